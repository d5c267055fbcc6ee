//! Arena storage and traversal for parsed DDR documents.

/// Upper bound on upward walks when resolving the context of a reference
/// site. DDR nesting below a script or layout is shallow; anything deeper
/// is treated as having no usable context.
pub const MAX_ANCESTOR_DEPTH: usize = 25;

/// Index of a node within its [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One element node. Text is the concatenation of the element's direct
/// text/CDATA children; nested element text is not merged in.
#[derive(Debug)]
pub struct Node {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Exclusive end of this node's subtree in the arena (preorder layout).
    subtree_end: u32,
    /// Byte offset of the start tag in the source text.
    byte_pos: usize,
}

/// A parsed DDR document: the node arena plus the raw source it was built
/// from. The raw text stays available for whole-document name counting and
/// line lookups.
pub struct Document {
    nodes: Vec<Node>,
    raw: String,
    line_starts: Vec<usize>,
}

impl Document {
    /// Parse XML source into an arena document. Fails only when roxmltree
    /// rejects the input outright.
    pub fn parse(source: &str) -> Result<Document, roxmltree::Error> {
        let parsed = roxmltree::Document::parse(source)?;

        let mut nodes = Vec::new();
        build_subtree(parsed.root_element(), None, &mut nodes);

        let mut line_starts = vec![0];
        for (offset, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset + 1);
            }
        }

        Ok(Document {
            nodes,
            raw: source.to_string(),
            line_starts,
        })
    }

    /// The document element.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The raw XML source this document was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Number of element nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn tag(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].tag
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id.index()]
            .attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value with a fallback for absent attributes.
    pub fn attr_or<'a>(&'a self, id: NodeId, name: &str, default: &'a str) -> &'a str {
        self.attr(id, name).unwrap_or(default)
    }

    /// Direct text content of the element (text and CDATA children only).
    pub fn text(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].text
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// First direct child with the given tag.
    pub fn child_by_tag(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.tag(child) == tag)
    }

    /// Walk upward from the parent of `id`, yielding at most
    /// [`MAX_ANCESTOR_DEPTH`] ancestors.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = self.parent(id);
        let mut remaining = MAX_ANCESTOR_DEPTH;
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            let next = current?;
            current = self.parent(next);
            Some(next)
        })
    }

    /// All nodes strictly below `id`, in document (preorder) order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let start = id.index() as u32 + 1;
        let end = self.nodes[id.index()].subtree_end;
        (start..end).map(NodeId)
    }

    /// Descendants of `id` with the given tag, in document order.
    pub fn descendants_by_tag<'a>(
        &'a self,
        id: NodeId,
        tag: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.descendants(id)
            .filter(move |&node| self.tag(node) == tag)
    }

    /// First descendant of `id` with the given tag.
    pub fn find_descendant(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(id).find(|&node| self.tag(node) == tag)
    }

    /// Every node in the document with the given tag, in document order.
    pub fn all_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        (0..self.nodes.len() as u32)
            .map(NodeId)
            .filter(move |&node| self.tag(node) == tag)
    }

    /// True when `ancestor` lies on the path from `id` to the root, within
    /// the bounded walk.
    pub fn has_ancestor(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(id).any(|node| node == ancestor)
    }

    /// 1-based line number of the node's start tag in the source.
    pub fn line_of(&self, id: NodeId) -> usize {
        let pos = self.nodes[id.index()].byte_pos;
        match self.line_starts.binary_search(&pos) {
            Ok(line) => line + 1,
            Err(line) => line,
        }
    }
}

fn build_subtree(
    element: roxmltree::Node<'_, '_>,
    parent: Option<NodeId>,
    nodes: &mut Vec<Node>,
) -> NodeId {
    let id = NodeId(nodes.len() as u32);

    let mut text = String::new();
    for child in element.children() {
        if child.is_text() {
            if let Some(piece) = child.text() {
                text.push_str(piece);
            }
        }
    }

    nodes.push(Node {
        tag: element.tag_name().name().to_string(),
        attrs: element
            .attributes()
            .map(|attr| (attr.name().to_string(), attr.value().to_string()))
            .collect(),
        text,
        parent,
        children: Vec::new(),
        subtree_end: 0,
        byte_pos: element.range().start,
    });

    let mut children = Vec::new();
    for child in element.children() {
        if child.is_element() {
            children.push(build_subtree(child, Some(id), nodes));
        }
    }

    let end = nodes.len() as u32;
    let node = &mut nodes[id.index()];
    node.children = children;
    node.subtree_end = end;

    id
}

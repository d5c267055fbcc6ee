//! Context resolution for reference sites.
//!
//! A reference node means different things depending on where it sits:
//! inside a Perform Script step, under a button, behind a trigger, in a
//! custom menu. All walks are bounded upward traversals over the arena.

use crate::catalog::Catalog;
use crate::document::{Document, NodeId};

use super::usage::SourceKind;

/// Script-trigger tags, at layout, object, file, and window level.
pub const TRIGGER_TAGS: &[&str] = &[
    "Trigger",
    "ScriptTriggers",
    "OnRecordLoad",
    "OnRecordCommit",
    "OnRecordRevert",
    "OnLayoutEnter",
    "OnLayoutExit",
    "OnLayoutKeystroke",
    "OnModeEnter",
    "OnModeExit",
    "OnViewChange",
    "OnObjectEnter",
    "OnObjectExit",
    "OnObjectModify",
    "OnObjectKeystroke",
    "OnObjectSave",
    "OnObjectValidate",
    "OnPanelSwitch",
    "OnTabSwitch",
    "OnFileAVPlayerChange",
    "OnGestureTap",
    "OnExternalCommandReceived",
    "OnWindowTransaction",
    "OnFileWindowOpen",
    "OnFileWindowClose",
];

/// Step ids of Perform Script (1) and Perform Script on Server (164).
const PERFORM_SCRIPT_STEP_IDS: &[&str] = &["1", "164"];

/// Nearest enclosing script definition's name.
pub fn owning_script<'a>(doc: &'a Document, catalog: &'a Catalog, node: NodeId) -> Option<&'a str> {
    doc.ancestors(node)
        .filter(|&ancestor| doc.tag(ancestor) == "Script")
        .filter_map(|ancestor| doc.attr(ancestor, "name"))
        .find(|name| catalog.scripts.contains_key(*name))
}

/// Nearest enclosing layout's name.
pub fn owning_layout<'a>(doc: &'a Document, node: NodeId) -> Option<&'a str> {
    doc.ancestors(node)
        .find(|&ancestor| doc.tag(ancestor) == "Layout")
        .and_then(|ancestor| doc.attr(ancestor, "name"))
}

/// Nearest enclosing base table's name.
pub fn owning_base_table<'a>(doc: &'a Document, node: NodeId) -> Option<&'a str> {
    doc.ancestors(node)
        .find(|&ancestor| doc.tag(ancestor) == "BaseTable")
        .and_then(|ancestor| doc.attr(ancestor, "name"))
}

/// First trigger tag found on the ancestor path.
pub fn trigger_tag<'a>(doc: &'a Document, node: NodeId) -> Option<&'a str> {
    for ancestor in doc.ancestors(node) {
        let tag = doc.tag(ancestor);
        if tag == "Trigger" {
            return Some(
                doc.attr(ancestor, "event")
                    .or_else(|| doc.attr(ancestor, "name"))
                    .unwrap_or("Trigger"),
            );
        }
        if TRIGGER_TAGS.contains(&tag) {
            return Some(tag);
        }
    }
    None
}

/// Menu path from enclosing menu set / menu / item, outermost first.
pub fn menu_path(doc: &Document, node: NodeId) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for ancestor in doc.ancestors(node) {
        match doc.tag(ancestor) {
            "CustomMenuItem" => parts.push(doc.attr_or(ancestor, "name", "Unknown Item")),
            "CustomMenu" => parts.push(doc.attr_or(ancestor, "name", "Unknown Menu")),
            "CustomMenuSet" => parts.push(doc.attr_or(ancestor, "name", "Unknown Menu Set")),
            _ => {}
        }
    }
    if parts.is_empty() {
        return None;
    }
    parts.reverse();
    Some(parts.join(" > "))
}

/// Layout name and object description for a node placed on a layout.
pub fn layout_object_context(doc: &Document, node: NodeId) -> (String, String) {
    let mut layout_name = String::new();
    let mut obj_info = String::new();
    for ancestor in doc.ancestors(node) {
        match doc.tag(ancestor) {
            "Layout" => {
                if layout_name.is_empty() {
                    layout_name = doc.attr_or(ancestor, "name", "Unknown Layout").to_string();
                }
            }
            "ButtonObj" => {
                if obj_info.is_empty() {
                    obj_info = "Button".to_string();
                }
            }
            "ButtonBarSegment" => {
                if obj_info.is_empty() {
                    obj_info = "ButtonBar Segment".to_string();
                }
            }
            "Object" => {
                if obj_info.is_empty() {
                    let obj_type = doc.attr_or(ancestor, "type", "Unknown");
                    match doc.attr(ancestor, "name") {
                        Some(name) if !name.is_empty() => {
                            obj_info = format!("{} '{}'", obj_type, name);
                        }
                        _ => obj_info = obj_type.to_string(),
                    }
                }
            }
            _ => {}
        }
    }
    if layout_name.is_empty() {
        layout_name = "Unknown Layout".to_string();
    }
    (layout_name, obj_info)
}

/// Context description for a JavaScript web-viewer call site.
pub fn javascript_context(doc: &Document, node: NodeId) -> String {
    let (layout_name, obj_info) = layout_object_context(doc, node);
    if obj_info.is_empty() {
        layout_name
    } else {
        format!("{} - {}", layout_name, obj_info)
    }
}

/// Classify a script reference node by its ancestor path. Returns the
/// source kind and a location description, or None when no context could
/// be recognized.
pub fn classify_script_reference(
    doc: &Document,
    catalog: &Catalog,
    node: NodeId,
) -> Option<(SourceKind, String)> {
    let path: Vec<&str> = doc.ancestors(node).map(|a| doc.tag(a)).collect();
    let has = |tag: &str| path.iter().any(|&t| t == tag);

    // 1. Perform Script / Perform Script on Server steps, credited to the
    // calling script. Self-references count: recursion is a real call.
    if has("Step") {
        if let Some(parent) = doc.parent(node) {
            if doc.tag(parent) == "Step" {
                let step_id = doc.attr_or(parent, "id", "");
                let step_name = doc.attr_or(parent, "name", "");
                if PERFORM_SCRIPT_STEP_IDS.contains(&step_id)
                    || step_name.contains("Perform Script")
                {
                    if let Some(caller) = owning_script(doc, catalog, node) {
                        return Some((SourceKind::Script, caller.to_string()));
                    }
                }
            }
        }
    }

    // 2. Buttons and other layout objects.
    if has("ButtonObj") || has("ButtonBarSegment") || has("Object") || has("Layout") {
        let (layout_name, obj_info) = layout_object_context(doc, node);
        let location = if obj_info.is_empty() {
            layout_name
        } else {
            format!("{} - {}", layout_name, obj_info)
        };
        return Some((SourceKind::Button, location));
    }

    // 3. Script triggers.
    if path.iter().any(|tag| TRIGGER_TAGS.contains(tag)) {
        let trigger = trigger_tag(doc, node).unwrap_or("Trigger");
        let context = trigger_context(doc, node);
        return Some((SourceKind::Trigger, format!("{} - {}", context, trigger)));
    }

    // 4. Custom menus.
    if has("CustomMenu") || has("CustomMenuItem") || has("CustomMenuSet") {
        if let Some(menu) = menu_path(doc, node) {
            return Some((SourceKind::Menu, menu));
        }
    }

    // 5. File options and window triggers.
    if has("FileOptions") || has("WindowTriggers") {
        if has("OnOpen") || has("OnFirstWindowOpen") {
            return Some((
                SourceKind::Other,
                "File Options - OnFirstWindowOpen".to_string(),
            ));
        }
        if has("OnClose") || has("OnLastWindowClose") {
            return Some((
                SourceKind::Other,
                "File Options - OnLastWindowClose".to_string(),
            ));
        }
        if has("OnWindowOpen") {
            return Some((
                SourceKind::Other,
                "Window Trigger - OnWindowOpen".to_string(),
            ));
        }
        if has("OnWindowClose") {
            return Some((
                SourceKind::Other,
                "Window Trigger - OnWindowClose".to_string(),
            ));
        }
    }

    // 6. Web viewers.
    if has("ExternalObj") || has("WebViewer") {
        return Some((SourceKind::WebViewer, javascript_context(doc, node)));
    }

    // 7. Value lists.
    if has("ValueList") {
        let name = doc
            .ancestors(node)
            .find(|&a| doc.tag(a) == "ValueList")
            .map(|a| doc.attr_or(a, "name", "Unknown Value List"))
            .unwrap_or("Unknown Value List");
        return Some((SourceKind::ValueList, name.to_string()));
    }

    None
}

/// Layout / field / object description for a trigger site.
fn trigger_context(doc: &Document, node: NodeId) -> String {
    let mut layout_name = "Unknown Layout".to_string();
    let mut field_name = String::new();
    let mut object_name = String::new();

    for ancestor in doc.ancestors(node) {
        match doc.tag(ancestor) {
            "Layout" => {
                if let Some(name) = doc.attr(ancestor, "name") {
                    layout_name = name.to_string();
                }
            }
            "Field" => {
                if field_name.is_empty() {
                    let name = doc.attr_or(ancestor, "name", "Unknown Field");
                    let table = owning_base_table(doc, ancestor).unwrap_or("Unknown Table");
                    field_name = format!("{}::{}", table, name);
                }
            }
            "Object" => {
                if object_name.is_empty() {
                    object_name = doc
                        .attr(ancestor, "name")
                        .filter(|name| !name.is_empty())
                        .unwrap_or(doc.attr_or(ancestor, "type", "Unknown"))
                        .to_string();
                }
            }
            _ => {}
        }
    }

    if !field_name.is_empty() {
        format!("{} - Field: {}", layout_name, field_name)
    } else if !object_name.is_empty() {
        format!("{} - Object: {}", layout_name, object_name)
    } else {
        layout_name
    }
}

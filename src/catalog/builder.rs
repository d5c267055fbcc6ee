//! Builds the entity catalog from a parsed document.
//!
//! The builder tolerates malformed exports: entries missing required
//! attributes fall back to placeholder names and are noted in the catalog's
//! error list. It never returns an error.

use crate::document::{Document, NodeId};

use super::types::{
    Catalog, CustomFunctionInfo, FieldInfo, LayoutInfo, RelationshipInfo, ScriptInfo, TableInfo,
    ValueListInfo,
};

/// Parent tags under which a `Layout` element is a reference, not a
/// definition.
const LAYOUT_REFERENCE_PARENTS: &[&str] = &["Step", "Parameter", "ButtonObj", "Relationship"];

/// Ancestor tags that mark a `Script` element as part of the script catalog.
const SCRIPT_CATALOG_TAGS: &[&str] = &["Scripts", "ScriptCatalog", "ScriptList"];

/// Build the catalog in one pass over the document.
pub fn build_catalog(doc: &Document) -> Catalog {
    let mut catalog = Catalog::default();

    collect_occurrences(doc, &mut catalog);
    collect_tables_and_fields(doc, &mut catalog);
    collect_scripts(doc, &mut catalog);
    collect_layouts(doc, &mut catalog);
    collect_custom_functions(doc, &mut catalog);
    collect_value_lists(doc, &mut catalog);
    collect_relationships(doc, &mut catalog);

    catalog
}

/// Occurrences come first: field and SQL lookups resolve through them.
fn collect_occurrences(doc: &Document, catalog: &mut Catalog) {
    for tag in ["Table", "TableOccurrence"] {
        for node in doc.all_by_tag(tag) {
            let name = match doc.attr(node, "name") {
                Some(name) if !name.is_empty() => name,
                _ => continue,
            };
            if let Some(base) = doc.attr(node, "baseTable") {
                if !base.is_empty() {
                    catalog.occurrences.insert(name, base);
                }
            }
        }
    }
}

fn collect_tables_and_fields(doc: &Document, catalog: &mut Catalog) {
    // Source 1: BaseTable elements with nested fields. This also covers
    // BaseTableCatalog//BaseTable//FieldCatalog/Field, since those fields
    // are descendants of their BaseTable.
    for table_node in doc.all_by_tag("BaseTable") {
        let table_name = match doc.attr(table_node, "name") {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                catalog.errors.push(format!(
                    "BaseTable without a name at line {}",
                    doc.line_of(table_node)
                ));
                continue;
            }
        };
        let table = catalog
            .tables
            .entry(table_name.clone())
            .or_insert_with(|| TableInfo {
                name: table_name,
                ..TableInfo::default()
            });
        for field_node in doc.descendants_by_tag(table_node, "Field") {
            if let Some(field) = field_from_node(doc, field_node) {
                table.add_field(field);
            }
        }
    }

    // Source 2: FieldCatalog entries that carry their own table attribute,
    // resolved through the occurrence map.
    for catalog_node in doc.all_by_tag("FieldCatalog") {
        for field_node in doc.children(catalog_node).to_vec() {
            if doc.tag(field_node) != "Field" {
                continue;
            }
            let table_attr = match doc.attr(field_node, "table") {
                Some(table) if !table.is_empty() => table,
                _ => continue,
            };
            let base = catalog.occurrences.resolve(table_attr).to_string();
            if let Some(field) = field_from_node(doc, field_node) {
                let table = catalog
                    .tables
                    .entry(base.clone())
                    .or_insert_with(|| TableInfo {
                        name: base,
                        ..TableInfo::default()
                    });
                table.add_field(field);
            }
        }
    }
}

fn field_from_node(doc: &Document, node: NodeId) -> Option<FieldInfo> {
    let name = doc.attr(node, "name")?;
    if name.is_empty() {
        return None;
    }
    Some(FieldInfo {
        name: name.to_string(),
        id: doc.attr_or(node, "id", "").to_string(),
        data_type: doc.attr_or(node, "dataType", "").to_string(),
    })
}

fn collect_scripts(doc: &Document, catalog: &mut Catalog) {
    for node in doc.all_by_tag("Script") {
        if !is_script_definition(doc, node) {
            continue;
        }

        let name = match doc.attr(node, "name") {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                catalog.errors.push(format!(
                    "Script definition without a name at line {}",
                    doc.line_of(node)
                ));
                "Unknown Script".to_string()
            }
        };
        let id = doc.attr_or(node, "id", "").to_string();
        let folder = script_folder(doc, node);

        // Later definitions win catalog identity.
        catalog.script_definitions.insert(node);
        if !id.is_empty() {
            catalog.scripts_by_id.insert(id.clone(), name.clone());
        }
        catalog.scripts.insert(
            name.clone(),
            ScriptInfo {
                name,
                id,
                folder,
                node,
            },
        );
    }
}

/// A Script element is a definition when it carries steps, or when it sits
/// in the script catalog. Access-only permission entries (an `Access`
/// subtree but no `StepList`) are catalog noise, not definitions.
fn is_script_definition(doc: &Document, node: NodeId) -> bool {
    // A Script nested in another script's body or in a layout object is a
    // reference even when the whole subtree sits inside the catalog.
    let in_reference_context = doc.ancestors(node).any(|ancestor| {
        matches!(
            doc.tag(ancestor),
            "Step" | "StepList" | "Script" | "ButtonObj" | "ButtonBarSegment" | "ValueList"
        )
    });
    if in_reference_context {
        return false;
    }
    let has_steps = doc.find_descendant(node, "Step").is_some();
    let in_catalog = doc
        .ancestors(node)
        .any(|ancestor| SCRIPT_CATALOG_TAGS.contains(&doc.tag(ancestor)));
    if !(has_steps || in_catalog) {
        return false;
    }
    let access_only = doc.find_descendant(node, "Access").is_some()
        && doc.find_descendant(node, "StepList").is_none();
    !access_only
}

/// Folder path from enclosing `Group` elements, outermost first.
fn script_folder(doc: &Document, node: NodeId) -> String {
    let mut parts: Vec<&str> = doc
        .ancestors(node)
        .filter(|&ancestor| doc.tag(ancestor) == "Group")
        .filter_map(|ancestor| doc.attr(ancestor, "name"))
        .collect();
    parts.reverse();
    parts.join("/")
}

fn collect_layouts(doc: &Document, catalog: &mut Catalog) {
    // Pass 1: layout paths and folder names from the LayoutCatalog tree.
    let mut paths: Vec<(String, String)> = Vec::new();
    for catalog_node in doc.all_by_tag("LayoutCatalog") {
        for node in doc.descendants(catalog_node) {
            match doc.tag(node) {
                "Group" => {
                    if let Some(name) = doc.attr(node, "name") {
                        if !name.is_empty() {
                            catalog.group_names.insert(name.to_string());
                        }
                    }
                }
                "Layout" => {
                    if let Some(id) = doc.attr(node, "id") {
                        if !id.is_empty() {
                            paths.push((id.to_string(), catalog_path(doc, node, catalog_node)));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    // Pass 2: actual layout definitions are Layout elements outside the
    // catalog and outside reference contexts.
    for node in doc.all_by_tag("Layout") {
        let name = match doc.attr(node, "name") {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };
        if catalog.group_names.contains(&name) {
            continue;
        }
        if doc
            .ancestors(node)
            .any(|ancestor| doc.tag(ancestor) == "LayoutCatalog")
        {
            continue;
        }
        if let Some(parent) = doc.parent(node) {
            if LAYOUT_REFERENCE_PARENTS.contains(&doc.tag(parent)) {
                continue;
            }
        }

        let id = doc.attr_or(node, "id", "").to_string();
        let path = paths
            .iter()
            .find(|(layout_id, _)| *layout_id == id)
            .map(|(_, path)| path.clone())
            .unwrap_or_else(|| "Top Level".to_string());

        // Later definitions win catalog identity.
        catalog.layout_definitions.insert(node);
        if !id.is_empty() {
            catalog.layouts_by_id.insert(id.clone(), name.clone());
        }
        catalog.layouts.insert(
            name.clone(),
            LayoutInfo {
                name,
                id,
                path,
                node,
            },
        );
    }
}

/// Folder path of a catalog entry: enclosing `Group` names up to the
/// catalog root, outermost first, joined with ` > `.
fn catalog_path(doc: &Document, node: NodeId, catalog_node: NodeId) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for ancestor in doc.ancestors(node) {
        if ancestor == catalog_node {
            break;
        }
        if doc.tag(ancestor) == "Group" {
            if let Some(name) = doc.attr(ancestor, "name") {
                if !name.is_empty() {
                    parts.push(name);
                }
            }
        }
    }
    if parts.is_empty() {
        return "Top Level".to_string();
    }
    parts.reverse();
    parts.join(" > ")
}

fn collect_custom_functions(doc: &Document, catalog: &mut Catalog) {
    for catalog_node in doc.all_by_tag("CustomFunctionCatalog") {
        for node in doc.descendants_by_tag(catalog_node, "CustomFunction") {
            let name = match doc.attr(node, "name") {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => {
                    catalog.errors.push(format!(
                        "CustomFunction without a name at line {}",
                        doc.line_of(node)
                    ));
                    continue;
                }
            };
            let definition = doc
                .find_descendant(node, "Calculation")
                .map(|calc| doc.text(calc).trim().to_string())
                .unwrap_or_default();
            catalog.custom_functions.insert(
                name.clone(),
                CustomFunctionInfo {
                    name,
                    id: doc.attr_or(node, "id", "").to_string(),
                    definition,
                },
            );
        }
    }
}

fn collect_value_lists(doc: &Document, catalog: &mut Catalog) {
    for catalog_node in doc.all_by_tag("ValueListCatalog") {
        for node in doc.descendants_by_tag(catalog_node, "ValueList") {
            if let Some(name) = doc.attr(node, "name") {
                if !name.is_empty() {
                    catalog.value_lists.push(ValueListInfo {
                        name: name.to_string(),
                        node,
                    });
                }
            }
        }
    }
}

fn collect_relationships(doc: &Document, catalog: &mut Catalog) {
    for node in doc.all_by_tag("Relationship") {
        let left = doc
            .child_by_tag(node, "LeftTable")
            .and_then(|child| doc.attr(child, "name"));
        let right = doc
            .child_by_tag(node, "RightTable")
            .and_then(|child| doc.attr(child, "name"));
        if let (Some(left), Some(right)) = (left, right) {
            catalog.relationships.push(RelationshipInfo {
                left_table: left.to_string(),
                right_table: right.to_string(),
                node,
            });
        }
    }
}

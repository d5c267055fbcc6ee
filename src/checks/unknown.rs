//! Unknown references.
//!
//! The inverse of the usage sheets: references whose target does not exist
//! in the catalog. Broken script calls, layout navigation to deleted
//! layouts, field references into renamed tables, calls to missing custom
//! functions. Each row is classified as a live error or explained away as
//! scheduled-for-deletion, debug, or commented-out code.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::document::NodeId;
use crate::report::{Cell, Sheet};
use crate::scan::extract_qualified_refs;

use super::{object_position, Check, CheckContext};

/// Builtin FileMaker function names that look like custom function calls.
const BUILTIN_FUNCTIONS: &[&str] = &[
    "If", "Let", "Get", "Set", "Sum", "Count", "Max", "Min", "Average", "Date", "Time",
    "Timestamp", "Year", "Month", "Day", "Hour", "Minute", "Second", "Left", "Right", "Middle",
    "Length", "Position", "Substitute", "Trim", "Upper", "Lower", "Proper", "TextStyleAdd",
    "TextStyleRemove", "PatternCount", "Filter", "FilterValues", "GetValue", "ValueCount", "List",
    "IsEmpty", "IsValid", "Case", "Choose", "Evaluate", "Extend", "Lookup", "Last", "GetField",
    "GetFieldName", "GetLayoutObjectAttribute", "Self", "GetNthRecord", "GetRepetition",
];

static FUNCTION_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s*\(").unwrap());

struct UnknownRow {
    kind: &'static str,
    context: String,
    location: String,
    error: String,
    details: &'static str,
    node: NodeId,
    /// Folder or path of the owning script/layout, for status needles.
    owner_path: String,
    /// The calculation text the reference came from, when there is one.
    calc_text: Option<String>,
    step_disabled: bool,
}

pub struct UnknownReferenceCheck;

impl Check for UnknownReferenceCheck {
    fn name(&self) -> &'static str {
        "Unknown References"
    }

    fn order(&self) -> usize {
        7
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<Sheet> {
        let mut found: Vec<UnknownRow> = Vec::new();
        self.scan_scripts(ctx, &mut found);
        self.scan_layouts(ctx, &mut found);
        self.scan_field_calculations(ctx, &mut found);
        self.scan_custom_functions(ctx, &mut found);
        self.scan_value_lists(ctx, &mut found);
        self.scan_relationships(ctx, &mut found);

        let mut rows: Vec<(usize, String, String, usize, Vec<Cell>)> = Vec::new();
        for item in found {
            let status = determine_status(&item);
            let commented = status == "Commented Out" || item.step_disabled || is_comment(&item);
            let kind_rank = match item.kind {
                "Script" => 0,
                "Field Calc" => 1,
                "Layout Field" => 2,
                "Layout Object" => 3,
                "Custom Function" => 4,
                "Value List" => 5,
                "Relationship" => 6,
                _ => 7,
            };
            let status_rank = match status {
                "Active Error" => 0,
                "To Delete" => 1,
                "Commented Out" => 2,
                _ => 3,
            };
            rows.push((
                kind_rank,
                item.context.clone(),
                item.location.clone(),
                status_rank,
                vec![
                    Cell::text(status),
                    Cell::text(item.kind),
                    Cell::text(&item.context),
                    Cell::text(&item.location),
                    Cell::text(if commented { "Yes" } else { "No" }),
                    Cell::text(&item.error),
                    Cell::int(ctx.doc.line_of(item.node)),
                    Cell::text(item.details),
                ],
            ));
        }
        rows.sort_by(|a, b| (a.0, &a.1, &a.2, a.3).cmp(&(b.0, &b.1, &b.2, b.3)));

        let mut sheet = Sheet::new(
            self.name(),
            self.order(),
            &[
                "Status",
                "Type",
                "Context",
                "Location",
                "Commented",
                "Error",
                "XML Line",
                "Details",
            ],
        );
        for (_, _, _, _, row) in rows {
            sheet.push_row(row);
        }
        Ok(sheet)
    }
}

impl UnknownReferenceCheck {
    fn scan_scripts(&self, ctx: &CheckContext<'_>, found: &mut Vec<UnknownRow>) {
        let doc = ctx.doc;
        let catalog = ctx.catalog;

        for script in catalog.scripts.values() {
            for step in doc.descendants_by_tag(script.node, "Step") {
                let step_name = doc.attr_or(step, "name", "Unknown Step");
                let step_number = doc
                    .attr(step, "index")
                    .or_else(|| doc.attr(step, "id"))
                    .unwrap_or("?");
                let location = format!("Step {}: {}", step_number, step_name);
                let disabled = doc.attr(step, "enable") == Some("False");

                if step_name == "Perform Script" {
                    for script_ref in doc.descendants_by_tag(step, "Script") {
                        let Some(target) = doc.attr(script_ref, "name") else {
                            continue;
                        };
                        if catalog.scripts.contains_key(target) {
                            continue;
                        }
                        found.push(UnknownRow {
                            kind: "Script",
                            context: script.name.clone(),
                            location: location.clone(),
                            error: format!("Unknown script: \"{}\"", target),
                            details: "Referenced script not found",
                            node: script_ref,
                            owner_path: script.folder.clone(),
                            calc_text: None,
                            step_disabled: disabled,
                        });
                    }
                }

                if step_name == "Go to Layout" {
                    for layout_ref in doc.descendants_by_tag(step, "Layout") {
                        let Some(target) = doc.attr(layout_ref, "name") else {
                            continue;
                        };
                        if catalog.layouts.contains_key(target)
                            || catalog.group_names.contains(target)
                        {
                            continue;
                        }
                        found.push(UnknownRow {
                            kind: "Script",
                            context: script.name.clone(),
                            location: location.clone(),
                            error: format!("Unknown layout: \"{}\"", target),
                            details: "Referenced layout not found",
                            node: layout_ref,
                            owner_path: script.folder.clone(),
                            calc_text: None,
                            step_disabled: disabled,
                        });
                    }
                }

                // Field references; Execute SQL payloads get their own
                // validation on the SQL sheet.
                if step_name != "Execute SQL" {
                    for field_ref in doc.descendants_by_tag(step, "Field") {
                        let (Some(table), Some(field)) =
                            (doc.attr(field_ref, "table"), doc.attr(field_ref, "name"))
                        else {
                            continue;
                        };
                        let base = catalog.occurrences.resolve(table);
                        if !catalog.is_base_table(base) {
                            found.push(UnknownRow {
                                kind: "Script",
                                context: script.name.clone(),
                                location: location.clone(),
                                error: format!("Unknown table: \"{}\"", table),
                                details: "Table not found",
                                node: field_ref,
                                owner_path: script.folder.clone(),
                                calc_text: None,
                                step_disabled: disabled,
                            });
                        } else if !catalog.has_field(table, field) {
                            found.push(UnknownRow {
                                kind: "Script",
                                context: script.name.clone(),
                                location: location.clone(),
                                error: format!("Unknown field: \"{}::{}\"", table, field),
                                details: "Field not found in table",
                                node: field_ref,
                                owner_path: script.folder.clone(),
                                calc_text: None,
                                step_disabled: disabled,
                            });
                        }
                    }
                }

                for calc in doc.descendants_by_tag(step, "Calculation") {
                    let text = doc.text(calc);
                    if text.contains("ExecuteSQL") {
                        continue;
                    }
                    for (table, field) in extract_qualified_refs(text) {
                        let base = catalog.occurrences.resolve(&table);
                        if !catalog.is_base_table(base) {
                            found.push(UnknownRow {
                                kind: "Script",
                                context: script.name.clone(),
                                location: location.clone(),
                                error: format!("Unknown table in calculation: \"{}\"", table),
                                details: "Table referenced in calculation not found",
                                node: calc,
                                owner_path: script.folder.clone(),
                                calc_text: Some(text.to_string()),
                                step_disabled: disabled,
                            });
                        } else if !catalog.has_field(&table, &field) {
                            found.push(UnknownRow {
                                kind: "Script",
                                context: script.name.clone(),
                                location: location.clone(),
                                error: format!(
                                    "Unknown field in calculation: \"{}::{}\"",
                                    table, field
                                ),
                                details: "Field referenced in calculation not found",
                                node: calc,
                                owner_path: script.folder.clone(),
                                calc_text: Some(text.to_string()),
                                step_disabled: disabled,
                            });
                        }
                    }
                }
            }
        }
    }

    fn scan_layouts(&self, ctx: &CheckContext<'_>, found: &mut Vec<UnknownRow>) {
        let doc = ctx.doc;
        let catalog = ctx.catalog;

        for layout in catalog.layouts.values() {
            for object in doc.descendants_by_tag(layout.node, "Object") {
                let position = object_position(doc, object);
                match doc.attr_or(object, "type", "") {
                    "Field" => {
                        let Some(field_ref) = doc.find_descendant(object, "Field") else {
                            continue;
                        };
                        let (Some(table), Some(field)) =
                            (doc.attr(field_ref, "table"), doc.attr(field_ref, "name"))
                        else {
                            continue;
                        };
                        let base = catalog.occurrences.resolve(table);
                        if !catalog.is_base_table(base) {
                            found.push(UnknownRow {
                                kind: "Layout Field",
                                context: layout.name.clone(),
                                location: format!("Field Object {}", position),
                                error: format!("Unknown table: \"{}\"", table),
                                details: "Table not found",
                                node: field_ref,
                                owner_path: layout.path.clone(),
                                calc_text: None,
                                step_disabled: false,
                            });
                        } else if !catalog.has_field(table, field) {
                            found.push(UnknownRow {
                                kind: "Layout Field",
                                context: layout.name.clone(),
                                location: format!("Field Object {}", position),
                                error: format!("Unknown field: \"{}::{}\"", table, field),
                                details: "Field not found in table",
                                node: field_ref,
                                owner_path: layout.path.clone(),
                                calc_text: None,
                                step_disabled: false,
                            });
                        }
                    }
                    "Button" => {
                        let button = doc
                            .attr(object, "name")
                            .filter(|name| !name.is_empty())
                            .unwrap_or("Unnamed Button");
                        for script_ref in doc.descendants_by_tag(object, "Script") {
                            let Some(target) = doc.attr(script_ref, "name") else {
                                continue;
                            };
                            if catalog.scripts.contains_key(target) {
                                continue;
                            }
                            found.push(UnknownRow {
                                kind: "Layout Object",
                                context: layout.name.clone(),
                                location: format!("Button: {} {}", button, position),
                                error: format!("Unknown script: \"{}\"", target),
                                details: "Script referenced by button not found",
                                node: script_ref,
                                owner_path: layout.path.clone(),
                                calc_text: None,
                                step_disabled: false,
                            });
                        }
                    }
                    "Portal" => {
                        let Some(portal) = doc.find_descendant(object, "Portal") else {
                            continue;
                        };
                        let Some(table) = doc.attr(portal, "table") else {
                            continue;
                        };
                        if catalog.is_known_table(table) {
                            continue;
                        }
                        found.push(UnknownRow {
                            kind: "Layout Object",
                            context: layout.name.clone(),
                            location: format!("Portal {}", position),
                            error: format!("Unknown portal table: \"{}\"", table),
                            details: "Portal table not found",
                            node: portal,
                            owner_path: layout.path.clone(),
                            calc_text: None,
                            step_disabled: false,
                        });
                    }
                    _ => {}
                }
            }
        }
    }

    fn scan_field_calculations(&self, ctx: &CheckContext<'_>, found: &mut Vec<UnknownRow>) {
        let doc = ctx.doc;
        let catalog = ctx.catalog;

        for table_node in doc.all_by_tag("BaseTable") {
            let Some(table_name) = doc.attr(table_node, "name") else {
                continue;
            };
            for field_node in doc.descendants_by_tag(table_node, "Field") {
                let Some(field_name) = doc.attr(field_node, "name") else {
                    continue;
                };
                let Some(calc) = doc.find_descendant(field_node, "Calculation") else {
                    continue;
                };
                let text = doc.text(calc);
                if text.contains("ExecuteSQL") {
                    continue;
                }
                for (table, field) in extract_qualified_refs(text) {
                    let base = catalog.occurrences.resolve(&table);
                    if !catalog.is_base_table(base) {
                        found.push(UnknownRow {
                            kind: "Field Calc",
                            context: table_name.to_string(),
                            location: format!("Field: {}", field_name),
                            error: format!("Unknown table in calculation: \"{}\"", table),
                            details: "Table referenced in calculation not found",
                            node: calc,
                            owner_path: String::new(),
                            calc_text: Some(text.to_string()),
                            step_disabled: false,
                        });
                    } else if !catalog.has_field(&table, &field) {
                        found.push(UnknownRow {
                            kind: "Field Calc",
                            context: table_name.to_string(),
                            location: format!("Field: {}", field_name),
                            error: format!(
                                "Unknown field in calculation: \"{}::{}\"",
                                table, field
                            ),
                            details: "Field referenced in calculation not found",
                            node: calc,
                            owner_path: String::new(),
                            calc_text: Some(text.to_string()),
                            step_disabled: false,
                        });
                    }
                }
            }
        }
    }

    fn scan_custom_functions(&self, ctx: &CheckContext<'_>, found: &mut Vec<UnknownRow>) {
        let doc = ctx.doc;
        let catalog = ctx.catalog;

        for function_node in doc.all_by_tag("CustomFunction") {
            let Some(name) = doc.attr(function_node, "name") else {
                continue;
            };
            if !catalog.custom_functions.contains_key(name) {
                continue;
            }
            let Some(calc) = doc.find_descendant(function_node, "Calculation") else {
                continue;
            };
            let text = doc.text(calc);
            for caps in FUNCTION_CALL_RE.captures_iter(text) {
                let candidate = &caps[1];
                if BUILTIN_FUNCTIONS.contains(&candidate)
                    || catalog.custom_functions.contains_key(candidate)
                {
                    continue;
                }
                found.push(UnknownRow {
                    kind: "Custom Function",
                    context: String::new(),
                    location: format!("Custom Function: {}", name),
                    error: format!("Unknown custom function: \"{}\"", candidate),
                    details: "Custom function call not found",
                    node: calc,
                    owner_path: String::new(),
                    calc_text: Some(text.to_string()),
                    step_disabled: false,
                });
            }
        }
    }

    fn scan_value_lists(&self, ctx: &CheckContext<'_>, found: &mut Vec<UnknownRow>) {
        let doc = ctx.doc;
        let catalog = ctx.catalog;

        for value_list in &catalog.value_lists {
            for field_ref in doc.descendants_by_tag(value_list.node, "Field") {
                let (Some(table), Some(field)) =
                    (doc.attr(field_ref, "table"), doc.attr(field_ref, "name"))
                else {
                    continue;
                };
                let base = catalog.occurrences.resolve(table);
                if !catalog.is_base_table(base) {
                    found.push(UnknownRow {
                        kind: "Value List",
                        context: String::new(),
                        location: format!("Value List: {}", value_list.name),
                        error: format!("Unknown table: \"{}\"", table),
                        details: "Table not found",
                        node: field_ref,
                        owner_path: String::new(),
                        calc_text: None,
                        step_disabled: false,
                    });
                } else if !catalog.has_field(table, field) {
                    found.push(UnknownRow {
                        kind: "Value List",
                        context: String::new(),
                        location: format!("Value List: {}", value_list.name),
                        error: format!("Unknown field: \"{}::{}\"", table, field),
                        details: "Field not found in table",
                        node: field_ref,
                        owner_path: String::new(),
                        calc_text: None,
                        step_disabled: false,
                    });
                }
            }
        }
    }

    fn scan_relationships(&self, ctx: &CheckContext<'_>, found: &mut Vec<UnknownRow>) {
        let doc = ctx.doc;
        let catalog = ctx.catalog;

        for relationship in &catalog.relationships {
            let name = doc.attr_or(relationship.node, "name", "Unknown Relationship");
            for pair in doc.descendants_by_tag(relationship.node, "FieldPair") {
                for (index, field_ref) in doc.descendants_by_tag(pair, "Field").enumerate() {
                    let (Some(table), Some(field)) =
                        (doc.attr(field_ref, "table"), doc.attr(field_ref, "name"))
                    else {
                        continue;
                    };
                    let location = format!("Relationship: {}, Field {}", name, index + 1);
                    let base = catalog.occurrences.resolve(table);
                    if !catalog.is_base_table(base) {
                        found.push(UnknownRow {
                            kind: "Relationship",
                            context: String::new(),
                            location,
                            error: format!("Unknown table: \"{}\"", table),
                            details: "Table not found",
                            node: field_ref,
                            owner_path: String::new(),
                            calc_text: None,
                            step_disabled: false,
                        });
                    } else if !catalog.has_field(table, field) {
                        found.push(UnknownRow {
                            kind: "Relationship",
                            context: String::new(),
                            location,
                            error: format!("Unknown field: \"{}::{}\"", table, field),
                            details: "Field not found in table",
                            node: field_ref,
                            owner_path: String::new(),
                            calc_text: None,
                            step_disabled: false,
                        });
                    }
                }
            }
        }
    }
}

/// Classify a broken reference: a real error, or one that is already
/// explained by where it lives or how it is written.
fn determine_status(item: &UnknownRow) -> &'static str {
    const DELETE_NEEDLES: &[&str] = &["to delete", "todelete", ">delete"];

    let haystacks = [
        item.context.to_lowercase(),
        item.location.to_lowercase(),
        item.error.to_lowercase(),
        item.owner_path.to_lowercase(),
    ];
    if haystacks
        .iter()
        .any(|text| DELETE_NEEDLES.iter().any(|needle| text.contains(needle)))
    {
        return "To Delete";
    }
    if haystacks[0].contains("temp")
        || haystacks[0].contains("debug")
        || haystacks[1].contains("temp")
        || haystacks[1].contains("debug")
        || haystacks[2].contains("temp")
        || haystacks[2].contains("debug")
    {
        return "Temp/Debug";
    }
    if item.step_disabled || is_comment(item) {
        return "Commented Out";
    }
    "Active Error"
}

/// True when the source calculation starts as a comment.
fn is_comment(item: &UnknownRow) -> bool {
    item.calc_text.as_deref().is_some_and(|text| {
        let trimmed = text.trim_start();
        trimmed.starts_with("/*") || trimmed.starts_with("//")
    })
}

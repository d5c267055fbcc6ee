//! SQL usage.
//!
//! Finds every calculation carrying an ExecuteSQL call, analyzes the
//! payloads lexically, and validates the extracted tables and fields
//! against the catalog. Sites inside layout objects get their own pass so
//! the row can say which object on which layout holds the query; the
//! document pass skips those calculations to avoid double rows.

use anyhow::Result;

use crate::document::NodeId;
use crate::report::{Cell, Sheet};
use crate::scan::{owning_base_table, owning_script};
use crate::sql::{analyze_sql, extract_execute_sql, validate_sql, SqlAnalysis, SqlValidation};

use super::{object_position, Check, CheckContext};

/// Tags whose text repeats a calculation shown elsewhere.
const ECHO_TAGS: &[&str] = &["StepText", "DisplayCalculation"];

pub struct SqlUsageCheck;

impl Check for SqlUsageCheck {
    fn name(&self) -> &'static str {
        "SQL Usage"
    }

    fn order(&self) -> usize {
        5
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<Sheet> {
        let doc = ctx.doc;
        let catalog = ctx.catalog;
        let mut rows: Vec<(usize, String, Vec<Cell>)> = Vec::new();

        // Document pass: scripts, field calculations, custom functions.
        for index in 0..doc.len() {
            let node = NodeId(index as u32);
            let text = doc.text(node);
            if !text.contains("ExecuteSQL") {
                continue;
            }
            let tag = doc.tag(node);
            if ECHO_TAGS.contains(&tag) {
                continue;
            }
            // Layout object calculations are handled by the object pass.
            if tag == "Calculation"
                && doc.ancestors(node).any(|ancestor| {
                    let tag = doc.tag(ancestor);
                    tag == "Object" || tag == "ExternalObject"
                })
            {
                continue;
            }
            let trimmed = text.trim();
            if trimmed.len() < 50 && !trimmed.starts_with("ExecuteSQL") {
                continue;
            }
            if trimmed.starts_with("PatternCount") || trimmed.starts_with("If [") {
                continue;
            }
            if extract_execute_sql(text).is_empty() {
                continue;
            }

            let (category, details, other_info) = site_context(ctx, node);
            let analysis = analyze_sql(text);
            let validation = validate_sql(&analysis, catalog);
            rows.push(build_row(
                ctx,
                node,
                &category,
                &details,
                &other_info,
                &analysis,
                &validation,
            ));
        }

        // Layout object pass.
        for layout in catalog.layouts.values() {
            for object in doc.descendants_by_tag(layout.node, "Object") {
                let Some((calc, context)) = object_sql_calc(ctx, object) else {
                    continue;
                };
                let text = doc.text(calc);
                let object_type = describe_object_type(ctx, object);
                let object_name = doc
                    .attr(object, "name")
                    .filter(|name| !name.is_empty())
                    .unwrap_or("Unnamed Object");
                let details = format!("{} (Name: {})", object_type, object_name);
                let other_info = format!(
                    "Layout: {}, {}, {}",
                    layout.name,
                    object_position(doc, object),
                    context
                );

                let analysis = analyze_sql(text);
                let validation = validate_sql(&analysis, catalog);
                rows.push(build_row(
                    ctx,
                    calc,
                    "Layout Object",
                    &details,
                    &other_info,
                    &analysis,
                    &validation,
                ));
            }
        }

        rows.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

        let mut sheet = Sheet::new(
            self.name(),
            self.order(),
            &[
                "Error Status",
                "Category",
                "Details",
                "Other Info",
                "SQL Text",
                "Tables",
                "Base Tables",
                "Fields",
                "Raw Field Matches",
                "Commented?",
                "Missing Tables",
                "Missing Fields",
                "XML Line",
                "Errors",
            ],
        );
        for (_, _, row) in rows {
            sheet.push_row(row);
        }
        Ok(sheet)
    }
}

/// Category / details / other-info for a site found in the document pass.
fn site_context(ctx: &CheckContext<'_>, node: NodeId) -> (String, String, String) {
    let doc = ctx.doc;

    if let Some(script) = owning_script(doc, ctx.catalog, node) {
        let step_info = doc
            .ancestors(node)
            .find(|&ancestor| doc.tag(ancestor) == "Step")
            .map(|step| {
                format!(
                    "Step {}: {}",
                    doc.attr_or(step, "index", "?"),
                    doc.attr_or(step, "name", "Unknown Step")
                )
            })
            .unwrap_or_else(|| "Script Step".to_string());
        return ("Script".to_string(), script.to_string(), step_info);
    }

    for ancestor in doc.ancestors(node) {
        match doc.tag(ancestor) {
            "Field" => {
                if let Some(field) = doc.attr(ancestor, "name") {
                    let table = owning_base_table(doc, ancestor).unwrap_or("Unknown Table");
                    return (
                        "Field Calc".to_string(),
                        format!("{}::{}", table, field),
                        String::new(),
                    );
                }
            }
            "CustomFunction" => {
                return (
                    "Custom Function".to_string(),
                    doc.attr_or(ancestor, "name", "Unknown Function").to_string(),
                    String::new(),
                );
            }
            _ => {}
        }
    }

    (
        "Other".to_string(),
        "Uncategorized".to_string(),
        "Unknown".to_string(),
    )
}

/// First calculation under a layout object that carries ExecuteSQL, with
/// the kind of slot it sits in. Hide conditions and conditional formatting
/// take priority over generic calculations.
fn object_sql_calc(ctx: &CheckContext<'_>, object: NodeId) -> Option<(NodeId, &'static str)> {
    let doc = ctx.doc;
    let slots: [(Option<NodeId>, &'static str); 3] = [
        (doc.find_descendant(object, "HideCondition"), "Hide Condition"),
        (
            doc.find_descendant(object, "ConditionalFormatting"),
            "Conditional Formatting",
        ),
        (Some(object), "Calculation"),
    ];
    for (container, context) in slots {
        let Some(container) = container else { continue };
        for calc in doc.descendants_by_tag(container, "Calculation") {
            if doc.text(calc).contains("ExecuteSQL") {
                return Some((calc, context));
            }
        }
    }
    None
}

fn describe_object_type(ctx: &CheckContext<'_>, object: NodeId) -> String {
    let doc = ctx.doc;
    let object_type = doc.attr_or(object, "type", "Unknown");
    if object_type != "ExternalObject" {
        return object_type.to_string();
    }
    match doc
        .find_descendant(object, "ExternalObj")
        .and_then(|external| doc.attr(external, "typeID"))
    {
        Some("WEBV") => "WebViewer".to_string(),
        Some(type_id) => format!("External ({})", type_id),
        None => "ExternalObject".to_string(),
    }
}

fn build_row(
    ctx: &CheckContext<'_>,
    node: NodeId,
    category: &str,
    details: &str,
    other_info: &str,
    analysis: &SqlAnalysis,
    validation: &SqlValidation,
) -> (usize, String, Vec<Cell>) {
    let doc = ctx.doc;
    let catalog = ctx.catalog;

    let mut table_lines: Vec<String> = Vec::new();
    let mut base_lines: Vec<String> = Vec::new();
    for table in &analysis.tables {
        let base = catalog.occurrences.resolve(table);
        if catalog.occurrences.is_alias(table) {
            table_lines.push(format!("{} (TO -> {})", table, base));
        } else {
            table_lines.push(table.clone());
        }
        if !base_lines.contains(&base.to_string()) {
            base_lines.push(base.to_string());
        }
    }

    let mut errors: Vec<&str> = Vec::new();
    if !validation.missing_tables.is_empty() {
        errors.push("Missing tables");
    }
    if !validation.missing_fields.is_empty() {
        errors.push("Missing fields");
    }
    if !validation.occurrence_warnings.is_empty() {
        errors.push("Table occurrence");
    }

    let priority = validation.issue.map(|issue| issue.priority()).unwrap_or(3);
    let first_table = table_lines
        .first()
        .map(|line| line.split(" (").next().unwrap_or(line).to_lowercase())
        .unwrap_or_default();

    let row = vec![
        Cell::text(validation.issue.map(|issue| issue.label()).unwrap_or("")),
        Cell::text(category),
        Cell::text(details),
        Cell::text(other_info),
        Cell::text(analysis.statements.join("\n")),
        Cell::text(table_lines.join("\n")),
        Cell::text(base_lines.join("\n")),
        Cell::text(analysis.fields.join("\n")),
        Cell::text(analysis.raw_matches.join("\n")),
        Cell::text(if analysis.commented { "commented out" } else { "" }),
        Cell::text(validation.missing_tables.join("\n")),
        Cell::text(validation.missing_fields.join("\n")),
        Cell::int(doc.line_of(node)),
        Cell::text(errors.join("; ")),
    ];
    (priority, first_table, row)
}

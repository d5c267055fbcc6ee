//! Table occurrence usage.
//!
//! Occurrences are referenced by name from script steps, layout bindings,
//! portals, and SQL payloads. Each occurrence row also carries its
//! relationship fan-out so a candidate for deletion can be judged against
//! the graph it would take down with it.

use std::collections::HashMap;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::catalog::Catalog;
use crate::document::NodeId;
use crate::report::{Cell, Sheet};
use crate::scan::OccurrenceCounter;

use super::{Check, CheckContext};

/// FROM/JOIN targets, bare or quoted either way.
static SQL_TABLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)FROM\s+([a-zA-Z0-9_]+)",
        r#"(?i)FROM\s+"([^"]+)""#,
        r"(?i)FROM\s+'([^']+)'",
        r"(?i)JOIN\s+([a-zA-Z0-9_]+)",
        r#"(?i)JOIN\s+"([^"]+)""#,
        r"(?i)JOIN\s+'([^']+)'",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Steps whose calculations commonly carry ExecuteSQL.
const SQL_BEARING_STEPS: &[&str] = &["Execute SQL", "Set Variable", "If", "Exit Loop If"];

type OccurrenceUsage = HashMap<String, Vec<String>>;

/// Record one usage site against a known occurrence, deduplicated.
fn record(catalog: &Catalog, usage: &mut OccurrenceUsage, name: &str, location: String) {
    if !catalog.occurrences.contains(name) {
        return;
    }
    let entries = usage.entry(name.to_string()).or_default();
    if !entries.contains(&location) {
        entries.push(location);
    }
}

pub struct TableOccurrenceCheck;

impl Check for TableOccurrenceCheck {
    fn name(&self) -> &'static str {
        "Table Occurrences"
    }

    fn order(&self) -> usize {
        6
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<Sheet> {
        let doc = ctx.doc;
        let catalog = ctx.catalog;

        let mut relationships: HashMap<&str, Vec<String>> = HashMap::new();
        for relationship in &catalog.relationships {
            relationships
                .entry(relationship.left_table.as_str())
                .or_default()
                .push(format!("-> {}", relationship.right_table));
            relationships
                .entry(relationship.right_table.as_str())
                .or_default()
                .push(format!("<- {}", relationship.left_table));
        }

        let mut usage = OccurrenceUsage::new();
        self.scan_scripts(ctx, &mut usage);
        self.scan_layouts(ctx, &mut usage);

        let counter =
            OccurrenceCounter::new(catalog.occurrences.iter().map(|(name, _)| name.to_string()))?;
        let xml_counts = counter.count(doc.raw());

        let mut rows: Vec<(usize, usize, String, Vec<Cell>)> = Vec::new();
        for (occurrence, base) in catalog.occurrences.iter() {
            let locations: &[String] = usage
                .get(occurrence)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let usage_count = locations.len();
            let xml_count = xml_counts.get(occurrence).copied().unwrap_or(0);
            let same_as_base = if occurrence == base
                || occurrence.strip_prefix("z_") == Some(base)
                || base.strip_prefix("z_") == Some(occurrence)
            {
                "Yes"
            } else {
                "No"
            };
            let related = relationships
                .get(occurrence)
                .map(|links| links.join("\n"))
                .unwrap_or_default();

            rows.push((
                usage_count,
                xml_count,
                occurrence.to_string(),
                vec![
                    Cell::text(occurrence),
                    Cell::text(base),
                    Cell::text(same_as_base),
                    Cell::int(xml_count),
                    Cell::int(usage_count),
                    Cell::text(locations.join("\n")),
                    Cell::text(related),
                ],
            ));
        }
        rows.sort_by(|a, b| (a.0, a.1, &a.2).cmp(&(b.0, b.1, &b.2)));

        let mut sheet = Sheet::new(
            self.name(),
            self.order(),
            &[
                "Table Occurrence",
                "Base Table",
                "Same as Base",
                "XML Occurrences",
                "Usage Count",
                "Usage Locations",
                "Relationships",
            ],
        );
        for (_, _, _, row) in rows {
            sheet.push_row(row);
        }
        Ok(sheet)
    }
}

impl TableOccurrenceCheck {
    fn scan_scripts(&self, ctx: &CheckContext<'_>, usage: &mut OccurrenceUsage) {
        let doc = ctx.doc;
        let catalog = ctx.catalog;

        for script in catalog.scripts.values() {
            for step in doc.descendants_by_tag(script.node, "Step") {
                let step_name = doc.attr_or(step, "name", "Unknown Step");
                let step_id = doc.attr_or(step, "id", "?");

                match step_name {
                    "Set Field" => {
                        if let Some(field_ref) = doc.find_descendant(step, "Field") {
                            if let Some(table) = doc.attr(field_ref, "table") {
                                record(
                                    catalog,
                                    usage,
                                    table,
                                    format!("Script '{}' Step {}: Set Field", script.name, step_id),
                                );
                            }
                        }
                    }
                    "Set Field By Name" => {
                        if let Some(calc) = doc.find_descendant(step, "Calculation") {
                            let text = doc.text(calc);
                            for (occurrence, _) in catalog.occurrences.iter() {
                                if text.contains(occurrence) {
                                    record(
                                        catalog,
                                        usage,
                                        occurrence,
                                        format!(
                                            "Script '{}' Step {}: Set Field By Name",
                                            script.name, step_id
                                        ),
                                    );
                                }
                            }
                        }
                    }
                    _ => {}
                }

                if SQL_BEARING_STEPS.contains(&step_name) {
                    for calc in doc.descendants_by_tag(step, "Calculation") {
                        let text = doc.text(calc);
                        if !text.contains("ExecuteSQL") {
                            continue;
                        }
                        let mut credited = false;
                        for name in sql_table_refs(text) {
                            if catalog.occurrences.contains(&name) {
                                record(
                                    catalog,
                                    usage,
                                    &name,
                                    format!(
                                        "Script '{}' Step {}: {} (ExecuteSQL)",
                                        script.name, step_id, step_name
                                    ),
                                );
                                credited = true;
                            }
                        }
                        // Fallback for queries built up from variables:
                        // any occurrence name appearing verbatim counts.
                        if step_name == "Execute SQL" && !credited {
                            let preview: String = text.chars().take(100).collect();
                            for (occurrence, _) in catalog.occurrences.iter() {
                                if text.contains(occurrence) {
                                    record(
                                        catalog,
                                        usage,
                                        occurrence,
                                        format!(
                                            "Script '{}' Step {}: Execute SQL - {}...",
                                            script.name, step_id, preview
                                        ),
                                    );
                                }
                            }
                        }
                    }
                } else if step_name == "Go to Layout" {
                    if let Some(layout_ref) = doc.find_descendant(step, "Layout") {
                        if let Some(table) = doc.attr(layout_ref, "table") {
                            let layout_name = doc.attr_or(layout_ref, "name", "Unknown Layout");
                            record(
                                catalog,
                                usage,
                                table,
                                format!(
                                    "Script '{}' Step {}: Go to Layout '{}'",
                                    script.name, step_id, layout_name
                                ),
                            );
                        }
                    }
                }

                for field_ref in doc.descendants_by_tag(step, "Field") {
                    if let Some(table) = doc.attr(field_ref, "table") {
                        record(
                            catalog,
                            usage,
                            table,
                            format!("Script '{}' Step {}: {}", script.name, step_id, step_name),
                        );
                    }
                }
            }
        }
    }

    fn scan_layouts(&self, ctx: &CheckContext<'_>, usage: &mut OccurrenceUsage) {
        let doc = ctx.doc;
        let catalog = ctx.catalog;

        for layout in catalog.layouts.values() {
            if let Some(table) = doc.attr(layout.node, "table") {
                record(
                    catalog,
                    usage,
                    table,
                    format!("Layout '{}' (Based on Table Occurrence)", layout.name),
                );
            }
            if let Some(table_ref) = doc.find_descendant(layout.node, "Table") {
                if let Some(name) = doc.attr(table_ref, "name") {
                    if Some(name) != doc.attr(layout.node, "table") {
                        record(
                            catalog,
                            usage,
                            name,
                            format!("Layout '{}' (Table Reference)", layout.name),
                        );
                    }
                }
            }

            for field_obj in doc.descendants_by_tag(layout.node, "FieldObj") {
                let Some(field_ref) = doc.find_descendant(field_obj, "Field") else {
                    continue;
                };
                let Some(table) = doc.attr(field_ref, "table") else {
                    continue;
                };
                record(
                    catalog,
                    usage,
                    table,
                    format!(
                        "Field Layout '{}' Object FieldObj {}",
                        layout.name,
                        bounds_label(ctx, field_obj)
                    ),
                );
            }

            for portal_obj in doc.descendants_by_tag(layout.node, "PortalObj") {
                let bounds = bounds_label(ctx, portal_obj);
                if let Some(alias) = doc.find_descendant(portal_obj, "TableAliasKey") {
                    let name = doc.text(alias).trim().to_string();
                    if !name.is_empty() {
                        record(
                            catalog,
                            usage,
                            &name,
                            format!("Portal Layout '{}' Object Portal {}", layout.name, bounds),
                        );
                    }
                }
                for calc in doc.descendants_by_tag(portal_obj, "Calculation") {
                    let text = doc.text(calc);
                    for (occurrence, _) in catalog.occurrences.iter() {
                        if text.contains(occurrence) {
                            record(
                                catalog,
                                usage,
                                occurrence,
                                format!(
                                    "Portal Filter Layout '{}' Object Portal {}",
                                    layout.name, bounds
                                ),
                            );
                        }
                    }
                }
            }

            for object in doc.descendants_by_tag(layout.node, "Object") {
                let object_type = doc.attr_or(object, "type", "Unknown");
                for calc in doc.descendants_by_tag(object, "Calculation") {
                    let context = match doc.parent(calc).map(|p| doc.tag(p)) {
                        Some("HideCondition") => "Hide Condition",
                        Some("Tooltip") => "Tooltip",
                        Some("ConditionalFormatting") => "Conditional Format",
                        Some(other) => other,
                        None => "Calculation",
                    };
                    let text = doc.text(calc);
                    if text.contains("ExecuteSQL") {
                        for name in sql_table_refs(text) {
                            record(
                                catalog,
                                usage,
                                &name,
                                format!(
                                    "{} on Layout '{}' - {} (ExecuteSQL)",
                                    context, layout.name, object_type
                                ),
                            );
                        }
                    } else {
                        for (occurrence, _) in catalog.occurrences.iter() {
                            if text.contains(occurrence) {
                                record(
                                    catalog,
                                    usage,
                                    occurrence,
                                    format!(
                                        "{} on Layout '{}' - {}",
                                        context, layout.name, object_type
                                    ),
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}

/// `Top N Left N` from an object's bounds, empty when absent.
fn bounds_label(ctx: &CheckContext<'_>, node: NodeId) -> String {
    let doc = ctx.doc;
    let Some(bounds) = doc.find_descendant(node, "Bounds") else {
        return String::new();
    };
    let top = doc
        .attr_or(bounds, "top", "0")
        .parse::<f64>()
        .unwrap_or(0.0) as i64;
    let left = doc
        .attr_or(bounds, "left", "0")
        .parse::<f64>()
        .unwrap_or(0.0) as i64;
    format!("Top {} Left {}", top, left)
}

/// Table names referenced from FROM/JOIN clauses, quoted or bare, cleaned
/// down to the first whitespace token.
fn sql_table_refs(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for pattern in SQL_TABLE_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            let cleaned = caps[1]
                .trim_matches(|c| c == '"' || c == '\'')
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_string();
            if !cleaned.is_empty() && !names.contains(&cleaned) {
                names.push(cleaned);
            }
        }
    }
    names
}

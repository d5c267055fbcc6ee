//! Custom function usage.
//!
//! A custom function call is just a name followed by an argument list (or a
//! bare name for zero-argument functions), so the scan is one word-boundary
//! pattern per function over every calculation text in the file. The call
//! corpus is collected once; the per-function scans are independent and run
//! in parallel on large solutions.

use std::collections::BTreeSet;

use anyhow::Result;
use rayon::prelude::*;
use regex::Regex;

use crate::catalog::Catalog;
use crate::document::Document;
use crate::report::{Cell, Sheet};
use crate::scan::format_grouped_locations;

use super::{Check, CheckContext, PARALLEL_THRESHOLD};

/// One calculation text somewhere a custom function could be called from.
struct CalcSite {
    location: String,
    /// Set when the site is another custom function's definition.
    caller: Option<String>,
    text: String,
}

pub struct CustomFunctionUsageCheck;

impl Check for CustomFunctionUsageCheck {
    fn name(&self) -> &'static str {
        "Custom Function Usage"
    }

    fn order(&self) -> usize {
        3
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<Sheet> {
        let sites = collect_sites(ctx.doc, ctx.catalog);

        let functions: Vec<&str> = ctx
            .catalog
            .custom_functions
            .keys()
            .map(String::as_str)
            .collect();

        let scan = |name: &&str| -> (String, Vec<usize>) {
            let pattern = format!(r"(?i)\b{}(?:\s*\(|\b)", regex::escape(name));
            let matched = match Regex::new(&pattern) {
                Ok(re) => sites
                    .iter()
                    .enumerate()
                    .filter(|(_, site)| re.is_match(&site.text))
                    .map(|(index, _)| index)
                    .collect(),
                Err(_) => Vec::new(),
            };
            (name.to_string(), matched)
        };
        let matches: Vec<(String, Vec<usize>)> = if functions.len() >= PARALLEL_THRESHOLD {
            functions.par_iter().map(scan).collect()
        } else {
            functions.iter().map(scan).collect()
        };

        let mut unused: Vec<Vec<Cell>> = Vec::new();
        let mut used: Vec<(i64, String, Vec<Cell>)> = Vec::new();
        for (name, site_indexes) in matches {
            let locations: Vec<String> = site_indexes
                .iter()
                .map(|&index| sites[index].location.clone())
                .collect();
            let callers: BTreeSet<&str> = site_indexes
                .iter()
                .filter_map(|&index| sites[index].caller.as_deref())
                .collect();
            let external = site_indexes
                .iter()
                .any(|&index| sites[index].caller.as_deref() != Some(name.as_str()));

            if !external {
                unused.push(vec![
                    Cell::text(&name),
                    Cell::int(0),
                    Cell::text("NOT USED"),
                    Cell::text("Unused"),
                ]);
                continue;
            }

            let mut used_in = format_grouped_locations(&locations, 10);
            let other_callers: Vec<&str> = callers
                .iter()
                .copied()
                .filter(|&caller| caller != name)
                .collect();
            if !other_callers.is_empty() {
                used_in.push_str(&format!("\nCalled by: {}", other_callers.join(", ")));
            }
            used.push((
                -(locations.len() as i64),
                name.to_lowercase(),
                vec![
                    Cell::text(&name),
                    Cell::int(locations.len()),
                    Cell::text(used_in.trim()),
                    Cell::text("Active"),
                ],
            ));
        }

        unused.sort_by(|a, b| a[0].as_text().cmp(&b[0].as_text()));
        used.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

        let mut sheet = Sheet::new(
            self.name(),
            self.order(),
            &["Custom Function", "Usage Count", "Used In", "Status"],
        );
        for row in unused {
            sheet.push_row(row);
        }
        for (_, _, row) in used {
            sheet.push_row(row);
        }
        Ok(sheet)
    }
}

/// Every calculation a custom function could be called from, with a
/// human-readable location.
fn collect_sites(doc: &Document, catalog: &Catalog) -> Vec<CalcSite> {
    let mut sites = Vec::new();
    let mut push = |location: String, caller: Option<String>, text: &str| {
        if !text.trim().is_empty() {
            sites.push(CalcSite {
                location,
                caller,
                text: text.to_string(),
            });
        }
    };

    for script in catalog.scripts.values() {
        for calc in doc.descendants_by_tag(script.node, "Calculation") {
            let location = match doc.parent(calc).filter(|&p| doc.tag(p) == "Step") {
                Some(step) => format!(
                    "Script: {}, Step {}: {}",
                    script.name,
                    doc.attr_or(step, "index", "?"),
                    doc.attr_or(step, "name", "Unknown Step")
                ),
                None => format!("Script: {}", script.name),
            };
            push(location, None, doc.text(calc));
        }
    }

    for table in doc.all_by_tag("BaseTable") {
        let Some(table_name) = doc.attr(table, "name") else {
            continue;
        };
        for field in doc.descendants_by_tag(table, "Field") {
            let Some(field_name) = doc.attr(field, "name") else {
                continue;
            };
            let qualified = format!("{}::{}", table_name, field_name);
            if let Some(calc) = doc.find_descendant(field, "Calculation") {
                push(format!("Field Calc: {}", qualified), None, doc.text(calc));
            }
            if let Some(auto_enter) = doc.find_descendant(field, "AutoEnter") {
                if let Some(calc) = doc.find_descendant(auto_enter, "Calculation") {
                    push(format!("Auto-Enter: {}", qualified), None, doc.text(calc));
                }
            }
            if let Some(validation) = doc.find_descendant(field, "Validation") {
                if let Some(calc) = doc.find_descendant(validation, "Calculation") {
                    push(format!("Validation: {}", qualified), None, doc.text(calc));
                }
            }
        }
    }

    for layout in catalog.layouts.values() {
        for object in doc.descendants_by_tag(layout.node, "Object") {
            let object_type = doc.attr_or(object, "type", "Unknown");
            let object_name = doc.attr_or(object, "name", "");
            for calc in doc.descendants_by_tag(object, "Calculation") {
                let context = match doc.parent(calc).map(|p| doc.tag(p)) {
                    Some("HideCondition") => " (Hide)",
                    Some("ConditionalFormatting") => " (Conditional)",
                    Some("Tooltip") => " (Tooltip)",
                    _ => "",
                };
                let mut location = format!("Layout Object: {} - {}", layout.name, object_type);
                if !object_name.is_empty() {
                    location.push_str(&format!(" '{}'", object_name));
                }
                location.push_str(context);
                push(location, None, doc.text(calc));
            }
        }
    }

    for value_list in &catalog.value_lists {
        if let Some(calc) = doc.find_descendant(value_list.node, "Calculation") {
            push(
                format!("Value List: {}", value_list.name),
                None,
                doc.text(calc),
            );
        }
    }

    for privilege_set in doc.all_by_tag("PrivilegeSet") {
        let set_name = doc.attr_or(privilege_set, "name", "Unknown Privilege Set");
        for calc in doc.descendants_by_tag(privilege_set, "Calculation") {
            push(format!("Privilege Set: {}", set_name), None, doc.text(calc));
        }
    }

    for function in catalog.custom_functions.values() {
        let location = format!("Custom Function: {}", function.name);
        let text = function.definition.clone();
        if !text.trim().is_empty() {
            sites.push(CalcSite {
                location,
                caller: Some(function.name.clone()),
                text,
            });
        }
    }

    sites
}

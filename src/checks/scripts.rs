//! Script usage.
//!
//! Every `Script` element that is not a definition is a reference; the
//! classifier buckets it by its ancestor path. The raw XML count from the
//! occurrence automaton backstops the structured scan: a script whose name
//! barely appears in the export is unused even if some exotic call site
//! slipped past the classifier.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;

use crate::report::{Cell, Sheet};
use crate::scan::{
    classify_script_reference, extract_js_script_calls, format_locations, javascript_context,
    OccurrenceCounter, SourceKind,
};

use super::{Check, CheckContext};

#[derive(Default)]
struct ScriptUsage {
    from_scripts: Vec<String>,
    from_buttons: Vec<String>,
    from_triggers: Vec<String>,
    from_menus: Vec<String>,
    from_value_lists: Vec<String>,
    from_web_viewers: Vec<String>,
    from_other: Vec<String>,
}

impl ScriptUsage {
    fn total(&self) -> usize {
        self.from_scripts.len()
            + self.from_buttons.len()
            + self.from_triggers.len()
            + self.from_menus.len()
            + self.from_value_lists.len()
            + self.from_web_viewers.len()
            + self.from_other.len()
    }

    /// True when the only callers are the script itself.
    fn is_self_referential(&self, own_name: &str) -> bool {
        if self.from_scripts.is_empty() {
            return false;
        }
        let callers: BTreeSet<&str> = self.from_scripts.iter().map(String::as_str).collect();
        callers.len() == 1
            && callers.contains(own_name)
            && self.from_buttons.is_empty()
            && self.from_triggers.is_empty()
            && self.from_menus.is_empty()
            && self.from_value_lists.is_empty()
            && self.from_web_viewers.is_empty()
            && self.from_other.is_empty()
    }
}

pub struct ScriptUsageCheck;

impl Check for ScriptUsageCheck {
    fn name(&self) -> &'static str {
        "Script Usage"
    }

    fn order(&self) -> usize {
        2
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<Sheet> {
        let doc = ctx.doc;
        let catalog = ctx.catalog;

        let counter = OccurrenceCounter::new(catalog.scripts.keys().cloned())?;
        let xml_counts = counter.count(doc.raw());

        let mut usage: BTreeMap<&str, ScriptUsage> = catalog
            .scripts
            .keys()
            .map(|name| (name.as_str(), ScriptUsage::default()))
            .collect();
        let mut unclassified = 0usize;

        for node in doc.all_by_tag("Script") {
            if catalog.script_definitions.contains(&node) {
                continue;
            }
            let name = doc
                .attr(node, "id")
                .and_then(|id| catalog.scripts_by_id.get(id))
                .map(String::as_str)
                .or_else(|| {
                    doc.attr(node, "name")
                        .filter(|name| catalog.scripts.contains_key(*name))
                });
            let Some(script_name) = name else { continue };

            match classify_script_reference(doc, catalog, node) {
                Some((kind, location)) => {
                    let Some(entry) = usage.get_mut(script_name) else {
                        continue;
                    };
                    match kind {
                        SourceKind::Script => entry.from_scripts.push(location),
                        SourceKind::Button => entry.from_buttons.push(location),
                        SourceKind::Trigger => entry.from_triggers.push(location),
                        SourceKind::Menu => entry.from_menus.push(location),
                        SourceKind::ValueList => entry.from_value_lists.push(location),
                        SourceKind::WebViewer => entry.from_web_viewers.push(location),
                        _ => entry.from_other.push(location),
                    }
                }
                None => {
                    unclassified += 1;
                    if ctx.debug {
                        println!(
                            "  [debug] unclassified reference to '{}' at line {}",
                            script_name,
                            doc.line_of(node)
                        );
                    }
                }
            }
        }

        // Perform JavaScript in Web Viewer calls scripts by name inside the
        // step text, invisible to the Script-element scan.
        for step in doc.all_by_tag("Step") {
            let is_js_step = doc.attr(step, "id") == Some("175")
                || doc.attr(step, "name") == Some("Perform JavaScript in Web Viewer");
            if !is_js_step {
                continue;
            }
            let Some(step_text) = doc.find_descendant(step, "StepText") else {
                continue;
            };
            for called in extract_js_script_calls(doc.text(step_text)) {
                if let Some(entry) = usage.get_mut(called.as_str()) {
                    entry.from_other.push(format!(
                        "JavaScript in Web Viewer - {}",
                        javascript_context(doc, step)
                    ));
                }
            }
        }

        if ctx.debug && unclassified > 0 {
            println!("  [debug] {} script references left unclassified", unclassified);
        }

        let mut rows: Vec<(usize, i64, String, Vec<Cell>)> = Vec::new();
        for script in catalog.scripts.values() {
            let entry = &usage[script.name.as_str()];
            let self_only = entry.is_self_referential(&script.name);
            let total = if self_only { 0 } else { entry.total() };
            let xml_count = xml_counts.get(&script.name).copied().unwrap_or(0);

            let name_lower = script.name.to_lowercase();
            let folder_lower = script.folder.to_lowercase();
            let special = if folder_lower.contains("todelete") {
                Some("Scheduled For Deletion")
            } else if name_lower.contains("server") {
                Some("Server")
            } else if name_lower.contains("debug") {
                Some("Debug")
            } else if name_lower.contains("dev playground")
                || folder_lower.contains("dev playground")
            {
                Some("Dev Playground")
            } else {
                None
            };

            // A self-recursive script's own call sites inflate the raw
            // count, so the xml_count gate does not apply to it.
            let status = match special {
                Some(special) => special,
                None if self_only => "Not Used",
                None if total == 0 && xml_count <= 2 => "Not Used",
                None if total == 0 => "Check Manually",
                None => "Active",
            };
            let rank = match status {
                "Not Used" => 0,
                "Check Manually" => 1,
                "Server" => 2,
                "Debug" => 3,
                "Dev Playground" => 4,
                "Scheduled For Deletion" => 5,
                _ => 6,
            };

            rows.push((
                rank,
                -(total as i64),
                name_lower,
                vec![
                    Cell::text(&script.name),
                    Cell::int(total),
                    Cell::text(status),
                    Cell::int(xml_count),
                    Cell::text(format_locations(&entry.from_scripts, 3)),
                    Cell::text(format_locations(&entry.from_buttons, 3)),
                    Cell::text(format_locations(&entry.from_triggers, 3)),
                    Cell::text(format_locations(&entry.from_menus, 3)),
                    Cell::text(format_locations(
                        &[
                            entry.from_value_lists.clone(),
                            entry.from_web_viewers.clone(),
                            entry.from_other.clone(),
                        ]
                        .concat(),
                        3,
                    )),
                ],
            ));
        }
        rows.sort_by(|a, b| (a.0, a.1, &a.2).cmp(&(b.0, b.1, &b.2)));

        let mut sheet = Sheet::new(
            self.name(),
            self.order(),
            &[
                "Script Name",
                "Total Usage",
                "Status",
                "XML Count",
                "Called from Scripts",
                "Called from Buttons",
                "Called from Triggers",
                "Called from Menus",
                "Called from Other",
            ],
        );
        for (_, _, _, row) in rows {
            sheet.push_row(row);
        }
        Ok(sheet)
    }
}

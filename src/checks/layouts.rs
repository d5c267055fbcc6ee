//! Layout usage.
//!
//! Collects every structured way a layout can be reached: Go to Layout
//! steps (including the related-record and window variants), buttons,
//! layout triggers, relationships, value lists, the file's default layout,
//! and custom menus. Raw name counting is useless for layouts because
//! every layout serializes its own name dozens of times, so this check is
//! purely structural.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::report::{Cell, Sheet};
use crate::scan::format_locations;

use super::{Check, CheckContext};

/// Steps other than Go to Layout that carry a target layout.
const NAVIGATION_STEPS: &[&str] = &["Go to Related Record", "New Window", "Select Window"];

/// Layout-level trigger containers searched for Go to Layout steps.
const LAYOUT_TRIGGER_TAGS: &[&str] = &[
    "OnRecordLoad",
    "OnRecordCommit",
    "OnRecordRevert",
    "OnLayoutEnter",
    "OnLayoutExit",
    "OnLayoutKeystroke",
    "OnModeEnter",
    "OnModeExit",
    "OnViewChange",
];

#[derive(Default)]
struct LayoutUsage {
    scripts: Vec<String>,
    buttons: Vec<String>,
    triggers: Vec<String>,
    other: Vec<String>,
}

impl LayoutUsage {
    fn total(&self) -> usize {
        self.scripts.len() + self.buttons.len() + self.triggers.len() + self.other.len()
    }
}

pub struct LayoutUsageCheck;

impl Check for LayoutUsageCheck {
    fn name(&self) -> &'static str {
        "Layout Usage"
    }

    fn order(&self) -> usize {
        1
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<Sheet> {
        let doc = ctx.doc;
        let catalog = ctx.catalog;

        let mut usage: BTreeMap<&str, LayoutUsage> = catalog
            .layouts
            .keys()
            .map(|name| (name.as_str(), LayoutUsage::default()))
            .collect();

        // Script navigation.
        for script in catalog.scripts.values() {
            for step in doc.descendants_by_tag(script.node, "Step") {
                let step_name = doc.attr_or(step, "name", "");
                if step_name == "Go to Layout" {
                    if let Some(target) = doc.find_descendant(step, "Layout") {
                        if let Some(name) = doc.attr(target, "name") {
                            if let Some(entry) = usage.get_mut(name) {
                                entry.scripts.push(script.name.clone());
                            }
                        }
                    }
                    // Some export versions put the target on the parameter.
                    for param in doc.descendants_by_tag(step, "Parameter") {
                        if let Some(name) = doc.attr(param, "layout") {
                            if let Some(entry) = usage.get_mut(name) {
                                entry.scripts.push(script.name.clone());
                            }
                        }
                    }
                } else if NAVIGATION_STEPS.contains(&step_name) {
                    if let Some(target) = doc.find_descendant(step, "Layout") {
                        if let Some(name) = doc.attr(target, "name") {
                            if let Some(entry) = usage.get_mut(name) {
                                entry
                                    .scripts
                                    .push(format!("{} ({})", script.name, step_name));
                            }
                        }
                    }
                }
            }
        }

        // Buttons and layout triggers.
        for layout in catalog.layouts.values() {
            for object in doc.descendants_by_tag(layout.node, "Object") {
                let object_type = doc.attr_or(object, "type", "Unknown");
                let object_name = doc.attr_or(object, "name", "");
                for step in doc.descendants_by_tag(object, "Step") {
                    if doc.attr(step, "name") != Some("Go to Layout") {
                        continue;
                    }
                    let Some(target) = doc.find_descendant(step, "Layout") else {
                        continue;
                    };
                    let Some(name) = doc.attr(target, "name") else {
                        continue;
                    };
                    if let Some(entry) = usage.get_mut(name) {
                        let label = if object_name.is_empty() {
                            object_type
                        } else {
                            object_name
                        };
                        entry.buttons.push(format!("{} - {}", layout.name, label));
                    }
                }
            }

            for trigger_tag in LAYOUT_TRIGGER_TAGS {
                let Some(trigger) = doc.find_descendant(layout.node, trigger_tag) else {
                    continue;
                };
                for step in doc.descendants_by_tag(trigger, "Step") {
                    if doc.attr(step, "name") != Some("Go to Layout") {
                        continue;
                    }
                    let Some(target) = doc.find_descendant(step, "Layout") else {
                        continue;
                    };
                    let Some(name) = doc.attr(target, "name") else {
                        continue;
                    };
                    if let Some(entry) = usage.get_mut(name) {
                        entry
                            .triggers
                            .push(format!("{} - {}", layout.name, trigger_tag));
                    }
                }
            }
        }

        // Relationships, value lists, file options, custom menus.
        for relationship in &catalog.relationships {
            let rel_name = doc.attr_or(relationship.node, "name", "Unknown Relationship");
            for target in doc.descendants_by_tag(relationship.node, "Layout") {
                if let Some(name) = doc.attr(target, "name") {
                    if let Some(entry) = usage.get_mut(name) {
                        entry.other.push(rel_name.to_string());
                    }
                }
            }
        }

        for value_list in &catalog.value_lists {
            for target in doc.descendants_by_tag(value_list.node, "Layout") {
                if let Some(name) = doc.attr(target, "name") {
                    if let Some(entry) = usage.get_mut(name) {
                        entry.other.push(value_list.name.clone());
                    }
                }
            }
        }

        for options in doc.all_by_tag("FileOptions") {
            if let Some(default) = doc.find_descendant(options, "DefaultLayout") {
                if let Some(name) = doc.attr(default, "name") {
                    if let Some(entry) = usage.get_mut(name) {
                        entry.other.push("File Options - Default Layout".to_string());
                    }
                }
            }
        }

        for menu_set in doc.all_by_tag("CustomMenuSet") {
            let set_name = doc.attr_or(menu_set, "name", "Unknown Menu Set");
            for menu in doc.descendants_by_tag(menu_set, "CustomMenu") {
                let menu_name = doc.attr_or(menu, "name", "Unknown Menu");
                for item in doc.descendants_by_tag(menu, "CustomMenuItem") {
                    let item_name = doc.attr_or(item, "name", "Unknown Item");
                    for step in doc.descendants_by_tag(item, "Step") {
                        if doc.attr(step, "name") != Some("Go to Layout") {
                            continue;
                        }
                        let Some(target) = doc.find_descendant(step, "Layout") else {
                            continue;
                        };
                        let Some(name) = doc.attr(target, "name") else {
                            continue;
                        };
                        if let Some(entry) = usage.get_mut(name) {
                            entry
                                .other
                                .push(format!("{} > {} > {}", set_name, menu_name, item_name));
                        }
                    }
                }
            }
        }

        // Rows, worst first.
        let mut rows: Vec<(usize, String, String, Vec<Cell>)> = Vec::new();
        for layout in catalog.layouts.values() {
            let entry = &usage[layout.name.as_str()];
            let total = entry.total();
            let path_lower = layout.path.to_lowercase();
            let status = if path_lower.contains("delete") {
                "In Delete Folder"
            } else if path_lower.contains("debug") {
                "In Debug Folder"
            } else if total == 0 {
                "Not Used"
            } else {
                "Active"
            };
            let rank = match status {
                "Not Used" => 0,
                "In Debug Folder" => 1,
                "In Delete Folder" => 2,
                _ => 3,
            };
            rows.push((
                rank,
                path_lower,
                layout.name.to_lowercase(),
                vec![
                    Cell::text(&layout.name),
                    Cell::text(&layout.path),
                    Cell::int(total),
                    Cell::text(status),
                    Cell::text(format_locations(&entry.scripts, 3)),
                    Cell::text(format_locations(&entry.buttons, 3)),
                    Cell::text(format_locations(&entry.triggers, 3)),
                    Cell::text(format_locations(&entry.other, 3)),
                ],
            ));
        }
        rows.sort_by(|a, b| (a.0, &a.1, &a.2).cmp(&(b.0, &b.1, &b.2)));

        let mut sheet = Sheet::new(
            self.name(),
            self.order(),
            &[
                "Layout Name",
                "Path",
                "Total Usage",
                "Status",
                "Used in Scripts",
                "Used in Buttons",
                "Used in Triggers",
                "Used in Other",
            ],
        );
        for (_, _, _, row) in rows {
            sheet.push_row(row);
        }
        Ok(sheet)
    }
}

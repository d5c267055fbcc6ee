//! Reference source kinds and location list formatting.

/// Where a reference was found. Classification happens at scan time from
/// the reference site's ancestors, so downstream sheets only bucket by
/// this kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A script step or step calculation.
    Script,
    /// A button or button bar segment on a layout.
    Button,
    /// A script trigger (layout, object, file, or window level).
    Trigger,
    /// A custom menu item.
    Menu,
    ValueList,
    WebViewer,
    Other,
}

/// Dedupe (preserving first-seen order), cap the list, and append a
/// `...and N more` line for the remainder.
pub fn format_locations(locations: &[String], max_items: usize) -> String {
    let mut unique: Vec<&str> = Vec::new();
    for location in locations {
        if !unique.contains(&location.as_str()) {
            unique.push(location);
        }
    }
    if unique.is_empty() {
        return String::new();
    }
    if unique.len() <= max_items {
        return unique.join("\n");
    }
    let remaining = unique.len() - max_items;
    let mut shown: Vec<String> = unique[..max_items].iter().map(|s| s.to_string()).collect();
    shown.push(format!("...and {} more", remaining));
    shown.join("\n")
}

/// Group locations by their `Type:` prefix, show up to three per group
/// (two plus a remainder line when a group is larger), and cap the overall
/// output.
pub fn format_grouped_locations(locations: &[String], overall_cap: usize) -> String {
    use std::collections::BTreeMap;

    let mut groups: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for location in locations {
        let group = location
            .split(':')
            .next()
            .unwrap_or("Other")
            .trim()
            .to_string();
        groups.entry(group).or_default().push(location);
    }

    let mut formatted: Vec<String> = Vec::new();
    for (group, members) in &groups {
        if members.len() <= 3 {
            formatted.extend(members.iter().map(|s| s.to_string()));
        } else {
            formatted.extend(members[..2].iter().map(|s| s.to_string()));
            formatted.push(format!("...and {} more {}(s)", members.len() - 2, group));
        }
    }
    formatted.truncate(overall_cap);
    formatted.join("\n")
}

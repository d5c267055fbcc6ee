//! Field usage.
//!
//! Fields hide in more places than any other entity: layout objects,
//! placeholder and display calculations, portals, web viewer URLs, merge
//! text, script parameters, field mappings, calculation chains, SQL
//! payloads, relationships, and value lists. Every scan strategy credits
//! the field's base table, so occurrences collapse onto one row per
//! defined field. Layout and script shards are independent and run in
//! parallel on large solutions.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use anyhow::Result;
use rayon::prelude::*;
use regex::Regex;

use crate::catalog::{Catalog, LayoutInfo, ScriptInfo, TableInfo};
use crate::document::{Document, NodeId};
use crate::report::{Cell, Sheet};
use crate::scan::{
    extract_chunk_field_refs, extract_dotted_refs, extract_embedded_field_refs,
    extract_field_id_refs, extract_merge_fields, extract_qualified_refs,
    extract_script_param_fields, format_locations, owning_base_table, owning_layout,
    owning_script, OccurrenceCounter,
};
use crate::sql::extract_execute_sql;
use crate::util::{contains_ci, contains_word, starts_with_ci};

use super::{object_position, Check, CheckContext, PARALLEL_THRESHOLD};

/// Housekeeping fields that exist on every table by convention.
const SYSTEM_FIELDS: &[&str] = &[
    "CreatedBy",
    "DateCreated_c",
    "ModificationTimestamp",
    "CreationTimestamp",
    "ModifiedBy",
    "PrimaryKey",
    "Count_s",
];

static GLOBALS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Globals::([A-Za-z0-9_]+)").unwrap());

static SQL_FROM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)FROM\s+([a-zA-Z0-9_]+)").unwrap());

type FieldKey = (String, String);
type UsageMap = HashMap<FieldKey, FieldUsage>;

#[derive(Clone, Copy)]
enum Bucket {
    Layouts,
    Scripts,
    Calculations,
    Sql,
    ValueLists,
    Relationships,
    WebViewers,
}

#[derive(Debug, Default)]
struct FieldUsage {
    layouts: Vec<String>,
    scripts: Vec<String>,
    calculations: Vec<String>,
    sql: Vec<String>,
    value_lists: Vec<String>,
    relationships: Vec<String>,
    web_viewers: Vec<String>,
}

impl FieldUsage {
    fn total(&self) -> usize {
        self.layouts.len()
            + self.scripts.len()
            + self.calculations.len()
            + self.sql.len()
            + self.value_lists.len()
            + self.relationships.len()
            + self.web_viewers.len()
    }
}

fn merge(into: &mut UsageMap, from: UsageMap) {
    for (key, value) in from {
        let entry = into.entry(key).or_default();
        entry.layouts.extend(value.layouts);
        entry.scripts.extend(value.scripts);
        entry.calculations.extend(value.calculations);
        entry.sql.extend(value.sql);
        entry.value_lists.extend(value.value_lists);
        entry.relationships.extend(value.relationships);
        entry.web_viewers.extend(value.web_viewers);
    }
}

pub struct FieldUsageCheck;

impl Check for FieldUsageCheck {
    fn name(&self) -> &'static str {
        "Field Usage"
    }

    fn order(&self) -> usize {
        4
    }

    fn run(&self, ctx: &CheckContext<'_>) -> Result<Sheet> {
        let doc = ctx.doc;
        let catalog = ctx.catalog;
        let scanner = FieldScanner { doc, catalog };
        let mut usage = UsageMap::new();

        // Layout and script shards, parallel when the solution is big
        // enough to pay for it. Shard results are merged in document order
        // so location lists stay deterministic.
        let layouts: Vec<&LayoutInfo> = catalog.layouts.values().collect();
        let layout_maps: Vec<UsageMap> = if layouts.len() >= PARALLEL_THRESHOLD {
            layouts
                .par_iter()
                .map(|layout| scanner.scan_layout(layout))
                .collect()
        } else {
            layouts
                .iter()
                .map(|layout| scanner.scan_layout(layout))
                .collect()
        };
        for map in layout_maps {
            merge(&mut usage, map);
        }

        let scripts: Vec<&ScriptInfo> = catalog.scripts.values().collect();
        let script_maps: Vec<UsageMap> = if scripts.len() >= PARALLEL_THRESHOLD {
            scripts
                .par_iter()
                .map(|script| scanner.scan_script(script))
                .collect()
        } else {
            scripts
                .iter()
                .map(|script| scanner.scan_script(script))
                .collect()
        };
        for map in script_maps {
            merge(&mut usage, map);
        }

        scanner.scan_field_calculations(&mut usage);
        scanner.scan_custom_functions(&mut usage);
        scanner.scan_sql(&mut usage);
        scanner.scan_relationships(&mut usage);
        scanner.scan_value_lists(&mut usage);
        scanner.scan_merge_text(&mut usage);

        // Raw XML counts for every defined field name.
        let names: BTreeSet<&str> = catalog
            .tables
            .values()
            .flat_map(|table| table.fields.keys())
            .map(String::as_str)
            .collect();
        let counter = OccurrenceCounter::new(names.iter().map(|name| name.to_string()))?;
        let xml_counts = counter.count(doc.raw());

        let empty = FieldUsage::default();
        let mut rows: Vec<(usize, String, String, Vec<Cell>)> = Vec::new();
        for (table_name, table) in &catalog.tables {
            for field_name in table.fields.keys() {
                let key = (table_name.clone(), field_name.clone());
                let entry = usage.get(&key).unwrap_or(&empty);
                let total = entry.total();
                let xml_count = xml_counts.get(field_name).copied().unwrap_or(0);

                let (status, rank) = classify(table, table_name, field_name, total);
                let other: Vec<String> = [
                    entry.value_lists.clone(),
                    entry.relationships.clone(),
                    entry.web_viewers.clone(),
                ]
                .concat();

                rows.push((
                    rank,
                    table_name.to_lowercase(),
                    field_name.to_lowercase(),
                    vec![
                        Cell::text(table_name),
                        Cell::text(field_name),
                        Cell::text(status),
                        Cell::int(total),
                        Cell::int(xml_count),
                        Cell::text(format_locations(&entry.layouts, 3)),
                        Cell::text(format_locations(&entry.scripts, 3)),
                        Cell::text(format_locations(&entry.calculations, 3)),
                        Cell::text(format_locations(&entry.sql, 3)),
                        Cell::text(format_locations(&other, 3)),
                    ],
                ));
            }
        }
        rows.sort_by(|a, b| (a.0, &a.1, &a.2).cmp(&(b.0, &b.1, &b.2)));

        let mut sheet = Sheet::new(
            self.name(),
            self.order(),
            &[
                "Table Name",
                "Field Name",
                "Status",
                "Usage Count",
                "XML Count",
                "Used in Layouts",
                "Used in Scripts",
                "Used in Calculations",
                "Used in SQL",
                "Used in Other",
            ],
        );
        for (_, _, _, row) in rows {
            sheet.push_row(row);
        }
        Ok(sheet)
    }
}

/// Status plus sort rank, unused first.
fn classify(
    table: &TableInfo,
    table_name: &str,
    field_name: &str,
    total: usize,
) -> (&'static str, usize) {
    if field_name.starts_with('#') {
        return ("Comment", 3);
    }
    if is_cache_pair(table, field_name) {
        return ("Cached", 1);
    }
    if SYSTEM_FIELDS.contains(&field_name) {
        return ("System", 2);
    }
    if table_name.contains("Import") || table_name.contains("import") || starts_with_ci(table_name, "imp_")
    {
        return ("Imported", 4);
    }
    if total == 0 {
        ("Not Used", 0)
    } else {
        ("Used", 5)
    }
}

/// `total_c` / `total_cache` pairs within one table are a caching
/// convention, not dead weight.
fn is_cache_pair(table: &TableInfo, field_name: &str) -> bool {
    if let Some(base) = field_name.strip_suffix("_cache") {
        return table.fields.contains_key(&format!("{}_c", base));
    }
    if let Some(base) = field_name.strip_suffix("_c") {
        return table.fields.contains_key(&format!("{}_cache", base));
    }
    false
}

struct FieldScanner<'a> {
    doc: &'a Document,
    catalog: &'a Catalog,
}

impl FieldScanner<'_> {
    /// Credit a reference to the field's base table, dropping candidates
    /// the catalog does not know.
    fn credit(&self, usage: &mut UsageMap, bucket: Bucket, table: &str, field: &str, location: String) {
        let base = self.catalog.occurrences.resolve(table);
        if !self.catalog.has_field(base, field) {
            return;
        }
        let entry = usage
            .entry((base.to_string(), field.to_string()))
            .or_default();
        match bucket {
            Bucket::Layouts => entry.layouts.push(location),
            Bucket::Scripts => entry.scripts.push(location),
            Bucket::Calculations => entry.calculations.push(location),
            Bucket::Sql => entry.sql.push(location),
            Bucket::ValueLists => entry.value_lists.push(location),
            Bucket::Relationships => entry.relationships.push(location),
            Bucket::WebViewers => entry.web_viewers.push(location),
        }
    }

    /// Run every applicable extraction strategy over one calculation text
    /// and credit everything found into the calculations bucket.
    fn find_field_references(
        &self,
        usage: &mut UsageMap,
        text: &str,
        table_context: Option<&str>,
        context: &str,
    ) {
        if text.trim().is_empty() {
            return;
        }

        for (table, field) in extract_qualified_refs(text) {
            self.credit(usage, Bucket::Calculations, &table, &field, context.to_string());
        }

        // Unqualified names resolve against the context table when the
        // text belongs to one.
        if let Some(context_table) = table_context {
            let base = self.catalog.occurrences.resolve(context_table);
            if let Some(table) = self.catalog.tables.get(base) {
                for field in table.fields.keys() {
                    if contains_word(text, field) {
                        self.credit(
                            usage,
                            Bucket::Calculations,
                            context_table,
                            field,
                            context.to_string(),
                        );
                    }
                }
            }
        }

        for (table, field) in extract_dotted_refs(text) {
            self.credit(usage, Bucket::Calculations, &table, &field, context.to_string());
        }

        // Globals::X without a table prefix lands on the first *Globals
        // table that defines the field.
        if text.contains("Globals") {
            for caps in GLOBALS_RE.captures_iter(text) {
                let field = &caps[1];
                let globals_table = self
                    .catalog
                    .tables
                    .keys()
                    .find(|name| name.ends_with("Globals") && self.catalog.has_field(name, field));
                if let Some(table) = globals_table {
                    let table = table.clone();
                    self.credit(usage, Bucket::Calculations, &table, field, context.to_string());
                }
            }
        }

        for (table, field) in extract_chunk_field_refs(text) {
            self.credit(
                usage,
                Bucket::Calculations,
                &table,
                &field,
                format!("{} (DisplayCalculation)", context),
            );
        }

        let ids = extract_field_id_refs(text);
        if !ids.is_empty() {
            for (table_name, table) in &self.catalog.tables {
                for id in &ids {
                    if let Some(field) = table.field_ids.get(id) {
                        let table_name = table_name.clone();
                        let field = field.clone();
                        self.credit(
                            usage,
                            Bucket::Calculations,
                            &table_name,
                            &field,
                            format!("{} (Field ID)", context),
                        );
                    }
                }
            }
        }

        if text.contains("PlaceholderText") || text.contains("findMode") {
            let mut hits: Vec<(String, String)> = Vec::new();
            for (table_name, table) in &self.catalog.tables {
                for field in table.fields.keys() {
                    if text.contains(field.as_str()) {
                        hits.push((table_name.clone(), field.clone()));
                    }
                }
            }
            for (table, field) in hits {
                self.credit(
                    usage,
                    Bucket::Calculations,
                    &table,
                    &field,
                    format!("{} (PlaceholderText)", context),
                );
            }
        }

        for (table, field) in extract_embedded_field_refs(text) {
            self.credit(
                usage,
                Bucket::Calculations,
                &table,
                &field,
                format!("{} (XML Reference)", context),
            );
        }

        for merge in extract_merge_fields(text) {
            let tables: Vec<String> = self
                .catalog
                .tables_with_field(&merge)
                .map(str::to_string)
                .collect();
            for table in tables {
                self.credit(
                    usage,
                    Bucket::Calculations,
                    &table,
                    &merge,
                    format!("{} (Merge Field)", context),
                );
            }
        }
    }

    /// Credit every defined field mentioned as `Table::Field` (or dotted
    /// with both halves present) somewhere in free text. Used for web
    /// viewer and button calculations where the text is usually URL or
    /// JavaScript soup.
    fn credit_qualified_mentions(
        &self,
        usage: &mut UsageMap,
        text: &str,
        bucket: Bucket,
        location: &str,
    ) {
        let mut hits: Vec<(String, String)> = Vec::new();
        for (table_name, table) in &self.catalog.tables {
            let dotted_prefix = format!("{}.", table_name);
            for field in table.fields.keys() {
                if text.contains(&format!("{}::{}", table_name, field))
                    || (text.contains(&dotted_prefix) && text.contains(&format!(".{}", field)))
                {
                    hits.push((table_name.clone(), field.clone()));
                }
            }
        }
        for (table, field) in hits {
            self.credit(usage, bucket, &table, &field, location.to_string());
        }
    }

    fn scan_layout(&self, layout: &LayoutInfo) -> UsageMap {
        let doc = self.doc;
        let mut usage = UsageMap::new();

        for object in doc.descendants_by_tag(layout.node, "Object") {
            let object_type = doc.attr_or(object, "type", "");
            let position = object_position(doc, object);

            match object_type {
                "Field" => self.scan_field_object(&mut usage, layout, object, &position),
                "Portal" => self.scan_portal_object(&mut usage, layout, object, &position),
                "ExternalObject" => {
                    self.scan_external_object(&mut usage, layout, object, &position)
                }
                "Button" => self.scan_button_object(&mut usage, layout, object, &position),
                "Text" => self.scan_text_object(&mut usage, layout, object, &position),
                "TabPanel" => {
                    let panel = doc
                        .attr(object, "name")
                        .filter(|name| !name.is_empty())
                        .unwrap_or("Unnamed Tab");
                    if let Some(label) = doc.find_descendant(object, "TabControlObj") {
                        for calc in doc.descendants_by_tag(label, "Calculation") {
                            self.find_field_references(
                                &mut usage,
                                doc.text(calc),
                                None,
                                &format!("Tab Label - {} {} {}", layout.name, panel, position),
                            );
                        }
                    }
                }
                "SlidePanel" => {
                    let panel = doc
                        .attr(object, "name")
                        .filter(|name| !name.is_empty())
                        .unwrap_or("Unnamed Slide");
                    if let Some(label) = doc.find_descendant(object, "SlideControlObj") {
                        for calc in doc.descendants_by_tag(label, "Calculation") {
                            self.find_field_references(
                                &mut usage,
                                doc.text(calc),
                                None,
                                &format!("Slide Label - {} {} {}", layout.name, panel, position),
                            );
                        }
                    }
                }
                "ButtonBar" => {
                    if let Some(bar) = doc.find_descendant(object, "ButtonBarObj") {
                        for segment in doc.descendants_by_tag(bar, "Segment") {
                            for calc in doc.descendants_by_tag(segment, "Calculation") {
                                self.find_field_references(
                                    &mut usage,
                                    doc.text(calc),
                                    None,
                                    &format!("Button Bar Label - {} {}", layout.name, position),
                                );
                            }
                        }
                    }
                }
                "Popover" => {
                    let popover = doc
                        .attr(object, "name")
                        .filter(|name| !name.is_empty())
                        .unwrap_or("Unnamed Popover");
                    if let Some(title) = doc.find_descendant(object, "PopoverObj") {
                        for calc in doc.descendants_by_tag(title, "Calculation") {
                            self.find_field_references(
                                &mut usage,
                                doc.text(calc),
                                None,
                                &format!("Popover Title - {} {} {}", layout.name, popover, position),
                            );
                        }
                    }
                }
                _ => {}
            }

            // Hide conditions and conditional formatting exist on any
            // object type.
            if let Some(formatting) = doc.find_descendant(object, "ConditionalFormatting") {
                for item in doc.descendants_by_tag(formatting, "Item") {
                    let calc = doc
                        .find_descendant(item, "Condition")
                        .and_then(|condition| doc.find_descendant(condition, "Calc"));
                    if let Some(calc) = calc {
                        self.find_field_references(
                            &mut usage,
                            doc.text(calc),
                            None,
                            &format!(
                                "Conditional Format - {} {} {}",
                                layout.name, object_type, position
                            ),
                        );
                    }
                }
            }
            if let Some(hide) = doc.find_descendant(object, "HideCondition") {
                if let Some(calc) = doc.find_descendant(hide, "Calculation") {
                    self.find_field_references(
                        &mut usage,
                        doc.text(calc),
                        None,
                        &format!("Hide Condition - {} {} {}", layout.name, object_type, position),
                    );
                }
            }
        }

        usage
    }

    fn scan_field_object(
        &self,
        usage: &mut UsageMap,
        layout: &LayoutInfo,
        object: NodeId,
        position: &str,
    ) {
        let doc = self.doc;
        if let Some(field_ref) = doc.find_descendant(object, "Field") {
            if let (Some(table), Some(field)) =
                (doc.attr(field_ref, "table"), doc.attr(field_ref, "name"))
            {
                self.credit(
                    usage,
                    Bucket::Layouts,
                    table,
                    field,
                    format!("Field - {} {}", layout.name, position),
                );
            }
        }
        if let Some(placeholder) = doc.find_descendant(object, "PlaceholderText") {
            let context = format!("PlaceholderText - {} {}", layout.name, position);
            if let Some(calc) = doc.find_descendant(placeholder, "Calculation") {
                self.find_field_references(usage, doc.text(calc), None, &context);
            }
            if let Some(display) = doc.find_descendant(placeholder, "DisplayCalculation") {
                for chunk in doc.descendants_by_tag(display, "Chunk") {
                    if doc.attr(chunk, "type") != Some("FieldRef") {
                        continue;
                    }
                    if let Some(field_ref) = doc.find_descendant(chunk, "Field") {
                        if let (Some(table), Some(field)) =
                            (doc.attr(field_ref, "table"), doc.attr(field_ref, "name"))
                        {
                            self.credit(usage, Bucket::Layouts, table, field, context.clone());
                        }
                    }
                }
            }
        }
    }

    fn scan_portal_object(
        &self,
        usage: &mut UsageMap,
        layout: &LayoutInfo,
        object: NodeId,
        position: &str,
    ) {
        let doc = self.doc;
        let portal_table = doc
            .find_descendant(object, "Portal")
            .and_then(|portal| doc.attr(portal, "table"));

        let filter_calc = doc
            .find_descendant(object, "FilterCalc")
            .and_then(|filter| doc.find_descendant(filter, "Calculation"));
        if let Some(calc) = filter_calc {
            self.find_field_references(
                usage,
                doc.text(calc),
                portal_table,
                &format!("Portal Filter - {} {}", layout.name, position),
            );
        }

        for inner in doc.descendants_by_tag(object, "Object") {
            if doc.attr(inner, "type") != Some("Field") {
                continue;
            }
            let Some(field_ref) = doc.find_descendant(inner, "Field") else {
                continue;
            };
            let Some(field) = doc.attr(field_ref, "name") else {
                continue;
            };
            let Some(table) = doc.attr(field_ref, "table").or(portal_table) else {
                continue;
            };
            let field_position = object_position(doc, inner);
            let location = if field_position.is_empty() {
                format!("Portal Field - {} {}", layout.name, position)
            } else {
                format!(
                    "Portal Field - {} {} (Field: {})",
                    layout.name, position, field_position
                )
            };
            self.credit(usage, Bucket::Layouts, table, field, location);
        }
    }

    fn scan_external_object(
        &self,
        usage: &mut UsageMap,
        layout: &LayoutInfo,
        object: NodeId,
        position: &str,
    ) {
        let doc = self.doc;
        let Some(external) = doc.find_descendant(object, "ExternalObj") else {
            return;
        };
        match doc.attr_or(external, "typeID", "") {
            "WEBV" => {
                for calc in doc.descendants_by_tag(object, "Calculation") {
                    let in_url = doc.parent(calc).map(|p| doc.tag(p)) == Some("URLCalc");
                    let location = if in_url {
                        format!("WebViewer URL - {} {}", layout.name, position)
                    } else {
                        format!("WebViewer - {} {}", layout.name, position)
                    };
                    self.credit_qualified_mentions(
                        usage,
                        doc.text(calc),
                        Bucket::WebViewers,
                        &location,
                    );
                }
            }
            "CHRT" => {
                let chart = doc
                    .attr(object, "name")
                    .filter(|name| !name.is_empty())
                    .unwrap_or("Unnamed Chart");
                for series in doc.descendants_by_tag(external, "ChartSeries") {
                    for field_ref in doc.descendants_by_tag(series, "Field") {
                        if let (Some(table), Some(field)) =
                            (doc.attr(field_ref, "table"), doc.attr(field_ref, "name"))
                        {
                            self.credit(
                                usage,
                                Bucket::Layouts,
                                table,
                                field,
                                format!("Chart Series - {} {} {}", layout.name, chart, position),
                            );
                        }
                    }
                }
                for calc in doc.descendants_by_tag(external, "Calculation") {
                    self.find_field_references(
                        usage,
                        doc.text(calc),
                        None,
                        &format!("Chart Calculation - {} {} {}", layout.name, chart, position),
                    );
                }
            }
            _ => {}
        }
    }

    fn scan_button_object(
        &self,
        usage: &mut UsageMap,
        layout: &LayoutInfo,
        object: NodeId,
        position: &str,
    ) {
        let doc = self.doc;
        let button = doc
            .attr(object, "name")
            .filter(|name| !name.is_empty())
            .unwrap_or("Unnamed Button");
        let context = format!("Button '{}' - {} {}", button, layout.name, position);

        for param in doc.descendants_by_tag(object, "Parameter") {
            let text = doc.text(param);
            if !contains_ci(text, "field:") {
                continue;
            }
            for (table, field) in extract_script_param_fields(text) {
                self.credit(
                    usage,
                    Bucket::Layouts,
                    &table,
                    &field,
                    format!("{} (Script param)", context),
                );
            }
        }
        for calc in doc.descendants_by_tag(object, "Calculation") {
            self.credit_qualified_mentions(
                usage,
                doc.text(calc),
                Bucket::Calculations,
                &format!("{} (Calculation)", context),
            );
        }
    }

    fn scan_text_object(
        &self,
        usage: &mut UsageMap,
        layout: &LayoutInfo,
        object: NodeId,
        position: &str,
    ) {
        let doc = self.doc;
        if let Some(field_list) = doc.find_descendant(object, "FieldList") {
            for field_ref in doc.descendants_by_tag(field_list, "Field") {
                if let (Some(table), Some(field)) =
                    (doc.attr(field_ref, "table"), doc.attr(field_ref, "name"))
                {
                    self.credit(
                        usage,
                        Bucket::Layouts,
                        table,
                        field,
                        format!("Text Object - {} {}", layout.name, position),
                    );
                }
            }
        }
        for data in doc.descendants_by_tag(object, "Data") {
            if doc.parent(data).map(|p| doc.tag(p)) != Some("Style") {
                continue;
            }
            self.credit_merge_fields(
                usage,
                doc.text(data),
                &format!("Text Merge Field - {} {}", layout.name, position),
            );
        }
    }

    /// Credit `<<merge>>` tokens, qualified or bare.
    fn credit_merge_fields(&self, usage: &mut UsageMap, text: &str, location: &str) {
        for merge in extract_merge_fields(text) {
            if let Some((table, field)) = merge.split_once("::") {
                self.credit(usage, Bucket::Layouts, table, field, location.to_string());
                continue;
            }
            let tables: Vec<String> = self
                .catalog
                .tables_with_field(&merge)
                .map(str::to_string)
                .collect();
            for table in tables {
                self.credit(usage, Bucket::Layouts, &table, &merge, location.to_string());
            }
        }
    }

    fn scan_script(&self, script: &ScriptInfo) -> UsageMap {
        let doc = self.doc;
        let mut usage = UsageMap::new();

        for step in doc.descendants_by_tag(script.node, "Step") {
            let step_name = doc.attr_or(step, "name", "Unknown Step");
            let index = doc.attr_or(step, "index", "?");
            let step_context = format!("Script - {} (Step {}: {})", script.name, index, step_name);

            for param in doc.descendants_by_tag(step, "Parameter") {
                let text = doc.text(param);
                if !contains_ci(text, "field:") {
                    continue;
                }
                for (table, field) in extract_script_param_fields(text) {
                    self.credit(
                        &mut usage,
                        Bucket::Scripts,
                        &table,
                        &field,
                        format!("{} (Param)", step_context),
                    );
                }
            }

            for calc in doc.descendants_by_tag(step, "Calculation") {
                self.find_field_references(&mut usage, doc.text(calc), None, &step_context);
            }

            if step_name == "Set Field" || step_name == "Set Field By Name" {
                if let Some(field_ref) = doc.find_descendant(step, "Field") {
                    if let (Some(table), Some(field)) =
                        (doc.attr(field_ref, "table"), doc.attr(field_ref, "name"))
                    {
                        self.credit(
                            &mut usage,
                            Bucket::Scripts,
                            table,
                            field,
                            format!("{} (Target field)", step_context),
                        );
                    }
                }
            }

            if step_name == "Import Records" || step_name == "Export Records" {
                for mapping in doc.descendants_by_tag(step, "FieldMapping") {
                    for field_ref in doc.descendants_by_tag(mapping, "Field") {
                        if let (Some(table), Some(field)) =
                            (doc.attr(field_ref, "table"), doc.attr(field_ref, "name"))
                        {
                            self.credit(
                                &mut usage,
                                Bucket::Scripts,
                                table,
                                field,
                                format!("{} (Field Mapping)", step_context),
                            );
                        }
                    }
                }
            }
        }

        usage
    }

    fn scan_field_calculations(&self, usage: &mut UsageMap) {
        let doc = self.doc;
        for table_node in doc.all_by_tag("BaseTable") {
            let Some(table_name) = doc.attr(table_node, "name") else {
                continue;
            };
            for field_node in doc.descendants_by_tag(table_node, "Field") {
                let Some(field_name) = doc.attr(field_node, "name") else {
                    continue;
                };
                if !self.catalog.has_field(table_name, field_name) {
                    continue;
                }
                let qualified = format!("{}::{}", table_name, field_name);

                if let Some(calc) = doc.find_descendant(field_node, "Calculation") {
                    self.credit(
                        usage,
                        Bucket::Calculations,
                        table_name,
                        field_name,
                        format!("Field Calculation - {} (Target)", qualified),
                    );
                    self.find_field_references(
                        usage,
                        doc.text(calc),
                        Some(table_name),
                        &format!("Field Calculation - {}", qualified),
                    );
                }

                if let Some(display) = doc.find_descendant(field_node, "DisplayCalculation") {
                    self.credit(
                        usage,
                        Bucket::Calculations,
                        table_name,
                        field_name,
                        format!("Field Display Calculation - {} (Target)", qualified),
                    );
                    for chunk in doc.descendants_by_tag(display, "Chunk") {
                        if doc.attr(chunk, "type") != Some("FieldRef") {
                            continue;
                        }
                        if let Some(field_ref) = doc.find_descendant(chunk, "Field") {
                            if let (Some(table), Some(field)) =
                                (doc.attr(field_ref, "table"), doc.attr(field_ref, "name"))
                            {
                                self.credit(
                                    usage,
                                    Bucket::Calculations,
                                    table,
                                    field,
                                    format!("Field Display Calculation - {}", qualified),
                                );
                            }
                        }
                    }
                }

                for (container, label) in
                    [("AutoEnter", "Auto-Enter Calculation"), ("Validation", "Validation Calculation")]
                {
                    let calc = doc
                        .find_descendant(field_node, container)
                        .and_then(|node| doc.find_descendant(node, "Calculation"));
                    if let Some(calc) = calc {
                        self.credit(
                            usage,
                            Bucket::Calculations,
                            table_name,
                            field_name,
                            format!("{} - {} (Target)", label, qualified),
                        );
                        self.find_field_references(
                            usage,
                            doc.text(calc),
                            Some(table_name),
                            &format!("{} - {}", label, qualified),
                        );
                    }
                }
            }
        }
    }

    fn scan_custom_functions(&self, usage: &mut UsageMap) {
        for function in self.catalog.custom_functions.values() {
            self.find_field_references(
                usage,
                &function.definition,
                None,
                &format!("Custom Function - {}", function.name),
            );
        }
    }

    fn scan_sql(&self, usage: &mut UsageMap) {
        let doc = self.doc;
        for calc in doc.all_by_tag("Calculation") {
            let text = doc.text(calc);
            if !text.contains("ExecuteSQL") {
                continue;
            }
            let context = self.sql_context(calc);
            for statement in extract_execute_sql(text) {
                let mut hits: Vec<(String, String, String)> = Vec::new();
                for caps in SQL_FROM_RE.captures_iter(&statement) {
                    let table = &caps[1];
                    let base = self.catalog.occurrences.resolve(table);
                    let Some(info) = self.catalog.tables.get(base) else {
                        continue;
                    };
                    for field in info.fields.keys() {
                        if statement.contains(&format!("{}.{}", table, field)) {
                            hits.push((
                                base.to_string(),
                                field.clone(),
                                format!("SQL - {}", context),
                            ));
                        }
                        for (re, clause) in sql_field_patterns(field) {
                            if re.is_match(&statement) {
                                hits.push((
                                    base.to_string(),
                                    field.clone(),
                                    format!("SQL ({}) - {}", clause, context),
                                ));
                            }
                        }
                    }
                }
                for (table, field, location) in hits {
                    self.credit(usage, Bucket::Sql, &table, &field, location);
                }
            }
        }
    }

    /// Human-readable site description for a Calculation node carrying SQL.
    fn sql_context(&self, calc: NodeId) -> String {
        let doc = self.doc;
        for ancestor in doc.ancestors(calc) {
            match doc.tag(ancestor) {
                "Step" => {
                    let step_name = doc.attr_or(ancestor, "name", "Unknown Step");
                    let index = doc.attr_or(ancestor, "index", "?");
                    let script = owning_script(doc, self.catalog, ancestor)
                        .unwrap_or("Unknown Script");
                    return format!("Script {} (Step {}: {})", script, index, step_name);
                }
                "Script" => {
                    if let Some(name) = doc.attr(ancestor, "name") {
                        return format!("Script {}", name);
                    }
                }
                "CustomFunction" => {
                    return format!(
                        "Custom Function {}",
                        doc.attr_or(ancestor, "name", "Unknown")
                    );
                }
                "Field" => {
                    if let Some(field) = doc.attr(ancestor, "name") {
                        let table = owning_base_table(doc, ancestor).unwrap_or("Unknown Table");
                        return format!("Field Calculation {}::{}", table, field);
                    }
                }
                "Object" => {
                    let layout = owning_layout(doc, ancestor).unwrap_or("Unknown Layout");
                    let object_type = doc.attr_or(ancestor, "type", "Unknown");
                    return format!("Layout Object - {} ({})", layout, object_type);
                }
                _ => {}
            }
        }
        "Unknown".to_string()
    }

    fn scan_relationships(&self, usage: &mut UsageMap) {
        let doc = self.doc;
        for relationship in &self.catalog.relationships {
            let name = doc.attr_or(relationship.node, "name", "Unknown Relationship");
            for pair in doc.descendants_by_tag(relationship.node, "FieldPair") {
                for field_ref in doc.descendants_by_tag(pair, "Field") {
                    if let (Some(table), Some(field)) =
                        (doc.attr(field_ref, "table"), doc.attr(field_ref, "name"))
                    {
                        self.credit(
                            usage,
                            Bucket::Relationships,
                            table,
                            field,
                            format!("Relationship - {}", name),
                        );
                    }
                }
            }
        }
    }

    fn scan_value_lists(&self, usage: &mut UsageMap) {
        let doc = self.doc;
        for value_list in &self.catalog.value_lists {
            for (tag, label) in [
                ("Field", "Value List"),
                ("PrimaryField", "Value List (Primary)"),
                ("DisplayField", "Value List (Display)"),
            ] {
                for wrapper in doc.descendants_by_tag(value_list.node, tag) {
                    // PrimaryField/DisplayField wrap a Field element; a
                    // bare Field carries the attributes itself.
                    let field_ref = if tag == "Field" {
                        wrapper
                    } else {
                        match doc.find_descendant(wrapper, "Field") {
                            Some(inner) => inner,
                            None => wrapper,
                        }
                    };
                    if let (Some(table), Some(field)) =
                        (doc.attr(field_ref, "table"), doc.attr(field_ref, "name"))
                    {
                        self.credit(
                            usage,
                            Bucket::ValueLists,
                            table,
                            field,
                            format!("{} - {}", label, value_list.name),
                        );
                    }
                }
            }
        }
    }

    /// Merge tokens in text objects anywhere in the document, including
    /// layouts the layout shard scan could not attribute.
    fn scan_merge_text(&self, usage: &mut UsageMap) {
        let doc = self.doc;
        for data in doc.all_by_tag("Data") {
            if doc.parent(data).map(|p| doc.tag(p)) != Some("Style") {
                continue;
            }
            let text = doc.text(data);
            if !text.contains("<<") {
                continue;
            }
            let mut object_type: Option<&str> = None;
            let mut layout_name: Option<&str> = None;
            for ancestor in doc.ancestors(data) {
                match doc.tag(ancestor) {
                    "Object" if object_type.is_none() => {
                        object_type = doc.attr(ancestor, "type");
                    }
                    "Layout" => {
                        layout_name = doc.attr(ancestor, "name");
                        break;
                    }
                    _ => {}
                }
            }
            let context = match layout_name {
                Some(layout) => format!(
                    "Text Merge Field - {} ({})",
                    layout,
                    object_type.unwrap_or("Text")
                ),
                None => "Text Object".to_string(),
            };
            self.credit_merge_fields(usage, text, &context);
        }
    }
}

/// Clause patterns that tie a bare field name to the statement's table.
fn sql_field_patterns(field: &str) -> Vec<(Regex, &'static str)> {
    let escaped = regex::escape(field);
    [
        (format!(r"(?i)WHERE\s+{}\s*[=<>!]", escaped), "WHERE"),
        (format!(r"(?i)AND\s+{}\s*[=<>!]", escaped), "AND"),
        (format!(r"(?i)OR\s+{}\s*[=<>!]", escaped), "OR"),
        (format!(r"(?i)SELECT\s+{}\s*(?:,|\s+FROM)", escaped), "SELECT"),
        (format!(r"(?i)ORDER\s+BY\s+{}", escaped), "ORDER_BY"),
        (format!(r"(?i)GROUP\s+BY\s+{}", escaped), "GROUP_BY"),
    ]
    .into_iter()
    .filter_map(|(pattern, clause)| Regex::new(&pattern).ok().map(|re| (re, clause)))
    .collect()
}

//! Catalog entity types.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::document::NodeId;

use super::resolver::OccurrenceMap;

/// A script definition.
#[derive(Debug, Clone)]
pub struct ScriptInfo {
    pub name: String,
    pub id: String,
    /// Folder path from enclosing script groups, outermost first, joined
    /// with `/`. Empty for top-level scripts.
    pub folder: String,
    pub node: NodeId,
}

/// A layout definition.
#[derive(Debug, Clone)]
pub struct LayoutInfo {
    pub name: String,
    pub id: String,
    /// Folder path from the layout catalog group tree, joined with ` > `.
    pub path: String,
    pub node: NodeId,
}

/// A field definition within a base table.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub id: String,
    pub data_type: String,
}

/// A base table and its fields.
#[derive(Debug, Default)]
pub struct TableInfo {
    pub name: String,
    /// Fields keyed by name, iterated in name order.
    pub fields: BTreeMap<String, FieldInfo>,
    /// Field id -> field name, for numeric id references.
    pub field_ids: HashMap<String, String>,
}

impl TableInfo {
    pub fn add_field(&mut self, field: FieldInfo) {
        if !field.id.is_empty() {
            self.field_ids
                .entry(field.id.clone())
                .or_insert_with(|| field.name.clone());
        }
        self.fields.entry(field.name.clone()).or_insert(field);
    }
}

/// A custom function definition.
#[derive(Debug, Clone)]
pub struct CustomFunctionInfo {
    pub name: String,
    pub id: String,
    pub definition: String,
}

/// A value list definition.
#[derive(Debug, Clone)]
pub struct ValueListInfo {
    pub name: String,
    pub node: NodeId,
}

/// A relationship between two table occurrences.
#[derive(Debug, Clone)]
pub struct RelationshipInfo {
    pub left_table: String,
    pub right_table: String,
    pub node: NodeId,
}

/// Frozen lookup structures for every entity defined in a DDR document.
#[derive(Debug, Default)]
pub struct Catalog {
    /// Script definitions keyed by name.
    pub scripts: BTreeMap<String, ScriptInfo>,
    /// Script id -> script name.
    pub scripts_by_id: HashMap<String, String>,
    /// Arena nodes that are script definitions (used to tell references
    /// apart from definitions during scanning).
    pub script_definitions: HashSet<NodeId>,
    /// Layout definitions keyed by name.
    pub layouts: BTreeMap<String, LayoutInfo>,
    /// Layout id -> layout name.
    pub layouts_by_id: HashMap<String, String>,
    /// Arena nodes that are layout definitions.
    pub layout_definitions: HashSet<NodeId>,
    /// Names of layout folder groups (these show up as `Layout` elements
    /// too and must not be treated as layouts).
    pub group_names: HashSet<String>,
    /// Base tables keyed by name.
    pub tables: BTreeMap<String, TableInfo>,
    /// Table occurrence -> base table.
    pub occurrences: OccurrenceMap,
    /// Custom functions keyed by name.
    pub custom_functions: BTreeMap<String, CustomFunctionInfo>,
    pub value_lists: Vec<ValueListInfo>,
    pub relationships: Vec<RelationshipInfo>,
    /// Non-fatal problems found while building (missing names, ids).
    pub errors: Vec<String>,
}

impl Catalog {
    /// Resolve a table name (occurrence or base) and look the field up on
    /// the base table.
    pub fn has_field(&self, table: &str, field: &str) -> bool {
        let base = self.occurrences.resolve(table);
        self.tables
            .get(base)
            .is_some_and(|info| info.fields.contains_key(field))
    }

    /// True when the name is a base table defined in the document.
    pub fn is_base_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// True when the name resolves to a known base table, either directly
    /// or through an occurrence.
    pub fn is_known_table(&self, name: &str) -> bool {
        self.is_base_table(self.occurrences.resolve(name))
    }

    /// Field name for a numeric field id within a (possibly occurrence)
    /// table name.
    pub fn field_by_id(&self, table: &str, id: &str) -> Option<&str> {
        let base = self.occurrences.resolve(table);
        self.tables
            .get(base)?
            .field_ids
            .get(id)
            .map(String::as_str)
    }

    /// All base tables that define a field with this name.
    pub fn tables_with_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> {
        self.tables
            .values()
            .filter(move |table| table.fields.contains_key(field))
            .map(|table| table.name.as_str())
    }
}

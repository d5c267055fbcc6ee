//! Entity catalog for a DDR document.
//!
//! The catalog is built in one pass over the document arena before any
//! reference scanning starts, and is read-only afterwards. Building never
//! fails: malformed entries get placeholder names and a note in the error
//! list.

mod builder;
mod resolver;
mod types;

pub use builder::build_catalog;
pub use resolver::OccurrenceMap;
pub use types::{
    Catalog, CustomFunctionInfo, FieldInfo, LayoutInfo, RelationshipInfo, ScriptInfo, TableInfo,
    ValueListInfo,
};

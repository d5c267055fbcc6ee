//! The analysis checks.
//!
//! Each check walks the document and catalog independently and produces one
//! report sheet. Checks never fail the pipeline: anything odd in the export
//! becomes a row or a note, not an abort.

mod custom_functions;
mod fields;
mod layouts;
mod scripts;
mod sql_usage;
mod tables;
mod unknown;

use anyhow::Result;

use crate::catalog::Catalog;
use crate::document::{Document, NodeId};
use crate::report::Sheet;

pub use custom_functions::CustomFunctionUsageCheck;
pub use fields::FieldUsageCheck;
pub use layouts::LayoutUsageCheck;
pub use scripts::ScriptUsageCheck;
pub use sql_usage::SqlUsageCheck;
pub use tables::TableOccurrenceCheck;
pub use unknown::UnknownReferenceCheck;

/// Below this many shards a parallel scan costs more than it saves.
pub(crate) const PARALLEL_THRESHOLD: usize = 8;

/// Shared input handed to every check.
pub struct CheckContext<'a> {
    pub doc: &'a Document,
    pub catalog: &'a Catalog,
    /// Print diagnostics about references the check could not classify.
    pub debug: bool,
    pub verbose: bool,
}

/// One analysis check producing one sheet.
pub trait Check: Sync {
    /// Sheet name in the report.
    fn name(&self) -> &'static str;

    /// Sheet position, lower first.
    fn order(&self) -> usize;

    fn run(&self, ctx: &CheckContext<'_>) -> Result<Sheet>;
}

/// Every check, in sheet order.
pub fn all_checks() -> Vec<Box<dyn Check>> {
    vec![
        Box::new(LayoutUsageCheck),
        Box::new(ScriptUsageCheck),
        Box::new(CustomFunctionUsageCheck),
        Box::new(FieldUsageCheck),
        Box::new(SqlUsageCheck),
        Box::new(TableOccurrenceCheck),
        Box::new(UnknownReferenceCheck),
    ]
}

/// `Top: N Left: N` from an object's Bounds, empty when there are no
/// bounds, `Unknown Position` when they fail to parse.
pub(crate) fn object_position(doc: &Document, node: NodeId) -> String {
    let Some(bounds) = doc.find_descendant(node, "Bounds") else {
        return String::new();
    };
    let top = doc.attr_or(bounds, "top", "0").parse::<f64>();
    let left = doc.attr_or(bounds, "left", "0").parse::<f64>();
    match (top, left) {
        (Ok(top), Ok(left)) => {
            format!("Top: {} Left: {}", top.round() as i64, left.round() as i64)
        }
        _ => "Unknown Position".to_string(),
    }
}

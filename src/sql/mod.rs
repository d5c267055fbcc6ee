//! ExecuteSQL payload analysis.
//!
//! FileMaker's ExecuteSQL dialect is scanned lexically: the analyzer pulls
//! each quoted payload out of calculation text, extracts table and field
//! candidates with bounded regex patterns, and validates them against the
//! catalog. It is deliberately not a SQL grammar.

mod analyzer;

pub use analyzer::{
    analyze_sql, extract_execute_sql, is_commented_sql, validate_sql, IssueKind, SqlAnalysis,
    SqlValidation,
};

//! Lexical ExecuteSQL scanner and catalog validation.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::Catalog;

/// Quoted payload of an ExecuteSQL call.
static EXECUTE_SQL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)ExecuteSQL\s*\(\s*["']([^"']*)["']"#).unwrap());

/// Table candidates after FROM or JOIN.
static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:FROM|JOIN)\s+([a-zA-Z0-9_]+)").unwrap());

/// Primary table of one statement.
static FROM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)FROM\s+([a-zA-Z0-9_]+)").unwrap());

/// `alias.field` tokens within a statement.
static ALIAS_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z0-9_]+)\.([a-zA-Z0-9_]+)").unwrap());

/// JOIN targets with an optional AS alias.
static JOIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)JOIN\s+([a-zA-Z0-9_]+)(?:\s+AS\s+([a-zA-Z0-9_]+))?").unwrap()
});

/// Block and line comments, including a whole-line block form.
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)^\s*/\*.*?\*/\s*|^\s*--.*?$|/\*.*?\*/").unwrap());

/// Function names that must not be mistaken for table aliases.
const ALIAS_STOPLIST: &[&str] = &["SUM", "COUNT", "AVG", "MAX", "MIN", "TRIM", "LEFT", "RIGHT"];

/// SQL keywords that the clause patterns can capture in place of a field.
const KEYWORD_STOPLIST: &[&str] = &[
    "FROM", "WHERE", "SELECT", "ORDER", "GROUP", "BY", "AS", "AND", "OR", "SUM", "COUNT", "AVG",
    "MAX", "MIN", "DISTINCT", "NULL", "TRUE", "FALSE", "BETWEEN", "IN", "NOT", "IS", "LIKE",
    "EXISTS",
];

/// Clause patterns that position a bare identifier as a field of the
/// statement's primary table.
static FIELD_CONTEXT_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)WHERE\s+([a-zA-Z0-9_]+)\s*[=<>!]", "WHERE"),
        (r"(?i)AND\s+([a-zA-Z0-9_]+)\s*[=<>!]", "AND"),
        (r"(?i)OR\s+([a-zA-Z0-9_]+)\s*[=<>!]", "OR"),
        (r"(?i)SELECT\s+([^\s,()]+)(?:\s*[,)]|\s+FROM)", "SELECT"),
        (r"(?i)SELECT\s+SUM\s*\(\s*([a-zA-Z0-9_]+)\s*\)", "SELECT_SUM"),
        (
            r"(?i)SELECT\s+COUNT\s*\(\s*(?:DISTINCT\s+)?([a-zA-Z0-9_]+)\s*\)",
            "SELECT_COUNT",
        ),
        (r"(?i)SELECT\s+AVG\s*\(\s*([a-zA-Z0-9_]+)\s*\)", "SELECT_AVG"),
        (r"(?i)SELECT\s+MAX\s*\(\s*([a-zA-Z0-9_]+)\s*\)", "SELECT_MAX"),
        (r"(?i)SELECT\s+MIN\s*\(\s*([a-zA-Z0-9_]+)\s*\)", "SELECT_MIN"),
        (r"(?i),\s*([a-zA-Z0-9_]+)(?:\s*[,)]|\s+FROM)", "SELECT_LIST"),
        (r"(?i)ORDER\s+BY\s+([a-zA-Z0-9_]+)", "ORDER_BY"),
        (r"(?i)GROUP\s+BY\s+([a-zA-Z0-9_]+)", "GROUP_BY"),
    ]
    .iter()
    .map(|(pattern, context)| (Regex::new(pattern).unwrap(), *context))
    .collect()
});

/// What a site's SQL problems amount to, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueKind {
    MissingTable,
    MissingField,
    NotBaseTable,
}

impl IssueKind {
    pub fn label(self) -> &'static str {
        match self {
            IssueKind::MissingTable => "Missing Table",
            IssueKind::MissingField => "Missing Field",
            IssueKind::NotBaseTable => "Not Base Table",
        }
    }

    /// Sort priority, lower sorts first.
    pub fn priority(self) -> usize {
        match self {
            IssueKind::MissingTable => 0,
            IssueKind::MissingField => 1,
            IssueKind::NotBaseTable => 2,
        }
    }
}

/// Lexical extraction result for one calculation text.
#[derive(Debug, Default)]
pub struct SqlAnalysis {
    /// Extracted ExecuteSQL payloads, in order of appearance.
    pub statements: Vec<String>,
    /// Unique FROM/JOIN table candidates, in order of first appearance.
    pub tables: Vec<String>,
    /// Field references, resolved to `table::field` where an alias map
    /// applied, otherwise left as found. Sorted for determinism.
    pub fields: Vec<String>,
    /// Provenance notes for every match, in discovery order.
    pub raw_matches: Vec<String>,
    /// True when every ExecuteSQL call sits inside comments.
    pub commented: bool,
}

/// Catalog validation result for one analysis.
#[derive(Debug, Default)]
pub struct SqlValidation {
    pub missing_tables: Vec<String>,
    pub missing_fields: Vec<String>,
    /// Tables referenced through an occurrence rather than the base table.
    pub occurrence_warnings: Vec<String>,
    pub issue: Option<IssueKind>,
}

/// All ExecuteSQL payloads found in a text.
pub fn extract_execute_sql(text: &str) -> Vec<String> {
    EXECUTE_SQL_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// True when stripping comments removes every ExecuteSQL mention.
pub fn is_commented_sql(text: &str) -> bool {
    let cleaned = COMMENT_RE.replace_all(text, "");
    !cleaned.contains("ExecuteSQL")
}

/// Run the lexical scan over one calculation text.
pub fn analyze_sql(text: &str) -> SqlAnalysis {
    let statements = extract_execute_sql(text);
    let mut analysis = SqlAnalysis {
        commented: is_commented_sql(text),
        ..SqlAnalysis::default()
    };

    // Table candidates come from the full text: a FROM in a commented-out
    // call is still worth surfacing next to the live ones.
    for caps in TABLE_RE.captures_iter(text) {
        let table = caps[1].to_string();
        if !analysis.tables.contains(&table) {
            analysis.tables.push(table);
        }
    }

    let mut fields: BTreeSet<String> = BTreeSet::new();

    for statement in &statements {
        let preview: String = statement.chars().take(50).collect();
        analysis
            .raw_matches
            .push(format!("extracted_sql: {}...", preview));

        let main_table = match FROM_RE.captures(statement) {
            Some(caps) => caps[1].to_string(),
            None => continue,
        };
        analysis
            .raw_matches
            .push(format!("main_table: {}", main_table));

        // alias.field tokens, aggregate names filtered out.
        for caps in ALIAS_FIELD_RE.captures_iter(statement) {
            let alias = &caps[1];
            let field = &caps[2];
            if ALIAS_STOPLIST.contains(&alias.to_ascii_uppercase().as_str()) {
                continue;
            }
            fields.insert(format!("{}.{}", alias, field));
            analysis
                .raw_matches
                .push(format!("alias:{}.{}", alias, field));
        }

        // Bare identifiers in field positions belong to the main table.
        for (pattern, context) in FIELD_CONTEXT_PATTERNS.iter() {
            for caps in pattern.captures_iter(statement) {
                let field = &caps[1];
                if KEYWORD_STOPLIST.contains(&field.to_ascii_uppercase().as_str())
                    || field.chars().all(|c| c.is_ascii_digit())
                {
                    continue;
                }
                fields.insert(format!("{}::{}", main_table, field));
                analysis
                    .raw_matches
                    .push(format!("{}_in_{}:{}", context, main_table, field));
            }
        }

        // Resolve alias.field through the statement's JOIN alias map.
        let mut aliases: Vec<(String, String)> = vec![(main_table.clone(), main_table.clone())];
        for caps in JOIN_RE.captures_iter(statement) {
            let table = caps[1].to_string();
            let alias = caps
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| table.clone());
            aliases.push((alias, table));
        }

        let dotted: Vec<String> = fields
            .iter()
            .filter(|field| field.contains('.') && !field.contains("::"))
            .cloned()
            .collect();
        for field_ref in dotted {
            let (alias_part, field_part) = match field_ref.split_once('.') {
                Some(parts) => parts,
                None => continue,
            };
            if let Some((_, table)) = aliases.iter().find(|(alias, _)| alias == alias_part) {
                fields.remove(&field_ref);
                fields.insert(format!("{}::{}", table, field_part));
            }
        }
    }

    analysis.statements = statements;
    analysis.fields = fields.into_iter().collect();
    analysis
}

/// Validate extracted tables and fields against the catalog.
pub fn validate_sql(analysis: &SqlAnalysis, catalog: &Catalog) -> SqlValidation {
    let mut validation = SqlValidation::default();

    for table in &analysis.tables {
        if catalog.occurrences.contains(table) {
            let base = catalog.occurrences.resolve(table);
            if base != table {
                validation.occurrence_warnings.push(table.clone());
                if !catalog.is_base_table(base) {
                    validation.missing_tables.push(table.clone());
                }
            } else if !catalog.is_base_table(table) {
                validation.missing_tables.push(table.clone());
            }
        } else if !catalog.is_base_table(table) {
            validation.missing_tables.push(table.clone());
        }
    }

    for field_ref in &analysis.fields {
        if let Some((table, field)) = field_ref.split_once("::") {
            let base = catalog.occurrences.resolve(table);
            if catalog.is_base_table(base) {
                if !catalog.has_field(base, field) {
                    if table != base {
                        validation
                            .missing_fields
                            .push(format!("{}::{} (TO -> {})", table, field, base));
                    } else {
                        validation.missing_fields.push(field_ref.clone());
                    }
                }
            } else {
                validation.missing_fields.push(field_ref.clone());
            }
        } else if let Some((table, field)) = field_ref.split_once('.') {
            let base = catalog.occurrences.resolve(table);
            if catalog.is_base_table(base) {
                if !catalog.has_field(base, field) {
                    if table != base {
                        validation
                            .missing_fields
                            .push(format!("{} (TO -> {})", field_ref, base));
                    } else {
                        validation.missing_fields.push(field_ref.clone());
                    }
                }
            } else {
                validation
                    .missing_fields
                    .push(format!("{} (possible alias)", field_ref));
            }
        } else if catalog.tables_with_field(field_ref).next().is_none() {
            validation
                .missing_fields
                .push(format!("{} (unqualified)", field_ref));
        }
    }

    validation.issue = if !validation.missing_tables.is_empty() {
        Some(IssueKind::MissingTable)
    } else if !validation.missing_fields.is_empty() {
        Some(IssueKind::MissingField)
    } else if !validation.occurrence_warnings.is_empty() {
        Some(IssueKind::NotBaseTable)
    } else {
        None
    };

    validation
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::catalog::{FieldInfo, TableInfo};

    /// One base table `Customers(CustomerId, Name)` plus an occurrence
    /// `customers_all` pointing at it.
    fn small_catalog() -> Catalog {
        let mut table = TableInfo {
            name: "Customers".to_string(),
            ..TableInfo::default()
        };
        table.add_field(FieldInfo {
            name: "CustomerId".to_string(),
            id: "1".to_string(),
            data_type: "Number".to_string(),
        });
        table.add_field(FieldInfo {
            name: "Name".to_string(),
            id: "2".to_string(),
            data_type: "Text".to_string(),
        });
        let mut catalog = Catalog::default();
        catalog.tables.insert("Customers".to_string(), table);
        catalog.occurrences.insert("Customers", "Customers");
        catalog.occurrences.insert("customers_all", "Customers");
        catalog
    }

    #[test]
    fn test_extract_execute_sql_payloads() {
        let text = r#"ExecuteSQL ( "SELECT name FROM Orders WHERE id = ?" ; "" ; "" ; $id )"#;
        let payloads = extract_execute_sql(text);
        assert_eq!(payloads, vec!["SELECT name FROM Orders WHERE id = ?"]);
    }

    #[test]
    fn test_commented_detection() {
        assert!(is_commented_sql("/* ExecuteSQL ( \"SELECT 1\" ) */"));
        assert!(is_commented_sql("-- ExecuteSQL ( \"SELECT 1\" )"));
        assert!(!is_commented_sql(
            "/* old */ ExecuteSQL ( \"SELECT 1 FROM T\" )"
        ));
    }

    #[test]
    fn test_main_table_fields() {
        let analysis =
            analyze_sql(r#"ExecuteSQL ( "SELECT total FROM Orders WHERE status = 1" ; "" ; "" )"#);
        assert_eq!(analysis.tables, vec!["Orders"]);
        assert!(analysis.fields.contains(&"Orders::total".to_string()));
        assert!(analysis.fields.contains(&"Orders::status".to_string()));
    }

    #[test]
    fn test_join_alias_resolution() {
        let analysis = analyze_sql(
            r#"ExecuteSQL ( "SELECT c.name FROM Orders JOIN Customers AS c WHERE c.id = 1" )"#,
        );
        assert!(analysis.fields.contains(&"Customers::name".to_string()));
        assert!(analysis.fields.contains(&"Customers::id".to_string()));
        assert!(analysis.tables.contains(&"Customers".to_string()));
    }

    #[test]
    fn test_keyword_and_digit_filtering() {
        let analysis =
            analyze_sql(r#"ExecuteSQL ( "SELECT DISTINCT FROM Orders ORDER BY 2" ; "" )"#);
        assert!(!analysis
            .fields
            .iter()
            .any(|field| field.ends_with("::DISTINCT") || field.ends_with("::2")));
    }

    #[test]
    fn test_validate_flags_missing_field() {
        let catalog = small_catalog();
        let analysis =
            analyze_sql(r#"ExecuteSQL ( "SELECT Name FROM Customers WHERE Region = ?" ; "" )"#);
        let validation = validate_sql(&analysis, &catalog);

        assert!(validation.missing_tables.is_empty());
        assert_eq!(validation.missing_fields, vec!["Customers::Region"]);
        assert_eq!(validation.issue, Some(IssueKind::MissingField));
    }

    #[test]
    fn test_validate_flags_missing_table_over_fields() {
        let catalog = small_catalog();
        let analysis =
            analyze_sql(r#"ExecuteSQL ( "SELECT Name FROM Invoices WHERE Total > 0" ; "" )"#);
        let validation = validate_sql(&analysis, &catalog);

        assert_eq!(validation.missing_tables, vec!["Invoices"]);
        // A missing table outranks whatever fields it dragged down with it.
        assert_eq!(validation.issue, Some(IssueKind::MissingTable));
    }

    #[test]
    fn test_validate_warns_on_occurrence_instead_of_base() {
        let catalog = small_catalog();
        let analysis = analyze_sql(r#"ExecuteSQL ( "SELECT Name FROM customers_all" ; "" )"#);
        let validation = validate_sql(&analysis, &catalog);

        assert!(validation.missing_tables.is_empty());
        assert!(validation.missing_fields.is_empty());
        assert_eq!(validation.occurrence_warnings, vec!["customers_all"]);
        assert_eq!(validation.issue, Some(IssueKind::NotBaseTable));
    }

    #[test]
    fn test_validate_clean_query_has_no_issue() {
        let catalog = small_catalog();
        let analysis =
            analyze_sql(r#"ExecuteSQL ( "SELECT Name FROM Customers WHERE CustomerId = ?" ; "" )"#);
        let validation = validate_sql(&analysis, &catalog);

        assert!(validation.missing_tables.is_empty());
        assert!(validation.missing_fields.is_empty());
        assert!(validation.occurrence_warnings.is_empty());
        assert_eq!(validation.issue, None);
    }
}

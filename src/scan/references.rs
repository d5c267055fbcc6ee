//! Lexical extraction strategies for calculation and step text.
//!
//! DDR calculation text mixes expression syntax with serialized XML
//! fragments, merge tokens, and SQL payloads. Each strategy here is
//! independent and infallible; callers run every applicable strategy over
//! every text. Over-counting a live reference is acceptable, silently
//! losing one is not.

use std::sync::LazyLock;

use regex::Regex;

/// `Table::Field` tokens. The table side admits the full identifier
/// alphabet seen in real solutions (unicode pseudo-table prefixes, the `+`
/// placeholder left by emoji normalization); the field side is plain.
static QUALIFIED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\p{L}\p{N}_+]+)::([A-Za-z0-9_]+)").unwrap());

/// `alias.field` tokens in expression text.
static DOTTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z][A-Za-z0-9_]*)\.([A-Za-z][A-Za-z0-9_]*)\b").unwrap());

/// Function names that read like table aliases in dotted notation.
const DOTTED_STOPLIST: &[&str] = &[
    "get", "let", "set", "abs", "sin", "cos", "tan", "exp", "log", "min", "max",
];

/// Serialized `<Field table=".." name="..">` fragments inside text.
static EMBEDDED_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<Field [^>]*?table="([^"]*)"[^>]*?name="([^"]*)""#).unwrap());

/// `<Chunk ...>` wrappers around a field reference, as serialized into
/// display calculations.
static CHUNK_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<Chunk[^>]*>.*?<Field[^>]*table="([^"]*)"[^>]*name="([^"]*)""#).unwrap()
});

/// Numeric field-id references inside serialized fragments.
static FIELD_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<Field [^>]*?id="(\d+)""#).unwrap());

/// `<<merge field>>` tokens in layout text.
static MERGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<<([^>]+)>>").unwrap());

/// `field:Table::Field` references in button script parameters.
static SCRIPT_PARAM_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"field:([^:]+)::([^;"\s]+)"#).unwrap());

/// `"Script Name" /* fmScript */` call annotations inside JavaScript
/// web-viewer step text.
static JS_SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"\s*/\*\s*fmScript"#).unwrap());

/// Qualified `Table::Field` references.
pub fn extract_qualified_refs(text: &str) -> Vec<(String, String)> {
    QUALIFIED_RE
        .captures_iter(text)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Dotted `alias.field` references, filtered against builtin function
/// names and all-numeric pieces.
pub fn extract_dotted_refs(text: &str) -> Vec<(String, String)> {
    DOTTED_RE
        .captures_iter(text)
        .filter(|caps| {
            let table = &caps[1];
            let field = &caps[2];
            !DOTTED_STOPLIST.contains(&table.to_ascii_lowercase().as_str())
                && !DOTTED_STOPLIST.contains(&field.to_ascii_lowercase().as_str())
        })
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Serialized field fragments (`<Field table=... name=...>`) found in text.
pub fn extract_embedded_field_refs(text: &str) -> Vec<(String, String)> {
    EMBEDDED_FIELD_RE
        .captures_iter(text)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Field references wrapped in `<Chunk>` display-calculation fragments.
pub fn extract_chunk_field_refs(text: &str) -> Vec<(String, String)> {
    CHUNK_FIELD_RE
        .captures_iter(text)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Numeric field ids from serialized fragments. The caller resolves them
/// against the catalog's per-table id index.
pub fn extract_field_id_refs(text: &str) -> Vec<String> {
    FIELD_ID_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// `<<merge field>>` tokens. The inner text may itself be qualified; the
/// caller decides how to credit it.
pub fn extract_merge_fields(text: &str) -> Vec<String> {
    MERGE_RE
        .captures_iter(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// `field:Table::Field` references from button script parameters.
pub fn extract_script_param_fields(text: &str) -> Vec<(String, String)> {
    SCRIPT_PARAM_FIELD_RE
        .captures_iter(text)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

/// Script names called from JavaScript in a web viewer step.
pub fn extract_js_script_calls(text: &str) -> Vec<String> {
    JS_SCRIPT_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_refs() {
        let refs = extract_qualified_refs("If ( Orders::Total > 0 ; Customers::Name ; \"\" )");
        assert_eq!(
            refs,
            vec![
                ("Orders".to_string(), "Total".to_string()),
                ("Customers".to_string(), "Name".to_string())
            ]
        );
    }

    #[test]
    fn test_qualified_refs_nonascii_table() {
        let refs = extract_qualified_refs("+Globals::Flag");
        assert_eq!(refs, vec![("+Globals".to_string(), "Flag".to_string())]);
    }

    #[test]
    fn test_dotted_refs_stoplist() {
        let refs = extract_dotted_refs("o.total + Abs.xyz + orders.id");
        assert_eq!(
            refs,
            vec![
                ("o".to_string(), "total".to_string()),
                ("orders".to_string(), "id".to_string())
            ]
        );
    }

    #[test]
    fn test_embedded_field_fragment() {
        let text = r#"prefix <Field id="3" table="Orders" name="Total"></Field> suffix"#;
        assert_eq!(
            extract_embedded_field_refs(text),
            vec![("Orders".to_string(), "Total".to_string())]
        );
        assert_eq!(extract_field_id_refs(text), vec!["3".to_string()]);
    }

    #[test]
    fn test_chunk_field_refs_span_lines() {
        let text = "<Chunk type=\"FieldRef\">\n  <Field table=\"Orders\" name=\"Total\"/>\n</Chunk>";
        assert_eq!(
            extract_chunk_field_refs(text),
            vec![("Orders".to_string(), "Total".to_string())]
        );
    }

    #[test]
    fn test_merge_fields() {
        assert_eq!(
            extract_merge_fields("Hello <<First Name>> <<Last Name>>"),
            vec!["First Name".to_string(), "Last Name".to_string()]
        );
    }

    #[test]
    fn test_script_param_fields() {
        assert_eq!(
            extract_script_param_fields(r#"field:Orders::Total; other"#),
            vec![("Orders".to_string(), "Total".to_string())]
        );
    }

    #[test]
    fn test_js_script_calls() {
        let text = r#"FileMaker.PerformScript("Sync Orders" /* fmScript */, p)"#;
        assert_eq!(extract_js_script_calls(text), vec!["Sync Orders".to_string()]);
    }
}

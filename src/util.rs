//! Shared utility helpers.

/// Case-insensitive substring search without allocating an uppercase copy.
#[inline]
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    find_ci(haystack, needle).is_some()
}

/// Case-insensitive starts_with check without allocating.
#[inline]
pub fn starts_with_ci(haystack: &str, needle: &str) -> bool {
    haystack.len() >= needle.len()
        && haystack.as_bytes()[..needle.len()].eq_ignore_ascii_case(needle.as_bytes())
}

/// Case-insensitive find — returns byte offset of first occurrence of `needle` in `haystack`.
#[inline]
pub fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let needle_bytes = needle.as_bytes();
    let haystack_bytes = haystack.as_bytes();
    if needle_bytes.len() > haystack_bytes.len() {
        return None;
    }
    haystack_bytes
        .windows(needle_bytes.len())
        .position(|window| window.eq_ignore_ascii_case(needle_bytes))
}

/// Whole-word, case-sensitive search. A match counts only when both sides
/// are non-identifier characters (identifier = alphanumeric or `_`).
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_ident_char(c));
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !is_ident_char(c));
        if before_ok && after_ok {
            return true;
        }
        from = end;
    }
    false
}

#[inline]
fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_ci() {
        assert!(contains_ci("OnServer Script", "onserver"));
        assert!(!contains_ci("short", "much longer needle"));
    }

    #[test]
    fn test_starts_with_ci() {
        assert!(starts_with_ci("Imp_Orders", "imp_"));
        assert!(!starts_with_ci("Orders_imp", "imp_"));
    }

    #[test]
    fn test_find_ci() {
        assert_eq!(find_ci("abc DEBUG xyz", "debug"), Some(4));
        assert_eq!(find_ci("abc", "debug"), None);
    }

    #[test]
    fn test_contains_word_boundaries() {
        assert!(contains_word("Set ( total ; Price )", "Price"));
        assert!(!contains_word("UnitPrice + 1", "Price"));
        assert!(!contains_word("Price_Total", "Price"));
        assert!(contains_word("Price", "Price"));
    }
}

//! Expression location heuristic
//!
//! Measures normally carry their calculation under `expression` (set by the
//! parser from `measure Name = ...`). Some models store it under another key
//! when it was authored without an explicit tag; in that case the first
//! non-metadata property that looks like a calculation is taken.

use regex::Regex;
use std::sync::LazyLock;

use crate::declaration::PropertyBag;

/// Length above which an untagged property value is assumed to be an expression
const LONG_TEXT_THRESHOLD: usize = 50;

/// Properties that are never calculation bodies
const METADATA_KEYS: &[&str] = &[
    "formatString",
    "displayFolder",
    "lineageTag",
    "sourceLineageTag",
    "description",
    "dataType",
    "dataCategory",
    "summarizeBy",
    "sourceColumn",
    "sortByColumn",
    "isHidden",
    "isKey",
    "changedProperty",
    "kind",
    "mode",
    "sourceKind",
];

static CALCULATION_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(VAR|RETURN|CALCULATE|CALCULATETABLE|SUM|SUMX|AVERAGE|AVERAGEX|MIN|MINX|MAX|MAXX|COUNT|COUNTA|COUNTX|COUNTROWS|DISTINCTCOUNT|DIVIDE|FILTER|ALL|ALLEXCEPT|ALLSELECTED|VALUES|DISTINCT|RELATED|RELATEDTABLE|IF|SWITCH|SELECTEDVALUE|HASONEVALUE|ISBLANK|BLANK|USERELATIONSHIP|TOTALYTD|DATEADD|SAMEPERIODLASTYEAR|KEEPFILTERS|REMOVEFILTERS|TREATAS|SUMMARIZE|ADDCOLUMNS|FORMAT)\s*\(|\b(VAR|RETURN)\b|\[[^\]]+\]",
    )
    .unwrap()
});

/// Whether a property value looks like a calculation body
pub fn looks_like_expression(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }

    trimmed.chars().count() > LONG_TEXT_THRESHOLD
        || CALCULATION_TOKENS.is_match(trimmed)
        || is_quoted_literal(trimmed)
}

fn is_quoted_literal(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('"') && s.ends_with('"')
}

fn is_metadata_key(key: &str) -> bool {
    METADATA_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// Locate the expression among a node's properties
///
/// Returns the key it was found under and its text.
pub fn locate_expression(properties: &PropertyBag) -> Option<(&str, &str)> {
    if let Some(expr) = properties.get("expression") {
        if !expr.trim().is_empty() {
            return Some(("expression", expr));
        }
    }

    properties
        .iter()
        .filter(|(key, _)| !key.eq_ignore_ascii_case("expression") && !is_metadata_key(key))
        .find(|(_, value)| looks_like_expression(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_calls_are_expressions() {
        assert!(looks_like_expression("SUM('Sales'[Amount])"));
        assert!(looks_like_expression("calculate ( [Total], ALL ( 'Date' ) )"));
        assert!(looks_like_expression("[Revenue] - [Cost]"));
    }

    #[test]
    fn quoted_literals_are_expressions() {
        assert!(looks_like_expression("\"N/A\""));
    }

    #[test]
    fn long_text_is_an_expression() {
        let long = "x".repeat(LONG_TEXT_THRESHOLD + 1);
        assert!(looks_like_expression(&long));
    }

    #[test]
    fn short_metadata_is_not() {
        assert!(!looks_like_expression("#,0.00"));
        assert!(!looks_like_expression("KPIs"));
        assert!(!looks_like_expression(""));
    }

    #[test]
    fn explicit_expression_wins() {
        let mut props = PropertyBag::new();
        props.insert("body", "SUM(x[y])");
        props.insert("expression", "[A] + 1");
        assert_eq!(locate_expression(&props), Some(("expression", "[A] + 1")));
    }

    #[test]
    fn metadata_keys_are_skipped() {
        let mut props = PropertyBag::new();
        props.insert("description", "Uses SUM(x) over the [Amount] column of the sales table");
        props.insert("formatString", "\"$\"#,0");
        assert_eq!(locate_expression(&props), None);

        props.insert("text", "COUNTROWS('Sales')");
        assert_eq!(locate_expression(&props), Some(("text", "COUNTROWS('Sales')")));
    }
}

//! Expression reference resolution
//!
//! Extracts every table, column and measure an expression refers to and
//! classifies it against a `ReferenceIndex`. Three shapes are recognised:
//!
//! - qualified: `'Sales'[Amount]` (or `Sales[Amount]` when `Sales` is a known table)
//! - bare table: `'Sales'` not followed by a bracket
//! - unqualified: `[Amount]`
//!
//! Resolution is heuristic. An unqualified name owned by several tables yields
//! one reference per owner, and a name the index does not know becomes a
//! measure with an empty table, listed in `unresolved`.

use modelref_core::{Diagnostic, DiagnosticCode, ObjectRef, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::comments::prepare;
use crate::index::ReferenceIndex;

/// Words that make the following bracket a declaration target
const DECLARATION_WORDS: [&str; 4] = ["VAR", "DEFINE", "MEASURE", "COLUMN"];

/// Everything an expression refers to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReferences {
    /// Tables named directly or as the owner of a qualified reference
    pub tables: BTreeSet<String>,

    pub columns: BTreeSet<ObjectRef>,

    pub measures: BTreeSet<ObjectRef>,

    /// Raw names as written
    pub identifiers: BTreeSet<String>,

    /// Unqualified names no table owns (emitted as empty-table measures)
    pub unresolved: BTreeSet<String>,

    /// Unqualified names owned by more than one table
    pub ambiguous: BTreeSet<String>,
}

impl ResolvedReferences {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.columns.is_empty() && self.measures.is_empty()
    }

    /// Ambiguity and fallback diagnostics for the object owning the expression
    pub fn diagnostics(&self, object: &str, index: &ReferenceIndex) -> Vec<Diagnostic> {
        let mut out = Vec::new();

        for name in &self.ambiguous {
            let owners: Vec<String> = index
                .measure_owners(name)
                .or_else(|| index.column_owners(name))
                .map(|o| o.iter().map(|t| format!("{}[{}]", t, name)).collect())
                .unwrap_or_default();
            out.push(
                Diagnostic::new(
                    DiagnosticCode::DaxAmbiguousReference,
                    Severity::Info,
                    format!("[{}] is owned by {} tables", name, owners.len()),
                )
                .with_object(object)
                .with_related(owners),
            );
        }

        for name in &self.unresolved {
            out.push(
                Diagnostic::new(
                    DiagnosticCode::DaxUnresolvedReference,
                    Severity::Warn,
                    format!("[{}] matches no known measure or column; assumed to be a measure", name),
                )
                .with_object(object),
            );
        }

        out
    }
}

/// Resolve the references in one expression
pub fn resolve(expression: &str, index: &ReferenceIndex) -> ResolvedReferences {
    let text = prepare(expression);
    let mut scanner = Scanner {
        text: &text,
        index,
        out: ResolvedReferences::default(),
    };
    scanner.run();
    scanner.out
}

struct Scanner<'a> {
    text: &'a str,
    index: &'a ReferenceIndex,
    out: ResolvedReferences,
}

impl<'a> Scanner<'a> {
    fn run(&mut self) {
        let text = self.text;
        let bytes = text.as_bytes();
        let mut pos = 0;

        while pos < bytes.len() {
            match bytes[pos] {
                b'\'' => {
                    let Some((table, after)) = read_delimited(text, pos, b'\'') else {
                        break;
                    };
                    if bytes.get(after) == Some(&b'[') {
                        let Some((name, end)) = read_delimited(text, after, b']') else {
                            break;
                        };
                        self.qualified(&table, &name);
                        pos = end;
                    } else {
                        self.table_literal(&table);
                        pos = after;
                    }
                }
                b'"' => {
                    // String contents are already blanked
                    pos = match text[pos + 1..].find('"') {
                        Some(i) => pos + i + 2,
                        None => bytes.len(),
                    };
                }
                b'[' => {
                    let Some((name, end)) = read_delimited(text, pos, b']') else {
                        break;
                    };
                    self.bracket(pos, &name);
                    pos = end;
                }
                _ => pos += 1,
            }
        }
    }

    /// A bracketed identifier at `start` not preceded by a quoted table
    fn bracket(&mut self, start: usize, name: &str) {
        let text = self.text;
        let before = &text[..start];

        if before.ends_with('@') {
            return;
        }

        let word = trailing_word(before, |c| c.is_alphanumeric() || c == '_');
        if !word.is_empty() && self.index.has_table(word) {
            self.qualified(word, name);
            return;
        }

        let last_word = trailing_word(before.trim_end(), char::is_alphabetic);
        if DECLARATION_WORDS
            .iter()
            .any(|w| w.eq_ignore_ascii_case(last_word))
        {
            debug!(name, "skipping declared name");
            return;
        }

        self.unqualified(name);
    }

    fn qualified(&mut self, table: &str, name: &str) {
        let index = self.index;
        self.out.identifiers.insert(name.to_string());
        let table = index.table(table).unwrap_or(table).to_string();
        self.out.tables.insert(table.clone());

        if let Some(measure) = index.measure(&table, name) {
            self.out.measures.insert(measure.clone());
        } else if let Some(column) = index.column(&table, name) {
            self.out.columns.insert(column.clone());
        } else {
            debug!(table = %table, name, "unknown qualified reference treated as column");
            self.out.columns.insert(ObjectRef::new(table, name));
        }
    }

    fn table_literal(&mut self, table: &str) {
        self.out.identifiers.insert(table.to_string());
        let table = self.index.table(table).unwrap_or(table).to_string();
        self.out.tables.insert(table);
    }

    fn unqualified(&mut self, name: &str) {
        let index = self.index;
        self.out.identifiers.insert(name.to_string());

        if let Some(owners) = index.measure_owners(name) {
            for table in owners {
                let measure = index
                    .measure(table, name)
                    .cloned()
                    .unwrap_or_else(|| ObjectRef::new(table.as_str(), name));
                self.out.measures.insert(measure);
            }
            if owners.len() > 1 {
                self.out.ambiguous.insert(name.to_string());
            }
            return;
        }

        if let Some(owners) = index.column_owners(name) {
            for table in owners {
                let column = index
                    .column(table, name)
                    .cloned()
                    .unwrap_or_else(|| ObjectRef::new(table.as_str(), name));
                self.out.columns.insert(column);
            }
            if owners.len() > 1 {
                self.out.ambiguous.insert(name.to_string());
            }
            return;
        }

        debug!(name, "unresolved reference assumed to be a measure");
        self.out.measures.insert(ObjectRef::unresolved(name));
        self.out.unresolved.insert(name.to_string());
    }
}

/// Read a `'...'` or `[...]` token starting at `start`, unescaping doubled
/// closers. Returns the contents and the byte offset after the closer.
fn read_delimited(text: &str, start: usize, close: u8) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let mut pos = start + 1;
    let mut seg_start = pos;
    let mut out = String::new();

    while pos < bytes.len() {
        if bytes[pos] == close {
            out.push_str(&text[seg_start..pos]);
            if bytes.get(pos + 1) == Some(&close) {
                out.push(close as char);
                pos += 2;
                seg_start = pos;
                continue;
            }
            return Some((out, pos + 1));
        }
        pos += 1;
    }

    None
}

/// Longest suffix of `s` whose characters all satisfy `keep`
fn trailing_word(s: &str, keep: impl Fn(char) -> bool) -> &str {
    let start = s
        .char_indices()
        .rev()
        .find(|(_, c)| !keep(*c))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;
    use modelref_core::MetadataRow;
    use pretty_assertions::assert_eq;

    fn index(measures: &[(&str, &str)], columns: &[(&str, &str)]) -> ReferenceIndex {
        let rows = |pairs: &[(&str, &str)]| -> Vec<MetadataRow> {
            pairs.iter().map(|(t, n)| MetadataRow::new(*t, *n)).collect()
        };
        build_index(&rows(measures), &rows(columns))
    }

    fn refs(pairs: &[(&str, &str)]) -> BTreeSet<ObjectRef> {
        pairs.iter().map(|(t, n)| ObjectRef::new(*t, *n)).collect()
    }

    #[test]
    fn qualified_column() {
        let idx = index(&[("Sales", "Total")], &[("Sales", "Amount")]);
        let r = resolve("SUM('Sales'[Amount])", &idx);

        assert_eq!(r.columns, refs(&[("Sales", "Amount")]));
        assert!(r.measures.is_empty());
        assert!(r.tables.contains("Sales"));
    }

    #[test]
    fn qualified_prefers_measure_then_column_then_defaults_to_column() {
        let idx = index(&[("T", "Both")], &[("T", "Both"), ("T", "Col")]);
        let r = resolve("'T'[Both] + 't'[col] + 'T'[Missing]", &idx);

        assert_eq!(r.measures, refs(&[("T", "Both")]));
        assert_eq!(r.columns, refs(&[("T", "Col"), ("T", "Missing")]));
    }

    #[test]
    fn unqualified_ambiguity_fans_out() {
        let idx = index(&[("X", "Rev"), ("Y", "Rev"), ("Z", "Uses")], &[]);
        let r = resolve("[Rev] * 2", &idx);

        assert_eq!(r.measures, refs(&[("X", "Rev"), ("Y", "Rev")]));
        assert!(r.ambiguous.contains("Rev"));
        assert_eq!(r.diagnostics("Z[Uses]", &idx)[0].related, vec!["X[Rev]", "Y[Rev]"]);
    }

    #[test]
    fn unqualified_measure_wins_over_column() {
        let idx = index(&[("A", "Qty")], &[("B", "Qty")]);
        let r = resolve("[Qty]", &idx);
        assert_eq!(r.measures, refs(&[("A", "Qty")]));
        assert!(r.columns.is_empty());
    }

    #[test]
    fn unqualified_column() {
        let idx = index(&[], &[("Sales", "Amount")]);
        let r = resolve("[amount] * 1.2", &idx);
        assert_eq!(r.columns, refs(&[("Sales", "Amount")]));
    }

    #[test]
    fn unknown_name_falls_back_to_unresolved_measure() {
        let idx = index(&[], &[]);
        let r = resolve("[Mystery] + 1", &idx);

        assert_eq!(r.measures, refs(&[("", "Mystery")]));
        assert!(r.unresolved.contains("Mystery"));
        let diags = r.diagnostics("T[M]", &idx);
        assert_eq!(diags[0].code, DiagnosticCode::DaxUnresolvedReference);
    }

    #[test]
    fn commented_references_are_ignored() {
        let idx = index(&[], &[("Sales", "Amount")]);
        let r = resolve(
            "SUM('Sales'[Amount]) /* 'Fake'[Ref] */\n-- 'Fake2'[Ref]\n// [Other]",
            &idx,
        );

        assert_eq!(r.columns, refs(&[("Sales", "Amount")]));
        assert!(r.measures.is_empty());
        assert_eq!(r.tables, BTreeSet::from(["Sales".to_string()]));
    }

    #[test]
    fn string_contents_are_ignored() {
        let idx = index(&[], &[]);
        let r = resolve("\"[NotARef]\" & \"'NotATable'\"", &idx);
        assert!(r.is_empty());
        assert!(r.identifiers.is_empty());
    }

    #[test]
    fn declaration_targets_are_skipped() {
        let idx = index(&[("T", "Base")], &[]);
        let r = resolve("DEFINE MEASURE [Local] = 1\nVAR [x] = [Base]\nRETURN x", &idx);

        assert_eq!(r.measures, refs(&[("T", "Base")]));
        assert!(r.unresolved.is_empty());
    }

    #[test]
    fn parameter_references_are_skipped() {
        let idx = index(&[], &[]);
        assert!(resolve("@[Param] + 1", &idx).is_empty());
    }

    #[test]
    fn bare_table_literals() {
        let idx = index(&[], &[("Date", "Date")]);
        let r = resolve("COUNTROWS('date') + CALCULATE(1, ALL('Other Table'))", &idx);

        assert_eq!(
            r.tables,
            BTreeSet::from(["Date".to_string(), "Other Table".to_string()])
        );
        assert!(r.columns.is_empty());
    }

    #[test]
    fn unquoted_known_table_is_qualified() {
        let idx = index(&[], &[("Sales", "Amount"), ("Returns", "Amount")]);
        let r = resolve("SUMX(Sales, Sales[Amount]) + Unknown[Amount]", &idx);

        assert_eq!(r.columns, refs(&[("Returns", "Amount"), ("Sales", "Amount")]));
        assert!(r.ambiguous.contains("Amount"));
    }

    #[test]
    fn escaped_names() {
        let idx = index(&[], &[("Bob's", "Size]s")]);
        let r = resolve("'Bob''s'[Size]]s]", &idx);
        assert_eq!(r.columns, refs(&[("Bob's", "Size]s")]));
    }

    #[test]
    fn canonical_casing_is_used() {
        let idx = index(&[("Sales", "Total")], &[]);
        let r = resolve("'SALES'[total]", &idx);
        assert_eq!(r.measures, refs(&[("Sales", "Total")]));
        assert!(r.tables.contains("Sales"));
    }
}

//! Relationship column references
//!
//! Relationship endpoints are written as `'Table'.'Column'`, `'Table'.Column`
//! or `Table.Column` (and occasionally `'Table'[Column]`). They are decomposed
//! here rather than by the generic property parser, because table and column
//! names may themselves contain dots, spaces and quotes.

/// Split a column reference into `(table, column)`
///
/// Returns `None` when either part is missing.
pub fn decompose_column_ref(raw: &str) -> Option<(String, String)> {
    let s = raw.trim();

    let (table, rest) = if s.starts_with('\'') {
        let (table, rest) = read_quoted(s)?;
        (table, rest.trim_start())
    } else {
        let pos = s.find(['.', '['])?;
        (s[..pos].trim().to_string(), &s[pos..])
    };

    let column = if let Some(rest) = rest.strip_prefix('.') {
        let rest = rest.trim();
        if rest.starts_with('\'') {
            let (column, tail) = read_quoted(rest)?;
            if !tail.trim().is_empty() {
                return None;
            }
            column
        } else {
            rest.to_string()
        }
    } else if let Some(rest) = rest.strip_prefix('[') {
        rest.trim_end().strip_suffix(']')?.replace("]]", "]")
    } else {
        return None;
    };

    if table.is_empty() || column.is_empty() {
        return None;
    }

    Some((table, column))
}

/// Encode `(table, column)` in the fully quoted `'Table'.'Column'` form
pub fn encode_column_ref(table: &str, column: &str) -> String {
    format!("'{}'.'{}'", table.replace('\'', "''"), column.replace('\'', "''"))
}

/// Read a single-quoted name starting at `s[0]`, unescaping doubled quotes.
/// Returns the name and the text after the closing quote.
fn read_quoted(s: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = s.char_indices().skip(1).peekable();

    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            if let Some(&(_, '\'')) = chars.peek() {
                chars.next();
                out.push('\'');
                continue;
            }
            return Some((out, &s[i + 1..]));
        }
        out.push(c);
    }

    None
}

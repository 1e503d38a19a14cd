//! Indentation-driven declaration parser
//!
//! A single forward pass over lines. Leading tab characters give a line's
//! depth; a stack of open declarations gives the current ancestry. Lines that
//! fit no known shape are skipped (and reported as diagnostics) so one bad
//! file never aborts a repository scan.

use modelref_core::{Diagnostic, DiagnosticCode, Location, Severity};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::declaration::{DeclarationKind, DeclarationNode};

/// `key:` at the start of a line
static COLON_PROPERTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*\s*:").unwrap());

/// `key =` at the start of a line, with a lower-case key
static EQUALS_PROPERTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][A-Za-z0-9_]*\s*=").unwrap());

/// Bare boolean flag such as `isHidden`
static BARE_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

const FENCE: &str = "```";

/// Parsed document together with the lines that were skipped
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub root: DeclarationNode,
    pub diagnostics: Vec<Diagnostic>,
}

/// Errors reading model-definition files
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parse model-definition text into a document tree
pub fn parse(text: &str) -> DeclarationNode {
    parse_with_diagnostics(text, "").root
}

/// Parse model-definition text, reporting skipped lines against `file`
pub fn parse_with_diagnostics(text: &str, file: &str) -> ParseOutput {
    LineParser::new(text, file).run()
}

/// Read and parse one file
pub fn parse_file(path: &Path) -> Result<DeclarationNode, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse(&text))
}

struct Frame {
    node: DeclarationNode,

    /// Tab depth of the declaration plus one; lines at a depth below this close it
    indent: usize,
}

struct LineParser<'a> {
    file: &'a str,
    lines: Vec<&'a str>,
    pos: usize,
    root: DeclarationNode,
    stack: Vec<Frame>,
    description: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> LineParser<'a> {
    fn new(text: &'a str, file: &'a str) -> Self {
        Self {
            file,
            lines: text.strip_prefix('\u{feff}').unwrap_or(text).lines().collect(),
            pos: 0,
            root: DeclarationNode::document(),
            stack: Vec::new(),
            description: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn run(mut self) -> ParseOutput {
        while self.pos < self.lines.len() {
            let raw = self.lines[self.pos];
            let line = self.pos + 1;
            self.pos += 1;

            let content = raw.trim();
            if content.is_empty() {
                continue;
            }

            let tabs = tab_depth(raw);
            self.close_frames(tabs);

            if let Some(text) = content.strip_prefix("///") {
                self.description.push(text.trim().to_string());
                continue;
            }

            if let Some((kind, rest)) = split_declaration(content) {
                self.open_declaration(kind, rest, tabs, line);
                continue;
            }

            self.description.clear();

            if content == "ref" || content.starts_with("ref ") {
                continue;
            }

            if let Some(kind) = DeclarationKind::from_keyword(content) {
                self.report(
                    DiagnosticCode::TmdlMissingName,
                    format!("{} declaration without a name", kind),
                    line,
                );
                continue;
            }

            if let Some((key, separator, value)) = split_property(content) {
                let value = match separator {
                    ':' => Some(value.to_string()),
                    _ => self.read_value(value, tabs, true),
                };
                if let Some(value) = value {
                    self.top().properties.insert(key, value);
                }
                continue;
            }

            if BARE_FLAG.is_match(content) {
                self.top().properties.insert(content, "true");
                continue;
            }

            self.report(
                DiagnosticCode::TmdlUnrecognizedLine,
                format!("unrecognized line: {}", content),
                line,
            );
        }

        self.close_frames(0);

        tracing::debug!(
            file = self.file,
            nodes = self.root.descendant_count(),
            skipped = self.diagnostics.len(),
            "parsed model definition"
        );

        ParseOutput {
            root: self.root,
            diagnostics: self.diagnostics,
        }
    }

    fn top(&mut self) -> &mut DeclarationNode {
        match self.stack.last_mut() {
            Some(frame) => &mut frame.node,
            None => &mut self.root,
        }
    }

    /// Pop every open declaration that a line at `tabs` is not nested in
    fn close_frames(&mut self, tabs: usize) {
        while self.stack.last().is_some_and(|f| f.indent > tabs) {
            if let Some(frame) = self.stack.pop() {
                self.top().children.push(frame.node);
            }
        }
    }

    fn open_declaration(&mut self, kind: DeclarationKind, rest: &str, tabs: usize, line: usize) {
        let (name_part, value) = split_unquoted(rest, '=');
        let name = unquote(name_part);

        if name.is_empty() {
            self.description.clear();
            self.report(
                DiagnosticCode::TmdlMissingName,
                format!("{} declaration without a name", kind),
                line,
            );
            return;
        }

        let mut node = DeclarationNode::new(kind, name);
        node.line = line;

        if !self.description.is_empty() {
            node.properties
                .insert("description", std::mem::take(&mut self.description).join("\n"));
        }

        if let Some(value) = value {
            let value = value.trim();
            if let Some(body) = self.read_value(value, tabs, kind.accepts_expression_body()) {
                node.properties.insert(kind.inline_value_key(), body);
            }
        }

        self.stack.push(Frame {
            node,
            indent: tabs + 1,
        });
    }

    /// Resolve the right-hand side of an `=`, pulling in following lines
    /// for empty, fenced or continued values
    fn read_value(&mut self, value: &str, tabs: usize, collect_empty: bool) -> Option<String> {
        if let Some(after) = value.strip_prefix(FENCE) {
            return Some(self.collect_fenced(after));
        }

        if value.is_empty() {
            if !collect_empty {
                return None;
            }
            let body = self.collect_block(tabs, true);
            return (!body.is_empty()).then_some(body);
        }

        if collect_empty {
            // Inline body continued on deeper lines
            let tail = self.collect_block(tabs, false);
            if !tail.is_empty() {
                return Some(format!("{}\n{}", value, tail));
            }
        }

        Some(value.to_string())
    }

    /// Collect an expression body below a line at `decl_tabs`
    ///
    /// Lines deeper than one level always continue the body. Lines exactly one
    /// level deeper continue it only when `child_level` is set and they do not
    /// look like a property. Blank lines are kept only when the body resumes
    /// after them.
    fn collect_block(&mut self, decl_tabs: usize, child_level: bool) -> String {
        let mut body: Vec<&str> = Vec::new();
        let mut blanks = 0;
        let mut cursor = self.pos;

        while cursor < self.lines.len() {
            let raw = self.lines[cursor];
            let content = raw.trim();
            if content.is_empty() {
                blanks += 1;
                cursor += 1;
                continue;
            }

            let depth = tab_depth(raw);
            let continues = depth > decl_tabs + 1
                || (child_level && depth == decl_tabs + 1 && !is_property_like(content));
            if !continues {
                break;
            }

            body.extend(std::iter::repeat("").take(blanks));
            blanks = 0;
            body.push(raw);
            cursor += 1;
            self.pos = cursor;
        }

        dedent(&body)
    }

    /// Collect lines verbatim up to a closing fence
    fn collect_fenced(&mut self, after_open: &str) -> String {
        if let Some(end) = after_open.find(FENCE) {
            return after_open[..end].trim().to_string();
        }

        let mut body: Vec<&str> = Vec::new();
        if !after_open.trim().is_empty() {
            body.push(after_open.trim());
        }

        while self.pos < self.lines.len() {
            let raw = self.lines[self.pos];
            self.pos += 1;
            if let Some(before) = raw.trim_end().strip_suffix(FENCE) {
                if !before.trim().is_empty() {
                    body.push(before);
                }
                break;
            }
            body.push(raw);
        }

        dedent(&body).trim_matches('\n').to_string()
    }

    fn report(&mut self, code: DiagnosticCode, message: String, line: usize) {
        tracing::debug!(file = self.file, line, "{}", message);
        self.diagnostics.push(
            Diagnostic::new(code, Severity::Warn, message)
                .with_location(Location::with_line(self.file, line)),
        );
    }
}

/// Number of leading tab characters
fn tab_depth(raw: &str) -> usize {
    raw.chars().take_while(|c| *c == '\t').count()
}

/// `keyword name...` where the token after the keyword is not `:` or `=`
fn split_declaration(content: &str) -> Option<(DeclarationKind, &str)> {
    let end = content
        .find(|c: char| c.is_whitespace() || c == ':' || c == '=')
        .unwrap_or(content.len());
    let kind = DeclarationKind::from_keyword(&content[..end])?;

    let rest = content[end..].trim_start();
    if rest.is_empty() || rest.starts_with(':') || rest.starts_with('=') {
        return None;
    }

    Some((kind, rest))
}

/// `key: value` or `key = value`, whichever separator comes first
fn split_property(content: &str) -> Option<(&str, char, &str)> {
    let pos = content.find([':', '='])?;
    let key = content[..pos].trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }

    let separator = if content[pos..].starts_with(':') { ':' } else { '=' };
    Some((key, separator, content[pos + 1..].trim()))
}

/// Split at the first `sep` outside single quotes
fn split_unquoted(s: &str, sep: char) -> (&str, Option<&str>) {
    let mut quoted = false;
    for (i, c) in s.char_indices() {
        if c == '\'' {
            quoted = !quoted;
        } else if c == sep && !quoted {
            return (&s[..i], Some(&s[i + c.len_utf8()..]));
        }
    }
    (s, None)
}

/// Strip surrounding single quotes and unescape doubled ones
fn unquote(raw: &str) -> String {
    let s = raw.trim();
    match s.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'"),
        None => s.to_string(),
    }
}

/// Whether a line one level below a declaration starts its properties
fn is_property_like(content: &str) -> bool {
    content.starts_with("///")
        || COLON_PROPERTY.is_match(content)
        || EQUALS_PROPERTY.is_match(content)
        || is_flag_name(content)
        || split_declaration(content).is_some()
}

/// `isHidden`, `isKey`, `isDefaultLabel`, ...
fn is_flag_name(content: &str) -> bool {
    content
        .strip_prefix("is")
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
        && BARE_FLAG.is_match(content)
}

/// Remove the common leading tabs and join with newlines
fn dedent(lines: &[&str]) -> String {
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| tab_depth(l))
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                ""
            } else {
                l[indent..].trim_end()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn only_child(root: &DeclarationNode) -> &DeclarationNode {
        assert_eq!(root.children.len(), 1, "expected one top-level declaration");
        &root.children[0]
    }

    #[test]
    fn table_with_columns_and_measure() {
        let text = "table Sales\n\
                    \tlineageTag: 1234\n\
                    \n\
                    \tmeasure Total = SUM('Sales'[Amount])\n\
                    \t\tformatString: #,0\n\
                    \n\
                    \tcolumn Amount\n\
                    \t\tdataType: decimal\n\
                    \t\tsourceColumn: Amount\n";

        let root = parse(text);
        let table = only_child(&root);
        assert_eq!(table.kind, DeclarationKind::Table);
        assert_eq!(table.name, "Sales");
        assert_eq!(table.properties.get("lineageTag"), Some("1234"));

        let measure = table.child(DeclarationKind::Measure, "Total").unwrap();
        assert_eq!(measure.properties.get("expression"), Some("SUM('Sales'[Amount])"));
        assert_eq!(measure.properties.get("formatString"), Some("#,0"));
        assert_eq!(measure.line, 4);

        let column = table.child(DeclarationKind::Column, "Amount").unwrap();
        assert_eq!(column.properties.get("dataType"), Some("decimal"));
    }

    #[test]
    fn multi_line_measure_stops_at_property() {
        let text = "table T\n\
                    \tmeasure 'Net Sales' =\n\
                    \t\t\tVAR gross = [Gross]\n\
                    \n\
                    \t\t\tRETURN gross - [Returns]\n\
                    \t\tformatString: 0.00\n\
                    \n\
                    \tmeasure Next = 1\n";

        let root = parse(text);
        let table = only_child(&root);
        let measure = table.child(DeclarationKind::Measure, "Net Sales").unwrap();
        assert_eq!(
            measure.properties.get("expression"),
            Some("VAR gross = [Gross]\n\nRETURN gross - [Returns]")
        );
        assert_eq!(measure.properties.get("formatString"), Some("0.00"));
        assert!(table.child(DeclarationKind::Measure, "Next").is_some());
    }

    #[test]
    fn body_at_child_level_continues_until_property() {
        let text = "table T\n\
                    \tcolumn Margin =\n\
                    \t\tIF (\n\
                    \t\t\t[Revenue] > 0,\n\
                    \t\t\t[Profit] / [Revenue]\n\
                    \t\t)\n\
                    \t\tdataType: double\n\
                    \t\tisHidden\n";

        let root = parse(text);
        let column = only_child(&root).child(DeclarationKind::Column, "Margin").unwrap();
        assert_eq!(
            column.properties.get("expression"),
            Some("IF (\n\t[Revenue] > 0,\n\t[Profit] / [Revenue]\n)")
        );
        assert_eq!(column.properties.get("dataType"), Some("double"));
        assert_eq!(column.properties.get_bool("isHidden"), Some(true));
    }

    #[test]
    fn trailing_blank_lines_are_not_part_of_body() {
        let text = "table T\n\tmeasure M =\n\t\t\t[A] + 1\n\n\n\tcolumn C\n";
        let root = parse(text);
        let table = only_child(&root);
        let measure = table.child(DeclarationKind::Measure, "M").unwrap();
        assert_eq!(measure.properties.get("expression"), Some("[A] + 1"));
        assert!(table.child(DeclarationKind::Column, "C").is_some());
    }

    #[test]
    fn fenced_expression() {
        let text = "table T\n\
                    \tmeasure Fenced = ```\n\
                    \t\t\tVAR x = 1\n\
                    \t\t\tformatString: not a property here\n\
                    \t\t\tRETURN x\n\
                    \t\t\t```\n\
                    \t\tdisplayFolder: KPIs\n";

        let root = parse(text);
        let measure = only_child(&root).child(DeclarationKind::Measure, "Fenced").unwrap();
        assert_eq!(
            measure.properties.get("expression"),
            Some("VAR x = 1\nformatString: not a property here\nRETURN x")
        );
        assert_eq!(measure.properties.get("displayFolder"), Some("KPIs"));
    }

    #[test]
    fn partition_source_block() {
        let text = "table Sales\n\
                    \tpartition Sales-part = m\n\
                    \t\tmode: import\n\
                    \t\tsource =\n\
                    \t\t\t\tlet\n\
                    \t\t\t\t    Source = Sql.Database(\"srv\", \"db\")\n\
                    \t\t\t\tin\n\
                    \t\t\t\t    Source\n\
                    \n\
                    \tannotation PBI_ResultType = Table\n";

        let root = parse(text);
        let table = only_child(&root);
        let partition = table.child(DeclarationKind::Partition, "Sales-part").unwrap();
        assert_eq!(partition.properties.get("sourceKind"), Some("m"));
        assert_eq!(partition.properties.get("mode"), Some("import"));
        assert_eq!(
            partition.properties.get("source"),
            Some("let\n    Source = Sql.Database(\"srv\", \"db\")\nin\n    Source")
        );

        let annotation = table.child(DeclarationKind::Annotation, "PBI_ResultType").unwrap();
        assert_eq!(annotation.properties.get("value"), Some("Table"));
    }

    #[test]
    fn relationships_and_expressions_at_top_level() {
        let text = "relationship 5d1a-77\n\
                    \tfromColumn: Sales.'Order Date'\n\
                    \ttoColumn: 'Date'.Date\n\
                    \n\
                    expression Server = \"localhost\" meta [IsParameterQuery=true, Type=\"Text\"]\n\
                    \tlineageTag: abc\n";

        let root = parse(text);
        assert_eq!(root.children.len(), 2);

        let rel = root.child(DeclarationKind::Relationship, "5d1a-77").unwrap();
        assert_eq!(rel.properties.get("fromColumn"), Some("Sales.'Order Date'"));

        let expr = root.child(DeclarationKind::Expression, "Server").unwrap();
        assert_eq!(
            expr.properties.get("expression"),
            Some("\"localhost\" meta [IsParameterQuery=true, Type=\"Text\"]")
        );
    }

    #[test]
    fn keyword_followed_by_separator_is_a_property() {
        let text = "table Date\n\
                    \thierarchy Calendar\n\
                    \t\tlevel Year\n\
                    \t\t\tcolumn: Year\n\
                    \t\tlevel Month\n\
                    \t\t\tcolumn: Month\n";

        let root = parse(text);
        let hierarchy = only_child(&root).child(DeclarationKind::Hierarchy, "Calendar").unwrap();
        let levels: Vec<_> = hierarchy
            .children_of(DeclarationKind::Level)
            .map(|l| (l.name.as_str(), l.properties.get("column")))
            .collect();
        assert_eq!(levels, vec![("Year", Some("Year")), ("Month", Some("Month"))]);
    }

    #[test]
    fn description_lines_attach_to_next_declaration() {
        let text = "table T\n\
                    \t/// Total sales\n\
                    \t/// before returns\n\
                    \tmeasure Gross = SUM(T[Amount])\n\
                    \tmeasure Other = 1\n";

        let root = parse(text);
        let table = only_child(&root);
        let gross = table.child(DeclarationKind::Measure, "Gross").unwrap();
        assert_eq!(
            gross.properties.get("description"),
            Some("Total sales\nbefore returns")
        );
        let other = table.child(DeclarationKind::Measure, "Other").unwrap();
        assert_eq!(other.properties.get("description"), None);
    }

    #[test]
    fn quoted_names_unescape_doubled_quotes() {
        let root = parse("table 'Customer''s Orders'\n\tcolumn 'Unit Price'\n");
        let table = only_child(&root);
        assert_eq!(table.name, "Customer's Orders");
        assert!(table.child(DeclarationKind::Column, "unit price").is_some());
    }

    #[test]
    fn name_stops_at_unquoted_equals() {
        let root = parse("table T\n\tmeasure 'a = b' = [X]\n");
        let measure = &only_child(&root).children[0];
        assert_eq!(measure.name, "a = b");
        assert_eq!(measure.properties.get("expression"), Some("[X]"));
    }

    #[test]
    fn spaces_do_not_add_depth() {
        let root = parse("table A\n    column X\ntable B\n");
        assert_eq!(root.children.len(), 3);
        assert_eq!(root.children[1].kind, DeclarationKind::Column);
    }

    #[test]
    fn unrecognized_lines_are_skipped_and_reported() {
        let text = "table T\n\
                    \tthis is not tmdl\n\
                    \tref table Other\n\
                    \tcolumn C\n\
                    \t\tdataType: string\n";

        let out = parse_with_diagnostics(text, "tables/T.tmdl");
        let table = only_child(&out.root);
        assert_eq!(table.children.len(), 1);
        assert_eq!(out.diagnostics.len(), 1);

        let diag = &out.diagnostics[0];
        assert_eq!(diag.code, DiagnosticCode::TmdlUnrecognizedLine);
        assert_eq!(diag.location, Some(Location::with_line("tables/T.tmdl", 2)));
    }

    #[test]
    fn leading_byte_order_mark_is_ignored() {
        let out = parse_with_diagnostics("\u{feff}table Sales\n\tcolumn Amount\n\tmeasure T = SUM(Sales[Amount])\n", "Sales.tmdl");
        assert!(out.diagnostics.is_empty());

        let table = only_child(&out.root);
        assert_eq!(table.kind, DeclarationKind::Table);
        assert_eq!(table.name, "Sales");
        assert_eq!(table.children.len(), 2);
    }

    #[test]
    fn keyword_without_name_is_reported() {
        let out = parse_with_diagnostics("table\n", "x.tmdl");
        assert!(out.root.children.is_empty());
        assert_eq!(out.diagnostics[0].code, DiagnosticCode::TmdlMissingName);
    }

    #[test]
    fn separator_order_decides_property_shape() {
        let root = parse("table T\n\tfoo = a:b\n\tbar: x = y\n");
        let table = only_child(&root);
        assert_eq!(table.properties.get("foo"), Some("a:b"));
        assert_eq!(table.properties.get("bar"), Some("x = y"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = parse_file(Path::new("/definitely/not/here.tmdl")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("here.tmdl"));
    }
}

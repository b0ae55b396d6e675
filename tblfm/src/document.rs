//! Markdown documents with formula tables
//!
//! A document is a run of blocks: plain lines, kept as written, and tables.
//! A table is a header line, a `|---|` separator line and any number of
//! body lines, followed by the `<!-- TBLFM: ... -->` lines that belong to it.

use crate::table::Table;
use serde::Serialize;

const DIRECTIVE_PREFIX: &str = "<!-- TBLFM:";

/// Column alignment from the separator line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Default,
    Left,
    Right,
    Center,
}

impl Alignment {
    fn from_separator(cell: &str) -> Self {
        match (cell.starts_with(':'), cell.ends_with(':') && cell.len() > 1) {
            (true, true) => Alignment::Center,
            (true, false) => Alignment::Left,
            (false, true) => Alignment::Right,
            (false, false) => Alignment::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableBlock {
    pub table: Table,
    pub alignments: Vec<Alignment>,
    /// Directive lines as written, in document order
    pub directives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Block {
    Text(String),
    Table(TableBlock),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    pub blocks: Vec<Block>,
    /// Whether the source ended with a newline
    pub trailing_newline: bool,
}

impl Document {
    pub fn tables(&self) -> impl Iterator<Item = &TableBlock> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Table(table) => Some(table),
            Block::Text(_) => None,
        })
    }

    pub fn tables_mut(&mut self) -> impl Iterator<Item = &mut TableBlock> {
        self.blocks.iter_mut().filter_map(|block| match block {
            Block::Table(table) => Some(table),
            Block::Text(_) => None,
        })
    }
}

/// Split markdown into text lines and tables
pub fn parse(markdown: &str) -> Document {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let starts_table = is_table_line(line) && lines.get(i + 1).is_some_and(|next| is_separator(next));
        if !starts_table {
            blocks.push(Block::Text(line.to_string()));
            i += 1;
            continue;
        }

        let alignments = split_row(lines[i + 1])
            .iter()
            .map(|cell| Alignment::from_separator(cell))
            .collect();
        let mut rows = vec![split_row(line)];
        i += 2;

        while i < lines.len() && is_table_line(lines[i]) {
            rows.push(split_row(lines[i]));
            i += 1;
        }

        let mut directives = Vec::new();
        while i < lines.len() && is_directive(lines[i]) {
            directives.push(lines[i].to_string());
            i += 1;
        }

        blocks.push(Block::Table(TableBlock {
            table: Table::from_rows(rows),
            alignments,
            directives,
        }));
    }

    Document {
        blocks,
        trailing_newline: markdown.ends_with('\n'),
    }
}

fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn is_separator(line: &str) -> bool {
    let line = line.trim();
    line.starts_with('|')
        && line.contains('-')
        && line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

fn is_directive(line: &str) -> bool {
    line.trim_start().starts_with(DIRECTIVE_PREFIX)
}

/// Cells of one table line, trimmed. `\|` stays inside its cell.
fn split_row(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('\\');
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    // Text after the last pipe only counts when the row is not closed
    if !current.trim().is_empty() {
        cells.push(current);
    }

    cells.into_iter().map(|cell| cell.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "foo\n\
| A   | B   |\n\
| --- | ---:|\n\
| 1   | 2   |\n\
|     |     |\n\
<!-- TBLFM: @>$>=@2 -->\n\
\n\
tail\n";

    #[test]
    fn test_parse_blocks() {
        let doc = parse(DOC);
        assert!(doc.trailing_newline);
        assert_eq!(doc.blocks.len(), 4);
        assert_eq!(doc.blocks[0], Block::Text("foo".to_string()));

        let table = doc.tables().next().unwrap();
        assert_eq!(table.alignments, vec![Alignment::Default, Alignment::Right]);
        assert_eq!(table.directives, vec!["<!-- TBLFM: @>$>=@2 -->".to_string()]);
        assert_eq!(table.table.row_count(), 3);
        assert_eq!(table.table.cell(2, 0), "");
        assert_eq!(doc.blocks[3], Block::Text("tail".to_string()));
    }

    #[test]
    fn test_alignment_markers() {
        assert_eq!(Alignment::from_separator(":---"), Alignment::Left);
        assert_eq!(Alignment::from_separator("---:"), Alignment::Right);
        assert_eq!(Alignment::from_separator(":-:"), Alignment::Center);
        assert_eq!(Alignment::from_separator("-"), Alignment::Default);
    }

    #[test]
    fn test_split_row_keeps_escaped_pipes() {
        assert_eq!(split_row("| a \\| b | c |"), vec!["a \\| b".to_string(), "c".to_string()]);
        assert_eq!(split_row("| 2023-07-12 10:00 | | |"), vec!["2023-07-12 10:00", "", ""]);
    }

    #[test]
    fn test_directive_must_follow_table() {
        let doc = parse("| A |\n| - |\n| 1 |\n\n<!-- TBLFM: @2=3 -->\n");
        assert!(doc.tables().next().unwrap().directives.is_empty());
        assert_eq!(doc.blocks.last(), Some(&Block::Text("<!-- TBLFM: @2=3 -->".to_string())));
    }

    #[test]
    fn test_lone_pipe_line_is_text() {
        let doc = parse("| not a table\nplain\n");
        assert_eq!(doc.tables().count(), 0);
        assert_eq!(doc.blocks.len(), 2);
    }
}

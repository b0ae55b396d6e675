//! Markdown renderer
//!
//! Renders a document back to markdown. Tables are re-aligned; every other
//! line is written unchanged.

use crate::document::{Alignment, Block, Document, TableBlock};

const MIN_WIDTH: usize = 3;

/// Document renderer
pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, doc: &Document) -> String {
        let mut lines: Vec<String> = Vec::new();
        for block in &doc.blocks {
            match block {
                Block::Text(line) => lines.push(line.clone()),
                Block::Table(table) => {
                    lines.extend(self.render_table(table));
                    lines.extend(table.directives.iter().cloned());
                }
            }
        }

        let mut output = lines.join("\n");
        if doc.trailing_newline {
            output.push('\n');
        }
        output
    }

    /// Table lines: header, separator, body
    pub fn render_table(&self, block: &TableBlock) -> Vec<String> {
        let table = &block.table;
        let columns = table.column_count().max(block.alignments.len());
        let alignment = |column: usize| block.alignments.get(column).copied().unwrap_or_default();

        let widths: Vec<usize> = (0..columns)
            .map(|column| {
                (0..table.row_count())
                    .map(|row| table.cell(row, column).chars().count())
                    .max()
                    .unwrap_or(0)
                    .max(MIN_WIDTH)
            })
            .collect();

        let render_row = |row: usize| {
            let cells: Vec<String> = (0..columns)
                .map(|column| pad(table.cell(row, column), widths[column], alignment(column)))
                .collect();
            format!("| {} |", cells.join(" | "))
        };

        let separator: Vec<String> = (0..columns)
            .map(|column| {
                let dashes = "-".repeat(widths[column]);
                match alignment(column) {
                    Alignment::Default => format!(" {} ", dashes),
                    Alignment::Left => format!(":{} ", dashes),
                    Alignment::Right => format!(" {}:", dashes),
                    Alignment::Center => format!(":{}:", dashes),
                }
            })
            .collect();

        let mut lines = Vec::with_capacity(table.row_count() + 1);
        if table.row_count() > 0 {
            lines.push(render_row(0));
        }
        lines.push(format!("|{}|", separator.join("|")));
        lines.extend((1..table.row_count()).map(render_row));
        lines
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn pad(text: &str, width: usize, alignment: Alignment) -> String {
    let fill = width.saturating_sub(text.chars().count());
    match alignment {
        Alignment::Right => format!("{}{}", " ".repeat(fill), text),
        Alignment::Center => {
            let left = fill / 2;
            format!("{}{}{}", " ".repeat(left), text, " ".repeat(fill - left))
        }
        Alignment::Default | Alignment::Left => format!("{}{}", text, " ".repeat(fill)),
    }
}

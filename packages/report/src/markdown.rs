//! GitHub-flavored Markdown rendering.

use crate::document::{Block, Document, Table};

/// Renders `doc` as Markdown.
#[must_use]
pub fn render(doc: &Document) -> String {
    let mut md = String::new();
    md.push_str(&format!("# {}\n\n", doc.title));
    if !doc.subtitle.is_empty() {
        md.push_str(&format!("_{}_\n\n", doc.subtitle));
    }

    md.push_str("## Contents\n\n");
    for (i, section) in doc.sections.iter().enumerate() {
        md.push_str(&format!("{}. [{}](#{})\n", i + 1, section.title, section.anchor()));
    }
    md.push('\n');

    for section in &doc.sections {
        md.push_str(&format!("## {}\n\n", section.title));
        for block in &section.blocks {
            render_block(&mut md, block);
        }
    }
    md
}

fn render_block(md: &mut String, block: &Block) {
    match block {
        Block::Heading(text) => md.push_str(&format!("### {text}\n\n")),
        Block::Paragraph(text) => md.push_str(&format!("{text}\n\n")),
        Block::List(items) => {
            for item in items {
                md.push_str(&format!("- {item}\n"));
            }
            md.push('\n');
        }
        Block::Table(table) => render_table(md, table),
    }
}

fn render_table(md: &mut String, table: &Table) {
    let header: Vec<String> = table.headers.iter().map(|h| cell(h)).collect();
    md.push_str(&format!("| {} |\n", header.join(" | ")));
    md.push_str(&format!("|{}\n", "---|".repeat(table.headers.len())));
    for row in &table.rows {
        let cells: Vec<String> = row.iter().map(|c| cell(c)).collect();
        md.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    if table.omitted > 0 {
        md.push_str(&format!("\n_{} more row(s) omitted._\n", table.omitted));
    }
    md.push('\n');
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Section;

    #[test]
    fn renders_toc_and_tables() {
        let mut section = Section::new("Data coverage");
        let mut table = Table::new(&["state", "rows"]);
        table.row(vec!["SP".to_string(), "a|b".to_string()]);
        section.table_or(table, "none");
        let doc = Document {
            title: "Report".to_string(),
            subtitle: String::new(),
            sections: vec![section],
        };
        let md = render(&doc);
        assert!(md.starts_with("# Report\n"));
        assert!(md.contains("1. [Data coverage](#data-coverage)"));
        assert!(md.contains("| state | rows |\n|---|---|\n| SP | a\\|b |"));
    }
}

//! Standalone HTML rendering.
//!
//! Every interpolated string goes through [`escape`]; municipality names
//! and flag details come from raw public data.

use crate::document::{Block, Document, Table};

/// Renders `doc` as a self-contained HTML page.
#[must_use]
pub fn render(doc: &Document) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape(&doc.title)));
    html.push_str(&format!("<style>{CSS}</style>\n</head>\n<body>\n"));

    html.push_str(&format!("<header>\n<h1>{}</h1>\n", escape(&doc.title)));
    if !doc.subtitle.is_empty() {
        html.push_str(&format!("<p class=\"subtitle\">{}</p>\n", escape(&doc.subtitle)));
    }
    html.push_str("</header>\n");

    html.push_str("<nav>\n<ol>\n");
    for section in &doc.sections {
        html.push_str(&format!(
            "<li><a href=\"#{}\">{}</a></li>\n",
            escape(&section.anchor()),
            escape(&section.title)
        ));
    }
    html.push_str("</ol>\n</nav>\n");

    for section in &doc.sections {
        html.push_str(&format!(
            "<section id=\"{}\">\n<h2>{}</h2>\n",
            escape(&section.anchor()),
            escape(&section.title)
        ));
        for block in &section.blocks {
            render_block(&mut html, block);
        }
        html.push_str("</section>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn render_block(html: &mut String, block: &Block) {
    match block {
        Block::Heading(text) => html.push_str(&format!("<h3>{}</h3>\n", escape(text))),
        Block::Paragraph(text) => html.push_str(&format!("<p>{}</p>\n", escape(text))),
        Block::List(items) => {
            html.push_str("<ul>\n");
            for item in items {
                html.push_str(&format!("<li>{}</li>\n", escape(item)));
            }
            html.push_str("</ul>\n");
        }
        Block::Table(table) => render_table(html, table),
    }
}

fn render_table(html: &mut String, table: &Table) {
    html.push_str("<table>\n<thead>\n<tr>");
    for header in &table.headers {
        html.push_str(&format!("<th>{}</th>", escape(header)));
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");
    for row in &table.rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", escape(cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");
    if table.omitted > 0 {
        html.push_str(&format!(
            "<p class=\"omitted\">{} more row(s) omitted.</p>\n",
            table.omitted
        ));
    }
}

/// Escapes the five HTML-significant characters.
#[must_use]
pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const CSS: &str = r"
body { font-family: system-ui, sans-serif; max-width: 1100px; margin: 2rem auto; padding: 0 1rem; color: #1e293b; background: #f8fafc; }
header { border-bottom: 2px solid #6366f1; margin-bottom: 1rem; }
.subtitle { color: #64748b; }
nav ol { columns: 2; }
section { background: white; border: 1px solid #e2e8f0; border-radius: 6px; padding: 0.5rem 1.5rem 1rem; margin: 1.5rem 0; }
table { border-collapse: collapse; width: 100%; font-size: 0.9rem; margin: 0.5rem 0 1rem; }
th, td { border: 1px solid #e2e8f0; padding: 0.3rem 0.5rem; text-align: left; }
th { background: #f1f5f9; }
tbody tr:nth-child(even) { background: #f8fafc; }
.omitted { color: #64748b; font-style: italic; }
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Section;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn interpolated_strings_are_escaped() {
        let mut section = Section::new("Hotspots");
        section.paragraph("<script>alert(1)</script>");
        let mut table = Table::new(&["name"]);
        table.row(vec!["São João d'Aliança <b>".to_string()]);
        section.table_or(table, "none");
        let doc = Document {
            title: "A & B".to_string(),
            subtitle: String::new(),
            sections: vec![section],
        };
        let html = render(&doc);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("<td>São João d&#39;Aliança &lt;b&gt;</td>"));
        assert!(html.contains("<title>A &amp; B</title>"));
        assert!(html.contains("<section id=\"hotspots\">"));
    }
}

//! Document rendering: Markdown report → `<base> AI Summary.docx`.
//!
//! The Markdown is parsed with `pulldown-cmark` into a flat list of blocks
//! (headings, paragraphs, list items, code, tables) and each block becomes
//! Word content through `docx-rs`:
//!
//! | Markdown            | Word                                   |
//! |---------------------|----------------------------------------|
//! | `#`…`######`        | `Heading1`…`Heading6` paragraph styles |
//! | `**bold**`, `*em*`  | bold / italic runs                     |
//! | `` `code` ``, fences| Courier New runs                       |
//! | `-` / `1.` items    | paragraphs prefixed with `•` / `n.`    |
//! | GFM tables          | tables with a bold header row          |
//!
//! The file is written to a temporary file in the output directory and then
//! moved over the target, so an existing document of the same name is
//! replaced whole or not at all.

use crate::error::ReportError;
use docx_rs::{BreakType, Docx, Paragraph, Run, RunFonts, Style, StyleType, Table, TableCell, TableRow};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Suffix appended to the input's base name.
pub const DOCUMENT_SUFFIX: &str = " AI Summary.docx";

const MONOSPACE: &str = "Courier New";

/// Heading sizes in half-points, `#` first.
const HEADING_SIZES: [usize; 6] = [36, 32, 28, 26, 24, 22];

/// `deed` → `deed AI Summary.docx`.
pub fn document_file_name(base_name: &str) -> String {
    format!("{base_name}{DOCUMENT_SUFFIX}")
}

/// Render `markdown` to `<output_dir>/<base_name> AI Summary.docx`,
/// replacing any existing file, and return the path written.
pub fn render_document(
    markdown: &str,
    base_name: &str,
    output_dir: &Path,
) -> Result<PathBuf, ReportError> {
    let path = output_dir.join(document_file_name(base_name));

    std::fs::create_dir_all(output_dir).map_err(|e| ReportError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    })?;

    let blocks = parse_blocks(markdown);
    debug!("Rendering {} blocks to {}", blocks.len(), path.display());
    let docx = build_docx(&blocks);

    let mut tmp = tempfile::NamedTempFile::new_in(output_dir).map_err(|e| {
        ReportError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        }
    })?;
    docx.build()
        .pack(tmp.as_file_mut())
        .map_err(|e| ReportError::RenderFailed {
            path: path.clone(),
            detail: e.to_string(),
        })?;
    tmp.persist(&path)
        .map_err(|e| ReportError::OutputWriteFailed {
            path: path.clone(),
            source: e.error,
        })?;

    info!("Wrote {}", path.display());
    Ok(path)
}

// ── Markdown → blocks ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
struct Span {
    text: String,
    bold: bool,
    italic: bool,
    code: bool,
    line_break: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Block {
    Heading { level: usize, spans: Vec<Span> },
    Paragraph { prefix: Option<String>, spans: Vec<Span> },
    Code(String),
    /// Rows of cells; the first row is the header.
    Table(Vec<Vec<Vec<Span>>>),
}

/// Event-driven builder over the `pulldown-cmark` stream.
#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    spans: Vec<Span>,
    bold: usize,
    italic: usize,
    heading: Option<usize>,
    code: Option<String>,
    /// Next number for each open list; `None` for bullet lists.
    lists: Vec<Option<u64>>,
    item_prefix: Option<String>,
    table: Option<Vec<Vec<Vec<Span>>>>,
    row: Vec<Vec<Span>>,
    in_head: bool,
}

impl BlockBuilder {
    fn push_text(&mut self, text: &str, code: bool) {
        self.spans.push(Span {
            text: text.to_string(),
            bold: self.bold > 0 || self.in_head,
            italic: self.italic > 0,
            code,
            line_break: false,
        });
    }

    fn push_break(&mut self) {
        self.spans.push(Span {
            line_break: true,
            ..Default::default()
        });
    }

    /// Close the pending paragraph, if it has any text.
    fn flush(&mut self) {
        let spans = std::mem::take(&mut self.spans);
        if spans.iter().all(|s| s.text.trim().is_empty()) {
            return;
        }
        self.blocks.push(Block::Paragraph {
            prefix: self.item_prefix.take(),
            spans,
        });
    }

    fn start_item(&mut self) {
        self.flush();
        let depth = self.lists.len().saturating_sub(1);
        let marker = match self.lists.last_mut() {
            Some(Some(n)) => {
                let marker = format!("{n}. ");
                *n += 1;
                marker
            }
            _ => "• ".to_string(),
        };
        self.item_prefix = Some(format!("{}{}", "    ".repeat(depth), marker));
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                self.flush();
                self.heading = Some(heading_level(level));
            }
            Event::End(TagEnd::Heading(_)) => {
                let spans = std::mem::take(&mut self.spans);
                let level = self.heading.take().unwrap_or(1);
                self.blocks.push(Block::Heading { level, spans });
            }
            Event::End(TagEnd::Paragraph) => self.flush(),

            Event::Start(Tag::List(first)) => {
                self.flush();
                self.lists.push(first);
            }
            Event::End(TagEnd::List(_)) => {
                self.flush();
                self.lists.pop();
            }
            Event::Start(Tag::Item) => self.start_item(),
            Event::End(TagEnd::Item) => self.flush(),

            Event::Start(Tag::CodeBlock(_)) => {
                self.flush();
                self.code = Some(String::new());
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(code) = self.code.take() {
                    self.blocks.push(Block::Code(code.trim_end_matches('\n').to_string()));
                }
            }

            Event::Start(Tag::Table(_)) => {
                self.flush();
                self.table = Some(Vec::new());
            }
            Event::End(TagEnd::Table) => {
                if let Some(rows) = self.table.take() {
                    self.blocks.push(Block::Table(rows));
                }
            }
            Event::Start(Tag::TableHead) => {
                self.in_head = true;
                self.row.clear();
            }
            Event::Start(Tag::TableRow) => self.row.clear(),
            Event::End(TagEnd::TableHead | TagEnd::TableRow) => {
                self.in_head = false;
                let row = std::mem::take(&mut self.row);
                if let Some(ref mut rows) = self.table {
                    rows.push(row);
                }
            }
            Event::Start(Tag::TableCell) => self.spans.clear(),
            Event::End(TagEnd::TableCell) => {
                let cell = std::mem::take(&mut self.spans);
                self.row.push(cell);
            }

            Event::Start(Tag::Strong) => self.bold += 1,
            Event::End(TagEnd::Strong) => self.bold = self.bold.saturating_sub(1),
            Event::Start(Tag::Emphasis) => self.italic += 1,
            Event::End(TagEnd::Emphasis) => self.italic = self.italic.saturating_sub(1),

            Event::Text(text) => match self.code {
                Some(ref mut code) => code.push_str(&text),
                None => self.push_text(&text, false),
            },
            Event::Code(text) => self.push_text(&text, true),
            Event::Html(text) | Event::InlineHtml(text) => self.push_text(&text, false),
            Event::SoftBreak => self.push_text(" ", false),
            Event::HardBreak => self.push_break(),
            Event::Rule => self.flush(),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

fn heading_level(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn parse_blocks(markdown: &str) -> Vec<Block> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);

    let mut builder = BlockBuilder::default();
    for event in Parser::new_ext(markdown, options) {
        builder.handle(event);
    }
    builder.finish()
}

// ── blocks → docx ────────────────────────────────────────────────────────

fn heading_styles() -> Vec<Style> {
    HEADING_SIZES
        .iter()
        .enumerate()
        .map(|(i, &size)| {
            Style::new(format!("Heading{}", i + 1), StyleType::Paragraph)
                .name(format!("Heading {}", i + 1))
                .size(size)
                .bold()
        })
        .collect()
}

fn run_for(span: &Span) -> Run {
    if span.line_break {
        return Run::new().add_break(BreakType::TextWrapping);
    }
    let mut run = Run::new().add_text(&span.text);
    if span.bold {
        run = run.bold();
    }
    if span.italic {
        run = run.italic();
    }
    if span.code {
        run = run.fonts(RunFonts::new().ascii(MONOSPACE).hi_ansi(MONOSPACE));
    }
    run
}

fn paragraph_of(spans: &[Span]) -> Paragraph {
    spans
        .iter()
        .fold(Paragraph::new(), |p, span| p.add_run(run_for(span)))
}

fn code_paragraph(code: &str) -> Paragraph {
    let lines: Vec<&str> = code.split('\n').collect();
    let last = lines.len().saturating_sub(1);
    lines.iter().enumerate().fold(Paragraph::new(), |p, (i, line)| {
        let mut run = Run::new()
            .add_text(*line)
            .fonts(RunFonts::new().ascii(MONOSPACE).hi_ansi(MONOSPACE));
        if i < last {
            run = run.add_break(BreakType::TextWrapping);
        }
        p.add_run(run)
    })
}

fn table_of(rows: &[Vec<Vec<Span>>]) -> Table {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let rows = rows
        .iter()
        .map(|row| {
            let mut cells: Vec<TableCell> = row
                .iter()
                .map(|spans| TableCell::new().add_paragraph(paragraph_of(spans)))
                .collect();
            // Word expects every row to span the full grid.
            while cells.len() < columns {
                cells.push(TableCell::new().add_paragraph(Paragraph::new()));
            }
            TableRow::new(cells)
        })
        .collect();
    Table::new(rows)
}

fn build_docx(blocks: &[Block]) -> Docx {
    let docx = heading_styles()
        .into_iter()
        .fold(Docx::new(), |docx, style| docx.add_style(style));

    blocks.iter().fold(docx, |docx, block| match block {
        Block::Heading { level, spans } => {
            docx.add_paragraph(paragraph_of(spans).style(&format!("Heading{level}")))
        }
        Block::Paragraph { prefix, spans } => {
            let mut p = Paragraph::new();
            if let Some(prefix) = prefix {
                p = p.add_run(Run::new().add_text(prefix));
            }
            let p = spans.iter().fold(p, |p, span| p.add_run(run_for(span)));
            docx.add_paragraph(p)
        }
        Block::Code(code) => docx.add_paragraph(code_paragraph(code)),
        Block::Table(rows) => docx.add_table(table_of(rows)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::outline::read_outline;

    fn plain(blocks: &[Block]) -> Vec<String> {
        blocks
            .iter()
            .map(|b| match b {
                Block::Heading { level, spans } => format!(
                    "h{level}:{}",
                    spans.iter().map(|s| s.text.as_str()).collect::<String>()
                ),
                Block::Paragraph { prefix, spans } => format!(
                    "p:{}{}",
                    prefix.as_deref().unwrap_or(""),
                    spans.iter().map(|s| s.text.as_str()).collect::<String>()
                ),
                Block::Code(code) => format!("code:{code}"),
                Block::Table(rows) => format!("table:{}", rows.len()),
            })
            .collect()
    }

    #[test]
    fn file_name_appends_suffix() {
        assert_eq!(document_file_name("Sy No 12"), "Sy No 12 AI Summary.docx");
    }

    #[test]
    fn blocks_follow_document_order() {
        let md = "# Report On Title\n\nIntro with **bold** text.\n\n## I. LANDS\n\n| A | B |\n| --- | --- |\n| 1 | 2 |\n\n- first\n- second\n\n1. one\n2. two\n\n```\nraw\n```\n";
        assert_eq!(
            plain(&parse_blocks(md)),
            vec![
                "h1:Report On Title",
                "p:Intro with bold text.",
                "h2:I. LANDS",
                "table:2",
                "p:• first",
                "p:• second",
                "p:1. one",
                "p:2. two",
                "code:raw",
            ]
        );
    }

    #[test]
    fn inline_styles_are_tracked() {
        let blocks = parse_blocks("plain **bold** *em* `code`");
        let Block::Paragraph { spans, .. } = &blocks[0] else {
            panic!("expected paragraph, got {blocks:?}");
        };
        let bold: Vec<&str> = spans.iter().filter(|s| s.bold).map(|s| s.text.as_str()).collect();
        let italic: Vec<&str> = spans.iter().filter(|s| s.italic).map(|s| s.text.as_str()).collect();
        let code: Vec<&str> = spans.iter().filter(|s| s.code).map(|s| s.text.as_str()).collect();
        assert_eq!(bold, vec!["bold"]);
        assert_eq!(italic, vec!["em"]);
        assert_eq!(code, vec!["code"]);
    }

    #[test]
    fn header_cells_are_bold() {
        let blocks = parse_blocks("| Period | Holder |\n| --- | --- |\n| 1990 | Ramappa |");
        let Block::Table(rows) = &blocks[0] else {
            panic!("expected table, got {blocks:?}");
        };
        assert!(rows[0].iter().flatten().all(|s| s.bold));
        assert!(rows[1].iter().flatten().all(|s| !s.bold));
    }

    #[test]
    fn nested_list_items_are_indented() {
        let blocks = parse_blocks("- parent\n  - child\n");
        assert_eq!(plain(&blocks), vec!["p:• parent", "p:    • child"]);
    }

    #[test]
    fn renders_and_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let first = render_document("# Old\n", "deed", dir.path()).unwrap();
        let second = render_document("# New\n\nBody.\n", "deed", dir.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.file_name().unwrap(), "deed AI Summary.docx");
        let outline = read_outline(&second).unwrap();
        assert_eq!(outline.heading_texts(), vec!["New"]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_output_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("reports").join("2024");
        let path = render_document("text", "ec", &nested).unwrap();
        assert!(path.exists());
    }
}

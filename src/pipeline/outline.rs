//! Read a rendered `.docx` back into a coarse outline.
//!
//! Only what survives a Markdown round trip is collected: headings with
//! their level, body paragraphs, and the row count of each top-level table.

use crate::error::ReportError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineHeading {
    pub level: usize,
    pub text: String,
}

/// Headings, paragraphs and tables of a Word document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOutline {
    pub headings: Vec<OutlineHeading>,
    /// Row count of each top-level table, header row included.
    pub tables: Vec<usize>,
    /// Non-empty body paragraphs outside tables, headings excluded.
    pub paragraphs: Vec<String>,
}

impl DocumentOutline {
    pub fn heading_texts(&self) -> Vec<&str> {
        self.headings.iter().map(|h| h.text.as_str()).collect()
    }
}

/// Read the outline of the `.docx` at `path`.
pub fn read_outline(path: &Path) -> Result<DocumentOutline, ReportError> {
    let fail = |detail: String| ReportError::DocumentReadFailed {
        path: path.to_path_buf(),
        detail,
    };

    let file = File::open(path).map_err(|e| fail(e.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| fail(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| fail(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| fail(e.to_string()))?;

    parse_document_xml(&xml).map_err(fail)
}

#[derive(Default)]
struct OutlineState {
    outline: DocumentOutline,
    /// Rows seen so far in each open table, outermost first.
    open_tables: Vec<usize>,
    in_paragraph: bool,
    in_text: bool,
    style: Option<String>,
    text: String,
}

impl OutlineState {
    fn start(&mut self, e: &BytesStart<'_>) {
        match e.name().as_ref() {
            b"w:tbl" => self.open_tables.push(0),
            b"w:tr" => {
                if let Some(rows) = self.open_tables.last_mut() {
                    *rows += 1;
                }
            }
            b"w:p" => {
                self.in_paragraph = true;
                self.style = None;
                self.text.clear();
            }
            b"w:t" => self.in_text = true,
            b"w:pStyle" => self.style = attribute(e, b"w:val"),
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"w:tbl" => {
                if let Some(rows) = self.open_tables.pop() {
                    if self.open_tables.is_empty() {
                        self.outline.tables.push(rows);
                    }
                }
            }
            b"w:t" => self.in_text = false,
            b"w:p" => {
                self.in_paragraph = false;
                if self.open_tables.is_empty() {
                    self.finish_paragraph();
                }
            }
            _ => {}
        }
    }

    fn finish_paragraph(&mut self) {
        let text = self.text.trim().to_string();
        match self.style.as_deref().and_then(heading_level) {
            Some(level) => self.outline.headings.push(OutlineHeading { level, text }),
            None if !text.is_empty() => self.outline.paragraphs.push(text),
            None => {}
        }
    }
}

/// `Heading2` → 2.
fn heading_level(style: &str) -> Option<usize> {
    style
        .strip_prefix("Heading")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|n| (1..=9).contains(n))
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn parse_document_xml(xml: &str) -> Result<DocumentOutline, String> {
    let mut reader = Reader::from_str(xml);
    // Runs split text at arbitrary points; whitespace at their edges matters.
    reader.trim_text(false);

    let mut state = OutlineState::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => state.start(&e),
            Ok(Event::Empty(e)) => {
                // Self-closing paragraphs and tables carry no text.
                if e.name().as_ref() == b"w:pStyle" {
                    state.start(&e);
                }
            }
            Ok(Event::End(e)) => state.end(e.name().as_ref()),
            Ok(Event::Text(t)) if state.in_text && state.in_paragraph => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                state.text.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                ))
            }
        }
        buf.clear();
    }

    Ok(state.outline)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t xml:space="preserve">Report On </w:t></w:r><w:r><w:t>Title</w:t></w:r></w:p>
<w:p><w:r><w:t>Prepared &amp; verified</w:t></w:r></w:p>
<w:p/>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Direction</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:p><w:r><w:t>East</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr><w:r><w:t>IX. SPECIAL CATEGORY LANDS</w:t></w:r></w:p>
</w:body></w:document>"#;

    #[test]
    fn collects_headings_tables_and_paragraphs() {
        let outline = parse_document_xml(BODY).unwrap();
        assert_eq!(
            outline.headings,
            vec![
                OutlineHeading {
                    level: 1,
                    text: "Report On Title".into()
                },
                OutlineHeading {
                    level: 2,
                    text: "IX. SPECIAL CATEGORY LANDS".into()
                },
            ]
        );
        assert_eq!(outline.tables, vec![2]);
        // Cell text is not a body paragraph.
        assert_eq!(outline.paragraphs, vec!["Prepared & verified"]);
    }

    #[test]
    fn heading_level_parses_style_ids() {
        assert_eq!(heading_level("Heading3"), Some(3));
        assert_eq!(heading_level("Normal"), None);
        assert_eq!(heading_level("Heading"), None);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = read_outline(Path::new("/no/such/report.docx")).unwrap_err();
        assert!(matches!(err, ReportError::DocumentReadFailed { .. }));
    }
}

//! Page splitting: turn one multi-page PDF into standalone single-page PDFs.
//!
//! Each output is a complete document that opens on its own: the page keeps
//! its content streams and resources, and attributes it used to inherit from
//! intermediate page-tree nodes (`Resources`, `MediaBox`, `CropBox`,
//! `Rotate`) are copied onto the page, which then becomes the only leaf of a
//! fresh page tree. Only objects the page reaches are carried over. Pages are
//! never reordered or altered.
//!
//! Parsing and re-serialising is CPU-bound, so the async entry point runs the
//! work on the blocking pool.

use crate::error::ReportError;
use crate::output::DocumentInfo;
use crate::pipeline::input::LoadedDocument;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;
use tracing::{debug, info};

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed, cyclic page trees.
const MAX_TREE_DEPTH: usize = 64;

/// One page of the source document, as a standalone PDF.
#[derive(Debug, Clone)]
pub struct SinglePage {
    /// 1-indexed position in the source document.
    pub number: usize,
    pub bytes: Vec<u8>,
}

impl SinglePage {
    /// Upload file name used for this page, e.g. `page_3.pdf`.
    pub fn file_name(&self) -> String {
        format!("page_{}.pdf", self.number)
    }
}

/// Split a loaded PDF into single-page PDFs, pages `1..=N` in order.
///
/// A document without pages yields an empty vector, not an error.
pub async fn split_document(doc: &LoadedDocument) -> Result<Vec<SinglePage>, ReportError> {
    let name = doc.name.clone();
    let bytes = doc.bytes.clone();

    tokio::task::spawn_blocking(move || split_pdf_bytes(&name, &bytes))
        .await
        .map_err(|e| ReportError::Internal(format!("Split task panicked: {}", e)))?
}

/// Blocking implementation of [`split_document`].
pub fn split_pdf_bytes(name: &str, bytes: &[u8]) -> Result<Vec<SinglePage>, ReportError> {
    let source = parse(name, bytes)?;
    let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
    info!("Splitting '{}' into {} pages", name, page_ids.len());

    let mut pages = Vec::with_capacity(page_ids.len());
    for (idx, &page_id) in page_ids.iter().enumerate() {
        let number = idx + 1;
        let bytes = extract_page(&source, page_id)
            .map_err(|detail| ReportError::SplitFailed { page: number, detail })?;
        debug!("Page {} → {} bytes", number, bytes.len());
        pages.push(SinglePage { number, bytes });
    }

    Ok(pages)
}

/// Page count and version of a PDF, without splitting it.
pub fn inspect_bytes(name: &str, bytes: &[u8]) -> Result<DocumentInfo, ReportError> {
    let doc = parse(name, bytes)?;
    Ok(DocumentInfo {
        file_name: name.to_string(),
        page_count: doc.get_pages().len(),
        pdf_version: doc.version.clone(),
        size_bytes: bytes.len(),
    })
}

fn parse(name: &str, bytes: &[u8]) -> Result<Document, ReportError> {
    Document::load_mem(bytes).map_err(|e| ReportError::CorruptPdf {
        name: name.to_string(),
        detail: e.to_string(),
    })
}

/// Build a standalone document holding only `page_id` and serialise it.
///
/// Only objects reachable from the page are copied, so the cost of each page
/// is bounded by what it references rather than by the whole source. Object
/// ids are kept as they are in the source.
fn extract_page(source: &Document, page_id: ObjectId) -> Result<Vec<u8>, String> {
    let mut page = source
        .get_dictionary(page_id)
        .map_err(|e| e.to_string())?
        .clone();
    for (key, value) in inherited_attributes(source, page_id) {
        page.set(key, value);
    }
    page.remove(b"Parent");

    let mut doc = Document::with_version(source.version.clone());
    doc.max_id = source.max_id;

    let mut seen: HashSet<ObjectId> = HashSet::from([page_id]);
    let mut pending = Vec::new();
    collect_references(&Object::Dictionary(page.clone()), &mut pending);
    while let Some(id) = pending.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Ok(object) = source.get_object(id) else {
            continue;
        };
        // Links and annotations may point at other pages; those stay out.
        if is_page_node(object) {
            continue;
        }
        collect_references(object, &mut pending);
        doc.objects.insert(id, object.clone());
    }

    let pages_id = doc.new_object_id();
    page.set("Parent", Object::Reference(pages_id));
    doc.objects.insert(page_id, Object::Dictionary(page));
    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(vec![Object::Reference(page_id)])),
            ("Count", Object::Integer(1)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| e.to_string())?;
    Ok(out)
}

fn collect_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => items.iter().for_each(|o| collect_references(o, out)),
        Object::Dictionary(dict) => dict.iter().for_each(|(_, o)| collect_references(o, out)),
        Object::Stream(stream) => stream
            .dict
            .iter()
            .for_each(|(_, o)| collect_references(o, out)),
        _ => {}
    }
}

fn is_page_node(object: &Object) -> bool {
    object
        .as_dict()
        .and_then(|d| d.get(b"Type"))
        .and_then(Object::as_name)
        .map(|name| name == b"Page" || name == b"Pages")
        .unwrap_or(false)
}

/// Inheritable attributes the page lacks but an ancestor defines; the
/// nearest ancestor wins.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(Vec<u8>, Object)> {
    let mut found: Vec<(Vec<u8>, Object)> = Vec::new();
    let Ok(page) = doc.get_dictionary(page_id) else {
        return found;
    };

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(node_id) = parent {
        if depth >= MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };
        for key in INHERITABLE {
            let already = page.has(key) || found.iter().any(|(k, _)| k.as_slice() == key);
            if !already {
                if let Ok(value) = node.get(key) {
                    found.push((key.to_vec(), value.clone()));
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    found
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Dictionary, Stream};

    /// Build an `n`-page PDF whose page `i` draws the text `Page i`.
    ///
    /// Resources and MediaBox live on the page-tree root so the splitter has
    /// to carry them down to each page.
    pub(crate) fn sample_pdf(n: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ]));
        let resources_id = doc.add_object(Dictionary::from_iter([(
            "Font",
            Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
        )]));

        let mut kids = Vec::with_capacity(n);
        for i in 1..=n {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Page {i}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page_id = doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
            ]));
            kids.push(Object::Reference(page_id));
        }

        let pages = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(n as i64)),
            ("Resources", Object::Reference(resources_id)),
            (
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn page_text(bytes: &[u8]) -> String {
        let doc = Document::load_mem(bytes).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
    }

    #[test]
    fn splits_into_one_document_per_page_in_order() {
        let pages = split_pdf_bytes("deed.pdf", &sample_pdf(3)).unwrap();
        assert_eq!(pages.len(), 3);

        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.number, i + 1);
            let doc = Document::load_mem(&page.bytes).expect("page opens on its own");
            assert_eq!(doc.get_pages().len(), 1);
            assert!(page_text(&page.bytes).contains(&format!("Page {}", i + 1)));
        }
    }

    #[test]
    fn inherited_attributes_are_copied_onto_the_page() {
        let pages = split_pdf_bytes("deed.pdf", &sample_pdf(2)).unwrap();
        let doc = Document::load_mem(&pages[1].bytes).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));
    }

    #[test]
    fn single_page_size_does_not_grow_with_the_source() {
        let small = split_pdf_bytes("deed.pdf", &sample_pdf(2)).unwrap();
        let large = split_pdf_bytes("deed.pdf", &sample_pdf(40)).unwrap();

        let objects = |bytes: &[u8]| Document::load_mem(bytes).unwrap().objects.len();
        assert_eq!(objects(&small[0].bytes), objects(&large[0].bytes));
        // Page, its content, resources, font, page-tree root and catalog.
        assert_eq!(objects(&large[39].bytes), 6);
        assert!(!page_text(&large[39].bytes).contains("Page 1)"));
    }

    #[test]
    fn empty_document_yields_no_pages() {
        let pages = split_pdf_bytes("empty.pdf", &sample_pdf(0)).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn garbage_is_a_corrupt_pdf() {
        let err = split_pdf_bytes("junk.pdf", b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, ReportError::CorruptPdf { .. }));
    }

    #[test]
    fn inspect_reports_page_count() {
        let bytes = sample_pdf(4);
        let info = inspect_bytes("ec.pdf", &bytes).unwrap();
        assert_eq!(info.page_count, 4);
        assert_eq!(info.pdf_version, "1.5");
        assert_eq!(info.size_bytes, bytes.len());
    }

    #[test]
    fn upload_name_uses_page_number() {
        let page = SinglePage {
            number: 12,
            bytes: vec![],
        };
        assert_eq!(page.file_name(), "page_12.pdf");
    }
}

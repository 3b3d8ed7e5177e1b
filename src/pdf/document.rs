//! Document structure operations using lopdf.
//!
//! Decoding only needs the page tree, and extraction copies the original page
//! objects into a rebuilt tree, so nothing here touches pixels.

use super::PdfError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use std::collections::HashSet;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Upper bound when walking `Parent` links, in case a tree is cyclic.
const MAX_TREE_DEPTH: usize = 64;

const PRODUCER: &str = "Markdown Labs";

/// Decode a PDF and return its page count.
pub fn decode_page_count(bytes: &[u8]) -> Result<u32, PdfError> {
    let doc = Document::load_mem(bytes).map_err(|e| PdfError::Decode(e.to_string()))?;

    let page_count = doc.get_pages().len() as u32;
    if page_count == 0 {
        return Err(PdfError::Decode("document has no pages".to_string()));
    }

    Ok(page_count)
}

/// Build a new document containing only `pages` (1-based) from `bytes`.
///
/// The input is sorted and de-duplicated first, so the output always lists
/// pages in ascending original order no matter how the caller collected them.
pub fn extract_pages(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, PdfError> {
    let mut wanted = pages.to_vec();
    wanted.sort_unstable();
    wanted.dedup();
    if wanted.is_empty() {
        return Err(PdfError::EmptySelection);
    }

    let mut doc = Document::load_mem(bytes).map_err(|e| PdfError::Extraction(e.to_string()))?;

    let page_ids = doc.get_pages();
    let mut kept = Vec::with_capacity(wanted.len());
    for number in &wanted {
        let id = page_ids.get(number).copied().ok_or_else(|| {
            PdfError::Extraction(format!(
                "page {} out of range (page_count={})",
                number,
                page_ids.len()
            ))
        })?;
        kept.push(id);
    }

    let catalog_id = reference(&doc.trailer, b"Root")?;
    let pages_root = {
        let catalog = doc
            .get_dictionary(catalog_id)
            .map_err(|e| PdfError::Extraction(e.to_string()))?;
        reference(catalog, b"Pages")?
    };

    // Push inherited attributes down before the intermediate nodes go away
    for &page_id in &kept {
        let inherited = inherited_attributes(&doc, page_id);
        let mut page = doc
            .get_dictionary(page_id)
            .map_err(|e| PdfError::Extraction(e.to_string()))?
            .clone();
        for (key, value) in inherited {
            page.set(key, value);
        }
        page.set("Parent", Object::Reference(pages_root));
        doc.set_object(page_id, Object::Dictionary(page));
    }

    let mut root = doc
        .get_dictionary(pages_root)
        .map_err(|e| PdfError::Extraction(e.to_string()))?
        .clone();
    for key in INHERITABLE {
        root.remove(key);
    }
    root.remove(b"Parent");
    root.set("Type", Object::Name(b"Pages".to_vec()));
    root.set(
        "Kids",
        Object::Array(kept.iter().map(|&id| Object::Reference(id)).collect()),
    );
    root.set("Count", Object::Integer(kept.len() as i64));
    doc.set_object(pages_root, Object::Dictionary(root));

    // Outlines, named destinations and the like point at dropped pages
    doc.set_object(
        catalog_id,
        dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_root,
        },
    );

    let info = rebuilt_info(&doc);
    let info_id = doc.add_object(Object::Dictionary(info));

    // The source trailer may carry Prev, XRefStm, Encrypt or xref stream keys
    // that are meaningless in the rewritten file
    let mut trailer = dictionary! {
        "Root" => catalog_id,
        "Info" => info_id,
    };
    if let Ok(id) = doc.trailer.get(b"ID") {
        trailer.set("ID", id.clone());
    }
    doc.trailer = trailer;

    doc.prune_objects();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| PdfError::Extraction(e.to_string()))?;

    Ok(out)
}

/// Resolve a dictionary entry that must be an indirect reference.
fn reference(dict: &Dictionary, key: &[u8]) -> Result<ObjectId, PdfError> {
    dict.get(key)
        .and_then(|obj| obj.as_reference())
        .map_err(|_| {
            PdfError::Extraction(format!(
                "missing /{} reference",
                String::from_utf8_lossy(key)
            ))
        })
}

/// Collect the inheritable attributes a page does not define itself, taking
/// each from its nearest ancestor.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let mut found = Vec::new();
    let Ok(page) = doc.get_dictionary(page_id) else {
        return found;
    };

    let mut missing: Vec<&'static [u8]> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();

    let mut visited = HashSet::new();
    let mut parent = page.get(b"Parent").and_then(|obj| obj.as_reference()).ok();

    while let Some(node_id) = parent {
        if missing.is_empty() || visited.len() >= MAX_TREE_DEPTH || !visited.insert(node_id) {
            break;
        }
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };

        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((*key, value.clone()));
                false
            }
            Err(_) => true,
        });

        parent = node.get(b"Parent").and_then(|obj| obj.as_reference()).ok();
    }

    found
}

/// Fresh document info: keep the source title/author, restamp the rest.
fn rebuilt_info(doc: &Document) -> Dictionary {
    let mut info = Dictionary::new();

    let source_info = doc
        .trailer
        .get(b"Info")
        .and_then(|obj| obj.as_reference())
        .and_then(|id| doc.get_dictionary(id));
    if let Ok(source_info) = source_info {
        for key in [&b"Title"[..], &b"Author"[..]] {
            if let Ok(value) = source_info.get(key) {
                if matches!(value, Object::String(..)) {
                    info.set(key, value.clone());
                }
            }
        }
    }

    let now = chrono::Utc::now();
    let date_str = format!("D:{}", now.format("%Y%m%d%H%M%S+00'00'"));
    info.set(
        "Producer",
        Object::String(PRODUCER.as_bytes().to_vec(), StringFormat::Literal),
    );
    info.set(
        "CreationDate",
        Object::String(date_str.as_bytes().to_vec(), StringFormat::Literal),
    );
    info.set(
        "ModDate",
        Object::String(date_str.as_bytes().to_vec(), StringFormat::Literal),
    );

    info
}

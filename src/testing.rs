//! Test fixtures: lopdf-generated documents and a backend that needs no PDFium.

use crate::cancel::CancellationToken;
use crate::pdf::{self, PdfBackend, PdfError};
use image::DynamicImage;
use lopdf::{dictionary, Document, Object, Stream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

fn content_for(page: u32) -> Vec<u8> {
    format!("BT /F1 24 Tf 72 720 Td (Page {}) Tj ET", page).into_bytes()
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A flat document whose page N draws the text "Page N".
pub fn build_pdf(page_count: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for page in 1..=page_count {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content_for(page)));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    save(doc)
}

/// Four pages split across two intermediate nodes that carry the
/// MediaBox and Resources.
pub fn build_nested_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let root_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut branches = Vec::new();
    for pair in [[1u32, 2], [3, 4]] {
        let branch_id = doc.new_object_id();
        let mut kids = Vec::new();
        for page in pair {
            let content_id = doc.add_object(Stream::new(dictionary! {}, content_for(page)));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => branch_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        let branch = dictionary! {
            "Type" => "Pages",
            "Parent" => root_id,
            "Kids" => kids,
            "Count" => 2,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        doc.objects.insert(branch_id, Object::Dictionary(branch));
        branches.push(Object::Reference(branch_id));
    }

    let root = dictionary! {
        "Type" => "Pages",
        "Kids" => branches,
        "Count" => 4,
    };
    doc.objects.insert(root_id, Object::Dictionary(root));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => root_id,
    });
    doc.trailer.set("Root", catalog_id);

    save(doc)
}

/// Append an incremental-update section that gives the document a new Info
/// dictionary with `title`, chained to the original xref through `/Prev`.
pub fn append_incremental_update(mut bytes: Vec<u8>, title: &str) -> Vec<u8> {
    let doc = Document::load_mem(&bytes).unwrap();
    let root = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    let info_number = doc.max_id + 1;

    let marker = b"startxref";
    let at = bytes
        .windows(marker.len())
        .rposition(|window| window == marker)
        .unwrap();
    let prev: usize = String::from_utf8_lossy(&bytes[at + marker.len()..])
        .split_whitespace()
        .next()
        .unwrap()
        .parse()
        .unwrap();

    bytes.push(b'\n');
    let object_offset = bytes.len();
    bytes.extend_from_slice(
        format!("{} 0 obj\n<< /Title ({}) >>\nendobj\n", info_number, title).as_bytes(),
    );
    let xref_offset = bytes.len();
    let section = format!(
        "xref\n0 1\n0000000000 65535 f \n{} 1\n{:010} 00000 n \n\
         trailer\n<< /Size {} /Root {} {} R /Info {} 0 R /Prev {} >>\n\
         startxref\n{}\n%%EOF\n",
        info_number,
        object_offset,
        info_number + 1,
        root.0,
        root.1,
        info_number,
        prev,
        xref_offset,
    );
    bytes.extend_from_slice(section.as_bytes());
    bytes
}

/// The "Page N" markers of a document, in page order.
pub fn page_markers(bytes: &[u8]) -> Vec<u32> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).unwrap();
            let content_id = page.get(b"Contents").unwrap().as_reference().unwrap();
            let stream = doc.get_object(content_id).unwrap().as_stream().unwrap();
            let text = String::from_utf8_lossy(&stream.content);
            let start = text.find("(Page ").unwrap() + "(Page ".len();
            let end = start + text[start..].find(')').unwrap();
            text[start..end].parse().unwrap()
        })
        .collect()
}

/// lopdf for structure and blank bitmaps for thumbnails.
#[derive(Default)]
pub struct FakeBackend {
    pub failing_page: Option<u32>,
    pub fail_extraction: AtomicBool,
    /// Number of documents loaded for rendering.
    pub render_loads: AtomicUsize,
}

impl FakeBackend {
    pub fn failing_on(page: u32) -> Self {
        Self {
            failing_page: Some(page),
            ..Self::default()
        }
    }

    pub fn set_fail_extraction(&self, fail: bool) {
        self.fail_extraction.store(fail, Ordering::SeqCst);
    }

    pub fn render_loads(&self) -> usize {
        self.render_loads.load(Ordering::SeqCst)
    }
}

impl PdfBackend for FakeBackend {
    fn decode(&self, bytes: &[u8]) -> Result<u32, PdfError> {
        pdf::decode_page_count(bytes)
    }

    fn render_pages(
        &self,
        bytes: &[u8],
        scale: f32,
        cancel: &CancellationToken,
        on_page: &mut dyn FnMut(u32, Result<DynamicImage, PdfError>) -> bool,
    ) -> Result<(), PdfError> {
        let page_count = pdf::decode_page_count(bytes)?;
        self.render_loads.fetch_add(1, Ordering::SeqCst);

        for page in 1..=page_count {
            if cancel.is_cancelled() {
                break;
            }
            let rendered = if self.failing_page == Some(page) {
                Err(PdfError::PageRender {
                    page,
                    reason: "simulated failure".to_string(),
                })
            } else {
                let width = ((595.0 * scale) as u32).max(1);
                let height = ((842.0 * scale) as u32).max(1);
                Ok(DynamicImage::new_rgba8(width, height))
            };
            if !on_page(page, rendered) {
                break;
            }
        }
        Ok(())
    }

    fn extract_pages(&self, bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, PdfError> {
        if self.fail_extraction.load(Ordering::SeqCst) {
            return Err(PdfError::Extraction("simulated failure".to_string()));
        }
        pdf::extract_pages(bytes, pages)
    }
}

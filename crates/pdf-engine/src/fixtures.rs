//! Small in-memory PDFs for tests.

use crate::{PageSize, PdfEngineError};
use lopdf::{Dictionary, Document, Object, Stream};

/// Builds a PDF with `page_count` empty pages of `size` (at least one page).
pub fn blank_pdf(page_count: u32, size: PageSize) -> Result<Vec<u8>, PdfEngineError> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();

    let mut kids = Vec::new();
    for _ in 0..page_count.max(1) {
        let content_id = document.add_object(Stream::new(Dictionary::new(), Vec::new()));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(size.width_pt),
                Object::Real(size.height_pt),
            ]),
        );
        page.set("Contents", Object::Reference(content_id));
        kids.push(Object::Reference(document.add_object(page)));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set("Kids", Object::Array(kids));
    document.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = document.add_object(catalog);
    document.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    document.save_to(&mut bytes)?;
    Ok(bytes)
}

use image::{ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
mod native;

pub use native::{codes, subtype_code, subtype_name, NativeAnnotation};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

const ENCRYPT_MARKER: &[u8] = b"/Encrypt";

/// US Letter, used when a page carries no readable MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Guards against cyclic `/Parent` chains while resolving inherited attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl Default for PageSize {
    fn default() -> Self {
        Self { width_pt: DEFAULT_MEDIA_BOX[2], height_pt: DEFAULT_MEDIA_BOX[3] }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("annotation code {0} has no PDF subtype")]
    UnsupportedAnnotation(i32),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Document container and page renderer consumed by the annotation engine.
///
/// Page indices are 0-based and stable for the lifetime of a handle. Annotation
/// rectangles cross this boundary in top-left-origin page space; conversion to
/// and from PDF user space happens inside the implementation.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    /// Native annotations of one page, in `/Annots` order.
    fn annotations(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<NativeAnnotation>, PdfEngineError>;
    /// Drops every existing annotation of the page and writes `annotations` in order.
    fn replace_annotations(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        annotations: &[NativeAnnotation],
    ) -> Result<(), PdfEngineError>;
    fn save(&mut self, handle: DocumentHandle, path: &Path) -> Result<(), PdfEngineError>;
    /// Path the document was opened from, `None` for in-memory sources.
    fn source_path(&self, handle: DocumentHandle) -> Result<Option<PathBuf>, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone, Copy)]
struct PageRecord {
    id: ObjectId,
    media_box: [f32; 4],
}

impl PageRecord {
    fn size(&self) -> PageSize {
        PageSize {
            width_pt: self.media_box[2] - self.media_box[0],
            height_pt: self.media_box[3] - self.media_box[1],
        }
    }
}

#[derive(Debug)]
struct DocumentRecord {
    document: Document,
    pages: Vec<PageRecord>,
    source: Option<PathBuf>,
}

impl DocumentRecord {
    fn page(&self, page_index: u32) -> Result<PageRecord, PdfEngineError> {
        self.pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.pages.len() as u32,
        })
    }
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(bytes: &[u8]) -> Result<(Document, Vec<PageRecord>), PdfEngineError> {
        let document = match Document::load_mem(bytes) {
            Ok(document) => document,
            Err(_) if has_encrypt_marker(bytes) => {
                return Err(PdfEngineError::EncryptedUnsupported);
            }
            Err(err) => return Err(err.into()),
        };
        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let pages: Vec<PageRecord> = document
            .get_pages()
            .into_values()
            .map(|id| PageRecord {
                id,
                media_box: inherited_media_box(&document, id).unwrap_or(DEFAULT_MEDIA_BOX),
            })
            .collect();

        if pages.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        Ok((document, pages))
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn record_mut(
        &mut self,
        handle: DocumentHandle,
    ) -> Result<&mut DocumentRecord, PdfEngineError> {
        self.docs.get_mut(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let (bytes, source) = match source {
            OpenSource::Path(path) => (fs::read(&path)?, Some(path)),
            OpenSource::Bytes(bytes) => (bytes, None),
        };

        let (document, pages) = Self::load(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, DocumentRecord { document, pages, source });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.pages.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        Ok(self.record(handle)?.page(page_index)?.size())
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn annotations(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<NativeAnnotation>, PdfEngineError> {
        let record = self.record(handle)?;
        let page = record.page(page_index)?;
        let document = &record.document;

        let Some(entries) = annots_array(document, page.id)? else {
            return Ok(Vec::new());
        };

        let annotations = entries
            .iter()
            .filter_map(|entry| resolve(document, entry).as_dict().ok())
            .filter_map(|dict| native::read_annotation(document, dict, page.media_box))
            .collect();

        Ok(annotations)
    }

    fn replace_annotations(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        annotations: &[NativeAnnotation],
    ) -> Result<(), PdfEngineError> {
        let record = self.record_mut(handle)?;
        let page = record.page(page_index)?;
        let document = &mut record.document;

        let dictionaries = annotations
            .iter()
            .map(|annotation| native::write_annotation(annotation, page.media_box, page.id))
            .collect::<Result<Vec<_>, _>>()?;

        for id in stale_annotation_objects(document, page.id)? {
            document.objects.remove(&id);
        }

        let references: Vec<Object> = dictionaries
            .into_iter()
            .map(|dict| Object::Reference(document.add_object(dict)))
            .collect();

        document.get_dictionary_mut(page.id)?.set("Annots", Object::Array(references));

        Ok(())
    }

    fn save(&mut self, handle: DocumentHandle, path: &Path) -> Result<(), PdfEngineError> {
        let record = self.record_mut(handle)?;

        // Serialize fully before touching the target so a failure never truncates it.
        let mut buffer = Vec::new();
        record.document.save_to(&mut buffer)?;
        fs::write(path, buffer)?;

        Ok(())
    }

    fn source_path(&self, handle: DocumentHandle) -> Result<Option<PathBuf>, PdfEngineError> {
        Ok(self.record(handle)?.source.clone())
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

/// Unparseable input that names an encryption dictionary is reported as encrypted.
fn has_encrypt_marker(bytes: &[u8]) -> bool {
    bytes.windows(ENCRYPT_MARKER.len()).any(|window| window == ENCRYPT_MARKER)
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        other => other,
    }
}

fn inherited_media_box(document: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let mut dict = document.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(media_box) = dict.get(b"MediaBox") {
            return native::read_rect(document, media_box);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = document.get_dictionary(parent).ok()?;
    }

    None
}

fn annots_array(
    document: &Document,
    page_id: ObjectId,
) -> Result<Option<&Vec<Object>>, PdfEngineError> {
    let page = document.get_dictionary(page_id)?;
    let Ok(annots) = page.get(b"Annots") else {
        return Ok(None);
    };

    Ok(resolve(document, annots).as_array().ok())
}

/// Objects owned by the page's current `/Annots`: each annotation and the array itself
/// when it is stored indirectly.
fn stale_annotation_objects(
    document: &Document,
    page_id: ObjectId,
) -> Result<Vec<ObjectId>, PdfEngineError> {
    let page = document.get_dictionary(page_id)?;
    let Ok(annots) = page.get(b"Annots") else {
        return Ok(Vec::new());
    };

    let mut ids = Vec::new();
    if let Object::Reference(id) = annots {
        ids.push(*id);
    }

    if let Ok(entries) = resolve(document, annots).as_array() {
        ids.extend(entries.iter().filter_map(|entry| entry.as_reference().ok()));
    }

    Ok(ids)
}

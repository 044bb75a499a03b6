//! Conversion between native document annotations and the annotation model
//!
//! Import reads every page's native annotations into an [`AnnotationSet`].
//! Export writes the set back: each page that holds annotations has its native
//! annotations fully replaced by the model's list, in list order. Pages with no
//! model annotations are left untouched.
//!
//! Import is lossy by policy: kinds outside the fixed table become highlights,
//! and native fields the model has no slot for are dropped.

use crate::annotation::{
    Annotation, AnnotationKind, AnnotationSet, BoxMarkup, DocPoint, DocRect, PageAnnotations, Rgb,
    TextMarkup, DEFAULT_FONT_SIZE,
};
use pdf_engine::{DocumentHandle, NativeAnnotation, PdfEngine, PdfEngineError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("no document is open")]
    DocumentUnavailable,
    #[error("annotation set covers {model} pages but the document has {document}")]
    PageCountMismatch { model: usize, document: usize },
    #[error("refusing to overwrite the source document {0}; save in place explicitly")]
    WouldOverwriteSource(PathBuf),
    #[error("document was not opened from a file; in-place save is unavailable")]
    NoSourcePath,
    #[error(transparent)]
    Engine(PdfEngineError),
}

impl From<PdfEngineError> for BridgeError {
    fn from(err: PdfEngineError) -> Self {
        match err {
            PdfEngineError::InvalidHandle(_) => BridgeError::DocumentUnavailable,
            other => BridgeError::Engine(other),
        }
    }
}

/// Where [`save_annotated`] writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    /// A new file; must differ from the document's source path.
    NewFile(PathBuf),
    /// Overwrite the file the document was opened from.
    InPlace,
}

/// Statistics about imported annotations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Native annotations found across all pages
    pub total_found: usize,
    /// Annotations that entered the model
    pub imported: usize,
    /// Imported as `Highlight` because their kind is not in the table
    pub defaulted: usize,
    /// Dropped because their geometry was unusable
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub pages_written: usize,
    pub pages_untouched: usize,
    pub annotations_written: usize,
}

/// Reads every page's native annotations, in native order.
pub fn import_annotations<E: PdfEngine>(
    engine: &E,
    handle: DocumentHandle,
) -> Result<(AnnotationSet, ImportStats), BridgeError> {
    let page_count = engine.page_count(handle)?;
    let mut stats = ImportStats::default();
    let mut pages = Vec::with_capacity(page_count as usize);

    for page_index in 0..page_count {
        let natives = engine.annotations(handle, page_index)?;
        stats.total_found += natives.len();

        let page: PageAnnotations = natives
            .iter()
            .filter_map(|native| {
                let converted = from_native(native, &mut stats);
                if converted.is_none() {
                    warn!(
                        page = page_index,
                        code = native.code,
                        "skipping annotation with invalid geometry"
                    );
                }
                converted
            })
            .collect();
        pages.push(page);
    }

    info!(
        pages = page_count,
        found = stats.total_found,
        imported = stats.imported,
        defaulted = stats.defaulted,
        skipped = stats.skipped,
        "annotations imported"
    );
    Ok((AnnotationSet::from_pages(pages), stats))
}

fn from_native(native: &NativeAnnotation, stats: &mut ImportStats) -> Option<Annotation> {
    let [x0, y0, x1, y1] = native.rect;
    let Ok(rect) = DocRect::new(x0, y0, x1, y1) else {
        stats.skipped += 1;
        return None;
    };

    let kind = AnnotationKind::try_from_native_code(native.code).unwrap_or_else(|| {
        debug!(code = native.code, "unrecognized annotation kind imported as highlight");
        stats.defaulted += 1;
        AnnotationKind::Highlight
    });
    let color = native.stroke.map_or(Rgb::YELLOW, Rgb::from_array);
    let text = native.contents.clone().unwrap_or_default();

    let markup = |text: String| BoxMarkup { rect, color, comment: text };
    let annotation = match kind {
        AnnotationKind::FreeText => Annotation::FreeText(TextMarkup {
            anchor: DocPoint::new(rect.x0(), rect.y0()),
            font_size: native
                .font_size
                .filter(|size| size.is_finite() && *size > 0.0)
                .unwrap_or(DEFAULT_FONT_SIZE),
            color,
            text,
        }),
        AnnotationKind::Highlight => Annotation::Highlight(markup(text)),
        AnnotationKind::Underline => Annotation::Underline(markup(text)),
        AnnotationKind::StrikeThrough => Annotation::StrikeThrough(markup(text)),
        AnnotationKind::Rectangle => Annotation::Rectangle(markup(text)),
    };

    stats.imported += 1;
    Some(annotation)
}

/// Native form of a model annotation.
pub fn to_native(annotation: &Annotation) -> NativeAnnotation {
    let code = annotation.kind().native_code();
    let native = NativeAnnotation::new(code, annotation.bounds().to_array())
        .with_stroke(annotation.color().to_array());
    let native = match annotation.font_size() {
        Some(size) => native.with_font_size(size),
        None => native,
    };

    match annotation.text() {
        "" => native,
        text => native.with_contents(text),
    }
}

/// Writes the model into the open document without saving it to disk.
pub fn export_annotations<E: PdfEngine>(
    engine: &mut E,
    handle: DocumentHandle,
    annotations: &AnnotationSet,
) -> Result<ExportStats, BridgeError> {
    let document_pages = engine.page_count(handle)? as usize;
    if annotations.page_count() != document_pages {
        return Err(BridgeError::PageCountMismatch {
            model: annotations.page_count(),
            document: document_pages,
        });
    }

    let mut stats = ExportStats::default();
    for (page_index, page) in annotations.iter() {
        if page.is_empty() {
            stats.pages_untouched += 1;
            continue;
        }

        let natives: Vec<NativeAnnotation> = page.iter().map(to_native).collect();
        engine.replace_annotations(handle, page_index as u32, &natives)?;

        stats.pages_written += 1;
        stats.annotations_written += natives.len();
    }

    info!(
        pages = stats.pages_written,
        annotations = stats.annotations_written,
        "annotations exported"
    );
    Ok(stats)
}

/// Exports the model and saves the document to `target`, returning the written path.
///
/// The target is resolved before anything is written, so a refused target leaves the
/// document unchanged.
pub fn save_annotated<E: PdfEngine>(
    engine: &mut E,
    handle: DocumentHandle,
    annotations: &AnnotationSet,
    target: &SaveTarget,
) -> Result<(PathBuf, ExportStats), BridgeError> {
    let source = engine.source_path(handle)?;
    let path = match target {
        SaveTarget::InPlace => source.ok_or(BridgeError::NoSourcePath)?,
        SaveTarget::NewFile(path) => {
            if source.as_deref().is_some_and(|source| same_file(source, path)) {
                return Err(BridgeError::WouldOverwriteSource(path.clone()));
            }
            path.clone()
        }
    };

    let stats = export_annotations(engine, handle, annotations)?;
    engine.save(handle, &path)?;
    info!(path = %path.display(), "document saved");

    Ok((path, stats))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

//! Editor facade
//!
//! [`AnnotationEditor`] owns one open document at a time together with its
//! annotation set, the interaction session, cached page renders and the
//! resize debouncer. Every operation that needs a document fails with
//! [`EditorError::NoDocument`] before touching any state when none is open.

use crate::annotation::{Annotation, AnnotationKind, AnnotationSet, Rgb};
use crate::bridge::{self, BridgeError, ExportStats, ImportStats, SaveTarget};
use crate::config::EditorConfig;
use crate::debounce::{Debouncer, TimerHandle};
use crate::interaction::{
    ColorInput, Effect, InteractionSession, PointerButton, SelectionOverlay, TextInput,
};
use crate::render_cache::RenderCache;
use crate::transform::ViewPoint;
use pdf_engine::{
    DocumentHandle, OpenSource, PageSize, PdfEngine, PdfEngineError, RenderRequest, RgbaImage,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("no document is open")]
    NoDocument,
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Debug, Clone)]
struct OpenDocument {
    handle: DocumentHandle,
    page_sizes: Vec<PageSize>,
}

pub struct AnnotationEditor<E: PdfEngine> {
    engine: E,
    config: EditorConfig,
    document: Option<OpenDocument>,
    annotations: AnnotationSet,
    session: InteractionSession,
    renders: RenderCache<RgbaImage>,
    resize: Debouncer,
    viewport: Option<(f32, f32)>,
}

impl<E: PdfEngine> AnnotationEditor<E> {
    pub fn new(engine: E, config: EditorConfig) -> Self {
        Self {
            session: InteractionSession::new(&config),
            renders: RenderCache::new(config.render_cache_pages),
            resize: Debouncer::new(Duration::from_millis(config.resize_debounce_ms)),
            engine,
            config,
            document: None,
            annotations: AnnotationSet::default(),
            viewport: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn session(&self) -> &InteractionSession {
        &self.session
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub fn is_open(&self) -> bool {
        self.document.is_some()
    }

    pub fn page_count(&self) -> usize {
        self.session.page_count()
    }

    fn document(&self) -> EditorResult<&OpenDocument> {
        self.document.as_ref().ok_or(EditorError::NoDocument)
    }

    fn require_document(&self) -> EditorResult<()> {
        self.document().map(|_| ())
    }

    /// Opens a document and imports its annotations, replacing whatever was open.
    ///
    /// On failure the previously open document stays open.
    pub fn open(&mut self, source: impl Into<OpenSource>) -> EditorResult<ImportStats> {
        let handle = self.engine.open(source.into())?;

        let loaded = self.load(handle);
        let (page_sizes, annotations, stats) = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                if let Err(close_err) = self.engine.close(handle) {
                    warn!(error = %close_err, "failed to release document after load error");
                }
                return Err(err);
            }
        };

        self.release_current();
        self.session.reset_document(page_sizes.len());
        self.annotations = annotations;
        self.document = Some(OpenDocument { handle, page_sizes });

        info!(pages = self.page_count(), annotations = self.annotations.total(), "document opened");
        Ok(stats)
    }

    fn load(
        &self,
        handle: DocumentHandle,
    ) -> EditorResult<(Vec<PageSize>, AnnotationSet, ImportStats)> {
        let page_count = self.engine.page_count(handle)?;
        let page_sizes = (0..page_count)
            .map(|page| self.engine.page_size(handle, page))
            .collect::<Result<Vec<_>, _>>()?;
        let (annotations, stats) = bridge::import_annotations(&self.engine, handle)?;

        Ok((page_sizes, annotations, stats))
    }

    /// Closes the open document, dropping its annotations and cached renders.
    pub fn close(&mut self) -> EditorResult<()> {
        self.require_document()?;
        self.release_current();
        self.session.close();
        self.annotations = AnnotationSet::default();
        Ok(())
    }

    fn release_current(&mut self) {
        self.renders.clear();
        self.resize.cancel();
        if let Some(previous) = self.document.take() {
            if let Err(err) = self.engine.close(previous.handle) {
                warn!(error = %err, "failed to close previous document");
            }
        }
    }

    /// Exports the model into the document and writes it to `target`.
    pub fn save(&mut self, target: SaveTarget) -> EditorResult<(PathBuf, ExportStats)> {
        let handle = self.document()?.handle;
        Ok(bridge::save_annotated(&mut self.engine, handle, &self.annotations, &target)?)
    }

    /// Bitmap of the current page at the current zoom, rendered on a cache miss.
    pub fn render_current_page(&mut self) -> EditorResult<&RgbaImage> {
        let handle = self.document()?.handle;
        let page = self.session.current_page();
        let zoom = self.session.zoom();

        if self.renders.get(page, zoom).is_none() {
            let scale = self.session.transform().scale(zoom);
            let image = self
                .engine
                .render_page(handle, RenderRequest { page_index: page as u32, scale })?;
            debug!(page, zoom, "page rendered");
            self.renders.insert(page, zoom, image);
        }

        self.renders.get(page, zoom).ok_or(EditorError::NoDocument)
    }

    pub fn current_page_size(&self) -> EditorResult<PageSize> {
        let document = self.document()?;
        Ok(document.page_sizes.get(self.session.current_page()).copied().unwrap_or_default())
    }

    // View

    fn after_zoom(&mut self, zoom: f32) -> f32 {
        self.renders.invalidate_stale(self.session.current_page(), zoom);
        zoom
    }

    pub fn set_zoom(&mut self, zoom: f32) -> EditorResult<f32> {
        self.require_document()?;
        let zoom = self.session.set_zoom(zoom);
        Ok(self.after_zoom(zoom))
    }

    pub fn zoom_in(&mut self) -> EditorResult<f32> {
        self.require_document()?;
        let zoom = self.session.zoom_in();
        Ok(self.after_zoom(zoom))
    }

    pub fn zoom_out(&mut self) -> EditorResult<f32> {
        self.require_document()?;
        let zoom = self.session.zoom_out();
        Ok(self.after_zoom(zoom))
    }

    pub fn reset_zoom(&mut self) -> EditorResult<f32> {
        self.require_document()?;
        let zoom = self.session.reset_zoom();
        Ok(self.after_zoom(zoom))
    }

    pub fn fit_to_viewport(&mut self, width_px: f32, height_px: f32) -> EditorResult<f32> {
        let page_size = self.current_page_size()?;
        let zoom = self.session.fit_to_viewport(width_px, height_px, page_size);
        Ok(self.after_zoom(zoom))
    }

    /// Records a viewport resize and (re)schedules a debounced refit.
    pub fn on_resize(
        &mut self,
        width_px: f32,
        height_px: f32,
        now: Instant,
    ) -> Option<TimerHandle> {
        self.document.as_ref()?;
        self.viewport = Some((width_px, height_px));
        Some(self.resize.signal(now))
    }

    /// Applies a pending refit once its debounce window has elapsed.
    /// Returns the new zoom when a refit happened.
    pub fn tick(&mut self, now: Instant) -> EditorResult<Option<f32>> {
        if !self.resize.poll(now) {
            return Ok(None);
        }
        let Some((width, height)) = self.viewport else {
            return Ok(None);
        };

        self.fit_to_viewport(width, height).map(Some)
    }

    pub fn go_to_page(&mut self, page: usize) -> EditorResult<bool> {
        self.require_document()?;
        Ok(self.session.go_to_page(page))
    }

    pub fn next_page(&mut self) -> EditorResult<bool> {
        self.require_document()?;
        Ok(self.session.next_page())
    }

    pub fn previous_page(&mut self) -> EditorResult<bool> {
        self.require_document()?;
        Ok(self.session.previous_page())
    }

    // Tool and style

    pub fn set_tool(&mut self, tool: AnnotationKind) {
        self.session.set_tool(tool);
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.session.set_color(color);
    }

    pub fn set_font_size(&mut self, font_size: f32) -> bool {
        self.session.set_font_size(font_size)
    }

    // Editing

    pub fn pointer_down(
        &mut self,
        button: PointerButton,
        point: ViewPoint,
    ) -> EditorResult<Effect> {
        self.require_document()?;
        Ok(self.session.pointer_down(button, point, &mut self.annotations))
    }

    pub fn pointer_move(&mut self, point: ViewPoint) -> EditorResult<Effect> {
        self.require_document()?;
        Ok(self.session.pointer_move(point, &mut self.annotations))
    }

    pub fn pointer_up(&mut self, button: PointerButton, point: ViewPoint) -> EditorResult<Effect> {
        self.require_document()?;
        Ok(self.session.pointer_up(button, point, &mut self.annotations))
    }

    pub fn delete_selected(&mut self) -> EditorResult<Option<Annotation>> {
        self.require_document()?;
        Ok(self.session.delete_selected(&mut self.annotations))
    }

    pub fn edit_selected_text(&mut self) -> EditorResult<Effect> {
        self.require_document()?;
        Ok(self.session.edit_selected_text(&self.annotations))
    }

    pub fn resume_text(&mut self, answer: Option<String>) -> EditorResult<Effect> {
        self.require_document()?;
        Ok(self.session.resume_text(answer, &mut self.annotations))
    }

    pub fn answer_text(&mut self, input: &mut impl TextInput) -> EditorResult<Effect> {
        self.require_document()?;
        Ok(self.session.answer_text(input, &mut self.annotations))
    }

    pub fn request_color(&mut self) -> Effect {
        self.session.request_color()
    }

    pub fn resume_color(&mut self, answer: Option<Rgb>) -> Effect {
        self.session.resume_color(answer)
    }

    pub fn answer_color(&mut self, input: &mut impl ColorInput) -> Effect {
        self.session.answer_color(input)
    }

    /// Appends an annotation to `page` directly, bypassing pointer gestures.
    pub fn add_annotation(
        &mut self,
        page: usize,
        annotation: Annotation,
    ) -> EditorResult<Option<usize>> {
        self.require_document()?;
        Ok(self.annotations.append(page, annotation))
    }

    pub fn clear_page(&mut self) -> EditorResult<usize> {
        self.require_document()?;
        Ok(self.session.clear_page(&mut self.annotations))
    }

    pub fn selection_overlay(&self) -> Option<SelectionOverlay> {
        self.session.selection_overlay(&self.annotations)
    }
}

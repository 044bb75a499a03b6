//! Pointer-driven editing session
//!
//! [`InteractionSession`] owns the view state (zoom, current page, active tool)
//! and the gesture state machine. It is the only writer of the annotation set
//! while the user is editing. Every transition takes the set by reference and
//! returns an [`Effect`] telling the host what to draw or ask for next.
//!
//! Text and color prompts never block inside the state machine. A transition
//! that needs input parks the session in an `Awaiting*` state and emits a
//! request; the host later calls [`InteractionSession::resume_text`] or
//! [`InteractionSession::resume_color`] with the answer, or `None` to cancel.
//! While parked, pointer input is ignored.

use crate::annotation::{Annotation, AnnotationKind, AnnotationSet, DocPoint, Rgb};
use crate::config::EditorConfig;
use crate::hit_test::{text_extent, HitTester};
use crate::transform::{fit_zoom, Transform, ViewPoint, ViewRect, ZoomRange};
use pdf_engine::PageSize;
use tracing::{debug, info};

/// Padding around the FreeText selection box, in view pixels.
const TEXT_SELECTION_PADDING: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Draws new annotations.
    Primary,
    /// Selects and drags existing annotations.
    Secondary,
}

/// A pending request for text from the host.
#[derive(Debug, Clone, PartialEq)]
pub enum TextRequest {
    /// New FreeText at `anchor` on `page`.
    Create { page: usize, anchor: DocPoint },
    /// Replacement text for the annotation at `index`.
    Edit { page: usize, index: usize, initial: String },
}

impl TextRequest {
    pub fn initial_value(&self) -> &str {
        match self {
            TextRequest::Create { .. } => "",
            TextRequest::Edit { initial, .. } => initial,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionState {
    Idle,
    Drawing { start: ViewPoint, current: ViewPoint },
    Selected { index: usize },
    Modifying { index: usize },
    AwaitingText(TextRequest),
    /// Color prompt is open; `selected` is restored when it closes.
    AwaitingColor { selected: Option<usize> },
}

/// Ephemeral shape drawn while a box annotation is being dragged out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewShape {
    pub kind: AnnotationKind,
    pub color: Rgb,
    pub rect: ViewRect,
}

impl PreviewShape {
    /// Line stroked instead of a filled box, for underline and strike-through.
    pub fn stroke_line(&self) -> Option<(ViewPoint, ViewPoint)> {
        let rect = self.rect;
        match self.kind {
            AnnotationKind::Underline => {
                Some((ViewPoint::new(rect.x0, rect.y1), ViewPoint::new(rect.x1, rect.y1)))
            }
            AnnotationKind::StrikeThrough => {
                let middle = (rect.y0 + rect.y1) / 2.0;
                Some((ViewPoint::new(rect.x0, middle), ViewPoint::new(rect.x1, middle)))
            }
            _ => None,
        }
    }
}

/// Highlight drawn around the selected annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionOverlay {
    pub index: usize,
    pub bounds: ViewRect,
    /// Corner handle squares; empty for FreeText.
    pub handles: Vec<ViewRect>,
    pub line_width: f32,
}

/// What the host should do after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    Preview(PreviewShape),
    /// Annotations changed or selection moved; repaint the page.
    Redraw { selection: Option<SelectionOverlay> },
    RequestText(TextRequest),
    RequestColor { current: Rgb },
}

/// Host-side text prompt.
pub trait TextInput {
    /// Returns `None` when the user cancels.
    fn prompt(&mut self, initial: &str) -> Option<String>;
}

impl<F> TextInput for F
where
    F: FnMut(&str) -> Option<String>,
{
    fn prompt(&mut self, initial: &str) -> Option<String> {
        self(initial)
    }
}

/// Host-side color picker.
pub trait ColorInput {
    fn prompt(&mut self, initial: Rgb) -> Option<Rgb>;
}

impl<F> ColorInput for F
where
    F: FnMut(Rgb) -> Option<Rgb>,
{
    fn prompt(&mut self, initial: Rgb) -> Option<Rgb> {
        self(initial)
    }
}

#[derive(Debug, Clone)]
pub struct InteractionSession {
    transform: Transform,
    hit_tester: HitTester,
    zoom_range: ZoomRange,
    zoom_step: f32,
    fit_margin: f32,
    min_drag_px: f32,
    zoom: f32,
    current_page: usize,
    page_count: usize,
    tool: AnnotationKind,
    color: Rgb,
    font_size: f32,
    dragging: Option<PointerButton>,
    state: InteractionState,
}

impl Default for InteractionSession {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}

impl InteractionSession {
    pub fn new(config: &EditorConfig) -> Self {
        let transform = Transform::new(config.base_scale);
        let zoom_range = ZoomRange::new(config.min_zoom, config.max_zoom);

        Self {
            transform,
            hit_tester: HitTester::new(transform),
            zoom_range,
            zoom_step: config.zoom_step,
            fit_margin: config.fit_margin,
            min_drag_px: config.min_drag_px,
            zoom: zoom_range.clamp(1.0),
            current_page: 0,
            page_count: 0,
            tool: config.default_tool,
            color: config.default_color,
            font_size: config.default_font_size,
            dragging: None,
            state: InteractionState::Idle,
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn tool(&self) -> AnnotationKind {
        self.tool
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    /// Index of the selected annotation on the current page.
    pub fn selected_index(&self) -> Option<usize> {
        match self.state {
            InteractionState::Selected { index } | InteractionState::Modifying { index } => {
                Some(index)
            }
            InteractionState::AwaitingColor { selected } => selected,
            _ => None,
        }
    }

    pub fn pending_text(&self) -> Option<&TextRequest> {
        match &self.state {
            InteractionState::AwaitingText(request) => Some(request),
            _ => None,
        }
    }

    /// Starts over for a freshly opened document.
    pub fn reset_document(&mut self, page_count: usize) {
        self.page_count = page_count;
        self.current_page = 0;
        self.enter_idle();
        debug!(page_count, "session reset for new document");
    }

    /// Drops all document-bound state.
    pub fn close(&mut self) {
        self.reset_document(0);
    }

    fn enter_idle(&mut self) {
        self.state = InteractionState::Idle;
        self.dragging = None;
    }

    // Zoom

    /// Sets the zoom, clamped to the configured range, and returns the applied value.
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        self.zoom = self.zoom_range.clamp(zoom);
        debug!(zoom = self.zoom, "zoom changed");
        self.zoom
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.set_zoom(self.zoom * self.zoom_step)
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.set_zoom(self.zoom / self.zoom_step)
    }

    pub fn reset_zoom(&mut self) -> f32 {
        self.set_zoom(1.0)
    }

    /// Fits `page` into the viewport. Degenerate sizes leave the zoom unchanged.
    pub fn fit_to_viewport(&mut self, width_px: f32, height_px: f32, page: PageSize) -> f32 {
        match fit_zoom(
            width_px,
            height_px,
            page.width_pt,
            page.height_pt,
            &self.transform,
            self.fit_margin,
        ) {
            Some(zoom) => self.set_zoom(zoom),
            None => self.zoom,
        }
    }

    // Navigation

    /// Moves to `page`; out-of-range requests are ignored. Changing page forces `Idle`.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        if page >= self.page_count || page == self.current_page {
            return false;
        }

        self.current_page = page;
        self.enter_idle();
        debug!(page, "page changed");
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.current_page + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        match self.current_page.checked_sub(1) {
            Some(page) => self.go_to_page(page),
            None => false,
        }
    }

    // Tool and style

    pub fn set_tool(&mut self, tool: AnnotationKind) {
        self.tool = tool;
    }

    /// Affects annotations created from now on only.
    pub fn set_color(&mut self, color: Rgb) {
        self.color = color;
    }

    /// Ignores non-positive and non-finite sizes.
    pub fn set_font_size(&mut self, font_size: f32) -> bool {
        if font_size.is_finite() && font_size > 0.0 {
            self.font_size = font_size;
            true
        } else {
            false
        }
    }

    // Pointer input

    pub fn pointer_down(
        &mut self,
        button: PointerButton,
        point: ViewPoint,
        annotations: &mut AnnotationSet,
    ) -> Effect {
        if self.is_suspended() || self.page_count == 0 {
            return Effect::None;
        }

        match button {
            PointerButton::Primary => self.begin_primary(point),
            PointerButton::Secondary => {
                if matches!(self.state, InteractionState::Drawing { .. }) {
                    return Effect::None;
                }
                self.dragging = Some(PointerButton::Secondary);
                self.select_at(point, annotations)
            }
        }
    }

    pub fn pointer_move(&mut self, point: ViewPoint, annotations: &mut AnnotationSet) -> Effect {
        match self.state {
            InteractionState::Drawing { start, .. } => {
                self.state = InteractionState::Drawing { start, current: point };
                Effect::Preview(PreviewShape {
                    kind: self.tool,
                    color: self.color,
                    rect: ViewRect::from_corners(start, point),
                })
            }
            InteractionState::Selected { index } | InteractionState::Modifying { index }
                if self.dragging == Some(PointerButton::Secondary) =>
            {
                self.drag_selected(index, point, annotations)
            }
            _ => Effect::None,
        }
    }

    pub fn pointer_up(
        &mut self,
        button: PointerButton,
        point: ViewPoint,
        annotations: &mut AnnotationSet,
    ) -> Effect {
        if self.dragging == Some(button) {
            self.dragging = None;
        }

        match (self.state.clone(), button) {
            (InteractionState::Drawing { start, .. }, PointerButton::Primary) => {
                self.finish_drawing(start, point, annotations)
            }
            (InteractionState::Modifying { index }, PointerButton::Secondary) => {
                self.state = InteractionState::Selected { index };
                Effect::None
            }
            _ => Effect::None,
        }
    }

    fn is_suspended(&self) -> bool {
        matches!(
            self.state,
            InteractionState::AwaitingText(_) | InteractionState::AwaitingColor { .. }
        )
    }

    fn begin_primary(&mut self, point: ViewPoint) -> Effect {
        let had_selection = self.selected_index().is_some();

        if self.tool == AnnotationKind::FreeText {
            let request = TextRequest::Create {
                page: self.current_page,
                anchor: self.transform.to_document(point, self.zoom),
            };
            self.dragging = None;
            self.state = InteractionState::AwaitingText(request.clone());
            debug!("free text requested");
            return Effect::RequestText(request);
        }

        self.dragging = Some(PointerButton::Primary);
        self.state = InteractionState::Drawing { start: point, current: point };

        if had_selection {
            Effect::Redraw { selection: None }
        } else {
            Effect::None
        }
    }

    fn finish_drawing(
        &mut self,
        start: ViewPoint,
        end: ViewPoint,
        annotations: &mut AnnotationSet,
    ) -> Effect {
        self.enter_idle();

        let dx = (end.x - start.x).abs();
        let dy = (end.y - start.y).abs();
        if dx < self.min_drag_px && dy < self.min_drag_px {
            debug!(dx, dy, "drag below threshold, treated as click");
            return Effect::Redraw { selection: None };
        }

        let Some(rect) =
            self.transform.rect_to_document(ViewRect::from_corners(start, end), self.zoom)
        else {
            return Effect::Redraw { selection: None };
        };
        let Ok(annotation) = Annotation::boxed(self.tool, rect, self.color) else {
            return Effect::Redraw { selection: None };
        };

        if let Some(index) = annotations.append(self.current_page, annotation) {
            info!(
                page = self.current_page,
                index,
                kind = %self.tool,
                rect = ?rect.to_array(),
                "annotation created"
            );
        }
        Effect::Redraw { selection: None }
    }

    fn select_at(&mut self, point: ViewPoint, annotations: &AnnotationSet) -> Effect {
        let hit = annotations
            .page(self.current_page)
            .and_then(|page| self.hit_tester.find(page, point, self.zoom));

        match hit {
            Some(index) => {
                self.state = InteractionState::Selected { index };
                debug!(page = self.current_page, index, "annotation selected");
                Effect::Redraw { selection: self.overlay_for(index, annotations) }
            }
            None => {
                self.enter_idle();
                Effect::Redraw { selection: None }
            }
        }
    }

    fn drag_selected(
        &mut self,
        index: usize,
        point: ViewPoint,
        annotations: &mut AnnotationSet,
    ) -> Effect {
        let target = self.transform.to_document(point, self.zoom);
        let moved = annotations
            .page(self.current_page)
            .and_then(|page| page.get(index))
            .map(|annotation| annotation.translated_to(target));

        let page = self.current_page;
        if moved.is_some_and(|moved| annotations.replace(page, index, moved)) {
            self.state = InteractionState::Modifying { index };
            Effect::Redraw { selection: self.overlay_for(index, annotations) }
        } else {
            debug!(index, "stale selection dropped");
            self.enter_idle();
            Effect::Redraw { selection: None }
        }
    }

    // Explicit actions

    /// Removes the selected annotation and returns it. No-op without a valid selection.
    pub fn delete_selected(&mut self, annotations: &mut AnnotationSet) -> Option<Annotation> {
        if self.is_suspended() {
            return None;
        }
        let index = self.selected_index()?;
        self.enter_idle();

        let removed = annotations.remove(self.current_page, index);
        if let Some(annotation) = &removed {
            info!(page = self.current_page, index, kind = %annotation.kind(), "annotation deleted");
        }
        removed
    }

    /// Asks for replacement text for the selected annotation.
    pub fn edit_selected_text(&mut self, annotations: &AnnotationSet) -> Effect {
        if self.is_suspended() {
            return Effect::None;
        }
        let Some(index) = self.selected_index() else {
            return Effect::None;
        };
        let Some(annotation) = annotations.page(self.current_page).and_then(|page| page.get(index))
        else {
            self.enter_idle();
            return Effect::Redraw { selection: None };
        };

        let request = TextRequest::Edit {
            page: self.current_page,
            index,
            initial: annotation.text().to_string(),
        };
        self.dragging = None;
        self.state = InteractionState::AwaitingText(request.clone());
        Effect::RequestText(request)
    }

    /// Completes a pending text request. `None` cancels without touching the model.
    ///
    /// Creation ignores empty text; an edit accepts it.
    pub fn resume_text(
        &mut self,
        answer: Option<String>,
        annotations: &mut AnnotationSet,
    ) -> Effect {
        let InteractionState::AwaitingText(request) = &self.state else {
            return Effect::None;
        };
        let request = request.clone();

        match request {
            TextRequest::Create { page, anchor } => {
                self.enter_idle();
                let Some(text) = answer.filter(|text| !text.is_empty()) else {
                    return Effect::None;
                };
                let Ok(annotation) = Annotation::free_text(anchor, self.font_size, self.color, text)
                else {
                    return Effect::None;
                };
                if let Some(index) = annotations.append(page, annotation) {
                    info!(page, index, "free text created");
                }
                Effect::Redraw { selection: None }
            }
            TextRequest::Edit { page, index, .. } => {
                self.state = InteractionState::Selected { index };
                let Some(text) = answer else {
                    return Effect::None;
                };

                let edited = annotations
                    .page(page)
                    .and_then(|list| list.get(index))
                    .map(|annotation| annotation.with_text(text));
                if edited.is_some_and(|edited| annotations.replace(page, index, edited)) {
                    info!(page, index, "annotation text updated");
                    Effect::Redraw { selection: self.overlay_for(index, annotations) }
                } else {
                    self.enter_idle();
                    Effect::Redraw { selection: None }
                }
            }
        }
    }

    /// Asks for a new drawing color.
    pub fn request_color(&mut self) -> Effect {
        if self.is_suspended() {
            return Effect::None;
        }
        self.state = InteractionState::AwaitingColor { selected: self.selected_index() };
        self.dragging = None;
        Effect::RequestColor { current: self.color }
    }

    /// Completes a pending color request. Existing annotations keep their colors.
    pub fn resume_color(&mut self, answer: Option<Rgb>) -> Effect {
        let InteractionState::AwaitingColor { selected } = self.state else {
            return Effect::None;
        };

        self.state = match selected {
            Some(index) => InteractionState::Selected { index },
            None => InteractionState::Idle,
        };

        if let Some(color) = answer {
            self.color = color;
            debug!(color = %color.to_hex(), "drawing color changed");
        }
        Effect::None
    }

    /// Runs the pending text request through `input`.
    pub fn answer_text(
        &mut self,
        input: &mut impl TextInput,
        annotations: &mut AnnotationSet,
    ) -> Effect {
        let Some(initial) = self.pending_text().map(|request| request.initial_value().to_string())
        else {
            return Effect::None;
        };
        let answer = input.prompt(&initial);
        self.resume_text(answer, annotations)
    }

    /// Runs the color request through `input`.
    pub fn answer_color(&mut self, input: &mut impl ColorInput) -> Effect {
        if let Effect::RequestColor { current } = self.request_color() {
            let answer = input.prompt(current);
            return self.resume_color(answer);
        }
        Effect::None
    }

    /// Removes every annotation on the current page.
    pub fn clear_page(&mut self, annotations: &mut AnnotationSet) -> usize {
        self.enter_idle();
        let removed = annotations.clear_page(self.current_page);
        info!(page = self.current_page, removed, "page annotations cleared");
        removed
    }

    // Rendering helpers

    /// Overlay for the current selection at the current zoom, if the selection is valid.
    pub fn selection_overlay(&self, annotations: &AnnotationSet) -> Option<SelectionOverlay> {
        self.overlay_for(self.selected_index()?, annotations)
    }

    fn overlay_for(&self, index: usize, annotations: &AnnotationSet) -> Option<SelectionOverlay> {
        let annotation = annotations.page(self.current_page)?.get(index)?;
        let zoom = self.zoom;
        let line_width = zoom.round().max(1.0);

        let (bounds, handles) = match annotation {
            Annotation::FreeText(markup) => {
                let anchor = self.transform.to_view(markup.anchor, zoom);
                let extent = text_extent(anchor, &markup.text, markup.font_size, zoom);
                (extent.expanded(TEXT_SELECTION_PADDING), Vec::new())
            }
            other => {
                let bounds = self.transform.rect_to_view(other.bounds(), zoom);
                let half = (6.0 * zoom).round().max(3.0);
                let handles = bounds
                    .corners()
                    .iter()
                    .map(|corner| ViewRect::from_corners(*corner, *corner).expanded(half))
                    .collect();
                (bounds, handles)
            }
        };

        Some(SelectionOverlay { index, bounds, handles, line_width })
    }
}

//! Annotation data model
//!
//! Typed markup items and the per-page collections that hold them.
//! All geometry is stored in document space (PDF points, top-left origin);
//! view-space values are derived on demand through [`crate::Transform`].

use pdf_engine::codes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width of one FreeText character relative to the font size.
const FREE_TEXT_CHAR_WIDTH: f32 = 0.3;
/// Line height of FreeText relative to the font size.
const FREE_TEXT_LINE_HEIGHT: f32 = 1.2;

/// Font size used for FreeText when none is given.
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Errors raised while constructing annotation values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("coordinate is not finite")]
    NonFiniteCoordinate,
    #[error("font size must be finite and positive, got {0}")]
    InvalidFontSize(f32),
    #[error("{0} is not a box annotation kind")]
    NotABoxKind(AnnotationKind),
    #[error("invalid color: {0}")]
    InvalidColor(String),
    #[error("unknown annotation kind: {0}")]
    UnknownKind(String),
}

/// A point in document space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DocPoint {
    pub x: f32,
    pub y: f32,
}

impl DocPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned rectangle in document space with `x0 <= x1` and `y0 <= y1`.
///
/// Fields are private so the ordering invariant cannot be broken after
/// construction; every constructor normalizes its corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f32; 4]", try_from = "[f32; 4]")]
pub struct DocRect {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl DocRect {
    /// Creates a rectangle from two arbitrary corners.
    ///
    /// # Errors
    /// Returns [`ModelError::NonFiniteCoordinate`] if any coordinate is NaN or infinite.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Result<Self, ModelError> {
        if ![x0, y0, x1, y1].iter().all(|value| value.is_finite()) {
            return Err(ModelError::NonFiniteCoordinate);
        }

        Ok(Self { x0: x0.min(x1), y0: y0.min(y1), x1: x0.max(x1), y1: y0.max(y1) })
    }

    pub fn from_corners(a: DocPoint, b: DocPoint) -> Result<Self, ModelError> {
        Self::new(a.x, a.y, b.x, b.y)
    }

    /// Accepts a slice of exactly four coordinates.
    pub fn from_slice(values: &[f32]) -> Result<Self, ModelError> {
        match values {
            [x0, y0, x1, y1] => Self::new(*x0, *y0, *x1, *y1),
            _ => Err(ModelError::NonFiniteCoordinate),
        }
    }

    pub fn x0(&self) -> f32 {
        self.x0
    }

    pub fn y0(&self) -> f32 {
        self.y0
    }

    pub fn x1(&self) -> f32 {
        self.x1
    }

    pub fn y1(&self) -> f32 {
        self.y1
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn center(&self) -> DocPoint {
        DocPoint::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Moves the rectangle by `(dx, dy)` keeping its size.
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self { x0: self.x0 + dx, y0: self.y0 + dy, x1: self.x1 + dx, y1: self.y1 + dy }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }
}

impl From<DocRect> for [f32; 4] {
    fn from(rect: DocRect) -> Self {
        rect.to_array()
    }
}

impl TryFrom<[f32; 4]> for DocRect {
    type Error = ModelError;

    fn try_from([x0, y0, x1, y1]: [f32; 4]) -> Result<Self, Self::Error> {
        Self::new(x0, y0, x1, y1)
    }
}

/// Normalized RGB color, each channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Rgb {
    r: f32,
    g: f32,
    b: f32,
}

impl Rgb {
    pub const YELLOW: Rgb = Rgb { r: 1.0, g: 1.0, b: 0.0 };
    pub const RED: Rgb = Rgb { r: 1.0, g: 0.0, b: 0.0 };
    pub const BLUE: Rgb = Rgb { r: 0.0, g: 0.0, b: 1.0 };
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };

    /// Creates a color, clamping each channel into `[0, 1]`. Non-finite channels become 0.
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        let clamp = |value: f32| if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
        Self { r: clamp(r), g: clamp(g), b: clamp(b) }
    }

    pub fn from_array([r, g, b]: [f32; 3]) -> Self {
        Self::new(r, g, b)
    }

    /// Parses `#rgb` or `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Result<Self, ModelError> {
        let invalid = || ModelError::InvalidColor(hex.to_string());
        let digits = hex.trim().trim_start_matches('#');
        if !digits.is_ascii() {
            return Err(invalid());
        }

        let channel = |text: &str| u8::from_str_radix(text, 16).map_err(|_| invalid());
        let (r, g, b) = match digits.len() {
            3 => {
                let expand = |i: usize| channel(digits[i..=i].repeat(2).as_str());
                (expand(0)?, expand(1)?, expand(2)?)
            }
            6 => (channel(&digits[0..2])?, channel(&digits[2..4])?, channel(&digits[4..6])?),
            _ => return Err(invalid()),
        };

        Ok(Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0))
    }

    pub fn to_hex(&self) -> String {
        let byte = |value: f32| (value * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn r(&self) -> f32 {
        self.r
    }

    pub fn g(&self) -> f32 {
        self.g
    }

    pub fn b(&self) -> f32 {
        self.b
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::YELLOW
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_hex()
    }
}

impl TryFrom<String> for Rgb {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

/// The closed set of markup kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    #[default]
    Highlight,
    Underline,
    StrikeThrough,
    Rectangle,
    FreeText,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 5] = [
        AnnotationKind::Highlight,
        AnnotationKind::Underline,
        AnnotationKind::StrikeThrough,
        AnnotationKind::Rectangle,
        AnnotationKind::FreeText,
    ];

    /// Native code written to the document.
    pub fn native_code(self) -> i32 {
        match self {
            AnnotationKind::Highlight => codes::HIGHLIGHT,
            AnnotationKind::Underline => codes::UNDERLINE,
            AnnotationKind::StrikeThrough => codes::STRIKE_OUT,
            AnnotationKind::Rectangle => codes::SQUARE,
            AnnotationKind::FreeText => codes::FREE_TEXT,
        }
    }

    /// Maps a native code back to a kind, `None` when the code is outside the table.
    pub fn try_from_native_code(code: i32) -> Option<Self> {
        match code {
            codes::HIGHLIGHT => Some(AnnotationKind::Highlight),
            codes::UNDERLINE => Some(AnnotationKind::Underline),
            codes::STRIKE_OUT => Some(AnnotationKind::StrikeThrough),
            codes::SQUARE_ALIAS | codes::SQUARE => Some(AnnotationKind::Rectangle),
            codes::FREE_TEXT => Some(AnnotationKind::FreeText),
            _ => None,
        }
    }

    /// Like [`Self::try_from_native_code`], falling back to `Highlight`.
    pub fn from_native_code(code: i32) -> Self {
        Self::try_from_native_code(code).unwrap_or(AnnotationKind::Highlight)
    }

    /// True for every kind whose geometry is a rectangle.
    pub fn is_box(self) -> bool {
        !matches!(self, AnnotationKind::FreeText)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationKind::Highlight => "highlight",
            AnnotationKind::Underline => "underline",
            AnnotationKind::StrikeThrough => "strike_through",
            AnnotationKind::Rectangle => "rectangle",
            AnnotationKind::FreeText => "free_text",
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnnotationKind {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "highlight" => Ok(AnnotationKind::Highlight),
            "underline" => Ok(AnnotationKind::Underline),
            "strike_through" | "strikethrough" | "strike" => Ok(AnnotationKind::StrikeThrough),
            "rectangle" | "rect" | "square" => Ok(AnnotationKind::Rectangle),
            "free_text" | "freetext" | "text" => Ok(AnnotationKind::FreeText),
            _ => Err(ModelError::UnknownKind(value.to_string())),
        }
    }
}

/// Payload of the rectangle kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxMarkup {
    pub rect: DocRect,
    pub color: Rgb,
    /// Tooltip text; empty when unused.
    #[serde(default)]
    pub comment: String,
}

/// Payload of FreeText.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMarkup {
    pub anchor: DocPoint,
    pub font_size: f32,
    pub color: Rgb,
    pub text: String,
}

impl TextMarkup {
    /// Bounding box estimated from character count and font size.
    pub fn bounds(&self) -> DocRect {
        let chars = self.text.chars().count() as f32;
        DocRect {
            x0: self.anchor.x,
            y0: self.anchor.y,
            x1: self.anchor.x + chars * self.font_size * FREE_TEXT_CHAR_WIDTH,
            y1: self.anchor.y + self.font_size * FREE_TEXT_LINE_HEIGHT,
        }
    }
}

/// One markup item. Each variant carries only the fields its kind needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    Highlight(BoxMarkup),
    Underline(BoxMarkup),
    StrikeThrough(BoxMarkup),
    Rectangle(BoxMarkup),
    FreeText(TextMarkup),
}

impl Annotation {
    /// Builds a rectangle-kind annotation with an empty comment.
    ///
    /// # Errors
    /// Returns [`ModelError::NotABoxKind`] for `FreeText`.
    pub fn boxed(kind: AnnotationKind, rect: DocRect, color: Rgb) -> Result<Self, ModelError> {
        let markup = BoxMarkup { rect, color, comment: String::new() };
        match kind {
            AnnotationKind::Highlight => Ok(Annotation::Highlight(markup)),
            AnnotationKind::Underline => Ok(Annotation::Underline(markup)),
            AnnotationKind::StrikeThrough => Ok(Annotation::StrikeThrough(markup)),
            AnnotationKind::Rectangle => Ok(Annotation::Rectangle(markup)),
            AnnotationKind::FreeText => Err(ModelError::NotABoxKind(kind)),
        }
    }

    pub fn highlight(rect: DocRect, color: Rgb) -> Self {
        Annotation::Highlight(BoxMarkup { rect, color, comment: String::new() })
    }

    pub fn rectangle(rect: DocRect, color: Rgb) -> Self {
        Annotation::Rectangle(BoxMarkup { rect, color, comment: String::new() })
    }

    /// Builds a FreeText annotation anchored at `anchor`.
    ///
    /// # Errors
    /// Rejects a non-finite anchor and a font size that is not finite and positive.
    pub fn free_text(
        anchor: DocPoint,
        font_size: f32,
        color: Rgb,
        text: impl Into<String>,
    ) -> Result<Self, ModelError> {
        if !anchor.is_finite() {
            return Err(ModelError::NonFiniteCoordinate);
        }
        if !(font_size.is_finite() && font_size > 0.0) {
            return Err(ModelError::InvalidFontSize(font_size));
        }

        Ok(Annotation::FreeText(TextMarkup { anchor, font_size, color, text: text.into() }))
    }

    pub fn kind(&self) -> AnnotationKind {
        match self {
            Annotation::Highlight(_) => AnnotationKind::Highlight,
            Annotation::Underline(_) => AnnotationKind::Underline,
            Annotation::StrikeThrough(_) => AnnotationKind::StrikeThrough,
            Annotation::Rectangle(_) => AnnotationKind::Rectangle,
            Annotation::FreeText(_) => AnnotationKind::FreeText,
        }
    }

    fn box_markup_mut(&mut self) -> Option<&mut BoxMarkup> {
        match self {
            Annotation::Highlight(markup)
            | Annotation::Underline(markup)
            | Annotation::StrikeThrough(markup)
            | Annotation::Rectangle(markup) => Some(markup),
            Annotation::FreeText(_) => None,
        }
    }

    pub fn color(&self) -> Rgb {
        match self {
            Annotation::Highlight(markup)
            | Annotation::Underline(markup)
            | Annotation::StrikeThrough(markup)
            | Annotation::Rectangle(markup) => markup.color,
            Annotation::FreeText(markup) => markup.color,
        }
    }

    /// Primary text for FreeText, the comment for every other kind.
    pub fn text(&self) -> &str {
        match self {
            Annotation::Highlight(markup)
            | Annotation::Underline(markup)
            | Annotation::StrikeThrough(markup)
            | Annotation::Rectangle(markup) => &markup.comment,
            Annotation::FreeText(markup) => &markup.text,
        }
    }

    pub fn font_size(&self) -> Option<f32> {
        match self {
            Annotation::FreeText(markup) => Some(markup.font_size),
            _ => None,
        }
    }

    /// Stored rectangle for box kinds, estimated text box for FreeText.
    pub fn bounds(&self) -> DocRect {
        match self {
            Annotation::Highlight(markup)
            | Annotation::Underline(markup)
            | Annotation::StrikeThrough(markup)
            | Annotation::Rectangle(markup) => markup.rect,
            Annotation::FreeText(markup) => markup.bounds(),
        }
    }

    /// Point that follows the pointer while the annotation is dragged:
    /// the box center, or the FreeText anchor.
    pub fn reference_point(&self) -> DocPoint {
        match self {
            Annotation::FreeText(markup) => markup.anchor,
            _ => self.bounds().center(),
        }
    }

    /// Returns a copy moved so its reference point lands on `target`.
    /// A non-finite target leaves the geometry unchanged.
    pub fn translated_to(&self, target: DocPoint) -> Self {
        let mut moved = self.clone();
        if !target.is_finite() {
            return moved;
        }

        match &mut moved {
            Annotation::FreeText(markup) => markup.anchor = target,
            other => {
                if let Some(markup) = other.box_markup_mut() {
                    let center = markup.rect.center();
                    markup.rect = markup.rect.translated(target.x - center.x, target.y - center.y);
                }
            }
        }
        moved
    }

    /// Returns a copy with its text (FreeText) or comment (box kinds) replaced.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        let mut updated = self.clone();
        match &mut updated {
            Annotation::FreeText(markup) => markup.text = text.into(),
            other => {
                if let Some(markup) = other.box_markup_mut() {
                    markup.comment = text.into();
                }
            }
        }
        updated
    }

    pub fn with_color(&self, color: Rgb) -> Self {
        let mut updated = self.clone();
        match &mut updated {
            Annotation::FreeText(markup) => markup.color = color,
            other => {
                if let Some(markup) = other.box_markup_mut() {
                    markup.color = color;
                }
            }
        }
        updated
    }
}

/// Ordered annotations of one page. List order is z-order: later items are on top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageAnnotations {
    items: Vec<Annotation>,
}

impl PageAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, annotation: Annotation) -> usize {
        self.items.push(annotation);
        self.items.len() - 1
    }

    /// Replaces the item at `index`. Returns `false` and changes nothing if the index is stale.
    pub fn replace(&mut self, index: usize, annotation: Annotation) -> bool {
        match self.items.get_mut(index) {
            Some(slot) => {
                *slot = annotation;
                true
            }
            None => false,
        }
    }

    /// Removes the item at `index`, or returns `None` if the index is stale.
    pub fn remove(&mut self, index: usize) -> Option<Annotation> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// Removes everything, returning how many items were dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    pub fn get(&self, index: usize) -> Option<&Annotation> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.items
    }
}

impl FromIterator<Annotation> for PageAnnotations {
    fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
        Self { items: iter.into_iter().collect() }
    }
}

impl<'a> IntoIterator for &'a PageAnnotations {
    type Item = &'a Annotation;
    type IntoIter = std::slice::Iter<'a, Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Annotations of a whole document: exactly one list per page.
///
/// Page-addressed operations on an out-of-range page are no-ops.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationSet {
    pages: Vec<PageAnnotations>,
}

impl AnnotationSet {
    /// Creates an empty list for each of `page_count` pages.
    pub fn with_page_count(page_count: usize) -> Self {
        Self { pages: vec![PageAnnotations::new(); page_count] }
    }

    pub fn from_pages(pages: Vec<PageAnnotations>) -> Self {
        Self { pages }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, page: usize) -> Option<&PageAnnotations> {
        self.pages.get(page)
    }

    pub fn page_mut(&mut self, page: usize) -> Option<&mut PageAnnotations> {
        self.pages.get_mut(page)
    }

    /// Appends to `page`, returning the new item's index.
    pub fn append(&mut self, page: usize, annotation: Annotation) -> Option<usize> {
        self.pages.get_mut(page).map(|list| list.append(annotation))
    }

    pub fn replace(&mut self, page: usize, index: usize, annotation: Annotation) -> bool {
        self.pages.get_mut(page).is_some_and(|list| list.replace(index, annotation))
    }

    pub fn remove(&mut self, page: usize, index: usize) -> Option<Annotation> {
        self.pages.get_mut(page).and_then(|list| list.remove(index))
    }

    pub fn clear_page(&mut self, page: usize) -> usize {
        self.pages.get_mut(page).map_or(0, PageAnnotations::clear)
    }

    /// Number of annotations across all pages.
    pub fn total(&self) -> usize {
        self.pages.iter().map(PageAnnotations::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &PageAnnotations)> {
        self.pages.iter().enumerate()
    }
}

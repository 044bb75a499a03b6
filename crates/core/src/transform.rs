//! Mapping between view-space pixels and document-space points.
//!
//! `view = document * base_scale * zoom`. The base scale is the render
//! oversampling factor and is fixed for the lifetime of a session.

use crate::annotation::{DocPoint, DocRect};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_SCALE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewPoint {
    pub x: f32,
    pub y: f32,
}

impl ViewPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in view pixels, always normalized.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl ViewRect {
    pub fn from_corners(a: ViewPoint, b: ViewPoint) -> Self {
        Self { x0: a.x.min(b.x), y0: a.y.min(b.y), x1: a.x.max(b.x), y1: a.y.max(b.y) }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Inclusive on every edge.
    pub fn contains(&self, point: ViewPoint) -> bool {
        (self.x0..=self.x1).contains(&point.x) && (self.y0..=self.y1).contains(&point.y)
    }

    pub fn expanded(&self, margin: f32) -> Self {
        Self {
            x0: self.x0 - margin,
            y0: self.y0 - margin,
            x1: self.x1 + margin,
            y1: self.y1 + margin,
        }
    }

    pub fn corners(&self) -> [ViewPoint; 4] {
        [
            ViewPoint::new(self.x0, self.y0),
            ViewPoint::new(self.x1, self.y0),
            ViewPoint::new(self.x0, self.y1),
            ViewPoint::new(self.x1, self.y1),
        ]
    }
}

/// Pure view/document conversion. Callers guarantee `zoom > 0`; zoom is clamped by
/// [`ZoomRange`] before it reaches here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    base_scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self { base_scale: DEFAULT_BASE_SCALE }
    }
}

impl Transform {
    /// Falls back to [`DEFAULT_BASE_SCALE`] for non-positive or non-finite input.
    pub fn new(base_scale: f32) -> Self {
        if base_scale.is_finite() && base_scale > 0.0 {
            Self { base_scale }
        } else {
            Self::default()
        }
    }

    pub fn base_scale(&self) -> f32 {
        self.base_scale
    }

    /// Pixels per document unit at `zoom`.
    pub fn scale(&self, zoom: f32) -> f32 {
        self.base_scale * zoom
    }

    pub fn to_document(&self, point: ViewPoint, zoom: f32) -> DocPoint {
        let scale = self.scale(zoom);
        DocPoint::new(point.x / scale, point.y / scale)
    }

    pub fn to_view(&self, point: DocPoint, zoom: f32) -> ViewPoint {
        let scale = self.scale(zoom);
        ViewPoint::new(point.x * scale, point.y * scale)
    }

    /// Returns `None` only when the view rectangle holds non-finite values.
    pub fn rect_to_document(&self, rect: ViewRect, zoom: f32) -> Option<DocRect> {
        let a = self.to_document(ViewPoint::new(rect.x0, rect.y0), zoom);
        let b = self.to_document(ViewPoint::new(rect.x1, rect.y1), zoom);
        DocRect::from_corners(a, b).ok()
    }

    pub fn rect_to_view(&self, rect: DocRect, zoom: f32) -> ViewRect {
        let a = self.to_view(DocPoint::new(rect.x0(), rect.y0()), zoom);
        let b = self.to_view(DocPoint::new(rect.x1(), rect.y1()), zoom);
        ViewRect::from_corners(a, b)
    }
}

/// Inclusive bounds for the zoom factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomRange {
    min: f32,
    max: f32,
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self { min: 0.5, max: 3.0 }
    }
}

impl ZoomRange {
    /// Swaps reversed bounds; non-positive bounds fall back to the defaults.
    pub fn new(min: f32, max: f32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        if min.is_finite() && max.is_finite() && min > 0.0 {
            Self { min, max }
        } else {
            Self::default()
        }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Out-of-range and NaN requests clamp instead of failing.
    pub fn clamp(&self, zoom: f32) -> f32 {
        if zoom.is_nan() {
            return self.min;
        }
        zoom.clamp(self.min, self.max)
    }
}

/// Zoom at which a page fits the viewport, before clamping.
pub fn fit_zoom(
    viewport_width_px: f32,
    viewport_height_px: f32,
    page_width_pt: f32,
    page_height_pt: f32,
    transform: &Transform,
    margin: f32,
) -> Option<f32> {
    if viewport_width_px <= 0.0
        || viewport_height_px <= 0.0
        || page_width_pt <= 0.0
        || page_height_pt <= 0.0
    {
        return None;
    }

    let width = viewport_width_px / (page_width_pt * transform.base_scale());
    let height = viewport_height_px / (page_height_pt * transform.base_scale());

    Some(width.min(height) * margin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_exact_within_epsilon() {
        let transform = Transform::default();
        let points = [(0.0, 0.0), (10.5, 20.25), (611.9, 791.3), (0.001, 333.333)];

        for zoom in [0.5, 0.75, 1.0, 1.2, 1.44, 2.0, 2.9, 3.0] {
            for (x, y) in points {
                let back = transform.to_document(transform.to_view(DocPoint::new(x, y), zoom), zoom);
                assert!((back.x - x).abs() <= 1e-3, "x at zoom {zoom}");
                assert!((back.y - y).abs() <= 1e-3, "y at zoom {zoom}");
            }
        }
    }

    #[test]
    fn view_scale_includes_base_scale() {
        let transform = Transform::default();
        assert_eq!(transform.to_view(DocPoint::new(10.0, 40.0), 1.5), ViewPoint::new(30.0, 120.0));
        assert_eq!(transform.to_document(ViewPoint::new(30.0, 120.0), 1.5), DocPoint::new(10.0, 40.0));
    }

    #[test]
    fn rect_conversion_normalizes_corners() {
        let transform = Transform::new(2.0);
        let view = ViewRect::from_corners(ViewPoint::new(200.0, 80.0), ViewPoint::new(20.0, 20.0));

        let doc = transform.rect_to_document(view, 1.0).expect("finite rect");
        assert_eq!(doc.to_array(), [10.0, 10.0, 100.0, 40.0]);
        assert_eq!(transform.rect_to_view(doc, 1.0), view);
    }

    #[test]
    fn invalid_base_scale_falls_back() {
        assert_eq!(Transform::new(0.0).base_scale(), DEFAULT_BASE_SCALE);
        assert_eq!(Transform::new(f32::NAN).base_scale(), DEFAULT_BASE_SCALE);
        assert_eq!(Transform::new(4.0).base_scale(), 4.0);
    }

    #[test]
    fn zoom_clamps_rather_than_errors() {
        let range = ZoomRange::default();
        assert_eq!(range.clamp(10.0), 3.0);
        assert_eq!(range.clamp(0.0), 0.5);
        assert_eq!(range.clamp(-4.0), 0.5);
        assert_eq!(range.clamp(f32::NAN), 0.5);
        assert_eq!(range.clamp(1.3), 1.3);
        assert_eq!(ZoomRange::new(3.0, 0.5), range);
        assert_eq!(ZoomRange::new(0.0, 2.0), range);
    }

    #[test]
    fn fit_zoom_uses_smaller_axis() {
        let transform = Transform::default();
        let zoom = fit_zoom(1224.0, 800.0, 612.0, 792.0, &transform, 0.95).expect("valid sizes");
        let expected = (800.0 / (792.0 * 2.0)) * 0.95;
        assert!((zoom - expected).abs() < 1e-6);
        assert_eq!(fit_zoom(0.0, 800.0, 612.0, 792.0, &transform, 0.95), None);
    }
}

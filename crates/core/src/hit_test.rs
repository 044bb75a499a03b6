//! Pointer hit-testing against a page's annotations.
//!
//! Candidates are scanned from the top of the z-order down and the first
//! expanded bounding box that contains the pointer wins, so overlapping
//! annotations resolve to the one drawn last.

use crate::annotation::{Annotation, PageAnnotations};
use crate::transform::{Transform, ViewPoint, ViewRect};

/// Estimated glyph advance relative to the rendered font size.
const TEXT_WIDTH_FACTOR: f32 = 0.6;
/// Estimated line height relative to the rendered font size.
const TEXT_HEIGHT_FACTOR: f32 = 1.2;
/// Smallest font size, in pixels, used when estimating text extent.
const MIN_FONT_PX: f32 = 8.0;

/// Tolerance around a box annotation, in view pixels.
pub fn box_margin(zoom: f32) -> f32 {
    (10.0 * zoom).round().max(5.0)
}

/// Tolerance around a text annotation, in view pixels.
pub fn text_margin(zoom: f32) -> f32 {
    (10.0 * zoom).round().max(5.0)
}

/// Font size as drawn on screen at `zoom`.
pub fn font_px(font_size: f32, zoom: f32) -> f32 {
    (font_size * zoom).round().max(MIN_FONT_PX)
}

/// Estimated on-screen text box anchored at `anchor`, before any margin.
pub fn text_extent(anchor: ViewPoint, text: &str, font_size: f32, zoom: f32) -> ViewRect {
    let font_px = font_px(font_size, zoom);
    let chars = text.chars().count() as f32;

    ViewRect {
        x0: anchor.x,
        y0: anchor.y,
        x1: anchor.x + chars * font_px * TEXT_WIDTH_FACTOR,
        y1: anchor.y + font_px * TEXT_HEIGHT_FACTOR,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HitTester {
    transform: Transform,
}

impl HitTester {
    pub fn new(transform: Transform) -> Self {
        Self { transform }
    }

    /// Index of the top-most annotation under `point`, if any.
    pub fn find(&self, page: &PageAnnotations, point: ViewPoint, zoom: f32) -> Option<usize> {
        page.iter()
            .enumerate()
            .rev()
            .find(|(_, annotation)| self.hit_region(annotation, zoom).contains(point))
            .map(|(index, _)| index)
    }

    /// View-space region that selects `annotation`, tolerance included.
    pub fn hit_region(&self, annotation: &Annotation, zoom: f32) -> ViewRect {
        match annotation {
            Annotation::FreeText(markup) => {
                let anchor = self.transform.to_view(markup.anchor, zoom);
                text_extent(anchor, &markup.text, markup.font_size, zoom)
                    .expanded(text_margin(zoom))
            }
            other => self.transform.rect_to_view(other.bounds(), zoom).expanded(box_margin(zoom)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{DocPoint, DocRect, Rgb};

    fn rectangle(x0: f32, y0: f32, x1: f32, y1: f32) -> Annotation {
        Annotation::rectangle(DocRect::new(x0, y0, x1, y1).expect("finite rect"), Rgb::RED)
    }

    fn page(items: Vec<Annotation>) -> PageAnnotations {
        items.into_iter().collect()
    }

    #[test]
    fn margins_scale_with_zoom_and_have_a_floor() {
        assert_eq!(box_margin(0.5), 5.0);
        assert_eq!(box_margin(1.0), 10.0);
        assert_eq!(box_margin(2.0), 20.0);
        assert_eq!(box_margin(1.26), 13.0);
        assert_eq!(text_margin(0.3), 5.0);
        assert_eq!(font_px(12.0, 0.5), 8.0);
        assert_eq!(font_px(12.0, 2.0), 24.0);
    }

    #[test]
    fn empty_page_has_no_hit() {
        let tester = HitTester::default();
        assert_eq!(tester.find(&PageAnnotations::new(), ViewPoint::new(10.0, 10.0), 1.0), None);
    }

    #[test]
    fn topmost_overlapping_annotation_wins() {
        let tester = HitTester::default();
        let annotations = page(vec![rectangle(0.0, 0.0, 100.0, 100.0), rectangle(50.0, 50.0, 150.0, 150.0)]);

        // (75, 75) in document space lies inside both.
        let point = ViewPoint::new(150.0, 150.0);
        assert_eq!(tester.find(&annotations, point, 1.0), Some(1));

        // Only the first covers (10, 10).
        assert_eq!(tester.find(&annotations, ViewPoint::new(20.0, 20.0), 1.0), Some(0));
    }

    #[test]
    fn tolerance_extends_past_the_edge() {
        let tester = HitTester::default();
        let annotations = page(vec![rectangle(10.0, 10.0, 100.0, 40.0)]);

        // Right edge at zoom 1.0 is x = 200 px.
        assert_eq!(tester.find(&annotations, ViewPoint::new(210.0, 50.0), 1.0), Some(0));
        assert_eq!(tester.find(&annotations, ViewPoint::new(211.0, 50.0), 1.0), None);
    }

    #[test]
    fn free_text_region_covers_estimated_text() {
        let tester = HitTester::default();
        let note = Annotation::free_text(DocPoint::new(50.0, 50.0), 10.0, Rgb::BLUE, "hello")
            .expect("valid free text");
        let annotations = page(vec![note]);

        // Anchor at (100, 100) px; five chars of 10 px text span 30 px plus a 10 px margin.
        assert_eq!(tester.find(&annotations, ViewPoint::new(139.0, 105.0), 1.0), Some(0));
        assert_eq!(tester.find(&annotations, ViewPoint::new(141.0, 105.0), 1.0), None);
        assert_eq!(tester.find(&annotations, ViewPoint::new(91.0, 91.0), 1.0), Some(0));
    }
}

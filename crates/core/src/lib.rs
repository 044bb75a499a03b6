//! PDF markup engine
//!
//! Annotation model, view/document transform, hit-testing, the interactive
//! editing state machine and the bridge to native PDF annotations.

pub mod annotation;
pub mod bridge;
pub mod config;
pub mod debounce;
pub mod editor;
pub mod hit_test;
pub mod interaction;
pub mod render_cache;
pub mod transform;

pub use annotation::{
    Annotation, AnnotationKind, AnnotationSet, BoxMarkup, DocPoint, DocRect, ModelError,
    PageAnnotations, Rgb, TextMarkup, DEFAULT_FONT_SIZE,
};
pub use bridge::{
    export_annotations, import_annotations, save_annotated, to_native, BridgeError, ExportStats,
    ImportStats, SaveTarget,
};
pub use config::{ConfigError, EditorConfig};
pub use debounce::{Debouncer, TimerHandle};
pub use editor::{AnnotationEditor, EditorError, EditorResult};
pub use hit_test::HitTester;
pub use interaction::{
    ColorInput, Effect, InteractionSession, InteractionState, PointerButton, PreviewShape,
    SelectionOverlay, TextInput, TextRequest,
};
pub use render_cache::RenderCache;
pub use transform::{Transform, ViewPoint, ViewRect, ZoomRange};

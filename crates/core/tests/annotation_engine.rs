use markup_core::{
    bridge, Annotation, AnnotationEditor, AnnotationKind, AnnotationSet, BridgeError, DocPoint,
    DocRect, EditorConfig, EditorError, Effect, HitTester, PageAnnotations, PointerButton, Rgb,
    SaveTarget, Transform, ViewPoint,
};
use pdf_engine::{codes, fixtures, LopdfEngine, NativeAnnotation, PageSize, PdfEngine};
use std::fs;
use std::path::{Path, PathBuf};

const EPSILON: f32 = 1e-3;

fn write_blank(dir: &Path, name: &str, pages: u32) -> PathBuf {
    let bytes = fixtures::blank_pdf(pages, PageSize::default()).expect("fixture should build");
    let path = dir.join(name);
    fs::write(&path, bytes).expect("fixture should be written");
    path
}

fn open_editor(path: &Path) -> AnnotationEditor<LopdfEngine> {
    let mut editor = AnnotationEditor::new(LopdfEngine::new(), EditorConfig::default());
    editor.open(path).expect("open should succeed");
    editor
}

fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> DocRect {
    DocRect::new(x0, y0, x1, y1).expect("finite rect")
}

fn assert_close(actual: [f32; 4], expected: [f32; 4]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < EPSILON, "expected {expected:?}, got {actual:?}");
    }
}

fn assert_same_annotation(actual: &Annotation, expected: &Annotation) {
    assert_eq!(actual.kind(), expected.kind());
    assert_eq!(actual.color(), expected.color());
    assert_eq!(actual.text(), expected.text());
    assert_close(actual.bounds().to_array(), expected.bounds().to_array());
    if let (Some(a), Some(e)) = (actual.font_size(), expected.font_size()) {
        assert!((a - e).abs() < EPSILON);
    }
}

#[test]
fn all_kinds_survive_export_save_and_import() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let source = write_blank(temp.path(), "source.pdf", 2);
    let output = temp.path().join("annotated.pdf");

    let page_one = vec![
        Annotation::highlight(rect(10.0, 10.0, 100.0, 40.0), Rgb::YELLOW).with_text("key point"),
        Annotation::boxed(AnnotationKind::Underline, rect(20.0, 50.0, 180.0, 62.5), Rgb::BLUE)
            .expect("box kind"),
        Annotation::boxed(AnnotationKind::StrikeThrough, rect(30.0, 80.0, 90.0, 96.0), Rgb::RED)
            .expect("box kind"),
        Annotation::rectangle(rect(200.0, 300.0, 350.0, 420.0), Rgb::BLACK).with_text("Grüße"),
        Annotation::free_text(DocPoint::new(72.0, 500.0), 18.0, Rgb::BLUE, "margin note")
            .expect("valid free text"),
    ];
    let page_two = vec![Annotation::rectangle(rect(1.0, 2.0, 3.0, 4.0), Rgb::RED)];

    let set = AnnotationSet::from_pages(vec![
        page_one.iter().cloned().collect::<PageAnnotations>(),
        page_two.iter().cloned().collect::<PageAnnotations>(),
    ]);

    let mut engine = LopdfEngine::new();
    let handle = engine.open(source.as_path().into()).expect("open should succeed");
    let (written, stats) =
        bridge::save_annotated(&mut engine, handle, &set, &SaveTarget::NewFile(output.clone()))
            .expect("save should succeed");
    assert_eq!(written, output);
    assert_eq!(stats.pages_written, 2);
    assert_eq!(stats.annotations_written, 6);

    let mut reloaded = LopdfEngine::new();
    let handle = reloaded.open(output.as_path().into()).expect("reopen should succeed");
    let (imported, import_stats) =
        bridge::import_annotations(&reloaded, handle).expect("import should succeed");

    assert_eq!(import_stats.imported, 6);
    assert_eq!(import_stats.defaulted, 0);
    for (page, expected) in [(0, &page_one), (1, &page_two)] {
        let actual = imported.page(page).expect("page exists");
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert_same_annotation(a, e);
        }
    }
}

#[test]
fn drawn_highlight_is_saved_and_reloaded() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let source = write_blank(temp.path(), "source.pdf", 1);
    let output = temp.path().join("out.pdf");

    let mut editor = open_editor(&source);
    editor.set_tool(AnnotationKind::Highlight);
    editor.set_color(Rgb::from_hex("#ffff00").expect("valid hex"));

    // zoom 1.0 with base scale 2: view = document * 2
    editor.pointer_down(PointerButton::Primary, ViewPoint::new(20.0, 20.0)).expect("open");
    editor.pointer_move(ViewPoint::new(150.0, 60.0)).expect("open");
    editor.pointer_up(PointerButton::Primary, ViewPoint::new(200.0, 80.0)).expect("open");
    editor.save(SaveTarget::NewFile(output.clone())).expect("save should succeed");

    let reloaded = open_editor(&output);
    let page = reloaded.annotations().page(0).expect("page 0");
    assert_eq!(page.len(), 1);

    let annotation = page.get(0).expect("one annotation");
    assert_eq!(annotation.kind(), AnnotationKind::Highlight);
    assert_eq!(annotation.color().to_hex(), "#ffff00");
    assert_close(annotation.bounds().to_array(), [10.0, 10.0, 100.0, 40.0]);
}

#[test]
fn deleting_the_second_annotation_keeps_the_first() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let source = write_blank(temp.path(), "source.pdf", 1);

    let mut editor = open_editor(&source);
    let first = Annotation::highlight(rect(10.0, 10.0, 50.0, 50.0), Rgb::YELLOW);
    let second = Annotation::rectangle(rect(200.0, 200.0, 260.0, 260.0), Rgb::RED);
    editor.add_annotation(0, first.clone()).expect("open");
    editor.add_annotation(0, second).expect("open");

    editor.pointer_down(PointerButton::Secondary, ViewPoint::new(460.0, 460.0)).expect("open");
    editor.pointer_up(PointerButton::Secondary, ViewPoint::new(460.0, 460.0)).expect("open");
    assert_eq!(editor.session().selected_index(), Some(1));

    let removed = editor.delete_selected().expect("open").expect("selection");
    assert_eq!(removed.kind(), AnnotationKind::Rectangle);
    assert_eq!(editor.session().selected_index(), None);

    let page = editor.annotations().page(0).expect("page 0");
    assert_eq!(page.len(), 1);
    assert_eq!(page.get(0), Some(&first));
}

#[test]
fn short_drags_are_clicks() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let source = write_blank(temp.path(), "source.pdf", 1);
    let mut editor = open_editor(&source);

    editor.pointer_down(PointerButton::Primary, ViewPoint::new(100.0, 100.0)).expect("open");
    editor.pointer_up(PointerButton::Primary, ViewPoint::new(103.0, 103.0)).expect("open");
    assert_eq!(editor.annotations().total(), 0);

    editor.pointer_down(PointerButton::Primary, ViewPoint::new(100.0, 100.0)).expect("open");
    editor.pointer_up(PointerButton::Primary, ViewPoint::new(106.0, 106.0)).expect("open");
    assert_eq!(editor.annotations().total(), 1);
}

#[test]
fn top_most_overlapping_rectangle_wins() {
    let page: PageAnnotations = vec![
        Annotation::rectangle(rect(0.0, 0.0, 100.0, 100.0), Rgb::RED),
        Annotation::rectangle(rect(50.0, 50.0, 150.0, 150.0), Rgb::BLUE),
    ]
    .into_iter()
    .collect();

    let tester = HitTester::new(Transform::new(2.0));
    assert_eq!(tester.find(&page, ViewPoint::new(150.0, 150.0), 1.0), Some(1));
    assert_eq!(tester.find(&page, ViewPoint::new(40.0, 40.0), 1.0), Some(0));
}

#[test]
fn selection_tolerance_scales_with_zoom() {
    let square = Annotation::rectangle(rect(100.0, 100.0, 200.0, 200.0), Rgb::RED);
    let page: PageAnnotations = std::iter::once(square).collect();
    let tester = HitTester::new(Transform::new(2.0));

    // right edge sits at x = 400 px at zoom 1.0 and x = 800 px at zoom 2.0
    assert_eq!(tester.find(&page, ViewPoint::new(408.0, 300.0), 1.0), Some(0));
    assert_eq!(tester.find(&page, ViewPoint::new(816.0, 600.0), 2.0), Some(0));

    assert_eq!(tester.find(&page, ViewPoint::new(412.0, 300.0), 1.0), None);
    assert_eq!(tester.find(&page, ViewPoint::new(824.0, 600.0), 2.0), None);
}

#[test]
fn unknown_native_kind_imports_as_yellow_highlight() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let source = write_blank(temp.path(), "source.pdf", 1);
    let output = temp.path().join("circle.pdf");

    let mut engine = LopdfEngine::new();
    let handle = engine.open(source.as_path().into()).expect("open should succeed");
    let circle = NativeAnnotation::new(codes::CIRCLE, [40.0, 40.0, 80.0, 90.0]);
    engine.replace_annotations(handle, 0, &[circle]).expect("replace should succeed");
    engine.save(handle, &output).expect("save should succeed");

    let mut editor = AnnotationEditor::new(LopdfEngine::new(), EditorConfig::default());
    let stats = editor.open(output.as_path()).expect("open should succeed");
    assert_eq!(stats.defaulted, 1);

    let annotation = editor.annotations().page(0).and_then(|page| page.get(0)).expect("imported");
    assert_eq!(annotation.kind(), AnnotationKind::Highlight);
    assert_eq!(annotation.color(), Rgb::YELLOW);
    assert_eq!(annotation.text(), "");
    assert_close(annotation.bounds().to_array(), [40.0, 40.0, 80.0, 90.0]);
}

#[test]
fn new_file_target_refuses_source_and_in_place_overwrites() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let source = write_blank(temp.path(), "source.pdf", 1);
    let original = fs::read(&source).expect("read source");

    let mut editor = open_editor(&source);
    let square = Annotation::rectangle(rect(5.0, 5.0, 25.0, 25.0), Rgb::RED);
    editor.add_annotation(0, square).expect("open");

    let err = editor.save(SaveTarget::NewFile(source.clone())).expect_err("must refuse the source");
    assert!(matches!(err, EditorError::Bridge(BridgeError::WouldOverwriteSource(_))));
    assert_eq!(fs::read(&source).expect("read source"), original);

    let (written, _) = editor.save(SaveTarget::InPlace).expect("in-place save");
    assert_eq!(written, source);

    let reloaded = open_editor(&source);
    assert_eq!(reloaded.annotations().total(), 1);
}

#[test]
fn free_text_created_through_prompt_round_trips() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let source = write_blank(temp.path(), "source.pdf", 1);
    let output = temp.path().join("text.pdf");

    let mut editor = open_editor(&source);
    editor.set_tool(AnnotationKind::FreeText);
    assert!(editor.set_font_size(16.0));

    let effect =
        editor.pointer_down(PointerButton::Primary, ViewPoint::new(100.0, 200.0)).expect("open");
    assert!(matches!(effect, Effect::RequestText(_)));
    editor.resume_text(Some("Remember".to_string())).expect("open");
    editor.save(SaveTarget::NewFile(output.clone())).expect("save should succeed");

    let reloaded = open_editor(&output);
    let annotation = reloaded.annotations().page(0).and_then(|page| page.get(0)).expect("imported");
    assert_eq!(annotation.kind(), AnnotationKind::FreeText);
    assert_eq!(annotation.text(), "Remember");
    assert_eq!(annotation.font_size(), Some(16.0));

    let anchor = annotation.reference_point();
    assert!((anchor.x - 50.0).abs() < EPSILON && (anchor.y - 100.0).abs() < EPSILON);
}

#[test]
fn note_mentioning_encrypt_reopens() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let source = write_blank(temp.path(), "source.pdf", 1);
    let output = temp.path().join("note.pdf");

    let mut editor = open_editor(&source);
    let note =
        Annotation::free_text(DocPoint::new(40.0, 40.0), 12.0, Rgb::RED, "see /Encrypt section")
            .expect("valid free text");
    let color = Rgb::from_hex("#123456").expect("valid hex");
    let comment = Annotation::highlight(rect(10.1, 10.7, 100.3, 40.9), color).with_text("/Encrypt");
    editor.add_annotation(0, note).expect("open");
    editor.add_annotation(0, comment.clone()).expect("open");
    editor.save(SaveTarget::NewFile(output.clone())).expect("save should succeed");

    let reloaded = open_editor(&output);
    let page = reloaded.annotations().page(0).expect("page 0");
    assert_eq!(page.len(), 2);
    assert_eq!(page.get(0).map(Annotation::text), Some("see /Encrypt section"));
    let highlight = page.get(1).expect("highlight");
    assert_eq!(highlight.text(), comment.text());
    assert_eq!(highlight.color().to_hex(), "#123456");
    assert_close(highlight.bounds().to_array(), comment.bounds().to_array());
}

use chrono::Utc;
use serde_json::{json, Map, Value};

use libris::library::models::{Highlight, ReadingPosition};
use libris::viewer::{EpubEffect, EpubViewer, Key, PdfEffect, PdfViewer, Report, Theme, Zoom};

fn rendered_pages(effects: &[PdfEffect]) -> Vec<u32> {
    effects
        .iter()
        .filter_map(|e| match e {
            PdfEffect::Render { page, .. } => Some(*page),
            _ => None,
        })
        .collect()
}

fn reports<E, F>(effects: Vec<E>, into_report: F) -> Vec<Report>
where
    F: Fn(E) -> Option<Report>,
{
    effects.into_iter().filter_map(into_report).collect()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

// ============================================================================
// PDF viewer
// ============================================================================

#[test]
fn test_pdf_open_renders_first_page() {
    let (viewer, effects) = PdfViewer::open(10, None);

    assert_eq!(viewer.current_page(), 1);
    assert_eq!(viewer.page_count(), 10);
    assert!(viewer.is_rendering());
    assert_eq!(
        effects,
        vec![
            PdfEffect::Render {
                page: 1,
                zoom_percent: 100
            },
            PdfEffect::Report(Report::Progress(ReadingPosition::Page(1))),
        ]
    );
}

#[test]
fn test_pdf_open_resumes_saved_page() {
    let (viewer, effects) = PdfViewer::open(10, Some(&ReadingPosition::Page(7)));
    assert_eq!(viewer.current_page(), 7);
    assert_eq!(rendered_pages(&effects), vec![7]);
}

#[test]
fn test_pdf_open_ignores_unusable_resume() {
    for resume in [
        ReadingPosition::Page(11),
        ReadingPosition::Page(0),
        ReadingPosition::Cfi("epubcfi(/6/2!/4/1:0)".to_string()),
    ] {
        let (viewer, effects) = PdfViewer::open(10, Some(&resume));
        assert_eq!(viewer.current_page(), 1, "resume {resume:?}");
        assert_eq!(rendered_pages(&effects), vec![1]);
    }
}

#[test]
fn test_pdf_open_empty_document() {
    let (mut viewer, effects) = PdfViewer::open(0, None);
    assert!(effects.is_empty());
    assert!(!viewer.is_rendering());
    assert!(viewer.next_page().is_empty());
    assert!(viewer.prev_page().is_empty());
}

#[test]
fn test_pdf_navigation_stays_in_bounds() {
    let (mut viewer, _) = PdfViewer::open(2, None);
    viewer.render_finished();

    assert!(viewer.prev_page().is_empty());
    assert_eq!(rendered_pages(&viewer.next_page()), vec![2]);
    viewer.render_finished();
    assert!(viewer.next_page().is_empty());
    assert_eq!(viewer.current_page(), 2);
}

#[test]
fn test_pdf_requests_during_render_coalesce_to_latest() {
    let (mut viewer, _) = PdfViewer::open(20, None);
    assert!(viewer.is_rendering());

    // Page 1 is still rendering; these only move the pending slot
    assert!(viewer.next_page().is_empty());
    assert!(viewer.next_page().is_empty());
    assert!(viewer.go_to_page(9).is_empty());
    assert_eq!(viewer.current_page(), 9);
    assert_eq!(viewer.pending_page(), Some(9));

    let effects = viewer.render_finished();
    assert_eq!(rendered_pages(&effects), vec![9]);
    assert_eq!(
        reports(effects, PdfEffect::into_report),
        vec![Report::Progress(ReadingPosition::Page(9))]
    );
    assert_eq!(viewer.pending_page(), None);
    assert!(viewer.is_rendering());

    assert!(viewer.render_finished().is_empty());
    assert!(!viewer.is_rendering());
}

#[test]
fn test_pdf_go_to_page_out_of_range_resets_input() {
    let (mut viewer, _) = PdfViewer::open(5, Some(&ReadingPosition::Page(3)));
    viewer.render_finished();

    assert_eq!(viewer.go_to_page(6), vec![PdfEffect::ResetPageInput(3)]);
    assert_eq!(viewer.go_to_page(0), vec![PdfEffect::ResetPageInput(3)]);
    assert_eq!(viewer.current_page(), 3);
    assert!(!viewer.is_rendering());

    assert_eq!(rendered_pages(&viewer.go_to_page(5)), vec![5]);
}

#[test]
fn test_pdf_zoom_rerenders_and_has_floor() {
    let (mut viewer, _) = PdfViewer::open(3, None);
    viewer.render_finished();

    assert_eq!(
        viewer.zoom_in(),
        vec![
            PdfEffect::Render {
                page: 1,
                zoom_percent: 110
            },
            PdfEffect::Report(Report::Progress(ReadingPosition::Page(1))),
        ]
    );
    viewer.render_finished();

    for _ in 0..6 {
        viewer.zoom_out();
        viewer.render_finished();
    }
    assert_eq!(viewer.zoom_percent(), Zoom::MIN);
    assert!(viewer.zoom_out().is_empty());
    assert_eq!(viewer.zoom_percent(), 50);
}

#[test]
fn test_pdf_wheel_turns_pages() {
    let (mut viewer, _) = PdfViewer::open(5, None);
    viewer.render_finished();

    assert_eq!(rendered_pages(&viewer.on_wheel(120.0, false)), vec![2]);
    viewer.render_finished();
    assert_eq!(rendered_pages(&viewer.on_wheel(-3.5, false)), vec![1]);
    viewer.render_finished();

    assert!(viewer.on_wheel(120.0, true).is_empty());
    assert!(viewer.on_wheel(0.0, false).is_empty());
    assert_eq!(viewer.current_page(), 1);
}

#[test]
fn test_pdf_arrow_keys() {
    let (mut viewer, _) = PdfViewer::open(5, None);
    viewer.render_finished();

    assert_eq!(rendered_pages(&viewer.on_key(Key::ArrowRight)), vec![2]);
    viewer.render_finished();
    assert_eq!(rendered_pages(&viewer.on_key(Key::ArrowLeft)), vec![1]);
    viewer.render_finished();
    assert!(viewer.on_key(Key::Other).is_empty());
}

#[test]
fn test_pdf_bookmark_marks_current_page() {
    let (mut viewer, _) = PdfViewer::open(12, Some(&ReadingPosition::Page(4)));
    viewer.render_finished();

    assert_eq!(
        viewer.bookmark(),
        Report::Highlight(object(json!({ "page": 4, "type": "bookmark", "color": "yellow" })))
    );
}

// ============================================================================
// EPUB viewer
// ============================================================================

#[test]
fn test_epub_open_without_position() {
    let (viewer, effects) = EpubViewer::open(None, &[], Theme::Default);
    assert_eq!(effects, vec![EpubEffect::Display { target: None }]);
    assert_eq!(viewer.location(), None);
    assert_eq!(viewer.font_size_percent(), 100);
}

#[test]
fn test_epub_open_resumes_and_redraws_highlights() {
    let cfi = "epubcfi(/6/8!/4/2/1:0)";
    let highlights = vec![
        Highlight::new(
            object(json!({ "cfiRange": "epubcfi(/6/4!/4,/1:0,/1:12)", "type": "highlight", "color": "yellow" })),
            Utc::now(),
        ),
        Highlight::new(
            object(json!({ "page": 3, "type": "bookmark", "color": "yellow" })),
            Utc::now(),
        ),
    ];

    let (viewer, effects) =
        EpubViewer::open(
            Some(&ReadingPosition::Cfi(cfi.to_string())),
            &highlights,
            Theme::Default,
        );

    assert_eq!(
        effects,
        vec![
            EpubEffect::Display {
                target: Some(cfi.to_string())
            },
            EpubEffect::Annotate {
                cfi_range: "epubcfi(/6/4!/4,/1:0,/1:12)".to_string()
            },
        ]
    );
    assert_eq!(viewer.location(), Some(cfi));
    assert_eq!(viewer.annotated_ranges(), ["epubcfi(/6/4!/4,/1:0,/1:12)"]);
}

#[test]
fn test_epub_open_ignores_page_position() {
    let (_, effects) = EpubViewer::open(Some(&ReadingPosition::Page(5)), &[], Theme::Default);
    assert_eq!(effects, vec![EpubEffect::Display { target: None }]);
}

#[test]
fn test_epub_relocation_reports_progress() {
    let (mut viewer, _) = EpubViewer::open(None, &[], Theme::Default);

    let effects = viewer.on_relocated("epubcfi(/6/10!/4/2/1:0)");
    assert_eq!(
        effects,
        vec![EpubEffect::Report(Report::Progress(ReadingPosition::Cfi(
            "epubcfi(/6/10!/4/2/1:0)".to_string()
        )))]
    );
    assert_eq!(viewer.location(), Some("epubcfi(/6/10!/4/2/1:0)"));

    assert!(viewer.on_relocated("").is_empty());
    assert_eq!(viewer.location(), Some("epubcfi(/6/10!/4/2/1:0)"));
}

#[test]
fn test_epub_selection_highlights_then_reports() {
    let (mut viewer, _) = EpubViewer::open(None, &[], Theme::Default);
    let range = "epubcfi(/6/4!/4/2,/1:5,/1:20)";

    let effects = viewer.on_selected(range);
    assert_eq!(
        effects,
        vec![
            EpubEffect::Annotate {
                cfi_range: range.to_string()
            },
            EpubEffect::ClearSelection,
            EpubEffect::Report(Report::Highlight(object(json!({
                "cfiRange": range,
                "color": "yellow",
                "type": "highlight",
            })))),
        ]
    );
    assert_eq!(viewer.annotated_ranges(), [range]);

    assert!(viewer.on_selected("").is_empty());
}

#[test]
fn test_epub_navigation() {
    let (viewer, _) = EpubViewer::open(None, &[], Theme::Default);
    assert_eq!(viewer.next(), vec![EpubEffect::Next]);
    assert_eq!(viewer.prev(), vec![EpubEffect::Prev]);
    assert_eq!(viewer.on_key(Key::ArrowRight), vec![EpubEffect::Next]);
    assert_eq!(viewer.on_key(Key::ArrowLeft), vec![EpubEffect::Prev]);
    assert!(viewer.on_key(Key::Other).is_empty());
}

#[test]
fn test_epub_font_size_has_floor() {
    let (mut viewer, _) = EpubViewer::open(None, &[], Theme::Default);

    assert_eq!(viewer.zoom_in(), vec![EpubEffect::SetFontSize(110)]);
    assert_eq!(viewer.zoom_out(), vec![EpubEffect::SetFontSize(100)]);
    for _ in 0..5 {
        viewer.zoom_out();
    }
    assert_eq!(viewer.font_size_percent(), 50);
    assert!(viewer.zoom_out().is_empty());
}

#[test]
fn test_epub_dark_preference_selected_on_open() {
    let (viewer, effects) = EpubViewer::open(None, &[], Theme::from_preference("dark"));
    assert_eq!(
        effects,
        vec![
            EpubEffect::Display { target: None },
            EpubEffect::SelectTheme(Theme::Dark),
        ]
    );
    assert_eq!(viewer.theme(), Theme::Dark);

    let (viewer, effects) = EpubViewer::open(None, &[], Theme::from_preference("light"));
    assert_eq!(effects, vec![EpubEffect::Display { target: None }]);
    assert_eq!(viewer.theme(), Theme::Default);
}

#[test]
fn test_epub_follows_theme_changes() {
    let (mut viewer, _) = EpubViewer::open(None, &[], Theme::Default);

    assert_eq!(
        viewer.on_theme_change(Theme::from_preference("dark")),
        vec![EpubEffect::SelectTheme(Theme::Dark)]
    );
    assert_eq!(viewer.theme(), Theme::Dark);

    assert_eq!(
        viewer.on_theme_change(Theme::from_preference("system")),
        vec![EpubEffect::SelectTheme(Theme::Default)]
    );
    assert_eq!(Theme::Default.name(), "default");
    assert_eq!(Theme::Dark.name(), "dark");
}

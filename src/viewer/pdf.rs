//! Page-at-a-time PDF viewer state.
//!
//! Only one page render runs at a time. Requests that arrive while a render
//! is in flight overwrite a single pending slot, so when the render finishes
//! only the most recent request is rendered; intermediate pages are skipped.

use serde_json::{Map, Value};

use super::{Key, Report, Zoom, HIGHLIGHT_COLOR};
use crate::library::models::ReadingPosition;

#[derive(Debug, Clone, PartialEq)]
pub enum PdfEffect {
    /// Ask the engine to draw `page` at `zoom_percent`; answer with
    /// [`PdfViewer::render_finished`].
    Render { page: u32, zoom_percent: u32 },
    /// The page typed into the page box was out of range; show this one instead.
    ResetPageInput(u32),
    Report(Report),
}

impl PdfEffect {
    pub fn into_report(self) -> Option<Report> {
        match self {
            PdfEffect::Report(report) => Some(report),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct PdfViewer {
    page: u32,
    page_count: u32,
    zoom: Zoom,
    rendering: bool,
    pending: Option<u32>,
}

impl PdfViewer {
    /// Open a document with `page_count` pages, resuming at a saved page when
    /// it is in range. Returns the viewer and the effects of the first render.
    pub fn open(page_count: u32, resume: Option<&ReadingPosition>) -> (Self, Vec<PdfEffect>) {
        let page = resume
            .and_then(ReadingPosition::as_page)
            .filter(|p| (1..=page_count).contains(p))
            .unwrap_or(1);

        let mut viewer = Self {
            page,
            page_count,
            zoom: Zoom::default(),
            rendering: false,
            pending: None,
        };

        let effects = if page_count == 0 {
            Vec::new()
        } else {
            viewer.start_render(page)
        };
        (viewer, effects)
    }

    pub fn current_page(&self) -> u32 {
        self.page
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn zoom_percent(&self) -> u32 {
        self.zoom.percent()
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    pub fn pending_page(&self) -> Option<u32> {
        self.pending
    }

    pub fn next_page(&mut self) -> Vec<PdfEffect> {
        if self.page >= self.page_count {
            return Vec::new();
        }
        self.page += 1;
        self.queue_render(self.page)
    }

    pub fn prev_page(&mut self) -> Vec<PdfEffect> {
        if self.page <= 1 {
            return Vec::new();
        }
        self.page -= 1;
        self.queue_render(self.page)
    }

    /// Jump to a page typed by the user.
    pub fn go_to_page(&mut self, page: u32) -> Vec<PdfEffect> {
        if !(1..=self.page_count).contains(&page) {
            return vec![PdfEffect::ResetPageInput(self.page)];
        }
        self.page = page;
        self.queue_render(page)
    }

    pub fn zoom_in(&mut self) -> Vec<PdfEffect> {
        self.zoom.zoom_in();
        self.queue_render(self.page)
    }

    pub fn zoom_out(&mut self) -> Vec<PdfEffect> {
        if !self.zoom.zoom_out() {
            return Vec::new();
        }
        self.queue_render(self.page)
    }

    /// Scroll down turns forward, up turns back. Ctrl+wheel belongs to the
    /// browser's own zoom and is ignored.
    pub fn on_wheel(&mut self, delta_y: f64, ctrl_key: bool) -> Vec<PdfEffect> {
        if ctrl_key {
            return Vec::new();
        }
        if delta_y > 0.0 {
            self.next_page()
        } else if delta_y < 0.0 {
            self.prev_page()
        } else {
            Vec::new()
        }
    }

    pub fn on_key(&mut self, key: Key) -> Vec<PdfEffect> {
        match key {
            Key::ArrowLeft => self.prev_page(),
            Key::ArrowRight => self.next_page(),
            Key::Other => Vec::new(),
        }
    }

    /// Bookmark the current page. The canvas has no text layer, so a PDF
    /// "highlight" marks the whole page.
    pub fn bookmark(&self) -> Report {
        let mut payload = Map::new();
        payload.insert("page".to_string(), Value::from(self.page));
        payload.insert("type".to_string(), Value::from("bookmark"));
        payload.insert("color".to_string(), Value::from(HIGHLIGHT_COLOR));
        Report::Highlight(payload)
    }

    /// The engine finished the in-flight render. Starts the pending page, if any.
    pub fn render_finished(&mut self) -> Vec<PdfEffect> {
        self.rendering = false;
        match self.pending.take() {
            Some(page) => self.start_render(page),
            None => Vec::new(),
        }
    }

    fn queue_render(&mut self, page: u32) -> Vec<PdfEffect> {
        if self.rendering {
            self.pending = Some(page);
            Vec::new()
        } else {
            self.start_render(page)
        }
    }

    fn start_render(&mut self, page: u32) -> Vec<PdfEffect> {
        self.rendering = true;
        vec![
            PdfEffect::Render {
                page,
                zoom_percent: self.zoom.percent(),
            },
            PdfEffect::Report(Report::Progress(ReadingPosition::Page(page))),
        ]
    }
}

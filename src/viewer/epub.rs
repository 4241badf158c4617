//! Continuous-scroll EPUB viewer state.
//!
//! Pagination, layout and text selection belong to the engine. This side
//! tracks font size, theme and location, and turns selections into
//! highlights anchored by CFI range.

use serde_json::{Map, Value};

use super::{Key, Report, Zoom, HIGHLIGHT_COLOR};
use crate::library::models::{Highlight, ReadingPosition};

/// Reader color scheme. The engine registers a `dark` theme next to its
/// built-in `default` one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Default,
    Dark,
}

impl Theme {
    /// Map a stored or broadcast preference. Anything but `dark` is the default.
    pub fn from_preference(preference: &str) -> Self {
        if preference.eq_ignore_ascii_case("dark") {
            Theme::Dark
        } else {
            Theme::Default
        }
    }

    /// Name of the engine theme to select.
    pub fn name(&self) -> &'static str {
        match self {
            Theme::Default => "default",
            Theme::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EpubEffect {
    /// Display the book, at `target` when there is a saved CFI.
    Display { target: Option<String> },
    Next,
    Prev,
    /// Font size as a percentage of the book's default.
    SetFontSize(u32),
    SelectTheme(Theme),
    /// Draw a highlight over the range.
    Annotate { cfi_range: String },
    /// Drop the engine's visual text selection.
    ClearSelection,
    Report(Report),
}

impl EpubEffect {
    pub fn into_report(self) -> Option<Report> {
        match self {
            EpubEffect::Report(report) => Some(report),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct EpubViewer {
    font_size: Zoom,
    theme: Theme,
    location: Option<String>,
    annotated: Vec<String>,
}

impl EpubViewer {
    /// Open at the saved CFI (if any), apply a dark theme preference and
    /// redraw the stored highlights.
    pub fn open(
        resume: Option<&ReadingPosition>,
        highlights: &[Highlight],
        theme: Theme,
    ) -> (Self, Vec<EpubEffect>) {
        let target = resume
            .and_then(ReadingPosition::as_cfi)
            .filter(|cfi| !cfi.is_empty())
            .map(str::to_string);

        let mut viewer = Self {
            location: target.clone(),
            theme,
            ..Self::default()
        };

        let mut effects = vec![EpubEffect::Display { target }];
        if theme == Theme::Dark {
            effects.push(EpubEffect::SelectTheme(theme));
        }
        for cfi_range in highlights.iter().filter_map(Highlight::cfi_range) {
            effects.extend(viewer.annotate(cfi_range));
        }
        (viewer, effects)
    }

    pub fn font_size_percent(&self) -> u32 {
        self.font_size.percent()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// The app-wide theme changed; follow it.
    pub fn on_theme_change(&mut self, theme: Theme) -> Vec<EpubEffect> {
        self.theme = theme;
        vec![EpubEffect::SelectTheme(theme)]
    }

    /// Start CFI of the last reported location.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Ranges currently drawn as highlights.
    pub fn annotated_ranges(&self) -> &[String] {
        &self.annotated
    }

    pub fn next(&self) -> Vec<EpubEffect> {
        vec![EpubEffect::Next]
    }

    pub fn prev(&self) -> Vec<EpubEffect> {
        vec![EpubEffect::Prev]
    }

    pub fn on_key(&self, key: Key) -> Vec<EpubEffect> {
        match key {
            Key::ArrowLeft => self.prev(),
            Key::ArrowRight => self.next(),
            Key::Other => Vec::new(),
        }
    }

    pub fn zoom_in(&mut self) -> Vec<EpubEffect> {
        self.font_size.zoom_in();
        vec![EpubEffect::SetFontSize(self.font_size.percent())]
    }

    pub fn zoom_out(&mut self) -> Vec<EpubEffect> {
        if !self.font_size.zoom_out() {
            return Vec::new();
        }
        vec![EpubEffect::SetFontSize(self.font_size.percent())]
    }

    /// The engine moved to a new location; save it as reading progress.
    pub fn on_relocated(&mut self, start_cfi: &str) -> Vec<EpubEffect> {
        if start_cfi.is_empty() {
            return Vec::new();
        }
        self.location = Some(start_cfi.to_string());
        vec![EpubEffect::Report(Report::Progress(ReadingPosition::Cfi(
            start_cfi.to_string(),
        )))]
    }

    /// The user selected text. The range is highlighted, the selection
    /// cleared, and the highlight reported.
    pub fn on_selected(&mut self, cfi_range: &str) -> Vec<EpubEffect> {
        if cfi_range.is_empty() {
            return Vec::new();
        }

        let mut effects = self.annotate(cfi_range);
        effects.push(EpubEffect::ClearSelection);

        let mut payload = Map::new();
        payload.insert("cfiRange".to_string(), Value::from(cfi_range));
        payload.insert("color".to_string(), Value::from(HIGHLIGHT_COLOR));
        payload.insert("type".to_string(), Value::from("highlight"));
        effects.push(EpubEffect::Report(Report::Highlight(payload)));
        effects
    }

    fn annotate(&mut self, cfi_range: &str) -> Vec<EpubEffect> {
        self.annotated.push(cfi_range.to_string());
        vec![EpubEffect::Annotate {
            cfi_range: cfi_range.to_string(),
        }]
    }
}

//! Reading-UI coordination, independent of any rendering engine.
//!
//! The viewers never draw anything themselves. Every input returns a list of
//! effects: engine commands (render this page, display that CFI) and
//! [`Report`]s for the server. The host applies the commands to its engine
//! and hands the reports to a [`crate::client::Reporter`].

pub mod epub;
pub mod pdf;

pub use epub::{EpubEffect, EpubViewer, Theme};
pub use pdf::{PdfEffect, PdfViewer};

use serde_json::{Map, Value};

use crate::library::models::ReadingPosition;

/// Color attached to highlights and bookmarks created from the viewers.
pub const HIGHLIGHT_COLOR: &str = "yellow";

/// A save the viewer wants delivered to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Progress(ReadingPosition),
    Highlight(Map<String, Value>),
}

/// Navigation keys the viewers react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Other,
}

/// Zoom level in percent, moved in fixed steps and never below a floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zoom {
    percent: u32,
}

impl Zoom {
    pub const DEFAULT: u32 = 100;
    pub const MIN: u32 = 50;
    pub const STEP: u32 = 10;

    pub fn percent(&self) -> u32 {
        self.percent
    }

    pub fn zoom_in(&mut self) {
        self.percent = self.percent.saturating_add(Self::STEP);
    }

    /// Returns false when already at the floor.
    pub fn zoom_out(&mut self) -> bool {
        if self.percent <= Self::MIN {
            return false;
        }
        self.percent = self.percent.saturating_sub(Self::STEP).max(Self::MIN);
        true
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            percent: Self::DEFAULT,
        }
    }
}

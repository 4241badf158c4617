use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document format of a stored book, derived from the upload's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    Epub,
    Pdf,
}

impl BookFormat {
    /// Classify a filename by its (case-insensitive) extension. A bare
    /// dotfile such as `.pdf` has no extension.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(BookFormat::Pdf),
            "epub" => Some(BookFormat::Epub),
            _ => None,
        }
    }

    /// Whether a declared MIME type is acceptable for a book upload.
    ///
    /// Mirrors the loose browser behaviour we have to live with: any type
    /// mentioning `pdf` or `epub` passes, e.g. `application/pdf`,
    /// `application/x-pdf` and `application/epub+zip`.
    pub fn accepts_mime(mime_type: &str) -> bool {
        let lower = mime_type.to_ascii_lowercase();
        lower.contains("pdf") || lower.contains("epub")
    }

    /// Validate an upload: the extension picks the format, and the declared
    /// MIME type must agree that this is a book. A missing or generic
    /// `application/octet-stream` type is guessed from the filename instead.
    pub fn for_upload(file_name: &str, declared_mime: Option<&str>) -> Option<Self> {
        let format = Self::from_file_name(file_name)?;
        let mime = match declared_mime
            .map(str::trim)
            .filter(|m| !m.is_empty() && *m != "application/octet-stream")
        {
            Some(declared) => declared.to_string(),
            None => mime_guess::from_path(file_name).first()?.to_string(),
        };
        Self::accepts_mime(&mime).then_some(format)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            BookFormat::Epub => "epub",
            BookFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            BookFormat::Epub => "application/epub+zip",
            BookFormat::Pdf => "application/pdf",
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.extension()
    }
}

impl std::str::FromStr for BookFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(BookFormat::Pdf),
            "epub" => Ok(BookFormat::Epub),
            other => Err(format!("unknown format '{other}'")),
        }
    }
}

/// Where a reader left off: a page number for PDFs, a CFI for EPUBs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingPosition {
    Page(u32),
    Cfi(String),
}

impl ReadingPosition {
    /// Zero pages and empty CFIs carry no position and are ignored on save.
    pub fn is_meaningful(&self) -> bool {
        match self {
            ReadingPosition::Page(page) => *page > 0,
            ReadingPosition::Cfi(cfi) => !cfi.is_empty(),
        }
    }

    pub fn as_page(&self) -> Option<u32> {
        match self {
            ReadingPosition::Page(page) => Some(*page),
            ReadingPosition::Cfi(_) => None,
        }
    }

    pub fn as_cfi(&self) -> Option<&str> {
        match self {
            ReadingPosition::Page(_) => None,
            ReadingPosition::Cfi(cfi) => Some(cfi),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRead {
    pub position: ReadingPosition,
    pub timestamp: DateTime<Utc>,
}

/// A stored highlight: whatever the viewer sent, plus the server's timestamp.
///
/// The payload is kept open-ended because the two viewers send different
/// shapes (`{page, type, color}` vs `{cfiRange, type, color}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Highlight {
    pub fn new(mut payload: Map<String, Value>, created_at: DateTime<Utc>) -> Self {
        payload.remove("createdAt");
        Self {
            payload,
            created_at,
        }
    }

    /// `highlight` for EPUB text ranges, `bookmark` for PDF pages.
    pub fn kind(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }

    pub fn color(&self) -> Option<&str> {
        self.payload.get("color").and_then(Value::as_str)
    }

    pub fn page(&self) -> Option<u32> {
        self.payload
            .get("page")
            .and_then(Value::as_u64)
            .and_then(|p| u32::try_from(p).ok())
    }

    pub fn cfi_range(&self) -> Option<&str> {
        self.payload.get("cfiRange").and_then(Value::as_str)
    }
}

/// A book record as persisted in the library file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    /// Generated name of the binary in the upload directory.
    pub filename: String,
    pub original_name: String,
    pub format: BookFormat,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_read: Option<LastRead>,
}

impl BookRecord {
    /// URL the viewer fetches the binary from.
    pub fn file_url(&self) -> String {
        format!("/uploads/{}", self.filename)
    }
}

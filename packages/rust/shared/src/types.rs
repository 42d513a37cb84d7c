//! Core domain types shared by the conversion pipelines.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// The format a pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Html,
    Pdf,
}

impl OutputFormat {
    /// File extension of outputs in this format, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

// ---------------------------------------------------------------------------
// SourceDocument
// ---------------------------------------------------------------------------

/// A Markdown file found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// File name as listed, e.g. `report.MD`.
    pub file_name: String,
    /// Directory the file was listed in.
    pub dir: PathBuf,
    /// File name without its extension, e.g. `report`.
    pub stem: String,
}

impl SourceDocument {
    /// Build a document from a listed file name. Returns `None` if the name
    /// has no stem.
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Option<Self> {
        let file_name = file_name.into();
        let stem = Path::new(&file_name).file_stem()?.to_str()?.to_string();
        Some(Self {
            dir: dir.into(),
            file_name,
            stem,
        })
    }

    /// Full path used to read the document.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

// ---------------------------------------------------------------------------
// OutputTarget
// ---------------------------------------------------------------------------

/// Where a converted document lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub dir: PathBuf,
    pub file_name: String,
}

impl OutputTarget {
    /// Derive the target for `doc` in `dir`: stem plus the format's extension,
    /// whatever the casing of the source extension.
    pub fn for_document(doc: &SourceDocument, dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            dir: dir.into(),
            file_name: format!("{}.{}", doc.stem, format.extension()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

// ---------------------------------------------------------------------------
// ConversionResult
// ---------------------------------------------------------------------------

/// What a converter hands to the output writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionResult {
    /// Rendered content that still has to be written.
    Rendered(String),
    /// The engine already wrote the output file itself. `warnings` lists
    /// problems that did not stop the file from being produced.
    Written { warnings: Vec<String> },
}

impl ConversionResult {
    /// Non-fatal problems reported alongside the result.
    pub fn warnings(&self) -> &[String] {
        match self {
            Self::Rendered(_) => &[],
            Self::Written { warnings } => warnings,
        }
    }
}

//! Markdown-to-PDF engines.
//!
//! An engine takes a source path and a destination path, performs its own
//! read and write, and reports only completion. Two engines exist:
//! - [`BuiltinEngine`]: in-process layout with `printpdf` base-14 fonts
//! - [`CommandEngine`]: an external program such as `pandoc`

mod builtin;
mod command;
mod layout;

use std::path::Path;

use mdpress_shared::{HtmlConfig, PdfConfig, PdfEngineKind, Result};

pub use builtin::BuiltinEngine;
pub use command::CommandEngine;
pub use layout::{LayoutError, LayoutOptions, LayoutStats, write_pdf};

/// The engine selected by `pdf.engine`.
#[derive(Clone)]
pub enum PdfEngine {
    Builtin(BuiltinEngine),
    Command(CommandEngine),
}

impl PdfEngine {
    pub fn from_config(pdf: &PdfConfig, html: &HtmlConfig) -> Self {
        match pdf.engine {
            PdfEngineKind::Builtin => Self::Builtin(BuiltinEngine::new(pdf, html)),
            PdfEngineKind::Command => Self::Command(CommandEngine::from_config(pdf)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Builtin(_) => "builtin",
            Self::Command(_) => "command",
        }
    }

    /// Convert `source` into a PDF at `dest`. Returns once the file is
    /// written, with any warnings about content that could not be kept.
    pub async fn render(&self, source: &Path, dest: &Path) -> Result<Vec<String>> {
        match self {
            Self::Builtin(engine) => engine.render(source, dest).await,
            Self::Command(engine) => engine.render(source, dest).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_follows_config() {
        let mut pdf = PdfConfig::default();
        let html = HtmlConfig::default();
        assert_eq!(PdfEngine::from_config(&pdf, &html).name(), "builtin");

        pdf.engine = PdfEngineKind::Command;
        assert_eq!(PdfEngine::from_config(&pdf, &html).name(), "command");
    }
}

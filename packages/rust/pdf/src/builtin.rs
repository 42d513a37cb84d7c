//! In-process PDF engine: comrak → layout blocks → printpdf.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use mdpress_markdown::{HtmlRenderer, extract_blocks};
use mdpress_shared::{HtmlConfig, MdpressError, PdfConfig, Result};

use crate::layout::{self, LayoutOptions};

/// Renders PDFs without external tools. The engine reads the source and
/// writes the destination itself, on the blocking thread pool.
#[derive(Clone)]
pub struct BuiltinEngine {
    renderer: Arc<HtmlRenderer>,
    layout: LayoutOptions,
}

impl BuiltinEngine {
    pub fn new(pdf: &PdfConfig, html: &HtmlConfig) -> Self {
        // Standalone wrapping only matters for HTML files on disk.
        let html = HtmlConfig {
            standalone: false,
            ..html.clone()
        };
        Self {
            renderer: Arc::new(HtmlRenderer::new(&html)),
            layout: LayoutOptions {
                page_size: pdf.page_size,
                font_size: pdf.font_size,
                margin_mm: pdf.margin_mm,
                font: pdf.font.clone(),
            },
        }
    }

    /// Write `dest` from `source`. Returns warnings about content the
    /// output could not represent.
    #[instrument(skip(self))]
    pub async fn render(&self, source: &Path, dest: &Path) -> Result<Vec<String>> {
        let engine = self.clone();
        let source = source.to_path_buf();
        let dest = dest.to_path_buf();
        let task_source = source.clone();

        tokio::task::spawn_blocking(move || engine.render_blocking(&task_source, &dest))
            .await
            .map_err(|e| MdpressError::conversion(&source, format!("pdf task failed: {e}")))?
    }

    fn render_blocking(&self, source: &Path, dest: &Path) -> Result<Vec<String>> {
        let markdown = std::fs::read_to_string(source)
            .map_err(|e| MdpressError::conversion(source, e.to_string()))?;

        let fragment = self.renderer.render_fragment(source, &markdown)?;
        let blocks = extract_blocks(&fragment.html);
        let title = fragment.title_or_stem(source);

        debug!(blocks = blocks.len(), %title, "laying out pdf");
        let stats = layout::write_pdf(&title, &blocks, &self.layout, dest)
            .map_err(|e| MdpressError::conversion(source, e.to_string()))?;
        debug!(pages = stats.pages, replaced = stats.replaced_chars, "pdf laid out");

        let mut warnings = Vec::new();
        if stats.replaced_chars > 0 {
            warnings.push(format!(
                "{} characters outside the builtin fonts were replaced with '?'; \
                 set pdf.font to a TrueType font that covers them",
                stats.replaced_chars
            ));
        }
        Ok(warnings)
    }
}

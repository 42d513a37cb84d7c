//! Converter adapters: one per output format behind a common trait.
//!
//! The HTML adapter returns rendered content for the writer; the PDF
//! adapter hands paths to an engine that writes the file itself and only
//! reports completion.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use mdpress_markdown::HtmlRenderer;
use mdpress_pdf::PdfEngine;
use mdpress_shared::{
    ConversionResult, MdpressError, OutputFormat, OutputTarget, Result, SourceDocument,
};

/// Converts one source document for a pipeline.
pub trait Converter: Send + Sync + 'static {
    /// Format this converter produces.
    fn format(&self) -> OutputFormat;

    /// Convert `doc`. `target` is where the output belongs; converters that
    /// return [`ConversionResult::Rendered`] must not write it themselves.
    fn convert(
        &self,
        doc: &SourceDocument,
        target: &OutputTarget,
    ) -> impl Future<Output = Result<ConversionResult>> + Send;
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

/// Reads the source into memory and renders it to an HTML string.
#[derive(Clone)]
pub struct HtmlConverter {
    renderer: Arc<HtmlRenderer>,
}

impl HtmlConverter {
    pub fn new(renderer: HtmlRenderer) -> Self {
        Self {
            renderer: Arc::new(renderer),
        }
    }
}

impl Converter for HtmlConverter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Html
    }

    async fn convert(
        &self,
        doc: &SourceDocument,
        _target: &OutputTarget,
    ) -> Result<ConversionResult> {
        let path = doc.path();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| MdpressError::read(&path, e.to_string()))?;
        let markdown =
            String::from_utf8(bytes).map_err(|e| MdpressError::read(&path, e.to_string()))?;

        let html = self.renderer.render(&path, &markdown)?;
        debug!(file = %doc.file_name, bytes = html.len(), "rendered html");
        Ok(ConversionResult::Rendered(html))
    }
}

// ---------------------------------------------------------------------------
// PDF
// ---------------------------------------------------------------------------

/// Delegates to a [`PdfEngine`], which writes straight to the target path.
#[derive(Clone)]
pub struct PdfConverter {
    engine: Arc<PdfEngine>,
}

impl PdfConverter {
    pub fn new(engine: PdfEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

impl Converter for PdfConverter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Pdf
    }

    async fn convert(
        &self,
        doc: &SourceDocument,
        target: &OutputTarget,
    ) -> Result<ConversionResult> {
        let dest = target.path();
        let warnings = self.engine.render(&doc.path(), &dest).await?;
        debug!(file = %doc.file_name, engine = self.engine.name(), "pdf written");
        Ok(ConversionResult::Written { warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdpress_shared::{HtmlConfig, PdfConfig};
    use std::path::PathBuf;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mdpress-convert-{tag}-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[tokio::test]
    async fn html_converter_returns_content_without_writing() {
        let dir = temp_dir("html");
        std::fs::write(dir.join("a.md"), "# Hello").unwrap();
        let doc = SourceDocument::new(&dir, "a.md").unwrap();
        let target = OutputTarget::for_document(&doc, dir.join("out"), OutputFormat::Html);

        let converter = HtmlConverter::new(HtmlRenderer::default());
        let result = converter.convert(&doc, &target).await.expect("convert");

        match result {
            ConversionResult::Rendered(html) => assert!(html.contains("<h1>Hello</h1>")),
            other => panic!("expected rendered content, got {other:?}"),
        }
        assert!(!target.path().exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn html_converter_rejects_invalid_utf8() {
        let dir = temp_dir("utf8");
        std::fs::write(dir.join("bad.md"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        let doc = SourceDocument::new(&dir, "bad.md").unwrap();
        let target = OutputTarget::for_document(&doc, &dir, OutputFormat::Html);

        let err = HtmlConverter::new(HtmlRenderer::default())
            .convert(&doc, &target)
            .await
            .unwrap_err();
        assert!(matches!(err, MdpressError::Read { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn pdf_converter_signals_completion() {
        let dir = temp_dir("pdf");
        std::fs::write(dir.join("a.md"), "# Hello").unwrap();
        let doc = SourceDocument::new(&dir, "a.md").unwrap();
        let target = OutputTarget::for_document(&doc, &dir, OutputFormat::Pdf);

        let engine = PdfEngine::from_config(&PdfConfig::default(), &HtmlConfig::default());
        let result = PdfConverter::new(engine)
            .convert(&doc, &target)
            .await
            .expect("convert");

        assert_eq!(result, ConversionResult::Written { warnings: vec![] });
        assert!(std::fs::metadata(target.path()).unwrap().len() > 0);

        let _ = std::fs::remove_dir_all(&dir);
    }
}

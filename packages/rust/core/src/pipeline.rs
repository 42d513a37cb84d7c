//! End-to-end batch pipeline: scan → convert → write, one task per file.

use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, instrument, warn};

use mdpress_shared::{OutputFormat, OutputTarget, PipelineConfig, Result, SourceDocument};

use crate::convert::Converter;
use crate::scanner;
use crate::writer;

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Written to `output`. `warnings` are problems that did not stop the
    /// file from being produced.
    Converted {
        output: PathBuf,
        warnings: Vec<String>,
    },
    Failed { error: String },
    /// Not attempted; another file claimed the same output name.
    Skipped { reason: String },
}

/// Outcome for a single source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub file_name: String,
    pub status: FileStatus,
}

impl FileOutcome {
    fn converted(file_name: impl Into<String>, output: PathBuf, warnings: Vec<String>) -> Self {
        Self {
            file_name: file_name.into(),
            status: FileStatus::Converted { output, warnings },
        }
    }

    fn failed(file_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            status: FileStatus::Failed {
                error: error.into(),
            },
        }
    }

    fn skipped(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            status: FileStatus::Skipped {
                reason: reason.into(),
            },
        }
    }
}

/// Result of one pipeline run. Outcomes are in completion order.
#[derive(Debug)]
pub struct RunReport {
    pub format: OutputFormat,
    pub outcomes: Vec<FileOutcome>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn converted(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Converted { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    /// Outcome for `file_name`, if the file was seen.
    pub fn outcome(&self, file_name: &str) -> Option<&FileOutcome> {
        self.outcomes.iter().find(|o| o.file_name == file_name)
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called once dispatch begins, with the number of files to convert.
    fn started(&self, format: OutputFormat, total: usize);
    /// Called as each file settles.
    fn file_done(&self, format: OutputFormat, outcome: &FileOutcome);
    /// Called when every dispatched file has settled.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn started(&self, _format: OutputFormat, _total: usize) {}
    fn file_done(&self, _format: OutputFormat, _outcome: &FileOutcome) {}
    fn done(&self, _report: &RunReport) {}
}

/// One output format's batch conversion over a source directory.
pub struct Pipeline<C: Converter> {
    config: PipelineConfig,
    converter: Arc<C>,
}

impl<C: Converter> Pipeline<C> {
    pub fn new(config: PipelineConfig, converter: C) -> Self {
        Self {
            config,
            converter: Arc::new(converter),
        }
    }

    /// Run the full pipeline.
    ///
    /// 1. Ensure the destination directory exists
    /// 2. Scan the source directory
    /// 3. Drop documents whose output names collide
    /// 4. Convert every document in its own task
    /// 5. Wait for all tasks, collecting per-file outcomes
    ///
    /// Only directory-level failures return `Err`; per-file failures are
    /// recorded in the report.
    #[instrument(skip_all, fields(
        format = %self.converter.format(),
        source = %self.config.source_dir.display(),
        dest = %self.config.dest_dir.display()
    ))]
    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<RunReport> {
        let start = Instant::now();
        let format = self.converter.format();

        writer::ensure_dir(&self.config.dest_dir)
            .await
            .inspect_err(|e| error!(error = %e, "cannot create destination directory"))?;

        let documents = scanner::scan(&self.config.source_dir)
            .await
            .inspect_err(|e| error!(error = %e, "cannot list source directory"))?;

        let (documents, collisions) = scanner::resolve_collisions(documents);
        info!(files = documents.len(), "starting conversion");
        progress.started(format, documents.len());

        let mut outcomes = Vec::with_capacity(documents.len() + collisions.len());
        for collision in collisions {
            warn!(
                file = %collision.dropped.file_name,
                kept = %collision.kept.file_name,
                "output name collision, skipping file"
            );
            let outcome = FileOutcome::skipped(
                collision.dropped.file_name,
                format!("output name collides with {}", collision.kept.file_name),
            );
            progress.file_done(format, &outcome);
            outcomes.push(outcome);
        }

        let limiter = self
            .config
            .max_concurrency
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));
        let mut in_flight = HashMap::new();
        let mut tasks = JoinSet::new();

        for doc in documents {
            let target = OutputTarget::for_document(&doc, &self.config.dest_dir, format);
            let converter = Arc::clone(&self.converter);
            let limiter = limiter.clone();
            let (task_doc, task_target) = (doc.clone(), target.clone());

            let handle = tasks.spawn(async move {
                let _permit = match limiter {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                convert_one(converter.as_ref(), &task_doc, &task_target).await
            });
            in_flight.insert(handle.id(), (doc, target));
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, Ok(result)),
                Err(e) => (e.id(), Err(e)),
            };
            let Some((doc, target)) = in_flight.remove(&id) else {
                continue;
            };

            let outcome = match result {
                Ok(Ok(warnings)) => {
                    let output = target.path();
                    info!(file = %doc.file_name, output = %output.display(), "converted");
                    for warning in &warnings {
                        warn!(file = %doc.file_name, %warning, "converted with warnings");
                    }
                    FileOutcome::converted(doc.file_name, output, warnings)
                }
                Ok(Err(e)) => {
                    warn!(file = %doc.file_name, error = %e, "conversion failed, skipping file");
                    FileOutcome::failed(doc.file_name, e.to_string())
                }
                Err(e) => {
                    let reason = task_failure(e);
                    error!(file = %doc.file_name, error = %reason, "conversion task aborted");
                    FileOutcome::failed(doc.file_name, reason)
                }
            };
            progress.file_done(format, &outcome);
            outcomes.push(outcome);
        }

        let report = RunReport {
            format,
            outcomes,
            elapsed: start.elapsed(),
        };
        info!(
            converted = report.converted(),
            failed = report.failed(),
            skipped = report.skipped(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "pipeline complete"
        );
        progress.done(&report);

        Ok(report)
    }
}

/// Convert and write one document, returning the converter's warnings.
async fn convert_one<C: Converter>(
    converter: &C,
    doc: &SourceDocument,
    target: &OutputTarget,
) -> Result<Vec<String>> {
    let result = converter.convert(doc, target).await?;
    let warnings = result.warnings().to_vec();
    writer::write_output(target, result).await?;
    Ok(warnings)
}

fn task_failure(e: JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload: Box<dyn Any + Send> = e.into_panic();
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    format!("conversion task panicked: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{HtmlConverter, PdfConverter};
    use mdpress_markdown::HtmlRenderer;
    use mdpress_pdf::PdfEngine;
    use mdpress_shared::{ConversionResult, HtmlConfig, MdpressError, PdfConfig};
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mdpress-pipeline-{tag}-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(dir.join("src")).expect("create src");
        dir
    }

    fn html_pipeline(root: &Path) -> Pipeline<HtmlConverter> {
        Pipeline::new(
            PipelineConfig::new(root.join("src"), root.join("html")),
            HtmlConverter::new(HtmlRenderer::default()),
        )
    }

    fn pdf_pipeline(root: &Path) -> Pipeline<PdfConverter> {
        let engine = PdfEngine::from_config(&PdfConfig::default(), &HtmlConfig::default());
        Pipeline::new(
            PipelineConfig::new(root.join("src"), root.join("pdf")),
            PdfConverter::new(engine),
        )
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .expect("read dir")
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[derive(Default)]
    struct RecordingProgress {
        started: Mutex<Option<usize>>,
        seen: Mutex<Vec<String>>,
        done: AtomicUsize,
    }

    impl ProgressReporter for RecordingProgress {
        fn started(&self, _format: OutputFormat, total: usize) {
            *self.started.lock().unwrap() = Some(total);
        }
        fn file_done(&self, _format: OutputFormat, outcome: &FileOutcome) {
            self.seen.lock().unwrap().push(outcome.file_name.clone());
        }
        fn done(&self, _report: &RunReport) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn html_end_to_end() {
        let root = temp_root("html-e2e");
        std::fs::write(root.join("src/a.md"), "# Hello").unwrap();

        let report = html_pipeline(&root).run(&SilentProgress).await.expect("run");

        assert_eq!(report.converted(), 1);
        let html = std::fs::read_to_string(root.join("html/a.html")).expect("a.html");
        assert!(html.contains("<h1>Hello</h1>"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn pdf_end_to_end() {
        let root = temp_root("pdf-e2e");
        std::fs::write(root.join("src/a.md"), "# Hello").unwrap();

        let report = pdf_pipeline(&root).run(&SilentProgress).await.expect("run");

        assert_eq!(report.converted(), 1);
        let bytes = std::fs::read(root.join("pdf/a.pdf")).expect("a.pdf");
        assert!(!bytes.is_empty());
        assert!(bytes.starts_with(b"%PDF"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn only_markdown_files_produce_outputs() {
        let root = temp_root("filter");
        std::fs::write(root.join("src/a.md"), "a").unwrap();
        std::fs::write(root.join("src/report.MD"), "# Report").unwrap();
        std::fs::write(root.join("src/notes.txt"), "n").unwrap();
        std::fs::write(root.join("src/page.html"), "<p>p</p>").unwrap();

        let report = html_pipeline(&root).run(&SilentProgress).await.expect("run");

        assert_eq!(report.converted(), 2);
        assert_eq!(dir_names(&root.join("html")), vec!["a.html", "report.html"]);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn pdf_pipeline_converts_only_markdown_files() {
        let root = temp_root("pdf-filter");
        std::fs::write(root.join("src/a.md"), "a").unwrap();
        std::fs::write(root.join("src/report.MD"), "# Report").unwrap();
        std::fs::write(root.join("src/notes.txt"), "n").unwrap();
        std::fs::write(root.join("src/page.html"), "<p>p</p>").unwrap();

        let report = pdf_pipeline(&root).run(&SilentProgress).await.expect("run");

        assert_eq!(report.converted(), 2);
        assert_eq!(dir_names(&root.join("pdf")), vec!["a.pdf", "report.pdf"]);
        let bytes = std::fs::read(root.join("pdf/report.pdf")).unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn pdf_pipeline_isolates_a_bad_file() {
        let root = temp_root("pdf-isolation");
        for name in ["one", "two", "three"] {
            std::fs::write(root.join(format!("src/{name}.md")), format!("# {name}")).unwrap();
        }
        std::fs::write(root.join("src/broken.md"), [0xc3, 0x28, 0xff]).unwrap();

        let report = pdf_pipeline(&root).run(&SilentProgress).await.expect("run");

        assert_eq!(report.converted(), 3);
        assert_eq!(report.failed(), 1);
        match &report.outcome("broken.md").expect("broken reported").status {
            FileStatus::Failed { error } => assert!(error.contains("broken.md"), "got: {error}"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(
            dir_names(&root.join("pdf")),
            vec!["one.pdf", "three.pdf", "two.pdf"]
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn pdf_replacement_characters_are_reported_per_file() {
        let root = temp_root("pdf-warn");
        std::fs::write(root.join("src/zh.md"), "# 你好\n\n這是中文內容。").unwrap();
        std::fs::write(root.join("src/en.md"), "# Hello").unwrap();

        let report = pdf_pipeline(&root).run(&SilentProgress).await.expect("run");

        assert_eq!(report.converted(), 2);
        match &report.outcome("zh.md").expect("zh reported").status {
            FileStatus::Converted { warnings, .. } => {
                assert_eq!(warnings.len(), 1);
                assert!(warnings[0].contains("replaced"), "got: {}", warnings[0]);
            }
            other => panic!("expected conversion, got {other:?}"),
        }
        assert!(matches!(
            &report.outcome("en.md").expect("en reported").status,
            FileStatus::Converted { warnings, .. } if warnings.is_empty()
        ));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let root = temp_root("idempotent");
        std::fs::write(root.join("src/a.md"), "# A\n\n* x\n* y\n").unwrap();
        std::fs::write(root.join("src/b.md"), "para with `code`").unwrap();
        let pipeline = html_pipeline(&root);

        pipeline.run(&SilentProgress).await.expect("first run");
        let first_a = std::fs::read(root.join("html/a.html")).unwrap();
        let first_b = std::fs::read(root.join("html/b.html")).unwrap();

        let report = pipeline.run(&SilentProgress).await.expect("second run");
        assert_eq!(report.failed(), 0);
        assert_eq!(std::fs::read(root.join("html/a.html")).unwrap(), first_a);
        assert_eq!(std::fs::read(root.join("html/b.html")).unwrap(), first_b);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn creates_nested_destination() {
        let root = temp_root("nested-dest");
        std::fs::write(root.join("src/a.md"), "a").unwrap();
        let dest = root.join("out").join("deep").join("html");

        let pipeline = Pipeline::new(
            PipelineConfig::new(root.join("src"), &dest),
            HtmlConverter::new(HtmlRenderer::default()),
        );
        pipeline.run(&SilentProgress).await.expect("first run");
        assert!(dest.join("a.html").is_file());
        pipeline.run(&SilentProgress).await.expect("rerun with existing dir");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn one_bad_file_does_not_affect_others() {
        let root = temp_root("isolation");
        for name in ["one", "two", "three"] {
            std::fs::write(root.join(format!("src/{name}.md")), format!("# {name}")).unwrap();
        }
        std::fs::write(root.join("src/broken.md"), [0xc3, 0x28, 0xff]).unwrap();

        let progress = RecordingProgress::default();
        let report = html_pipeline(&root).run(&progress).await.expect("run");

        assert_eq!(report.converted(), 3);
        assert_eq!(report.failed(), 1);
        let broken = report.outcome("broken.md").expect("broken reported");
        assert!(matches!(broken.status, FileStatus::Failed { .. }));
        assert_eq!(
            dir_names(&root.join("html")),
            vec!["one.html", "three.html", "two.html"]
        );

        assert_eq!(*progress.started.lock().unwrap(), Some(4));
        assert_eq!(progress.seen.lock().unwrap().len(), 4);
        assert_eq!(progress.done.load(Ordering::SeqCst), 1);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn missing_source_directory_halts_pipeline() {
        let root = temp_root("missing-src");
        std::fs::remove_dir_all(root.join("src")).unwrap();

        let err = html_pipeline(&root).run(&SilentProgress).await.unwrap_err();
        assert!(matches!(err, MdpressError::DirectoryRead { .. }));

        let _ = std::fs::remove_dir_all(&root);
    }

    // Needs a case-sensitive filesystem to hold both names.
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn case_collision_keeps_one_and_reports_the_other() {
        let root = temp_root("collision");
        std::fs::write(root.join("src/Report.md"), "# upper").unwrap();
        std::fs::write(root.join("src/report.MD"), "# lower").unwrap();

        let report = html_pipeline(&root).run(&SilentProgress).await.expect("run");

        assert_eq!(report.converted(), 1);
        assert_eq!(report.skipped(), 1);
        let skipped = report.outcome("Report.md").expect("reported");
        assert!(matches!(skipped.status, FileStatus::Skipped { .. }));
        let html = std::fs::read_to_string(root.join("html/report.html")).unwrap();
        assert!(html.contains("lower"));

        let _ = std::fs::remove_dir_all(&root);
    }

    /// Counts how many conversions run at once.
    struct GaugeConverter {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Converter for GaugeConverter {
        fn format(&self) -> OutputFormat {
            OutputFormat::Html
        }

        async fn convert(
            &self,
            _doc: &SourceDocument,
            _target: &OutputTarget,
        ) -> Result<ConversionResult> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(ConversionResult::Rendered(String::new()))
        }
    }

    #[tokio::test]
    async fn max_concurrency_bounds_in_flight_conversions() {
        let root = temp_root("limit");
        for i in 0..8 {
            std::fs::write(root.join(format!("src/f{i}.md")), "x").unwrap();
        }
        let mut config = PipelineConfig::new(root.join("src"), root.join("html"));
        config.max_concurrency = Some(2);
        let pipeline = Pipeline::new(
            config,
            GaugeConverter {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            },
        );

        let report = pipeline.run(&SilentProgress).await.expect("run");
        assert_eq!(report.converted(), 8);
        assert!(pipeline.converter.peak.load(Ordering::SeqCst) <= 2);

        let _ = std::fs::remove_dir_all(&root);
    }

    struct PanickingConverter;

    impl Converter for PanickingConverter {
        fn format(&self) -> OutputFormat {
            OutputFormat::Html
        }

        async fn convert(
            &self,
            doc: &SourceDocument,
            _target: &OutputTarget,
        ) -> Result<ConversionResult> {
            if doc.stem.starts_with("boom") {
                panic!("renderer crashed on {}", doc.stem);
            }
            Ok(ConversionResult::Rendered("ok".into()))
        }
    }

    #[tokio::test]
    async fn panicking_task_is_reported_as_failure() {
        let root = temp_root("panic");
        std::fs::write(root.join("src/boom-a.md"), "x").unwrap();
        std::fs::write(root.join("src/boom-b.md"), "x").unwrap();
        std::fs::write(root.join("src/fine.md"), "y").unwrap();

        let pipeline = Pipeline::new(
            PipelineConfig::new(root.join("src"), root.join("html")),
            PanickingConverter,
        );
        let report = pipeline.run(&SilentProgress).await.expect("run");

        assert_eq!(report.converted(), 1);
        assert_eq!(report.failed(), 2);
        for stem in ["boom-a", "boom-b"] {
            let outcome = report.outcome(&format!("{stem}.md")).expect("reported");
            match &outcome.status {
                FileStatus::Failed { error } => {
                    assert!(error.contains("panicked"), "got: {error}");
                    assert!(error.ends_with(&format!("crashed on {stem}")), "got: {error}");
                }
                other => panic!("expected failure, got {other:?}"),
            }
        }

        let _ = std::fs::remove_dir_all(&root);
    }
}

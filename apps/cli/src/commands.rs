//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use mdpress_core::{
    Converter, FileOutcome, FileStatus, HtmlConverter, PdfConverter, Pipeline, ProgressReporter,
    RunReport,
};
use mdpress_markdown::HtmlRenderer;
use mdpress_pdf::PdfEngine;
use mdpress_shared::{
    AppConfig, OutputFormat, PipelineConfig, config_file_path, init_config, load_config,
    project_config_path,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// mdpress: batch-convert a directory of Markdown into HTML and PDF.
#[derive(Parser)]
#[command(
    name = "mdpress",
    version,
    about = "Batch-convert Markdown files into HTML and PDF.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Project root holding `src/`, `html/` and `pdf/` (defaults to the current directory).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Config file (defaults to <root>/mdpress.toml, then ~/.mdpress/mdpress.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Directory overrides shared by the single-format commands.
#[derive(clap::Args, Default)]
pub(crate) struct DirArgs {
    /// Source directory (overrides `paths.source_dir`).
    #[arg(long)]
    pub src: Option<PathBuf>,

    /// Destination directory (overrides the format's output dir).
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Convert every Markdown file in the source directory to HTML.
    Html(DirArgs),

    /// Convert every Markdown file in the source directory to PDF.
    Pdf(DirArgs),

    /// Run the HTML and PDF pipelines side by side.
    All,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a config file with defaults.
    Init {
        /// Write to ~/.mdpress/mdpress.toml instead of the project root.
        #[arg(long)]
        global: bool,
    },
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "mdpress=info",
        1 => "mdpress=debug",
        _ => "mdpress=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let root = resolve_root(cli.root)?;
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Html(dirs) => cmd_convert(&root, config_path, OutputFormat::Html, &dirs).await,
        Command::Pdf(dirs) => cmd_convert(&root, config_path, OutputFormat::Pdf, &dirs).await,
        Command::All => cmd_all(&root, config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init { global } => cmd_config_init(&root, global),
            ConfigAction::Show => cmd_config_show(&root, config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// The project root: `--root` when given, else the current directory.
fn resolve_root(flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag {
        Some(root) => Ok(root),
        None => std::env::current_dir()
            .map_err(|e| eyre!("cannot determine working directory: {e}")),
    }
}

/// Load the config with relative file settings anchored at `root`.
fn load_project_config(root: &Path, config_path: Option<&Path>) -> Result<AppConfig> {
    let mut config = load_config(root, config_path)?;
    config.pdf.font = config.pdf.font.map(|font| root.join(font));
    Ok(config)
}

fn resolve_pipeline(
    config: &AppConfig,
    root: &Path,
    format: OutputFormat,
    dirs: &DirArgs,
) -> PipelineConfig {
    let mut pipeline = PipelineConfig::resolve(config, root, format);
    if let Some(src) = &dirs.src {
        pipeline.source_dir = root.join(src);
    }
    if let Some(out) = &dirs.out {
        pipeline.dest_dir = root.join(out);
    }
    pipeline
}

async fn cmd_convert(
    root: &Path,
    config_path: Option<&Path>,
    format: OutputFormat,
    dirs: &DirArgs,
) -> Result<()> {
    let config = load_project_config(root, config_path)?;
    let pipeline = resolve_pipeline(&config, root, format, dirs);
    let progress = CliProgress::new(MultiProgress::new());

    let report = match format {
        OutputFormat::Html => run_html(&config, pipeline, &progress).await?,
        OutputFormat::Pdf => run_pdf(&config, pipeline, &progress).await?,
    };
    print_summary(&report);
    Ok(())
}

async fn cmd_all(root: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_project_config(root, config_path)?;
    let dirs = DirArgs::default();
    let html = resolve_pipeline(&config, root, OutputFormat::Html, &dirs);
    let pdf = resolve_pipeline(&config, root, OutputFormat::Pdf, &dirs);

    let multi = MultiProgress::new();
    let html_progress = CliProgress::new(multi.clone());
    let pdf_progress = CliProgress::new(multi);

    info!(root = %root.display(), "running html and pdf pipelines");
    let (html_report, pdf_report) = tokio::join!(
        run_html(&config, html, &html_progress),
        run_pdf(&config, pdf, &pdf_progress),
    );

    // Report whichever pipeline finished before surfacing a failure.
    let settled = settle([html_report, pdf_report]);
    for report in &settled.reports {
        print_summary(report);
    }
    for e in &settled.also_failed {
        eprintln!("error: {e}");
    }
    match settled.first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Results of pipelines run side by side.
struct Settled<T, E> {
    reports: Vec<T>,
    /// Returned to the caller, which prints it.
    first_error: Option<E>,
    /// Failures after the first; printed here since only one can be returned.
    also_failed: Vec<E>,
}

fn settle<T, E>(results: impl IntoIterator<Item = std::result::Result<T, E>>) -> Settled<T, E> {
    let mut settled = Settled {
        reports: Vec::new(),
        first_error: None,
        also_failed: Vec::new(),
    };
    for result in results {
        match result {
            Ok(report) => settled.reports.push(report),
            Err(e) if settled.first_error.is_none() => settled.first_error = Some(e),
            Err(e) => settled.also_failed.push(e),
        }
    }
    settled
}

async fn run_html(
    config: &AppConfig,
    pipeline: PipelineConfig,
    progress: &CliProgress,
) -> mdpress_shared::Result<RunReport> {
    let converter = HtmlConverter::new(HtmlRenderer::new(&config.html));
    run_pipeline(pipeline, converter, progress).await
}

async fn run_pdf(
    config: &AppConfig,
    pipeline: PipelineConfig,
    progress: &CliProgress,
) -> mdpress_shared::Result<RunReport> {
    let engine = PdfEngine::from_config(&config.pdf, &config.html);
    info!(engine = engine.name(), "pdf engine selected");
    run_pipeline(pipeline, PdfConverter::new(engine), progress).await
}

async fn run_pipeline<C: Converter>(
    pipeline: PipelineConfig,
    converter: C,
    progress: &CliProgress,
) -> mdpress_shared::Result<RunReport> {
    let result = Pipeline::new(pipeline, converter).run(progress).await;
    progress.finish();
    result
}

fn print_summary(report: &RunReport) {
    println!(
        "{}: {} converted, {} failed, {} skipped in {:.1}s",
        report.format,
        report.converted(),
        report.failed(),
        report.skipped(),
        report.elapsed.as_secs_f64()
    );
}

fn cmd_config_init(root: &Path, global: bool) -> Result<()> {
    let path = if global {
        config_file_path()?
    } else {
        project_config_path(root)
    };
    let path = init_config(&path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(root: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(root, config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar per pipeline.
///
/// Per-file lines go to stdout (success) and stderr (failure) with the bars
/// suspended, so they survive when output is not a terminal.
struct CliProgress {
    multi: MultiProgress,
    bar: ProgressBar,
}

impl CliProgress {
    fn new(multi: MultiProgress) -> Self {
        let bar = multi.add(ProgressBar::new(0));
        bar.set_style(
            ProgressStyle::with_template("{prefix:>5} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { multi, bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn started(&self, format: OutputFormat, total: usize) {
        self.bar.set_prefix(format.to_string());
        self.bar.set_length(total as u64);
    }

    fn file_done(&self, _format: OutputFormat, outcome: &FileOutcome) {
        match &outcome.status {
            FileStatus::Converted { output, warnings } => {
                self.multi.suspend(|| {
                    println!("{} -> {}", outcome.file_name, output.display());
                    for warning in warnings {
                        eprintln!("{} warning: {warning}", outcome.file_name);
                    }
                });
                self.bar.inc(1);
            }
            FileStatus::Failed { error } => {
                self.multi
                    .suspend(|| eprintln!("{} failed: {error}", outcome.file_name));
                self.bar.inc(1);
            }
            FileStatus::Skipped { reason } => {
                self.multi
                    .suspend(|| eprintln!("{} skipped: {reason}", outcome.file_name));
            }
        }
        self.bar.set_message(outcome.file_name.clone());
    }

    fn done(&self, _report: &RunReport) {}
}

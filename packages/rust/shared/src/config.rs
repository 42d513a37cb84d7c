//! Application configuration for mdpress.
//!
//! Lookup order: an explicit `--config` file, then `<root>/mdpress.toml`,
//! then `~/.mdpress/mdpress.toml`, then built-in defaults.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MdpressError, Result};
use crate::types::OutputFormat;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "mdpress.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".mdpress";

/// Placeholder substituted with the source path in PDF command args.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Placeholder substituted with the destination path in PDF command args.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

// ---------------------------------------------------------------------------
// Config structs (matching mdpress.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source and destination directories.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Markdown→HTML rendering options.
    #[serde(default)]
    pub html: HtmlConfig,

    /// Markdown→PDF engine options.
    #[serde(default)]
    pub pdf: PdfConfig,

    /// Scheduling options shared by both pipelines.
    #[serde(default)]
    pub run: RunConfig,
}

/// `[paths]` section. Relative paths resolve against the root directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    #[serde(default = "default_html_dir")]
    pub html_dir: PathBuf,

    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            html_dir: default_html_dir(),
            pdf_dir: default_pdf_dir(),
        }
    }
}

fn default_source_dir() -> PathBuf {
    "src".into()
}
fn default_html_dir() -> PathBuf {
    "html".into()
}
fn default_pdf_dir() -> PathBuf {
    "pdf".into()
}

/// `[html]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlConfig {
    /// GFM tables.
    #[serde(default = "default_true")]
    pub table: bool,

    /// GFM `~~strikethrough~~`.
    #[serde(default = "default_true")]
    pub strikethrough: bool,

    /// Bare URL autolinking.
    #[serde(default = "default_true")]
    pub autolink: bool,

    /// `- [ ]` task list items.
    #[serde(default = "default_true")]
    pub tasklist: bool,

    /// Emit `id` anchors on headings.
    #[serde(default)]
    pub header_ids: bool,

    /// Wrap output in a full HTML5 document instead of a fragment.
    #[serde(default)]
    pub standalone: bool,

    /// Stylesheet href linked from standalone documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<String>,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            table: true,
            strikethrough: true,
            autolink: true,
            tasklist: true,
            header_ids: false,
            standalone: false,
            stylesheet: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Which PDF engine converts documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfEngineKind {
    /// In-process layout with built-in fonts.
    Builtin,
    /// An external command such as `pandoc`.
    Command,
}

/// Paper sizes supported by the builtin engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in millimetres.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::Letter => (215.9, 279.4),
        }
    }
}

/// `[pdf]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    #[serde(default = "default_engine")]
    pub engine: PdfEngineKind,

    #[serde(default = "default_page_size")]
    pub page_size: PageSize,

    /// Body font size in points.
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// Page margin on every side, in millimetres.
    #[serde(default = "default_margin")]
    pub margin_mm: f32,

    /// TrueType font for the builtin engine. Without one, text is set in
    /// the PDF base-14 fonts and characters outside Latin-1 become `?`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<PathBuf>,

    /// Program run by the `command` engine.
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments for `command`; `{input}` and `{output}` are substituted.
    #[serde(default = "default_command_args")]
    pub args: Vec<String>,

    /// Kill the command after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            page_size: default_page_size(),
            font_size: default_font_size(),
            margin_mm: default_margin(),
            font: None,
            command: default_command(),
            args: default_command_args(),
            command_timeout_secs: None,
        }
    }
}

fn default_engine() -> PdfEngineKind {
    PdfEngineKind::Builtin
}
fn default_page_size() -> PageSize {
    PageSize::A4
}
fn default_font_size() -> f32 {
    11.0
}
fn default_margin() -> f32 {
    20.0
}
fn default_command() -> String {
    "pandoc".into()
}
fn default_command_args() -> Vec<String> {
    vec![
        INPUT_PLACEHOLDER.into(),
        "-o".into(),
        OUTPUT_PLACEHOLDER.into(),
    ]
}

/// `[run]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum conversions in flight per pipeline. `0` means unbounded.
    #[serde(default)]
    pub max_concurrency: usize,
}

impl AppConfig {
    /// Reject values no pipeline could run with.
    pub fn validate(&self) -> Result<()> {
        let pdf = &self.pdf;
        if !pdf.font_size.is_finite() || pdf.font_size <= 0.0 {
            return Err(MdpressError::config(format!(
                "pdf.font_size must be positive, got {}",
                pdf.font_size
            )));
        }
        let (width, height) = pdf.page_size.dimensions_mm();
        if !pdf.margin_mm.is_finite()
            || pdf.margin_mm < 0.0
            || pdf.margin_mm * 2.0 >= width.min(height)
        {
            return Err(MdpressError::config(format!(
                "pdf.margin_mm {} leaves no room on the page",
                pdf.margin_mm
            )));
        }
        if pdf.engine == PdfEngineKind::Command {
            if pdf.command.trim().is_empty() {
                return Err(MdpressError::config("pdf.command must not be empty"));
            }
            if !pdf.args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER)) {
                return Err(MdpressError::config(format!(
                    "pdf.args must contain the {OUTPUT_PLACEHOLDER} placeholder"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory scanned for Markdown files.
    pub source_dir: PathBuf,
    /// Directory outputs are written to.
    pub dest_dir: PathBuf,
    /// Cap on in-flight conversions; `None` dispatches everything at once.
    pub max_concurrency: Option<usize>,
}

impl PipelineConfig {
    pub fn new(source_dir: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
            max_concurrency: None,
        }
    }

    /// Resolve the directories for `format` against `root`.
    pub fn resolve(config: &AppConfig, root: &Path, format: OutputFormat) -> Self {
        let dest = match format {
            OutputFormat::Html => &config.paths.html_dir,
            OutputFormat::Pdf => &config.paths.pdf_dir,
        };
        Self {
            source_dir: root.join(&config.paths.source_dir),
            dest_dir: root.join(dest),
            max_concurrency: (config.run.max_concurrency > 0).then_some(config.run.max_concurrency),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the user config directory (`~/.mdpress/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MdpressError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.mdpress/mdpress.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Path of the project-local config file for `root`.
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

/// Load the application config for `root`. An explicit path must exist;
/// otherwise the project file, then the user file, then defaults are used.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    let project = project_config_path(root);
    if project.is_file() {
        return load_config_from(&project);
    }

    match config_file_path() {
        Ok(user) if user.is_file() => load_config_from(&user),
        _ => {
            tracing::debug!(root = %root.display(), "no config file found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MdpressError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        MdpressError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;

    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Write a default config file to `path`, creating parent directories.
/// Refuses to overwrite an existing file.
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(MdpressError::config(format!(
            "{} already exists",
            path.display()
        )));
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| MdpressError::io(dir, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MdpressError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| MdpressError::io(path, e))?;
    tracing::info!(path = %path.display(), "created default config file");

    Ok(path.to_path_buf())
}

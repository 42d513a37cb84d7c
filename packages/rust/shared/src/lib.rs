//! Shared types, error model, and configuration for mdpress.
//!
//! This crate is the foundation depended on by all other mdpress crates.
//! It provides:
//! - [`MdpressError`]: the unified error type
//! - Domain types ([`SourceDocument`], [`OutputTarget`], [`ConversionResult`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, HtmlConfig, INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER, PageSize, PathsConfig,
    PdfConfig, PdfEngineKind, PipelineConfig, RunConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, project_config_path,
};
pub use error::{MdpressError, Result};
pub use types::{ConversionResult, OutputFormat, OutputTarget, SourceDocument};

//! Batch conversion pipelines for mdpress.
//!
//! This crate ties scanning, format-specific conversion, and output writing
//! into one generic [`pipeline::Pipeline`], instantiated once per format.

pub mod convert;
pub mod pipeline;
pub mod scanner;
pub mod writer;

pub use convert::{Converter, HtmlConverter, PdfConverter};
pub use pipeline::{FileOutcome, FileStatus, Pipeline, ProgressReporter, RunReport, SilentProgress};
pub use scanner::{Collision, Scanner, is_markdown, resolve_collisions, scan};

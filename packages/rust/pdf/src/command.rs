//! External-command PDF engine (e.g. `pandoc {input} -o {output}`).

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, instrument};

use mdpress_shared::{INPUT_PLACEHOLDER, MdpressError, OUTPUT_PLACEHOLDER, PdfConfig, Result};

/// Runs a configured program that reads the source and writes the PDF.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    pub fn from_config(config: &PdfConfig) -> Self {
        Self {
            program: config.command.clone(),
            args: config.args.clone(),
            timeout: config.command_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Arguments with `{input}` and `{output}` substituted.
    pub fn expand_args(&self, source: &Path, dest: &Path) -> Vec<String> {
        let input = source.to_string_lossy();
        let output = dest.to_string_lossy();
        self.args
            .iter()
            .map(|a| {
                a.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }

    /// Run the command and wait for it. Success requires a zero exit status
    /// and a non-empty file at `dest`. Output left by an earlier run is
    /// removed first, so only this run's file can satisfy the check.
    #[instrument(skip(self), fields(program = %self.program))]
    pub async fn render(&self, source: &Path, dest: &Path) -> Result<Vec<String>> {
        match tokio::fs::remove_file(dest).await {
            Ok(()) => debug!(dest = %dest.display(), "removed previous output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(MdpressError::conversion(
                    source,
                    format!("cannot remove previous {}: {e}", dest.display()),
                ));
            }
        }

        let args = self.expand_args(source, dest);
        debug!(?args, "spawning pdf command");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MdpressError::conversion(
                    source,
                    format!("failed to spawn `{}`: {e}", self.program),
                )
            })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    MdpressError::conversion(
                        source,
                        format!("`{}` timed out after {}s", self.program, limit.as_secs()),
                    )
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| MdpressError::conversion(source, format!("`{}` failed: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or("").trim();
            return Err(MdpressError::conversion(
                source,
                format!("`{}` exited with {}: {detail}", self.program, output.status),
            ));
        }

        match tokio::fs::metadata(dest).await {
            Ok(meta) if meta.len() > 0 => Ok(Vec::new()),
            Ok(_) => Err(MdpressError::conversion(
                source,
                format!("`{}` produced an empty {}", self.program, dest.display()),
            )),
            Err(e) => Err(MdpressError::conversion(
                source,
                format!("`{}` did not produce {}: {e}", self.program, dest.display()),
            )),
        }
    }
}

//! Output writer: destination directories and rendered content.

use std::path::Path;

use tracing::debug;

use mdpress_shared::{ConversionResult, MdpressError, OutputTarget, Result};

/// Create `dir` and any missing parents. A no-op if it already exists.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| MdpressError::write(dir, e))
}

/// Persist a conversion result at `target`.
///
/// Rendered content overwrites whatever is at the path. A completion
/// signal means the engine already wrote the file, so nothing happens.
pub async fn write_output(target: &OutputTarget, result: ConversionResult) -> Result<()> {
    match result {
        ConversionResult::Rendered(content) => {
            let path = target.path();
            tokio::fs::write(&path, content.as_bytes())
                .await
                .map_err(|e| MdpressError::write(&path, e))?;
            debug!(path = %path.display(), bytes = content.len(), "wrote output");
            Ok(())
        }
        ConversionResult::Written { .. } => Ok(()),
    }
}

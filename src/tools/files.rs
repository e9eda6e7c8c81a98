use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{error, info};

use super::ToolError;
use crate::render::RenderedImage;

/// Creates `path` and any missing ancestors. Succeeds when it already exists.
pub fn ensure_directory(path: impl AsRef<Path>) -> Result<String, ToolError> {
    let path = path.as_ref();
    fs::create_dir_all(path).map_err(|e| ToolError::io(path, e))?;
    info!(path = %path.display(), "directory ensured");
    Ok(format!("Directory created successfully at: {}", path.display()))
}

/// Writes the encoded figure to `filename` verbatim, making sure the
/// visualization directory exists first.
///
/// Returns `None` on any I/O failure after logging it, so an automated caller
/// can carry on with the session.
pub fn save_figure(image: &RenderedImage, filename: impl AsRef<Path>, visual_dir: &Path) -> Option<PathBuf> {
    let filename = filename.as_ref();
    match write_figure(image, filename, visual_dir) {
        Ok(()) => {
            info!(path = %filename.display(), bytes = image.bytes.len(), "Figure saved");
            Some(filename.to_path_buf())
        }
        Err(e) => {
            error!(error = %e, "Error saving figure");
            None
        }
    }
}

fn write_figure(image: &RenderedImage, filename: &Path, visual_dir: &Path) -> Result<(), ToolError> {
    fs::create_dir_all(visual_dir).map_err(|e| ToolError::io(visual_dir, e))?;
    fs::write(filename, &image.bytes).map_err(|e| ToolError::io(filename, e))
}

//! Narrow operations the agent invokes against the execution context.

mod files;
mod report;
mod summary;
mod vision;

use thiserror::Error;

use crate::render::RenderError;

pub use files::{ensure_directory, save_figure};
pub use report::{build_report, render_report};
pub use summary::get_dataframe_info;
pub use vision::describe_image;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("cannot read image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("model service error: {0:#}")]
    Service(anyhow::Error),
    #[error("model service returned an empty answer")]
    EmptyAnswer,
    #[error("invalid arguments for `{tool}`: {reason}")]
    BadArguments { tool: String, reason: String },
    #[error("unknown figure `{0}`")]
    UnknownFigure(String),
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("failed to save figure to {0}")]
    SaveFailed(String),
}

impl ToolError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        ToolError::Io { path: path.display().to_string(), source }
    }
}

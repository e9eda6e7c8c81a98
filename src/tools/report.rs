use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use tracing::info;

use super::ToolError;

/// Renders the markdown report. Image links under `output_root` are rewritten
/// relative to it; order and multiplicity of `image_links` are kept as given.
pub fn render_report(text: &str, image_links: &[String], output_root: &Path) -> String {
    let images = image_links
        .iter()
        .map(|link| format!("![Visualization]({})", relative_link(link, output_root)))
        .collect::<Vec<_>>()
        .join("\n");
    format!("# Exploratory Data Analysis Report\n\n{text}\n\n## Visualizations\n{images}\n")
}

/// Writes the report to `output_path`, replacing any previous file.
pub fn build_report(
    text: &str,
    image_links: &[String],
    output_path: impl AsRef<Path>,
    output_root: &Path,
) -> Result<String, ToolError> {
    let output_path = output_path.as_ref();
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ToolError::io(parent, e))?;
    }
    let body = render_report(text, image_links, output_root);
    fs::write(output_path, body).map_err(|e| ToolError::io(output_path, e))?;
    info!(path = %output_path.display(), images = image_links.len(), "report written");
    Ok(format!("Report saved successfully to {}", output_path.display()))
}

fn relative_link(link: &str, output_root: &Path) -> String {
    let link_path = without_cur_dir(Path::new(link));
    match link_path.strip_prefix(without_cur_dir(output_root)) {
        Ok(rest) if !rest.as_os_str().is_empty() => rest
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        _ => link.to_string(),
    }
}

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components().filter(|c| !matches!(c, Component::CurDir)).collect()
}

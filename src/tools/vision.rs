use std::{io::Cursor, path::Path};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ColorType, DynamicImage, ImageFormat};
use tracing::{debug, warn};

use super::ToolError;
use crate::llm::{ChatBackend, ChatMessage, ChatOptions, ContentPart, Role};

/// Asks the vision model `question` about the image at `path`.
///
/// Never fails: any problem comes back as a string starting with
/// `Error: image analysis failed:`, the same shape as other tool failures.
pub async fn describe_image(backend: &dyn ChatBackend, model: &str, path: impl AsRef<Path>, question: &str) -> String {
    match try_describe_image(backend, model, path.as_ref(), question).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!(error = %e, "image analysis failed");
            format!("Error: image analysis failed: {e}")
        }
    }
}

async fn try_describe_image(
    backend: &dyn ChatBackend,
    model: &str,
    path: &Path,
    question: &str,
) -> Result<String, ToolError> {
    let url = jpeg_data_url(path)?;
    debug!(path = %path.display(), encoded = url.len(), "sending image to vision model");
    let message = ChatMessage::multimodal(Role::User, vec![ContentPart::text(question), ContentPart::image_url(url)]);
    let reply = backend
        .complete(&[message], &ChatOptions::new(model))
        .await
        .map_err(ToolError::Service)?;
    reply.content.ok_or(ToolError::EmptyAnswer)
}

/// Loads an image, drops any alpha channel and re-encodes it as a base64 JPEG data URL.
fn jpeg_data_url(path: &Path) -> Result<String, ToolError> {
    let image_err = |source| ToolError::Image { path: path.display().to_string(), source };
    let img = image::open(path).map_err(image_err)?;
    let img = match img.color() {
        ColorType::L8 | ColorType::Rgb8 => img,
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    };
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .map_err(image_err)?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&buf)))
}

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use eda_agent::llm::{ChatBackend, ChatMessage, ChatOptions, ChatReply, ContentPart, MessageContent};
use eda_agent::tools::describe_image;

#[derive(Default)]
struct RecordingBackend {
    requests: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    fail: bool,
}

#[async_trait]
impl ChatBackend for RecordingBackend {
    async fn complete(&self, messages: &[ChatMessage], opts: &ChatOptions) -> Result<ChatReply> {
        self.requests.lock().unwrap().push((opts.model.clone(), messages.to_vec()));
        if self.fail {
            return Err(anyhow!("rate limited"));
        }
        Ok(ChatReply { content: Some("A bar chart with three bars.".into()), tool_calls: vec![] })
    }
}

fn write_rgba_png(path: &std::path::Path) -> Result<()> {
    let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([200, 30, 30, 128]));
    img.save(path)?;
    Ok(())
}

#[tokio::test]
async fn sends_question_and_jpeg_in_one_message() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("chart.png");
    write_rgba_png(&path)?;
    let backend = RecordingBackend::default();

    let answer = describe_image(&backend, "gpt-4o-mini", &path, "What does this show?").await;
    assert_eq!(answer, "A bar chart with three bars.");

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (model, messages) = &requests[0];
    assert_eq!(model, "gpt-4o-mini");
    assert_eq!(messages.len(), 1);
    let MessageContent::Parts(parts) = &messages[0].content else { panic!("expected multimodal content") };
    assert_eq!(parts[0], ContentPart::text("What does this show?"));
    let ContentPart::ImageUrl { image_url } = &parts[1] else { panic!("expected image part") };
    let encoded = image_url.url.strip_prefix("data:image/jpeg;base64,").expect("jpeg data url");
    let bytes = STANDARD.decode(encoded)?;
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    Ok(())
}

#[tokio::test]
async fn missing_file_is_reported_as_text() {
    let backend = RecordingBackend::default();
    let answer = describe_image(&backend, "gpt-4o-mini", "does/not/exist.png", "?").await;
    assert!(answer.starts_with("Error: image analysis failed:"));
    assert!(backend.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn service_failure_is_reported_as_text() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("chart.png");
    write_rgba_png(&path)?;
    let backend = RecordingBackend { fail: true, ..Default::default() };

    let answer = describe_image(&backend, "gpt-4o-mini", &path, "?").await;
    assert!(answer.starts_with("Error: image analysis failed:"));
    assert!(answer.contains("rate limited"));
    Ok(())
}

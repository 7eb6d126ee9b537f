//! Image description tool backed by a vision-capable chat model

use super::schema::{ArgSpec, ArgType, ToolArgs, ToolDescriptor};
use super::Tool;
use crate::backend::VisionBackend;
use crate::config::ToolsConfig;
use crate::{Result, ZarvisError};
use async_trait::async_trait;
use base64::Engine as _;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const TOOL_NAME: &str = "see_tool";

pub struct VisionTool {
    backend: Arc<dyn VisionBackend>,
    descriptor: ToolDescriptor,
}

impl VisionTool {
    pub fn new(backend: Arc<dyn VisionBackend>, config: &ToolsConfig) -> Self {
        let descriptor = ToolDescriptor::new(
            TOOL_NAME,
            "Analyze an image and provide detailed observations. Use this tool when you \
             need to understand visual content, identify objects, read text from images \
             or describe a visual scene.",
        )
        .arg(ArgSpec::required(
            "image_url",
            ArgType::String,
            "http(s) URL, data URI or local path of the image to analyze",
        ))
        .arg(
            ArgSpec::optional(
                "prompt",
                ArgType::String,
                "Specific question or instruction for the image analysis",
            )
            .with_default(config.vision_prompt.clone()),
        );

        Self {
            backend,
            descriptor,
        }
    }

    pub async fn describe(&self, image_ref: &str, prompt: &str) -> Result<String> {
        let url = resolve_image_reference(image_ref).await?;
        let description = self.backend.describe(&url, prompt).await?;
        info!("Analyzed image, returned {} characters", description.len());
        Ok(description)
    }
}

#[async_trait]
impl Tool for VisionTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String> {
        let image = args.require("image_url")?;
        let prompt = args.get("prompt").unwrap_or_default();
        self.describe(image, prompt).await
    }
}

/// Turn an image reference into something the vision endpoint accepts.
///
/// Remote URLs and data URIs pass through; local files are inlined as a
/// base64 data URI.
pub async fn resolve_image_reference(image_ref: &str) -> Result<String> {
    let trimmed = image_ref.trim();
    if trimmed.is_empty() {
        return Err(ZarvisError::InvalidArgument(
            "Image reference is empty".to_string(),
        ));
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:image/")
    {
        return Ok(trimmed.to_string());
    }

    let path = Path::new(trimmed);
    if !path.is_file() {
        return Err(ZarvisError::InvalidArgument(format!(
            "Image reference is neither a URL nor an existing file: {}",
            trimmed
        )));
    }

    let mime = image_mime_type(path).ok_or_else(|| {
        ZarvisError::InvalidArgument(format!("Unsupported image type: {}", path.display()))
    })?;
    let bytes = tokio::fs::read(path).await?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);

    Ok(format!("data:{};base64,{}", mime, encoded))
}

fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoBackend;

    #[async_trait]
    impl VisionBackend for EchoBackend {
        async fn describe(&self, image_url: &str, prompt: &str) -> Result<String> {
            Ok(format!("{} | {}", prompt, &image_url[..image_url.len().min(22)]))
        }
    }

    #[tokio::test]
    async fn test_urls_pass_through() {
        let url = resolve_image_reference(" https://example.com/cat.png ").await.unwrap();
        assert_eq!(url, "https://example.com/cat.png");

        let data = resolve_image_reference("data:image/png;base64,AAAA").await.unwrap();
        assert_eq!(data, "data:image/png;base64,AAAA");
    }

    #[tokio::test]
    async fn test_local_file_is_inlined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.PNG");
        std::fs::write(&path, b"png").unwrap();

        let url = resolve_image_reference(path.to_str().unwrap()).await.unwrap();
        assert_eq!(url, "data:image/png;base64,cG5n");
    }

    #[tokio::test]
    async fn test_unresolvable_reference() {
        let result = resolve_image_reference("not-a-file.png").await;
        assert!(matches!(result, Err(ZarvisError::InvalidArgument(_))));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"text").unwrap();
        let result = resolve_image_reference(path.to_str().unwrap()).await;
        assert!(matches!(result, Err(ZarvisError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_invoke_uses_default_prompt() {
        let tool = VisionTool::new(Arc::new(EchoBackend), &ToolsConfig::default());
        let mut raw = std::collections::BTreeMap::new();
        raw.insert("image_url".to_string(), "https://example.com/a.png".to_string());

        let args = tool.descriptor().coerce(&raw).unwrap();
        let text = tool.invoke(&args).await.unwrap();
        assert!(text.starts_with("Describe what you see in this image in detail."));
    }
}

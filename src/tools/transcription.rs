//! Speech-to-text tool backed by the remote transcription endpoint

use super::schema::{ArgSpec, ArgType, ToolArgs, ToolDescriptor};
use super::Tool;
use crate::backend::TranscriptionBackend;
use crate::config::ToolsConfig;
use crate::{Result, ZarvisError};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub const TOOL_NAME: &str = "listen_tool";

pub struct TranscriptionTool {
    backend: Arc<dyn TranscriptionBackend>,
    descriptor: ToolDescriptor,
}

impl TranscriptionTool {
    pub fn new(backend: Arc<dyn TranscriptionBackend>, config: &ToolsConfig) -> Self {
        let descriptor = ToolDescriptor::new(
            TOOL_NAME,
            "Transcribe an audio file to text. Use this tool when you need to convert \
             speech or audio to text, such as voice commands or audio messages.",
        )
        .arg(ArgSpec::required(
            "audio_file_path",
            ArgType::String,
            "Path to the audio file (wav, m4a, mp3 and similar formats)",
        ))
        .arg(
            ArgSpec::optional(
                "prompt",
                ArgType::String,
                "Optional context or spelling guidance for better transcription",
            )
            .with_default(config.transcription_prompt.clone()),
        );

        Self {
            backend,
            descriptor,
        }
    }

    /// Transcribe a local audio file
    pub async fn transcribe(&self, audio_path: &Path, prompt: &str) -> Result<String> {
        if !audio_path.is_file() {
            return Err(ZarvisError::NotFound(format!(
                "Audio file not found: {}",
                audio_path.display()
            )));
        }

        let audio = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        debug!("Uploading {} ({} bytes) for transcription", file_name, audio.len());

        let text = self.backend.transcribe(&file_name, audio, prompt).await?;
        let text = text.trim().to_string();

        info!("Transcribed {} characters from audio", text.len());
        Ok(text)
    }
}

#[async_trait]
impl Tool for TranscriptionTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String> {
        let path = args.require("audio_file_path")?;
        let prompt = args.get("prompt").unwrap_or_default();
        self.transcribe(Path::new(path), prompt).await
    }
}

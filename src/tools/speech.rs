//! Text-to-speech tool writing synthesized audio into the output directory

use super::schema::{ArgSpec, ArgType, ToolArgs, ToolDescriptor};
use super::Tool;
use crate::backend::SpeechBackend;
use crate::config::ToolsConfig;
use crate::{Result, ZarvisError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub const TOOL_NAME: &str = "speak_tool";

pub struct SpeechTool {
    backend: Arc<dyn SpeechBackend>,
    descriptor: ToolDescriptor,
    output_dir: PathBuf,
    default_voice: String,
    default_filename: String,
}

impl SpeechTool {
    pub fn new(backend: Arc<dyn SpeechBackend>, config: &ToolsConfig) -> Self {
        let descriptor = ToolDescriptor::new(
            TOOL_NAME,
            "Convert text to speech and save it as an audio file. Use this tool when you \
             need to generate speech audio, create voice responses or produce audio output \
             for the user. Returns the path of the generated file.",
        )
        .arg(ArgSpec::required(
            "text",
            ArgType::String,
            "The text to convert to speech (cannot be empty)",
        ))
        .arg(
            ArgSpec::optional(
                "output_filename",
                ArgType::String,
                "File name for the generated audio; a unique name is picked when omitted",
            ),
        )
        .arg(
            ArgSpec::optional("voice", ArgType::String, "Voice to use for synthesis")
                .with_default(config.voice.clone()),
        );

        Self {
            backend,
            descriptor,
            output_dir: config.output_dir.clone(),
            default_voice: config.voice.clone(),
            default_filename: config.default_output_filename.clone(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Default file name with a random suffix, e.g. `speech_<uuid>.wav`
    fn unique_filename(&self) -> String {
        let base = Path::new(&self.default_filename);
        let stem = base
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("speech");
        let id = Uuid::new_v4().simple();
        match base.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}_{}.{}", stem, id, ext),
            None => format!("{}_{}", stem, id),
        }
    }

    /// Synthesize `text` and return the path of the written audio file
    pub async fn synthesize(
        &self,
        text: &str,
        output_filename: Option<&str>,
        voice: Option<&str>,
    ) -> Result<PathBuf> {
        if text.trim().is_empty() {
            return Err(ZarvisError::InvalidArgument(
                "Text input cannot be empty".to_string(),
            ));
        }

        let filename = match output_filename {
            Some(name) => name.to_string(),
            None => self.unique_filename(),
        };
        validate_filename(&filename)?;
        let voice = voice.unwrap_or(&self.default_voice);

        let audio = self.backend.synthesize(text, voice).await?;

        tokio::fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            ZarvisError::Io(format!(
                "Cannot create output directory {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;

        let path = self.output_dir.join(&filename);
        tokio::fs::write(&path, &audio)
            .await
            .map_err(|e| ZarvisError::Io(format!("Cannot write {}: {}", path.display(), e)))?;

        debug!("Wrote {} bytes of {} audio", audio.len(), voice);
        info!("Generated speech: {}", path.display());
        Ok(path)
    }
}

#[async_trait]
impl Tool for SpeechTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String> {
        let text = args.require("text")?;
        let path = self
            .synthesize(text, args.get("output_filename"), args.get("voice"))
            .await?;
        Ok(path.display().to_string())
    }
}

/// Output names must stay inside the output directory
fn validate_filename(name: &str) -> Result<()> {
    let bare = Path::new(name)
        .file_name()
        .map(|n| n == std::ffi::OsStr::new(name))
        .unwrap_or(false);

    if name.trim().is_empty() || !bare {
        return Err(ZarvisError::InvalidArgument(format!(
            "Output filename must be a plain file name: '{}'",
            name
        )));
    }
    Ok(())
}

/// Duration of a WAV file in seconds, if its header can be read
pub fn wav_duration_secs(path: &Path) -> Option<f32> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 || spec.channels == 0 {
        return None;
    }
    let frames = reader.duration();
    Some(frames as f32 / spec.sample_rate as f32)
}

pub mod registry;
pub mod schema;
pub mod speech;
pub mod transcription;
pub mod vision;

pub use registry::ToolRegistry;
pub use schema::{ArgSpec, ArgType, ToolArgs, ToolDescriptor};
pub use speech::SpeechTool;
pub use transcription::TranscriptionTool;
pub use vision::VisionTool;

use crate::backend::InferenceClient;
use crate::config::ToolsConfig;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A stateless capability the reasoning step can call.
///
/// Implementations must be safe to invoke concurrently with themselves and
/// with other tools; the orchestrator runs the calls of one round in
/// parallel.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    /// Run the tool with arguments already coerced against the descriptor
    async fn invoke(&self, args: &ToolArgs) -> Result<String>;
}

/// Registry with the transcription, vision and speech tools backed by one client
pub fn default_registry(client: Arc<InferenceClient>, config: &ToolsConfig) -> ToolRegistry {
    ToolRegistry::new()
        .with(Arc::new(TranscriptionTool::new(client.clone(), config)))
        .with(Arc::new(VisionTool::new(client.clone(), config)))
        .with(Arc::new(SpeechTool::new(client, config)))
}

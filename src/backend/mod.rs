//! Remote inference seams
//!
//! The agent and the tools talk to the inference service only through the
//! traits below. [`InferenceClient`] implements all of them against an
//! OpenAI-compatible HTTP API; tests substitute scripted implementations.

pub mod client;
mod wire;

pub use client::InferenceClient;

use crate::config::ApiConfig;
use crate::messages::{Message, ToolInvocation};
use crate::tools::ToolDescriptor;
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of one reasoning round
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningResponse {
    /// Terminal answer with no tool calls
    Final(String),

    /// The model wants tools run before it answers
    ToolCalls {
        content: Option<String>,
        invocations: Vec<ToolInvocation>,
    },
}

#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Submit the full history and the tool set, get the next step back
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<ReasoningResponse>;
}

#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    async fn transcribe(&self, file_name: &str, audio: Vec<u8>, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// `image_url` is an http(s) URL or a data URI
    async fn describe(&self, image_url: &str, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Returns the encoded audio bytes
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;
}

/// Retry behaviour for remote calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry; doubles on every further retry
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

impl From<&ApiConfig> for RetryPolicy {
    fn from(config: &ApiConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }
}

//! HTTP client for the OpenAI-compatible inference API
//!
//! One [`InferenceClient`] serves reasoning (chat completions with tools),
//! transcription, vision and speech synthesis. Retries are opt-in through
//! [`RetryPolicy`]; with the default policy every failure surfaces on the
//! first attempt.

use super::wire::{
    into_reasoning_response, to_chat_message, to_chat_tool, ChatMessage, ChatRequest,
    ChatResponse, SpeechRequest, TranscriptionResponse,
};
use super::{
    ReasoningBackend, ReasoningResponse, RetryPolicy, SpeechBackend, TranscriptionBackend,
    VisionBackend,
};
use crate::config::AppConfig;
use crate::messages::Message;
use crate::tools::ToolDescriptor;
use crate::{Result, ZarvisError};
use async_trait::async_trait;
use reqwest::{multipart, RequestBuilder, StatusCode};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
struct Models {
    chat: String,
    chat_temperature: f32,
    transcription: String,
    vision: String,
    vision_temperature: f32,
    vision_max_tokens: u32,
    speech: String,
    speech_format: String,
}

#[derive(Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    models: Models,
}

impl InferenceClient {
    /// Build a client from the application configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let api_key = config
            .api
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ZarvisError::Config("API key is required".to_string()))?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ZarvisError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            timeout: config.api.request_timeout(),
            retry: RetryPolicy::from(&config.api),
            models: Models {
                chat: config.agent.model.clone(),
                chat_temperature: config.agent.temperature,
                transcription: config.tools.transcription_model.clone(),
                vision: config.tools.vision_model.clone(),
                vision_temperature: config.tools.vision_temperature,
                vision_max_tokens: config.tools.vision_max_tokens,
                speech: config.tools.speech_model.clone(),
                speech_format: config.tools.speech_format.clone(),
            },
        })
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send a request, retrying transport errors and retryable statuses
    async fn send<F>(&self, label: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> Result<RequestBuilder>,
    {
        let mut attempt = 0u32;
        loop {
            let request = build()?
                .bearer_auth(&self.api_key)
                .timeout(self.timeout);

            let error = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let error =
                        ZarvisError::Upstream(format!("{} failed: HTTP {}: {}", label, status, body));
                    if !is_retryable(status) {
                        return Err(error);
                    }
                    error
                }
                Err(e) if e.is_timeout() => {
                    ZarvisError::Upstream(format!("{} timed out after {:?}", label, self.timeout))
                }
                Err(e) => ZarvisError::Upstream(format!("{} request failed: {}", label, e)),
            };

            if attempt >= self.retry.max_retries {
                return Err(error);
            }
            attempt += 1;
            let delay = self.retry.delay_for(attempt);
            warn!(
                "{} attempt {}/{} failed, retrying in {:?}: {}",
                label, attempt, self.retry.max_retries, delay, error
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn chat(&self, label: &str, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.url("chat/completions");
        let response = self
            .send(label, || Ok(self.http.post(&url).json(request)))
            .await?;
        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ZarvisError::Upstream(format!("{} returned invalid JSON: {}", label, e)))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl ReasoningBackend for InferenceClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<ReasoningResponse> {
        let request = ChatRequest {
            model: self.models.chat.clone(),
            messages: messages.iter().map(to_chat_message).collect(),
            tools: tools.iter().map(to_chat_tool).collect(),
            tool_choice: if tools.is_empty() { None } else { Some("auto") },
            temperature: self.models.chat_temperature,
            max_completion_tokens: None,
            top_p: None,
            stream: false,
        };

        debug!(
            "Reasoning request: {} messages, {} tools",
            request.messages.len(),
            request.tools.len()
        );

        let response = self.chat("Reasoning", &request).await?;
        into_reasoning_response(response)
    }
}

#[async_trait]
impl TranscriptionBackend for InferenceClient {
    async fn transcribe(&self, file_name: &str, audio: Vec<u8>, prompt: &str) -> Result<String> {
        let url = self.url("audio/translations");
        let response = self
            .send("Transcription", || {
                let file = multipart::Part::bytes(audio.clone())
                    .file_name(file_name.to_string())
                    .mime_str("application/octet-stream")
                    .map_err(|e| ZarvisError::InvalidArgument(e.to_string()))?;
                let form = multipart::Form::new()
                    .part("file", file)
                    .text("model", self.models.transcription.clone())
                    .text("prompt", prompt.to_string())
                    .text("response_format", "json")
                    .text("temperature", "0");
                Ok(self.http.post(&url).multipart(form))
            })
            .await?;

        let body: TranscriptionResponse = response.json().await.map_err(|e| {
            ZarvisError::Upstream(format!("Transcription returned invalid JSON: {}", e))
        })?;
        Ok(body.text)
    }
}

#[async_trait]
impl VisionBackend for InferenceClient {
    async fn describe(&self, image_url: &str, prompt: &str) -> Result<String> {
        let message = ChatMessage {
            role: "user".to_string(),
            content: Some(json!([
                {"type": "text", "text": prompt},
                {"type": "image_url", "image_url": {"url": image_url}},
            ])),
            tool_calls: None,
            tool_call_id: None,
        };

        let request = ChatRequest {
            model: self.models.vision.clone(),
            messages: vec![message],
            tools: Vec::new(),
            tool_choice: None,
            temperature: self.models.vision_temperature,
            max_completion_tokens: Some(self.models.vision_max_tokens),
            top_p: Some(1.0),
            stream: false,
        };

        let response = self.chat("Vision", &request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ZarvisError::Upstream("Vision response contained no choices".to_string()))?;
        choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ZarvisError::Upstream("Vision response had no description".to_string()))
    }
}

#[async_trait]
impl SpeechBackend for InferenceClient {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let url = self.url("audio/speech");
        let request = SpeechRequest {
            model: &self.models.speech,
            voice,
            input: text,
            response_format: &self.models.speech_format,
        };

        let response = self
            .send("Speech synthesis", || Ok(self.http.post(&url).json(&request)))
            .await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

impl std::fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("models", &self.models)
            .finish_non_exhaustive()
    }
}

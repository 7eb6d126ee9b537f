//! Shared doubles for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use zarvis::backend::{ReasoningBackend, ReasoningResponse, TranscriptionBackend};
use zarvis::messages::{Message, ToolInvocation};
use zarvis::tools::{ArgSpec, ArgType, Tool, ToolArgs, ToolDescriptor};
use zarvis::{Result, ZarvisError};

/// Reasoning backend that replays a fixed script, then answers "done"
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ReasoningResponse>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<ReasoningResponse>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<ReasoningResponse> {
        self.requests.lock().push(messages.to_vec());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ReasoningResponse::Final("done".to_string())))
    }
}

/// Reasoning backend that never stops asking for `tool`
pub struct LoopingBackend {
    pub tool: String,
    pub calls: AtomicUsize,
}

impl LoopingBackend {
    pub fn new(tool: &str) -> Arc<Self> {
        Arc::new(Self {
            tool: tool.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ReasoningBackend for LoopingBackend {
    async fn complete(
        &self,
        _messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<ReasoningResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ReasoningResponse::ToolCalls {
            content: None,
            invocations: vec![call(&format!("loop_{}", n), &self.tool, &[("text", "again")])],
        })
    }
}

pub fn call(id: &str, name: &str, args: &[(&str, &str)]) -> ToolInvocation {
    let arguments: BTreeMap<String, String> = args
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ToolInvocation::new(id, name, arguments)
}

pub fn tool_calls(invocations: Vec<ToolInvocation>) -> Result<ReasoningResponse> {
    Ok(ReasoningResponse::ToolCalls {
        content: None,
        invocations,
    })
}

pub fn final_answer(text: &str) -> Result<ReasoningResponse> {
    Ok(ReasoningResponse::Final(text.to_string()))
}

fn text_descriptor(name: &str) -> ToolDescriptor {
    ToolDescriptor::new(name, format!("{} test tool", name)).arg(ArgSpec::required(
        "text",
        ArgType::String,
        "Input text",
    ))
}

/// Returns its `text` argument
pub struct EchoTool {
    descriptor: ToolDescriptor,
}

impl EchoTool {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            descriptor: text_descriptor(name),
        })
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String> {
        Ok(args.require("text")?.to_string())
    }
}

/// Always fails with an invalid-argument error
pub struct FailingTool {
    descriptor: ToolDescriptor,
}

impl FailingTool {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            descriptor: text_descriptor(name),
        })
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, _args: &ToolArgs) -> Result<String> {
        Err(ZarvisError::InvalidArgument("text is unusable".to_string()))
    }
}

/// Sleeps before answering and tracks how many calls overlap
pub struct SlowTool {
    descriptor: ToolDescriptor,
    delay: Duration,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub started: AtomicUsize,
    pub finished: AtomicUsize,
}

impl SlowTool {
    pub fn new(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            descriptor: text_descriptor(name),
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<String> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(format!("slow: {}", args.require("text")?))
    }
}

/// Transcription backend with a fixed transcript
pub struct FixedTranscript(pub String);

#[async_trait]
impl TranscriptionBackend for FixedTranscript {
    async fn transcribe(&self, _file_name: &str, _audio: Vec<u8>, _prompt: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

//! Request and response bodies of the OpenAI-compatible API

use crate::messages::{Message, ToolInvocation};
use crate::tools::ToolDescriptor;
use crate::{Result, ZarvisError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use super::ReasoningResponse;

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ChatTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'static str>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    pub stream: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub(crate) struct ChatTool {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: ChatFunction,
}

#[derive(Debug, Serialize, Clone)]
pub(crate) struct ChatFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct ChatToolCall {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: ChatFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(crate) struct ChatFunctionCall {
    pub name: String,
    /// JSON-encoded argument object
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TranscriptionResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SpeechRequest<'a> {
    pub model: &'a str,
    pub voice: &'a str,
    pub input: &'a str,
    pub response_format: &'a str,
}

pub(crate) fn to_chat_message(message: &Message) -> ChatMessage {
    match message {
        Message::System { content } | Message::User { content } => ChatMessage {
            role: message.role().as_str().to_string(),
            content: Some(Value::String(content.clone())),
            tool_calls: None,
            tool_call_id: None,
        },
        Message::Assistant {
            content,
            tool_calls,
        } => ChatMessage {
            role: "assistant".to_string(),
            content: content.clone().map(Value::String),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls.iter().map(to_chat_tool_call).collect())
            },
            tool_call_id: None,
        },
        Message::ToolResult {
            invocation_id,
            content,
            ..
        } => ChatMessage {
            role: "tool".to_string(),
            content: Some(Value::String(content.clone())),
            tool_calls: None,
            tool_call_id: Some(invocation_id.clone()),
        },
    }
}

fn to_chat_tool_call(invocation: &ToolInvocation) -> ChatToolCall {
    let arguments: serde_json::Map<String, Value> = invocation
        .arguments
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();

    ChatToolCall {
        id: Some(invocation.id.clone()),
        call_type: function_type(),
        function: ChatFunctionCall {
            name: invocation.name.clone(),
            arguments: Value::Object(arguments).to_string(),
        },
    }
}

pub(crate) fn to_chat_tool(descriptor: &ToolDescriptor) -> ChatTool {
    ChatTool {
        tool_type: "function",
        function: ChatFunction {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            parameters: descriptor.parameters_schema(),
        },
    }
}

/// Flatten a JSON argument object into string values
fn parse_arguments(raw: &str) -> std::result::Result<BTreeMap<String, String>, String> {
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let value: Value =
        serde_json::from_str(raw).map_err(|e| format!("Malformed arguments: {}", e))?;

    let Value::Object(map) = value else {
        return Err("Arguments are not a JSON object".to_string());
    };

    Ok(map
        .into_iter()
        .filter_map(|(k, v)| match v {
            Value::Null => None,
            Value::String(s) => Some((k, s)),
            other => Some((k, other.to_string())),
        })
        .collect())
}

pub(crate) fn into_reasoning_response(response: ChatResponse) -> Result<ReasoningResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ZarvisError::Upstream("Response contained no choices".to_string()))?;

    let message = choice.message;
    let calls = message.tool_calls.unwrap_or_default();
    if calls.is_empty() {
        return Ok(ReasoningResponse::Final(message.content.unwrap_or_default()));
    }

    let invocations = calls
        .into_iter()
        .map(|call| {
            let name = call.function.name;
            let id = match call.id {
                Some(id) if !id.is_empty() => id,
                _ => ToolInvocation::generate_id(),
            };
            match parse_arguments(&call.function.arguments) {
                Ok(arguments) => ToolInvocation::new(id, name, arguments),
                Err(error) => {
                    warn!("Unusable arguments for {} ({}): {}", name, id, error);
                    ToolInvocation::malformed(id, name, error)
                }
            }
        })
        .collect();

    Ok(ReasoningResponse::ToolCalls {
        content: message.content.filter(|c| !c.trim().is_empty()),
        invocations,
    })
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Text appended as the result of a tool call that was cancelled in flight
pub const CANCELLED_RESULT: &str = "cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A request from the reasoning step to run a named tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: BTreeMap<String, String>,

    /// Set when the backend sent arguments that could not be parsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_error: Option<String>,
}

impl ToolInvocation {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            argument_error: None,
        }
    }

    /// An invocation whose raw arguments were unusable; it fails on its own when run
    pub fn malformed(
        id: impl Into<String>,
        name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            argument_error: Some(error.into()),
            ..Self::new(id, name, BTreeMap::new())
        }
    }

    /// Create an invocation with a generated id
    pub fn generated(name: impl Into<String>, arguments: BTreeMap<String, String>) -> Self {
        Self::new(Self::generate_id(), name, arguments)
    }

    pub fn generate_id() -> String {
        format!("call_{}", Uuid::new_v4().simple())
    }

    pub fn arg(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolInvocation>,
    },
    #[serde(rename = "tool")]
    ToolResult {
        invocation_id: String,
        tool_name: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Final assistant text with no tool calls
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Assistant message requesting tool calls
    pub fn tool_calls(content: Option<String>, tool_calls: Vec<ToolInvocation>) -> Self {
        Message::Assistant {
            content,
            tool_calls,
        }
    }

    pub fn tool_result(invocation: &ToolInvocation, content: impl Into<String>) -> Self {
        Message::ToolResult {
            invocation_id: invocation.id.clone(),
            tool_name: invocation.name.clone(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn tool_error(invocation: &ToolInvocation, content: impl Into<String>) -> Self {
        Message::ToolResult {
            invocation_id: invocation.id.clone(),
            tool_name: invocation.name.clone(),
            content: content.into(),
            is_error: true,
        }
    }

    /// Synthetic result for a tool call that never finished
    pub fn cancelled_result(invocation: &ToolInvocation) -> Self {
        Self::tool_error(invocation, CANCELLED_RESULT)
    }

    pub fn role(&self) -> Role {
        match self {
            Message::System { .. } => Role::System,
            Message::User { .. } => Role::User,
            Message::Assistant { .. } => Role::Assistant,
            Message::ToolResult { .. } => Role::Tool,
        }
    }

    /// Textual content, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Message::System { content } | Message::User { content } => Some(content),
            Message::Assistant { content, .. } => content.as_deref(),
            Message::ToolResult { content, .. } => Some(content),
        }
    }

    /// Tool calls requested by this message (empty unless assistant)
    pub fn invocations(&self) -> &[ToolInvocation] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.invocations().is_empty()
    }
}

//! Conversation state handed between the session controller and the agent
//!
//! The state is an append-only, causally ordered list of messages. Every
//! tool call an assistant message requests must be answered by exactly one
//! tool result before the next reasoning message appears.

use super::types::{Message, Role, ToolInvocation};
use crate::{Result, ZarvisError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn has_system_message(&self) -> bool {
        self.messages.iter().any(|m| m.role() == Role::System)
    }

    /// Count of messages with the given role
    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role() == role).count()
    }

    /// Text of the most recent assistant message that carried text
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role() == Role::Assistant)
            .find_map(Message::text)
    }

    /// Tool calls from the last assistant message that have no result yet
    pub fn pending_invocations(&self) -> Vec<&ToolInvocation> {
        let Some(start) = self.messages.iter().rposition(Message::has_tool_calls) else {
            return Vec::new();
        };

        let answered: HashSet<&str> = self.messages[start + 1..]
            .iter()
            .filter_map(|m| match m {
                Message::ToolResult { invocation_id, .. } => Some(invocation_id.as_str()),
                _ => None,
            })
            .collect();

        self.messages[start]
            .invocations()
            .iter()
            .filter(|inv| !answered.contains(inv.id.as_str()))
            .collect()
    }

    /// Check the tool call / tool result pairing invariant
    pub fn validate(&self) -> Result<()> {
        let mut pending: HashSet<&str> = HashSet::new();

        for (index, message) in self.messages.iter().enumerate() {
            match message {
                Message::ToolResult { invocation_id, .. } => {
                    if !pending.remove(invocation_id.as_str()) {
                        return Err(ZarvisError::Orchestrator(format!(
                            "Tool result at {} answers unknown or already answered call {}",
                            index, invocation_id
                        )));
                    }
                }
                other => {
                    if !pending.is_empty() {
                        return Err(ZarvisError::Orchestrator(format!(
                            "{} message at {} precedes results for {} tool call(s)",
                            other.role().as_str(),
                            index,
                            pending.len()
                        )));
                    }
                    for invocation in other.invocations() {
                        if !pending.insert(invocation.id.as_str()) {
                            return Err(ZarvisError::Orchestrator(format!(
                                "Duplicate tool call id {} at {}",
                                invocation.id, index
                            )));
                        }
                    }
                }
            }
        }

        if pending.is_empty() {
            Ok(())
        } else {
            Err(ZarvisError::Orchestrator(format!(
                "{} tool call(s) have no result",
                pending.len()
            )))
        }
    }

    /// Export conversation to JSON
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.messages)
    }

    /// Import a conversation from JSON
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

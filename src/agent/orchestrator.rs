//! Reasoning / tool-execution loop
//!
//! One turn appends the user message, then alternates between a reasoning
//! round and, when the backend asks for them, a parallel batch of tool
//! calls. The turn ends with a final assistant message or fails once the
//! round bound is exceeded, the backend errors, or the turn is cancelled.
//! The conversation handed back is always consistent: every tool call has
//! exactly one result.

use super::events::AgentEvent;
use super::prompts::{with_context, SYSTEM_PROMPT};
use crate::backend::{ReasoningBackend, ReasoningResponse};
use crate::config::AgentConfig;
use crate::messages::{ConversationState, Message, ToolInvocation};
use crate::tools::{ToolDescriptor, ToolRegistry};
use crate::ZarvisError;
use futures::future::join_all;
use futures::Stream;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// States of the per-turn state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    Reasoning,
    AwaitingTools,
    Done,
    Failed,
}

/// Successful end of a turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResult {
    pub response: String,
    pub state: ConversationState,
    pub rounds: usize,
}

/// Failed turn, with the conversation accumulated up to the failure
#[derive(Debug, Clone, PartialEq)]
pub struct TurnFailure {
    pub error: ZarvisError,
    pub state: ConversationState,
    pub rounds: usize,
}

impl std::fmt::Display for TurnFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn failed after {} round(s): {}", self.rounds, self.error)
    }
}

impl std::error::Error for TurnFailure {}

pub type TurnOutcome = std::result::Result<TurnResult, TurnFailure>;

type EventSink = Option<UnboundedSender<AgentEvent>>;

fn emit(events: &EventSink, event: AgentEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

pub struct Orchestrator {
    backend: Arc<dyn ReasoningBackend>,
    registry: ToolRegistry,
    descriptors: Vec<ToolDescriptor>,
    max_rounds: usize,
    system_prompt: String,
}

impl Orchestrator {
    /// Create an orchestrator; the registered tool set is fixed from here on
    pub fn new(backend: Arc<dyn ReasoningBackend>, registry: ToolRegistry, config: &AgentConfig) -> Self {
        let descriptors = registry.descriptors();
        info!(
            "Orchestrator ready with tools {:?}, max {} rounds",
            registry.names(),
            config.max_rounds
        );

        Self {
            backend,
            registry,
            descriptors,
            max_rounds: config.max_rounds.max(1),
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| SYSTEM_PROMPT.to_string()),
        }
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run one turn to completion
    pub async fn think(&self, state: ConversationState, input: &str) -> TurnOutcome {
        self.run_turn(state, input.to_string(), CancellationToken::new(), None)
            .await
    }

    /// Run one turn with extra key/value context folded into the user message
    pub async fn think_with_context<K, V>(
        &self,
        state: ConversationState,
        input: &str,
        context: &[(K, V)],
    ) -> TurnOutcome
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.run_turn(state, with_context(input, context), CancellationToken::new(), None)
            .await
    }

    /// Run one turn that stops at the next suspension point once `cancel` fires
    pub async fn think_cancellable(
        &self,
        state: ConversationState,
        input: &str,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        self.run_turn(state, input.to_string(), cancel, None).await
    }

    /// Run one turn, yielding progress events as they happen.
    ///
    /// The last item is always [`AgentEvent::Finished`] or
    /// [`AgentEvent::Failed`]. Cancelling `cancel` ends the turn with a
    /// consistent state; dropping the stream abandons the turn.
    pub fn stream_think<'a>(
        &'a self,
        state: ConversationState,
        input: &str,
        cancel: CancellationToken,
    ) -> impl Stream<Item = AgentEvent> + Send + 'a {
        let input = input.to_string();

        async_stream::stream! {
            let (tx, mut rx) = unbounded_channel();
            let run = self.run_turn(state, input, cancel, Some(tx));
            tokio::pin!(run);

            let outcome = loop {
                let next = tokio::select! {
                    biased;
                    Some(event) = rx.recv() => Ok(event),
                    outcome = &mut run => Err(outcome),
                };
                match next {
                    Ok(event) => yield event,
                    Err(outcome) => break outcome,
                }
            };

            while let Ok(event) = rx.try_recv() {
                yield event;
            }

            match outcome {
                Ok(result) => yield AgentEvent::Finished(result),
                Err(failure) => yield AgentEvent::Failed(failure),
            }
        }
    }

    async fn run_turn(
        &self,
        mut state: ConversationState,
        input: String,
        cancel: CancellationToken,
        events: EventSink,
    ) -> TurnOutcome {
        let started = Instant::now();
        let mut rounds = 0usize;

        emit(&events, AgentEvent::TurnStarted);
        debug!("Processing: {}", truncate(&input, 100));
        append(&mut state, Message::user(input), &events);

        let fail = |error: ZarvisError, state: ConversationState, rounds: usize| {
            warn!("Turn failed after {} round(s): {}", rounds, error);
            Err(TurnFailure {
                error,
                state,
                rounds,
            })
        };

        loop {
            if cancel.is_cancelled() {
                return fail(cancelled(), state, rounds);
            }
            if rounds >= self.max_rounds {
                debug!(phase = ?AgentPhase::Failed, "round bound reached");
                return fail(
                    ZarvisError::Orchestrator(format!(
                        "No final response within {} reasoning rounds",
                        self.max_rounds
                    )),
                    state,
                    rounds,
                );
            }

            rounds += 1;
            debug!(phase = ?AgentPhase::Reasoning, round = rounds, "reasoning");
            emit(&events, AgentEvent::RoundStarted { round: rounds });

            let request = self.request_messages(&state);
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return fail(cancelled(), state, rounds),
                response = self.backend.complete(&request, &self.descriptors) => response,
            };

            let (content, invocations) = match response {
                Err(error) => return fail(error, state, rounds),
                Ok(ReasoningResponse::Final(text)) => (Some(text), Vec::new()),
                Ok(ReasoningResponse::ToolCalls {
                    content,
                    invocations,
                }) => (content, invocations),
            };

            if invocations.is_empty() {
                let text = content.unwrap_or_default();
                append(&mut state, Message::assistant(text.clone()), &events);
                debug!(phase = ?AgentPhase::Done, "final response");
                info!(
                    "Response generated ({} chars, {} round(s), {}ms)",
                    text.len(),
                    rounds,
                    started.elapsed().as_millis()
                );
                return Ok(TurnResult {
                    response: text,
                    state,
                    rounds,
                });
            }

            debug!(
                phase = ?AgentPhase::AwaitingTools,
                "Routing to tools: {:?}",
                invocations.iter().map(|i| i.name.as_str()).collect::<Vec<_>>()
            );
            append(
                &mut state,
                Message::tool_calls(content, invocations.clone()),
                &events,
            );
            emit(
                &events,
                AgentEvent::ToolCallsRequested {
                    invocations: invocations.clone(),
                },
            );

            let results = self.execute_tools(&invocations, &cancel).await;
            for result in results {
                if let Message::ToolResult {
                    invocation_id,
                    is_error,
                    ..
                } = &result
                {
                    emit(
                        &events,
                        AgentEvent::ToolCompleted {
                            invocation_id: invocation_id.clone(),
                            is_error: *is_error,
                        },
                    );
                }
                append(&mut state, result, &events);
            }
        }
    }

    /// History as sent to the backend, with the system prompt when missing
    fn request_messages(&self, state: &ConversationState) -> Vec<Message> {
        let mut messages = Vec::with_capacity(state.len() + 1);
        if !state.has_system_message() {
            messages.push(Message::system(self.system_prompt.clone()));
        }
        messages.extend(state.messages().iter().cloned());
        messages
    }

    /// Run one round's tool calls concurrently; results come back in invocation order
    async fn execute_tools(
        &self,
        invocations: &[ToolInvocation],
        cancel: &CancellationToken,
    ) -> Vec<Message> {
        join_all(
            invocations
                .iter()
                .map(|invocation| self.execute_tool(invocation, cancel)),
        )
        .await
    }

    async fn execute_tool(&self, invocation: &ToolInvocation, cancel: &CancellationToken) -> Message {
        let Some(tool) = self.registry.get(&invocation.name) else {
            warn!("Unknown tool requested: {}", invocation.name);
            let error = ZarvisError::InvalidArgument(format!("Unknown tool '{}'", invocation.name));
            return Message::tool_error(invocation, format!("Error: {}", error));
        };

        if let Some(reason) = &invocation.argument_error {
            let error = ZarvisError::InvalidArgument(format!("{} for {}", reason, invocation.name));
            return Message::tool_error(invocation, format!("Error: {}", error));
        }

        let args = match tool.descriptor().coerce(&invocation.arguments) {
            Ok(args) => args,
            Err(error) => {
                warn!("Rejected arguments for {}: {}", invocation.name, error);
                return Message::tool_error(invocation, format!("Error: {}", error));
            }
        };

        if cancel.is_cancelled() {
            return Message::cancelled_result(invocation);
        }

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(tool = %invocation.name, "tool call cancelled");
                return Message::cancelled_result(invocation);
            }
            result = tool.invoke(&args) => result,
        };

        match result {
            Ok(output) => {
                debug!(
                    tool = %invocation.name,
                    id = %invocation.id,
                    "tool executed in {}ms",
                    started.elapsed().as_millis()
                );
                Message::tool_result(invocation, output)
            }
            Err(error) => {
                warn!("Tool {} failed: {}", invocation.name, error);
                Message::tool_error(invocation, format!("Error: {}", error))
            }
        }
    }
}

fn append(state: &mut ConversationState, message: Message, events: &EventSink) {
    emit(events, AgentEvent::MessageAppended(message.clone()));
    state.push(message);
}

fn cancelled() -> ZarvisError {
    ZarvisError::Cancelled("Turn cancelled".to_string())
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

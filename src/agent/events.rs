use super::orchestrator::{TurnFailure, TurnResult};
use crate::messages::{Message, ToolInvocation};

/// Progress of a streamed turn, in state-machine order
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// The turn has been accepted
    TurnStarted,

    /// A reasoning round is about to be submitted
    RoundStarted { round: usize },

    /// The backend asked for tool calls
    ToolCallsRequested { invocations: Vec<ToolInvocation> },

    /// One tool call has a result (possibly an error or a cancellation)
    ToolCompleted { invocation_id: String, is_error: bool },

    /// A message was appended to the conversation
    MessageAppended(Message),

    /// Terminal: final response
    Finished(TurnResult),

    /// Terminal: the turn failed
    Failed(TurnFailure),
}

impl AgentEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Finished(_) | AgentEvent::Failed(_))
    }
}

pub mod events;
pub mod orchestrator;
pub mod prompts;

pub use events::AgentEvent;
pub use orchestrator::{AgentPhase, Orchestrator, TurnFailure, TurnOutcome, TurnResult};
pub use prompts::SYSTEM_PROMPT;

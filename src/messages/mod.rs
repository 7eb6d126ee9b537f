pub mod state;
pub mod types;

pub use state::ConversationState;
pub use types::{Message, Role, ToolInvocation, CANCELLED_RESULT};

//! Session layer between a presentation surface and the agent

pub mod artifacts;
pub mod controller;

pub use artifacts::{ArtifactLifecycle, LifecycleEvent};
pub use controller::{SessionController, SessionEvent, SubmissionKind, DEFAULT_IMAGE_PROMPT};

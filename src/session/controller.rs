//! Session controller for the presentation layer
//!
//! Owns the conversation between turns and runs each submission as a task
//! on a tokio runtime, so a UI thread never blocks on the network. Progress
//! comes back as [`SessionEvent`]s on a crossbeam channel, matching how a
//! frame loop polls for work.

use super::artifacts::{ArtifactLifecycle, LifecycleEvent};
use crate::agent::Orchestrator;
use crate::config::SessionConfig;
use crate::messages::ConversationState;
use crate::tools::speech::{wav_duration_secs, SpeechTool};
use crate::{Result, ZarvisError};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prompt used for image submissions without one
pub const DEFAULT_IMAGE_PROMPT: &str = "Describe what you see in detail.";

/// What kind of input started a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Text,
    Voice,
    Image,
}

/// Events emitted by the session controller
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A submission was accepted and its turn is running
    TurnStarted {
        request_id: Uuid,
        kind: SubmissionKind,
    },

    /// Final assistant text of a turn
    Response { request_id: Uuid, text: String },

    /// Spoken version of a response was written to disk
    SpeechReady {
        request_id: Uuid,
        path: PathBuf,
        duration_secs: Option<f32>,
    },

    /// A turn or its speech follow-up failed
    Error { request_id: Uuid, error: ZarvisError },

    /// Conversation history was cleared
    MemoryCleared,
}

impl SessionEvent {
    pub fn request_id(&self) -> Option<Uuid> {
        match self {
            SessionEvent::TurnStarted { request_id, .. }
            | SessionEvent::Response { request_id, .. }
            | SessionEvent::SpeechReady { request_id, .. }
            | SessionEvent::Error { request_id, .. } => Some(*request_id),
            SessionEvent::MemoryCleared => None,
        }
    }
}

fn emit(tx: &Sender<SessionEvent>, event: SessionEvent) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => warn!("Session event dropped, channel full: {:?}", event),
        Err(TrySendError::Disconnected(_)) => debug!("Session event receiver gone"),
    }
}

/// Clears the busy flag when a turn task ends, including by panic
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SessionController {
    orchestrator: Arc<Orchestrator>,
    speech: Arc<SpeechTool>,
    artifacts: ArtifactLifecycle,
    state: Arc<Mutex<ConversationState>>,
    busy: Arc<AtomicBool>,
    auto_speak: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    runtime: Handle,
    event_tx: Sender<SessionEvent>,
    event_rx: Receiver<SessionEvent>,
}

impl SessionController {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        speech: Arc<SpeechTool>,
        config: &SessionConfig,
        runtime: Handle,
    ) -> Self {
        let (event_tx, event_rx) = bounded(config.event_buffer.max(1));
        let artifacts = ArtifactLifecycle::new(config, runtime.clone());

        Self {
            orchestrator,
            speech,
            artifacts,
            state: Arc::new(Mutex::new(ConversationState::new())),
            busy: Arc::new(AtomicBool::new(false)),
            auto_speak: AtomicBool::new(false),
            cancel: Mutex::new(None),
            runtime,
            event_tx,
            event_rx,
        }
    }

    /// Receiver for session events; clones share one queue
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.event_rx.clone()
    }

    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<SessionEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Speak the responses of text and image turns
    pub fn set_auto_speak(&self, enabled: bool) {
        self.auto_speak.store(enabled, Ordering::SeqCst);
    }

    pub fn auto_speak(&self) -> bool {
        self.auto_speak.load(Ordering::SeqCst)
    }

    pub fn artifacts(&self) -> &ArtifactLifecycle {
        &self.artifacts
    }

    pub fn submit_text(&self, text: &str) -> Result<Uuid> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ZarvisError::InvalidArgument(
                "Message cannot be empty".to_string(),
            ));
        }
        self.dispatch(SubmissionKind::Text, text.to_string(), None, self.auto_speak())
    }

    /// Submit a recorded audio file; the recording is deleted after its turn
    pub fn submit_voice(&self, audio_path: &Path, auto_speak: bool) -> Result<Uuid> {
        let message = format!(
            "Transcribe the audio file at {} and respond to what was said.",
            audio_path.display()
        );
        self.dispatch(
            SubmissionKind::Voice,
            message,
            Some(audio_path.to_path_buf()),
            auto_speak,
        )
    }

    pub fn submit_image(&self, image_ref: &str, prompt: Option<&str>) -> Result<Uuid> {
        let image_ref = image_ref.trim();
        if image_ref.is_empty() {
            return Err(ZarvisError::InvalidArgument(
                "Image reference cannot be empty".to_string(),
            ));
        }
        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_IMAGE_PROMPT);

        let message = format!("Analyze the image at {}: {}", image_ref, prompt);
        self.dispatch(SubmissionKind::Image, message, None, self.auto_speak())
    }

    /// Cancel the turn in flight, if any
    pub fn cancel(&self) -> bool {
        if !self.is_busy() {
            return false;
        }
        match self.cancel.lock().take() {
            Some(token) => {
                info!("Cancelling turn in flight");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn clear_memory(&self) -> Result<()> {
        if self.is_busy() {
            return Err(ZarvisError::SessionBusy(
                "Cannot clear memory while a turn is running".to_string(),
            ));
        }
        *self.state.lock() = ConversationState::new();
        info!("Conversation memory cleared");
        emit(&self.event_tx, SessionEvent::MemoryCleared);
        Ok(())
    }

    /// Snapshot of the conversation as of the last completed turn
    pub fn history(&self) -> ConversationState {
        self.state.lock().clone()
    }

    /// Report that a speech file finished playing; returns whether a deletion was scheduled
    pub fn playback_complete(&self, path: &Path) -> bool {
        self.artifacts
            .fire(path, LifecycleEvent::PlaybackComplete)
            .is_some()
    }

    /// Cancel any running turn and delete every pending artifact
    pub async fn shutdown(&self) -> usize {
        self.cancel();
        self.artifacts.cleanup_now().await
    }

    fn dispatch(
        &self,
        kind: SubmissionKind,
        message: String,
        recording: Option<PathBuf>,
        speak: bool,
    ) -> Result<Uuid> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ZarvisError::SessionBusy(
                "A turn is already in progress".to_string(),
            ));
        }

        let request_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        *self.cancel.lock() = Some(cancel.clone());

        if let Some(path) = &recording {
            self.artifacts
                .register(path.clone(), LifecycleEvent::TranscriptionComplete);
        }

        let baseline = self.state.lock().clone();
        let orchestrator = self.orchestrator.clone();
        let speech = self.speech.clone();
        let artifacts = self.artifacts.clone();
        let state = self.state.clone();
        let busy = BusyGuard(self.busy.clone());
        let tx = self.event_tx.clone();

        info!("Turn {} started ({:?})", request_id, kind);
        emit(&tx, SessionEvent::TurnStarted { request_id, kind });

        self.runtime.spawn(async move {
            let outcome = orchestrator
                .think_cancellable(baseline, &message, cancel)
                .await;

            if let Some(path) = &recording {
                artifacts.fire(path, LifecycleEvent::TranscriptionComplete);
            }

            let response = match outcome {
                Ok(result) => {
                    debug!("Turn {} finished in {} round(s)", request_id, result.rounds);
                    *state.lock() = result.state;
                    drop(busy);
                    emit(
                        &tx,
                        SessionEvent::Response {
                            request_id,
                            text: result.response.clone(),
                        },
                    );
                    Some(result.response)
                }
                Err(failure) => {
                    warn!("Turn {} failed: {}", request_id, failure);
                    *state.lock() = failure.state;
                    drop(busy);
                    emit(
                        &tx,
                        SessionEvent::Error {
                            request_id,
                            error: failure.error,
                        },
                    );
                    None
                }
            };

            let Some(text) = response.filter(|t| speak && !t.trim().is_empty()) else {
                return;
            };

            let filename = format!("speech_{}.wav", request_id.simple());
            match speech.synthesize(&text, Some(filename.as_str()), None).await {
                Ok(path) => {
                    let duration_secs = wav_duration_secs(&path);
                    artifacts.register(path.clone(), LifecycleEvent::PlaybackComplete);
                    emit(
                        &tx,
                        SessionEvent::SpeechReady {
                            request_id,
                            path,
                            duration_secs,
                        },
                    );
                }
                Err(error) => {
                    warn!("Speech for turn {} failed: {}", request_id, error);
                    emit(&tx, SessionEvent::Error { request_id, error });
                }
            }
        });

        Ok(request_id)
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("busy", &self.is_busy())
            .field("auto_speak", &self.auto_speak())
            .field("messages", &self.state.lock().len())
            .field("artifacts", &self.artifacts)
            .finish_non_exhaustive()
    }
}

//! Delayed cleanup of transient audio files
//!
//! Recordings and synthesized speech are handed to [`ArtifactLifecycle`]
//! once their creator is done with them. Each artifact waits for one
//! lifecycle event; when it fires, the file is deleted after a fixed delay.
//! Firing twice, or for a file that is already gone, does nothing.

use crate::config::SessionConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Event that starts an artifact's deletion countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Synthesized speech finished playing
    PlaybackComplete,

    /// A recording finished its transcription turn
    TranscriptionComplete,
}

struct Inner {
    pending: Mutex<HashMap<PathBuf, LifecycleEvent>>,
    playback_delay: Duration,
    recording_delay: Duration,
    runtime: Handle,
}

#[derive(Clone)]
pub struct ArtifactLifecycle {
    inner: Arc<Inner>,
}

impl ArtifactLifecycle {
    pub fn new(config: &SessionConfig, runtime: Handle) -> Self {
        Self::with_delays(
            config.playback_cleanup_delay(),
            config.recording_cleanup_delay(),
            runtime,
        )
    }

    pub fn with_delays(playback_delay: Duration, recording_delay: Duration, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                playback_delay,
                recording_delay,
                runtime,
            }),
        }
    }

    /// Delay applied after `event` fires
    pub fn delay_for(&self, event: LifecycleEvent) -> Duration {
        match event {
            LifecycleEvent::PlaybackComplete => self.inner.playback_delay,
            LifecycleEvent::TranscriptionComplete => self.inner.recording_delay,
        }
    }

    /// Take ownership of `path`; it is deleted some time after `trigger` fires
    pub fn register(&self, path: impl Into<PathBuf>, trigger: LifecycleEvent) {
        let path = path.into();
        debug!("Artifact registered: {} (on {:?})", path.display(), trigger);
        self.inner.pending.lock().insert(path, trigger);
    }

    /// Fire `event` for `path`.
    ///
    /// Returns the handle of the scheduled deletion, or `None` when the path
    /// is not waiting for this event.
    pub fn fire(&self, path: &Path, event: LifecycleEvent) -> Option<JoinHandle<()>> {
        {
            let mut pending = self.inner.pending.lock();
            match pending.get(path) {
                Some(trigger) if *trigger == event => {
                    pending.remove(path);
                }
                _ => {
                    debug!("No artifact waiting on {:?} for {}", event, path.display());
                    return None;
                }
            }
        }

        let delay = self.delay_for(event);
        let path = path.to_path_buf();
        Some(self.inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            delete_artifact(&path).await;
        }))
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.inner.pending.lock().contains_key(path)
    }

    pub fn pending(&self) -> Vec<PathBuf> {
        self.inner.pending.lock().keys().cloned().collect()
    }

    /// Delete every artifact still waiting for its event; returns how many were taken
    pub async fn cleanup_now(&self) -> usize {
        let paths: Vec<PathBuf> = self.inner.pending.lock().drain().map(|(p, _)| p).collect();
        for path in &paths {
            delete_artifact(path).await;
        }
        paths.len()
    }
}

/// Remove a file, tolerating it being gone already. Failures are logged only.
pub async fn delete_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Artifact deleted: {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Artifact already gone: {}", path.display())
        }
        Err(e) => warn!("Failed to delete artifact {}: {}", path.display(), e),
    }
}

impl std::fmt::Debug for ArtifactLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactLifecycle")
            .field("pending", &self.inner.pending.lock().len())
            .field("playback_delay", &self.inner.playback_delay)
            .field("recording_delay", &self.inner.recording_delay)
            .finish()
    }
}

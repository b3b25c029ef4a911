/// Preview controller
///
/// Owns the single active selection. Every selection takes a fresh
/// `SelectionToken`; a decrypt result is applied only if it carries the
/// current token and the controller is still waiting for it. Anything else
/// is dropped on arrival.
///
/// States:
/// - `Empty` - nothing selected
/// - `ThumbnailOnly` - selected, showing the thumbnail, no decrypt running
/// - `Decrypting` - thumbnail shown while the full decrypt runs
/// - `FullPreview` - decrypted artifact shown

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use super::data::{ContainerItem, Thumbnail};
use crate::bridge::{BridgeError, SharedEngine};

/// Identity of one selection. Strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectionToken(u64);

/// Identity of one decrypted artifact, distinct even when the engine
/// reuses the same file location
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactGeneration(u64);

/// Reference to a decrypted artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub location: PathBuf,
    pub generation: ArtifactGeneration,
}

/// Why a preview decrypt did not produce an artifact
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptFailure {
    #[error("{0}")]
    Engine(String),

    #[error("decrypt timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

impl From<BridgeError> for DecryptFailure {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Engine(message) => DecryptFailure::Engine(message),
            other => DecryptFailure::Engine(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PreviewState {
    #[default]
    Empty,
    ThumbnailOnly {
        item_path: String,
        thumbnail: Option<Thumbnail>,
    },
    Decrypting {
        item_path: String,
        thumbnail: Option<Thumbnail>,
        token: SelectionToken,
    },
    FullPreview {
        item_path: String,
        artifact: ArtifactRef,
        token: SelectionToken,
    },
}

impl PreviewState {
    pub fn item_path(&self) -> Option<&str> {
        match self {
            PreviewState::Empty => None,
            PreviewState::ThumbnailOnly { item_path, .. }
            | PreviewState::Decrypting { item_path, .. }
            | PreviewState::FullPreview { item_path, .. } => Some(item_path),
        }
    }
}

/// A decrypt that has been issued for a selection, not yet run
pub struct DecryptRequest {
    pub token: SelectionToken,
    pub item_path: String,
    password: String,
    /// Directory private to this selection
    artifact_dir: PathBuf,
    timeout: Duration,
}

impl DecryptRequest {
    /// Run the decrypt with a bounded wait. On timeout the engine call is
    /// abandoned, not cancelled.
    pub async fn run(self, engine: SharedEngine) -> DecryptOutcome {
        let call = engine.decrypt_to_artifact(self.item_path.clone(), self.password, self.artifact_dir);
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(location)) => Ok(location),
            Ok(Err(e)) => Err(DecryptFailure::from(e)),
            Err(_) => Err(DecryptFailure::TimedOut(self.timeout)),
        };

        DecryptOutcome {
            token: self.token,
            item_path: self.item_path,
            result,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecryptOutcome {
    pub token: SelectionToken,
    pub item_path: String,
    pub result: Result<PathBuf, DecryptFailure>,
}

/// What `complete` did with an outcome
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Applied(ArtifactRef),
    /// Superseded or duplicate; state untouched
    Discarded,
    /// Current request failed; preview fell back to the thumbnail
    Failed(DecryptFailure),
}

#[derive(Debug)]
pub struct PreviewController {
    state: PreviewState,
    /// Token of the newest selection; only its outcome can apply
    current: SelectionToken,
    /// Artifacts applied so far
    generations: u64,
    /// Root under which each selection gets its own directory
    artifact_dir: PathBuf,
    /// Upper bound on one decrypt wait
    timeout: Duration,
}

impl PreviewController {
    pub fn new(artifact_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            state: PreviewState::Empty,
            current: SelectionToken(0),
            generations: 0,
            artifact_dir,
            timeout,
        }
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn current_token(&self) -> SelectionToken {
        self.current
    }

    /// The artifact being shown, if any
    pub fn artifact(&self) -> Option<&ArtifactRef> {
        match &self.state {
            PreviewState::FullPreview { artifact, .. } => Some(artifact),
            _ => None,
        }
    }

    /// Where the engine writes the artifact for selection `token`. The
    /// bridge creates the directory on demand.
    pub fn selection_dir(&self, token: SelectionToken) -> PathBuf {
        self.artifact_dir.join(format!("selection-{}", token.0))
    }

    fn next_token(&mut self) -> SelectionToken {
        self.current = SelectionToken(self.current.0 + 1);
        self.current
    }

    /// Select `item`. Shows `thumbnail` straight away and, when a password
    /// is given, returns the decrypt to run. Any earlier request is superseded.
    pub fn select(
        &mut self,
        item: &ContainerItem,
        thumbnail: Option<Thumbnail>,
        password: &str,
    ) -> Option<DecryptRequest> {
        let token = self.next_token();

        if password.is_empty() {
            self.state = PreviewState::ThumbnailOnly {
                item_path: item.path.clone(),
                thumbnail,
            };
            return None;
        }

        info!("🔓 Selection {} decrypting {}", token.0, item.path);
        self.state = PreviewState::Decrypting {
            item_path: item.path.clone(),
            thumbnail,
            token,
        };

        // Each selection gets its own directory, so a superseded engine call
        // still running cannot overwrite the artifact of the current one
        Some(DecryptRequest {
            token,
            item_path: item.path.clone(),
            password: password.to_string(),
            artifact_dir: self.selection_dir(token),
            timeout: self.timeout,
        })
    }

    /// Apply a decrypt outcome if and only if it is the one being waited for
    pub fn complete(&mut self, outcome: DecryptOutcome) -> Completion {
        // Only the newest selection, and only while it is still decrypting
        let waiting = matches!(
            &self.state,
            PreviewState::Decrypting { token, .. } if *token == outcome.token
        );
        if outcome.token != self.current || !waiting {
            info!("🗑️  Discarding decrypt for {} (selection {})", outcome.item_path, outcome.token.0);
            return Completion::Discarded;
        }

        let (item_path, thumbnail) = match std::mem::take(&mut self.state) {
            PreviewState::Decrypting {
                item_path, thumbnail, ..
            } => (item_path, thumbnail),
            other => {
                self.state = other;
                return Completion::Discarded;
            }
        };

        match outcome.result {
            Ok(location) => {
                self.generations += 1;
                let artifact = ArtifactRef {
                    location,
                    generation: ArtifactGeneration(self.generations),
                };
                info!("✅ Selection {} showing {}", outcome.token.0, item_path);
                self.state = PreviewState::FullPreview {
                    item_path,
                    artifact: artifact.clone(),
                    token: outcome.token,
                };
                Completion::Applied(artifact)
            }
            Err(failure) => {
                warn!("⚠️  Decrypt of {} failed: {}", item_path, failure);
                self.state = PreviewState::ThumbnailOnly { item_path, thumbnail };
                Completion::Failed(failure)
            }
        }
    }

    /// A thumbnail arrived after its item was selected; use it as the interim view
    pub fn thumbnail_arrived(&mut self, path: &str, arrived: &Thumbnail) {
        match &mut self.state {
            PreviewState::ThumbnailOnly { item_path, thumbnail }
            | PreviewState::Decrypting {
                item_path, thumbnail, ..
            } if item_path == path && thumbnail.is_none() => {
                *thumbnail = Some(arrived.clone());
            }
            _ => {}
        }
    }

    /// Forget the selection; anything still in flight becomes stale
    pub fn reset(&mut self) {
        self.next_token();
        self.state = PreviewState::Empty;
    }
}

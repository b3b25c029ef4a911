/// Request/response bridge to the external crypto engine
///
/// The engine owns the container format, the cipher and the folder walk.
/// This module only knows how to ask it for things:
/// - `wire.rs` - JSON requests and replies
/// - `process.rs` - runs the engine program once per call
/// - `fake.rs` - in-memory engine for tests

pub mod process;
pub mod wire;

#[cfg(test)]
pub mod fake;

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::state::data::ContainerItem;

pub use process::ProcessEngine;

/// Everything that can go wrong between us and the engine.
///
/// `Engine` carries the engine's own text untouched; callers show it as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("failed to start engine `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    #[error("engine pipe error: {0}")]
    Io(String),

    #[error("engine exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },

    #[error("malformed engine reply: {0}")]
    Malformed(String),

    #[error("{0}")]
    Engine(String),
}

/// Reply to `read-item-metadata`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemMetadata {
    /// Encoded image bytes; `None` means the item is not previewable
    pub thumbnail: Option<Vec<u8>>,
}

/// The five engine calls.
///
/// Every call returns an owned `'static` future so results can be carried
/// through `iced::Task::perform` and outlive the UI borrow that issued them.
pub trait Engine: Send + Sync {
    /// Unfiltered listing of `folder`, in the engine's order
    fn scan_folder(&self, folder: String) -> BoxFuture<'static, Result<Vec<ContainerItem>, BridgeError>>;

    /// Cheap per-item metadata; never decrypts the body
    fn read_item_metadata(&self, item: String) -> BoxFuture<'static, Result<ItemMetadata, BridgeError>>;

    /// Decrypt `item` into a transient plaintext file inside `artifact_dir`,
    /// creating the directory if needed. The file name may be the same for
    /// every call.
    fn decrypt_to_artifact(
        &self,
        item: String,
        password: String,
        artifact_dir: PathBuf,
    ) -> BoxFuture<'static, Result<PathBuf, BridgeError>>;

    /// Every password becomes an independent key slot.
    fn encrypt_folder(&self, folder: String, passwords: Vec<String>) -> BoxFuture<'static, Result<String, BridgeError>>;

    /// Any one enrolled password opens every container in `folder`
    fn decrypt_folder(&self, folder: String, password: String) -> BoxFuture<'static, Result<String, BridgeError>>;
}

/// Shared handle passed into every background task
pub type SharedEngine = Arc<dyn Engine>;

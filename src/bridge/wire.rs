/// JSON messages exchanged with the engine program
///
/// One request goes in on stdin, one reply comes back on stdout.
/// A reply is either the call's payload or `{"error": "..."}`.

use std::path::PathBuf;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{BridgeError, ItemMetadata};
use crate::state::data::ContainerItem;

/// A single engine call. Deliberately not `Debug`: it carries passwords.
#[derive(Serialize)]
#[serde(tag = "call", rename_all = "kebab-case")]
pub enum Request {
    ScanFolder {
        path: String,
    },
    ReadItemMetadata {
        path: String,
    },
    DecryptToArtifact {
        path: String,
        password: String,
        artifact_dir: PathBuf,
    },
    EncryptFolder {
        path: String,
        passwords: Vec<String>,
    },
    DecryptFolder {
        path: String,
        password: String,
    },
}

impl Request {
    /// Call name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Request::ScanFolder { .. } => "scan-folder",
            Request::ReadItemMetadata { .. } => "read-item-metadata",
            Request::DecryptToArtifact { .. } => "decrypt-to-artifact",
            Request::EncryptFolder { .. } => "encrypt-folder",
            Request::DecryptFolder { .. } => "decrypt-folder",
        }
    }
}

/// Either an engine-reported failure or the payload.
/// `Failure` is tried first so payloads with optional fields never swallow an error.
#[derive(Deserialize)]
#[serde(untagged)]
enum Reply<T> {
    Failure { error: String },
    Success(T),
}

#[derive(Debug, Deserialize)]
pub struct ScanReply {
    pub entries: Vec<ContainerItem>,
}

/// Extra keys the engine may add (sizes, timestamps) are ignored.
#[derive(Debug, Deserialize)]
pub struct MetadataReply {
    pub thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArtifactReply {
    pub artifact: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct MessageReply {
    pub message: String,
}

impl TryFrom<MetadataReply> for ItemMetadata {
    type Error = BridgeError;

    fn try_from(reply: MetadataReply) -> Result<Self, Self::Error> {
        let thumbnail = match reply.thumbnail {
            Some(encoded) if !encoded.is_empty() => Some(
                base64::engine::general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| BridgeError::Malformed(format!("thumbnail is not base64: {}", e)))?,
            ),
            _ => None,
        };
        Ok(ItemMetadata { thumbnail })
    }
}

/// Decode a reply body into `T`, surfacing `{"error": ...}` verbatim.
pub fn decode_reply<T>(body: &[u8]) -> Result<T, BridgeError>
where
    T: for<'de> Deserialize<'de>,
{
    match serde_json::from_slice::<Reply<T>>(body) {
        Ok(Reply::Success(payload)) => Ok(payload),
        Ok(Reply::Failure { error }) => Err(BridgeError::Engine(error)),
        Err(e) => Err(BridgeError::Malformed(e.to_string())),
    }
}

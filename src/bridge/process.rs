/// Engine reached as a child process
///
/// Each call spawns the configured program, writes one JSON request to its
/// stdin, closes stdin and parses the whole of stdout as the reply.
/// A call that is abandoned (for example by a timeout) is not killed; the
/// child runs to completion and its reply is dropped.

use std::path::PathBuf;
use std::process::Stdio;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::wire::{self, ArtifactReply, MessageReply, MetadataReply, Request, ScanReply};
use super::{BridgeError, Engine, ItemMetadata};
use crate::state::data::ContainerItem;

/// Runs `program args...` once per engine call
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: String,
    args: Vec<String>,
}

impl ProcessEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Send `request` and decode the reply as `T`
    fn call<T>(&self, request: Request) -> BoxFuture<'static, Result<T, BridgeError>>
    where
        T: for<'de> serde::Deserialize<'de> + Send + 'static,
    {
        let program = self.program.clone();
        let args = self.args.clone();

        async move {
            let body = exchange(&program, &args, &request).await?;
            wire::decode_reply(&body)
        }
        .boxed()
    }
}

/// Run the engine for one request and return its stdout
async fn exchange(program: &str, args: &[String], request: &Request) -> Result<Vec<u8>, BridgeError> {
    let payload = serde_json::to_vec(request).map_err(|e| BridgeError::Malformed(e.to_string()))?;

    debug!(call = request.name(), program, "engine call");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BridgeError::Spawn {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

    // Requests are small, so writing everything before reading cannot stall
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| BridgeError::Io("engine stdin unavailable".to_string()))?;
    stdin
        .write_all(&payload)
        .await
        .map_err(|e| BridgeError::Io(format!("write request: {}", e)))?;
    drop(stdin);

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| BridgeError::Io(format!("read reply: {}", e)))?;

    let stdout_is_blank = output.stdout.iter().all(u8::is_ascii_whitespace);
    if !output.status.success() && stdout_is_blank {
        return Err(BridgeError::Exited {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    debug!(call = request.name(), bytes = output.stdout.len(), "engine reply");
    Ok(output.stdout)
}

impl Engine for ProcessEngine {
    fn scan_folder(&self, folder: String) -> BoxFuture<'static, Result<Vec<ContainerItem>, BridgeError>> {
        self.call::<ScanReply>(Request::ScanFolder { path: folder })
            .map(|reply| reply.map(|r| r.entries))
            .boxed()
    }

    fn read_item_metadata(&self, item: String) -> BoxFuture<'static, Result<ItemMetadata, BridgeError>> {
        self.call::<MetadataReply>(Request::ReadItemMetadata { path: item })
            .map(|reply| reply.and_then(ItemMetadata::try_from))
            .boxed()
    }

    fn decrypt_to_artifact(
        &self,
        item: String,
        password: String,
        artifact_dir: PathBuf,
    ) -> BoxFuture<'static, Result<PathBuf, BridgeError>> {
        let call = self.call::<ArtifactReply>(Request::DecryptToArtifact {
            path: item,
            password,
            artifact_dir: artifact_dir.clone(),
        });

        async move {
            // Each selection has its own directory, which may not exist yet
            tokio::fs::create_dir_all(&artifact_dir)
                .await
                .map_err(|e| BridgeError::Io(format!("create {}: {}", artifact_dir.display(), e)))?;
            call.await.map(|r| r.artifact)
        }
        .boxed()
    }

    fn encrypt_folder(&self, folder: String, passwords: Vec<String>) -> BoxFuture<'static, Result<String, BridgeError>> {
        self.call::<MessageReply>(Request::EncryptFolder {
            path: folder,
            passwords,
        })
        .map(|reply| reply.map(|r| r.message))
        .boxed()
    }

    fn decrypt_folder(&self, folder: String, password: String) -> BoxFuture<'static, Result<String, BridgeError>> {
        self.call::<MessageReply>(Request::DecryptFolder { path: folder, password })
            .map(|reply| reply.map(|r| r.message))
            .boxed()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// An engine that ignores its request and prints `script`'s output
    fn shell_engine(script: &str) -> ProcessEngine {
        ProcessEngine::new("sh", vec!["-c".to_string(), format!("cat >/dev/null; {}", script)])
    }

    #[tokio::test]
    async fn test_scan_through_child_process() {
        let engine = shell_engine(r#"echo '{"entries":[{"path":"/d/a.cry","is_dir":false}]}'"#);
        let entries = engine.scan_folder("/d".to_string()).await.unwrap();

        assert_eq!(entries, vec![ContainerItem::file("/d/a.cry")]);
    }

    #[tokio::test]
    async fn test_request_reaches_engine_stdin() {
        // Bounce the request back through stderr
        let engine = ProcessEngine::new("sh", vec!["-c".to_string(), "cat >&2; exit 1".to_string()]);
        let err = engine
            .decrypt_folder("/d".to_string(), "secret1".to_string())
            .await
            .unwrap_err();

        let stderr = match err {
            BridgeError::Exited { stderr, .. } => stderr,
            other => panic!("unexpected error: {other:?}"),
        };
        let request: serde_json::Value = serde_json::from_str(&stderr).unwrap();
        assert_eq!(request["call"], "decrypt-folder");
        assert_eq!(request["path"], "/d");
        assert_eq!(request["password"], "secret1");
    }

    #[tokio::test]
    async fn test_engine_error_is_verbatim() {
        let engine = shell_engine(r#"echo '{"error":"解密失败：(/d/a.cry)"}'"#);
        let err = engine
            .decrypt_to_artifact("/d/a.cry".to_string(), "secret1".to_string(), PathBuf::from("/tmp"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "解密失败：(/d/a.cry)");
    }

    #[tokio::test]
    async fn test_artifact_directory_is_created_before_the_call() {
        let root = std::env::temp_dir().join(format!("cryview-process-{}", std::process::id()));
        let dir = root.join("selection-3");
        let engine = shell_engine(&format!(r#"echo '{{"artifact":"{}/preview"}}'"#, dir.display()));

        let location = engine
            .decrypt_to_artifact("/d/a.cry".to_string(), "secret1".to_string(), dir.clone())
            .await
            .unwrap();

        assert!(dir.is_dir());
        assert_eq!(location, dir.join("preview"));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_silent_failure_reports_stderr() {
        let engine = shell_engine("echo 'no such folder' >&2; exit 3");
        let err = engine.scan_folder("/nope".to_string()).await.unwrap_err();

        match err {
            BridgeError::Exited { stderr, .. } => assert_eq!(stderr, "no such folder"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let engine = ProcessEngine::new("/definitely/not/an/engine", Vec::new());
        let err = engine.encrypt_folder("/d".to_string(), vec![]).await.unwrap_err();

        assert!(matches!(err, BridgeError::Spawn { .. }));
    }
}

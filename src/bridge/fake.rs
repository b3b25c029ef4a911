/// In-memory engine for tests
///
/// Models just enough of a real engine: folder listings, per-item
/// thumbnails, per-path latency, a virtual file tree for bulk operations
/// where every enrolled password is an independent key slot, and a
/// decrypt call that writes `preview` into whatever directory it is given.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};

use super::{BridgeError, Engine, ItemMetadata};
use crate::state::data::ContainerItem;

const SUFFIX: &str = ".cry";

/// Sealed file in the virtual tree
#[derive(Debug, Clone)]
struct Sealed {
    slots: Vec<String>,
    body: Vec<u8>,
}

#[derive(Debug, Default)]
struct FakeState {
    listings: HashMap<String, Result<Vec<ContainerItem>, String>>,
    thumbnails: HashMap<String, Result<Option<Vec<u8>>, String>>,
    delays: HashMap<String, Duration>,
    failing_decrypts: HashMap<String, String>,
    plain: HashMap<String, Vec<u8>>,
    sealed: HashMap<String, Sealed>,
    metadata_calls: HashMap<String, usize>,
    decrypt_calls: usize,
    folder_calls: usize,
}

/// Cheap to clone; clones share state
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<FakeState>>,
}

/// PNG signature followed by `tag`, enough for format sniffing
pub fn png_bytes(tag: &str) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(tag.as_bytes());
    bytes
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(self, change: impl FnOnce(&mut FakeState)) -> Self {
        change(&mut self.state.lock().unwrap());
        self
    }

    pub fn with_listing(self, folder: &str, entries: Vec<ContainerItem>) -> Self {
        self.with(|s| {
            s.listings.insert(folder.to_string(), Ok(entries));
        })
    }

    pub fn with_failing_listing(self, folder: &str, error: &str) -> Self {
        self.with(|s| {
            s.listings.insert(folder.to_string(), Err(error.to_string()));
        })
    }

    pub fn with_thumbnail(self, item: &str, bytes: Option<Vec<u8>>) -> Self {
        self.with(|s| {
            s.thumbnails.insert(item.to_string(), Ok(bytes));
        })
    }

    pub fn with_failing_thumbnail(self, item: &str, error: &str) -> Self {
        self.with(|s| {
            s.thumbnails.insert(item.to_string(), Err(error.to_string()));
        })
    }

    /// Every call about `path` waits `delay` before answering
    pub fn with_delay(self, path: &str, delay: Duration) -> Self {
        self.with(|s| {
            s.delays.insert(path.to_string(), delay);
        })
    }

    pub fn with_failing_decrypt(self, item: &str, error: &str) -> Self {
        self.with(|s| {
            s.failing_decrypts.insert(item.to_string(), error.to_string());
        })
    }

    pub fn with_file(self, path: &str, body: &[u8]) -> Self {
        self.with(|s| {
            s.plain.insert(path.to_string(), body.to_vec());
        })
    }

    pub fn metadata_calls(&self, item: &str) -> usize {
        self.state.lock().unwrap().metadata_calls.get(item).copied().unwrap_or(0)
    }

    pub fn total_metadata_calls(&self) -> usize {
        self.state.lock().unwrap().metadata_calls.values().sum()
    }

    pub fn decrypt_calls(&self) -> usize {
        self.state.lock().unwrap().decrypt_calls
    }

    pub fn folder_calls(&self) -> usize {
        self.state.lock().unwrap().folder_calls
    }

    pub fn plain_file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().plain.get(path).cloned()
    }

    pub fn is_sealed(&self, path: &str) -> bool {
        self.state.lock().unwrap().sealed.contains_key(path)
    }

    fn delay_for(&self, path: &str) -> Duration {
        self.state.lock().unwrap().delays.get(path).copied().unwrap_or_default()
    }
}

fn in_folder(folder: &str, path: &str) -> bool {
    path.strip_prefix(folder)
        .is_some_and(|rest| rest.starts_with('/'))
}

impl Engine for FakeEngine {
    fn scan_folder(&self, folder: String) -> BoxFuture<'static, Result<Vec<ContainerItem>, BridgeError>> {
        let this = self.clone();
        async move {
            tokio::time::sleep(this.delay_for(&folder)).await;
            let state = this.state.lock().unwrap();
            match state.listings.get(&folder) {
                Some(Ok(entries)) => Ok(entries.clone()),
                Some(Err(e)) => Err(BridgeError::Engine(e.clone())),
                None => Err(BridgeError::Engine(format!("打开路径失败({})", folder))),
            }
        }
        .boxed()
    }

    fn read_item_metadata(&self, item: String) -> BoxFuture<'static, Result<ItemMetadata, BridgeError>> {
        let this = self.clone();
        this.state.lock().unwrap().metadata_calls.entry(item.clone()).and_modify(|n| *n += 1).or_insert(1);
        async move {
            tokio::time::sleep(this.delay_for(&item)).await;
            let state = this.state.lock().unwrap();
            match state.thumbnails.get(&item) {
                Some(Ok(thumbnail)) => Ok(ItemMetadata {
                    thumbnail: thumbnail.clone(),
                }),
                Some(Err(e)) => Err(BridgeError::Engine(e.clone())),
                None => Ok(ItemMetadata::default()),
            }
        }
        .boxed()
    }

    fn decrypt_to_artifact(
        &self,
        item: String,
        password: String,
        artifact_dir: PathBuf,
    ) -> BoxFuture<'static, Result<PathBuf, BridgeError>> {
        let this = self.clone();
        this.state.lock().unwrap().decrypt_calls += 1;
        async move {
            tokio::time::sleep(this.delay_for(&item)).await;
            let state = this.state.lock().unwrap();
            if let Some(error) = state.failing_decrypts.get(&item) {
                return Err(BridgeError::Engine(error.clone()));
            }
            match state.sealed.get(&item) {
                Some(sealed) if !sealed.slots.contains(&password) => {
                    Err(BridgeError::Engine("提供的密码不匹配任何加密密钥".to_string()))
                }
                // Fixed file name inside the caller's directory, like the real engine
                _ => Ok(artifact_dir.join("preview")),
            }
        }
        .boxed()
    }

    fn encrypt_folder(&self, folder: String, passwords: Vec<String>) -> BoxFuture<'static, Result<String, BridgeError>> {
        let this = self.clone();
        this.state.lock().unwrap().folder_calls += 1;
        async move {
            tokio::time::sleep(this.delay_for(&folder)).await;
            let mut state = this.state.lock().unwrap();
            let targets: Vec<String> = state
                .plain
                .keys()
                .filter(|path| in_folder(&folder, path) && !path.ends_with(SUFFIX))
                .cloned()
                .collect();
            for path in &targets {
                if let Some(body) = state.plain.remove(path) {
                    let sealed = Sealed {
                        slots: passwords.clone(),
                        body,
                    };
                    state.sealed.insert(format!("{}{}", path, SUFFIX), sealed);
                }
            }
            Ok(format!("加密完毕：{}，{} 个文件", folder, targets.len()))
        }
        .boxed()
    }

    fn decrypt_folder(&self, folder: String, password: String) -> BoxFuture<'static, Result<String, BridgeError>> {
        let this = self.clone();
        this.state.lock().unwrap().folder_calls += 1;
        async move {
            tokio::time::sleep(this.delay_for(&folder)).await;
            let mut state = this.state.lock().unwrap();
            let targets: Vec<String> = state
                .sealed
                .keys()
                .filter(|path| in_folder(&folder, path))
                .cloned()
                .collect();

            let refused = targets
                .iter()
                .find(|path| !state.sealed[*path].slots.contains(&password));
            if let Some(path) = refused {
                return Err(BridgeError::Engine(format!("解密失败：({})", path)));
            }

            for path in targets {
                if let Some(sealed) = state.sealed.remove(&path) {
                    let plain_path = path.trim_end_matches(SUFFIX).to_string();
                    state.plain.insert(plain_path, sealed.body);
                }
            }
            Ok("解密完毕".to_string())
        }
        .boxed()
    }
}

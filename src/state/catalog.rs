/// Container catalog
///
/// Turns a folder path into the list of browsable containers. The engine
/// does the listing; filtering happens here so the UI never sees
/// directories, foreign files or platform bookkeeping entries.

use thiserror::Error;
use tracing::{info, warn};

use super::data::{ContainerItem, FolderSnapshot, ScanId};
use crate::bridge::{BridgeError, SharedEngine};

/// Bookkeeping files some platforms drop into every folder
const HOUSEKEEPING_NAMES: &[&str] = &["Thumbs.db", "ehthumbs.db", "desktop.ini", "Icon\r"];

/// Folders whose contents are bookkeeping as a whole
const HOUSEKEEPING_DIRS: &[&str] = &["__MACOSX", ".Trashes", ".Spotlight-V100", ".fseventsd"];

/// Why a folder could not be listed. Displays as the engine's own text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{source}")]
pub struct ScanFailure {
    #[source]
    pub source: BridgeError,
}

/// Result of one scan. A failure still carries an empty snapshot so the
/// browse view has something to show, but stays distinguishable from an
/// empty folder.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Listed(FolderSnapshot),
    Failed {
        snapshot: FolderSnapshot,
        failure: ScanFailure,
    },
}

impl ScanOutcome {
    pub fn snapshot(&self) -> &FolderSnapshot {
        match self {
            ScanOutcome::Listed(snapshot) => snapshot,
            ScanOutcome::Failed { snapshot, .. } => snapshot,
        }
    }

    pub fn into_snapshot(self) -> FolderSnapshot {
        match self {
            ScanOutcome::Listed(snapshot) => snapshot,
            ScanOutcome::Failed { snapshot, .. } => snapshot,
        }
    }

    pub fn failure(&self) -> Option<&ScanFailure> {
        match self {
            ScanOutcome::Listed(_) => None,
            ScanOutcome::Failed { failure, .. } => Some(failure),
        }
    }
}

/// True for entries that only exist for the OS's own bookkeeping
pub fn is_housekeeping(item: &ContainerItem) -> bool {
    let name = item.file_name();

    // Hidden files, including AppleDouble `._x.cry` shadows and `.DS_Store`
    if name.starts_with('.') || HOUSEKEEPING_NAMES.contains(&name) {
        return true;
    }

    item.path
        .split(|c| c == '/' || c == '\\')
        .any(|part| HOUSEKEEPING_DIRS.contains(&part))
}

/// Keep only non-directory entries ending in `suffix`, minus bookkeeping
pub fn filter_entries(entries: Vec<ContainerItem>, suffix: &str) -> Vec<ContainerItem> {
    entries
        .into_iter()
        .filter(|item| !item.is_directory)
        .filter(|item| item.file_name().len() > suffix.len() && item.file_name().ends_with(suffix))
        .filter(|item| !is_housekeeping(item))
        .collect()
}

/// Scan `folder` through the engine and build snapshot `id`
pub async fn scan(engine: SharedEngine, folder: String, suffix: String, id: ScanId) -> ScanOutcome {
    info!("🔍 Scanning folder: {}", folder);

    match engine.scan_folder(folder.clone()).await {
        Ok(entries) => {
            let listed = entries.len();
            let items = filter_entries(entries, &suffix);
            info!("✅ Scan {} listed {} entries, {} containers", id.0, listed, items.len());
            ScanOutcome::Listed(FolderSnapshot::new(id, folder, items))
        }
        Err(source) => {
            warn!("⚠️  Scan {} of {} failed: {}", id.0, folder, source);
            ScanOutcome::Failed {
                snapshot: FolderSnapshot::empty(id, folder),
                failure: ScanFailure { source },
            }
        }
    }
}

/// A scan that has been issued but not yet run
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub id: ScanId,
    pub folder: String,
    suffix: String,
}

impl ScanRequest {
    pub async fn run(self, engine: SharedEngine) -> ScanCompletion {
        let outcome = scan(engine, self.folder.clone(), self.suffix, self.id).await;
        ScanCompletion { id: self.id, outcome }
    }
}

#[derive(Debug, Clone)]
pub struct ScanCompletion {
    pub id: ScanId,
    pub outcome: ScanOutcome,
}

/// Issues scans and accepts only the newest one's result
#[derive(Debug)]
pub struct ContainerCatalog {
    /// File name suffix of a container, `.cry` by default
    suffix: String,
    /// The scan whose result will be accepted, if one is in flight
    latest: Option<ScanId>,
    /// Scans issued so far; the next id is one more
    issued: u64,
}

impl ContainerCatalog {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            latest: None,
            issued: 0,
        }
    }

    /// Issue a new scan; any scan still in flight becomes stale
    pub fn begin_scan(&mut self, folder: impl Into<String>) -> ScanRequest {
        self.issued += 1;
        let id = ScanId(self.issued);
        self.latest = Some(id);

        ScanRequest {
            id,
            folder: folder.into(),
            suffix: self.suffix.clone(),
        }
    }

    /// Hand back the outcome if it belongs to the newest scan
    pub fn finish(&mut self, completion: ScanCompletion) -> Option<ScanOutcome> {
        if self.latest != Some(completion.id) {
            info!("🗑️  Dropping stale scan {}", completion.id.0);
            return None;
        }
        self.latest = None;
        Some(completion.outcome)
    }

    /// Stop waiting for the in-flight scan; its result will be dropped
    pub fn cancel(&mut self) {
        if let Some(id) = self.latest.take() {
            info!("✋ Cancelled scan {}", id.0);
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.latest.is_some()
    }
}

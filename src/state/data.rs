/// Shared data structures for the browsing pipeline
///
/// These structs represent the data model that flows between
/// the engine bridge, the core state machines and the UI layer.

use std::collections::HashMap;
use std::fmt;

use iced::widget::image;
use serde::Deserialize;

/// One entry of an engine folder listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContainerItem {
    /// Full path, unique within one snapshot
    pub path: String,
    #[serde(rename = "is_dir")]
    pub is_directory: bool,
}

impl ContainerItem {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
        }
    }

    /// Last path component, accepting both separators
    pub fn file_name(&self) -> &str {
        self.path
            .rsplit(|c| c == '/' || c == '\\')
            .find(|part| !part.is_empty())
            .unwrap_or(&self.path)
    }
}

/// Identity of one scan; also identifies the snapshot it produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScanId(pub u64);

/// The ordered result of one scan of one folder.
///
/// Replaced wholesale on re-scan, never patched.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderSnapshot {
    id: ScanId,
    /// Folder as the user typed it
    folder: String,
    /// Containers in engine order
    items: Vec<ContainerItem>,
    /// Path to position in `items`
    index: HashMap<String, usize>,
}

impl FolderSnapshot {
    pub fn new(id: ScanId, folder: impl Into<String>, items: Vec<ContainerItem>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.path.clone(), i))
            .collect();

        Self {
            id,
            folder: folder.into(),
            items,
            index,
        }
    }

    /// Snapshot with no items, used when a scan fails
    pub fn empty(id: ScanId, folder: impl Into<String>) -> Self {
        Self::new(id, folder, Vec::new())
    }

    pub fn id(&self) -> ScanId {
        self.id
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn items(&self) -> &[ContainerItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ContainerItem> {
        self.items.get(index)
    }

    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.index.get(path).copied()
    }

    /// Look an item up by its stable path
    pub fn item(&self, path: &str) -> Option<&ContainerItem> {
        self.index_of(path).and_then(|i| self.items.get(i))
    }
}

/// Encoded thumbnail image plus the render handle built from it.
///
/// The handle is created once so the renderer decodes each thumbnail once.
#[derive(Clone)]
pub struct Thumbnail {
    /// Encoded image as sent by the engine
    bytes: Vec<u8>,
    handle: image::Handle,
}

impl Thumbnail {
    pub fn new(bytes: Vec<u8>) -> Self {
        let handle = image::Handle::from_bytes(bytes.clone());
        Self { bytes, handle }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn handle(&self) -> &image::Handle {
        &self.handle
    }
}

impl PartialEq for Thumbnail {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Write-once cache entry for one item
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailRecord {
    pub item_path: String,
    /// `None` when the item is not previewable or the fetch failed
    pub thumbnail: Option<Thumbnail>,
}

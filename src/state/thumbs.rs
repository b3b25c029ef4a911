/// Thumbnail cache for one folder snapshot
///
/// Fetches are issued lazily when a row first becomes visible, at most once
/// per item, and results are keyed by item path so arrival order never
/// matters. Entries are write-once and never evicted; the whole cache is
/// dropped together with its snapshot.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::data::{FolderSnapshot, ScanId, Thumbnail, ThumbnailRecord};
use super::viewport::VisibleRange;
use crate::bridge::{BridgeError, SharedEngine};

#[derive(Debug, Clone)]
enum Slot {
    InFlight,
    Ready(ThumbnailRecord),
}

/// What `ensure` found for an item
#[derive(Debug)]
pub enum Ensure<'a> {
    /// Already resolved; nothing to do
    Ready(&'a ThumbnailRecord),
    /// A fetch is outstanding; wait for its arrival
    InFlight,
    /// First sighting; run this fetch
    Fetch(ThumbnailFetch),
}

/// Render-side view of one row's thumbnail
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThumbState<'a> {
    Unrequested,
    Loading,
    Ready(&'a Thumbnail),
    /// Resolved, but the item has nothing to preview
    Absent,
}

/// An issued metadata request, not yet run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailFetch {
    pub snapshot: ScanId,
    pub item_path: String,
}

impl ThumbnailFetch {
    pub async fn run(self, engine: SharedEngine) -> ThumbnailArrival {
        let result = engine
            .read_item_metadata(self.item_path.clone())
            .await
            .map(|metadata| metadata.thumbnail);

        ThumbnailArrival {
            snapshot: self.snapshot,
            item_path: self.item_path,
            result,
        }
    }
}

/// A finished fetch, tagged with the snapshot that asked for it
#[derive(Debug, Clone)]
pub struct ThumbnailArrival {
    pub snapshot: ScanId,
    pub item_path: String,
    pub result: Result<Option<Vec<u8>>, BridgeError>,
}

/// Write-once thumbnail store for one snapshot
#[derive(Debug)]
pub struct ThumbnailCache {
    /// Arrivals tagged with any other snapshot are dropped
    snapshot: ScanId,
    /// Keyed by item path, never by row index
    entries: HashMap<String, Slot>,
    issued: usize,
}

impl ThumbnailCache {
    pub fn new(snapshot: ScanId) -> Self {
        Self {
            snapshot,
            entries: HashMap::new(),
            issued: 0,
        }
    }

    /// Number of fetches this cache has ever issued
    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Idempotent: the first call for a path hands out a fetch, later calls
    /// report it in flight or return the cached record.
    pub fn ensure(&mut self, item_path: &str) -> Ensure<'_> {
        if !self.entries.contains_key(item_path) {
            self.entries.insert(item_path.to_string(), Slot::InFlight);
            self.issued += 1;
            debug!("🖼️  Fetching thumbnail for {}", item_path);
            return Ensure::Fetch(ThumbnailFetch {
                snapshot: self.snapshot,
                item_path: item_path.to_string(),
            });
        }

        match self.entries.get(item_path) {
            Some(Slot::Ready(record)) => Ensure::Ready(record),
            _ => Ensure::InFlight,
        }
    }

    /// Ensure every row of `range`, returning only the new fetches
    pub fn ensure_range(&mut self, snapshot: &FolderSnapshot, range: &VisibleRange) -> Vec<ThumbnailFetch> {
        if snapshot.id() != self.snapshot {
            return Vec::new();
        }

        (range.start..range.end)
            .filter_map(|index| snapshot.get(index))
            .filter_map(|item| match self.ensure(&item.path) {
                Ensure::Fetch(fetch) => Some(fetch),
                _ => None,
            })
            .collect()
    }

    /// Store an arrival. Returns the new record, or `None` when the arrival
    /// belongs to another snapshot or the entry is already resolved.
    pub fn complete(&mut self, arrival: ThumbnailArrival) -> Option<&ThumbnailRecord> {
        if arrival.snapshot != self.snapshot {
            debug!("🗑️  Dropping thumbnail for {} from snapshot {}", arrival.item_path, arrival.snapshot.0);
            return None;
        }
        if let Some(Slot::Ready(_)) = self.entries.get(&arrival.item_path) {
            return None;
        }

        // Errors and unreadable bytes both resolve to an absent thumbnail
        let thumbnail = match arrival.result {
            Ok(Some(bytes)) => decode_thumbnail(&arrival.item_path, bytes),
            Ok(None) => None,
            Err(e) => {
                warn!("⚠️  Thumbnail for {} failed: {}", arrival.item_path, e);
                None
            }
        };

        let record = ThumbnailRecord {
            item_path: arrival.item_path.clone(),
            thumbnail,
        };
        self.entries.insert(arrival.item_path.clone(), Slot::Ready(record));

        match self.entries.get(&arrival.item_path) {
            Some(Slot::Ready(record)) => Some(record),
            _ => None,
        }
    }

    pub fn get(&self, item_path: &str) -> Option<&ThumbnailRecord> {
        match self.entries.get(item_path) {
            Some(Slot::Ready(record)) => Some(record),
            _ => None,
        }
    }

    pub fn thumbnail(&self, item_path: &str) -> Option<&Thumbnail> {
        self.get(item_path).and_then(|record| record.thumbnail.as_ref())
    }

    /// What the row for `item_path` should draw
    pub fn state(&self, item_path: &str) -> ThumbState<'_> {
        match self.entries.get(item_path) {
            None => ThumbState::Unrequested,
            Some(Slot::InFlight) => ThumbState::Loading,
            Some(Slot::Ready(ThumbnailRecord {
                thumbnail: Some(thumbnail),
                ..
            })) => ThumbState::Ready(thumbnail),
            Some(Slot::Ready(_)) => ThumbState::Absent,
        }
    }
}

/// Accept bytes only if they look like an image the renderer can decode
fn decode_thumbnail(item_path: &str, bytes: Vec<u8>) -> Option<Thumbnail> {
    match image::guess_format(&bytes) {
        Ok(_) => Some(Thumbnail::new(bytes)),
        Err(e) => {
            warn!("⚠️  Thumbnail for {} is not an image: {}", item_path, e);
            None
        }
    }
}

/// One browsed folder: its snapshot, scroll window and thumbnail cache
///
/// Everything here lives and dies with the snapshot. A rescan builds a new
/// session, which drops the old cache and any of its outstanding fetches.

use tracing::debug;

use super::data::{FolderSnapshot, Thumbnail};
use super::thumbs::{ThumbnailArrival, ThumbnailCache, ThumbnailFetch};
use super::viewport::{ViewportWindow, VisibleRange, DEFAULT_OVERSCAN};

/// Row geometry for the item list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowLayout {
    /// Row height while a thumbnail is loading or shown
    pub row_height: f32,
    /// Row height once an item turns out to have no thumbnail
    pub compact_height: f32,
    /// Extra rows kept alive beyond each edge of the viewport
    pub overscan: usize,
}

impl Default for RowLayout {
    fn default() -> Self {
        Self {
            row_height: 110.0,
            compact_height: 40.0,
            overscan: DEFAULT_OVERSCAN,
        }
    }
}

/// Result of applying a thumbnail arrival
#[derive(Debug)]
pub struct Arrived {
    pub item_path: String,
    pub thumbnail: Option<Thumbnail>,
    /// Fetches for rows pulled into view by a collapsed row
    pub fetches: Vec<ThumbnailFetch>,
}

/// State of the folder being browsed, replaced wholesale on every scan
#[derive(Debug)]
pub struct BrowseSession {
    snapshot: FolderSnapshot,
    layout: RowLayout,
    /// Scroll position and measured row sizes
    window: ViewportWindow,
    /// Thumbnails of this snapshot only
    thumbs: ThumbnailCache,
    /// Rows rendered right now, refreshed on every scroll, resize or collapse
    visible: VisibleRange,
}

impl BrowseSession {
    pub fn new(snapshot: FolderSnapshot, layout: RowLayout) -> Self {
        let window = ViewportWindow::new(snapshot.len(), layout.row_height, layout.overscan);
        let thumbs = ThumbnailCache::new(snapshot.id());

        Self {
            snapshot,
            layout,
            window,
            thumbs,
            visible: VisibleRange::default(),
        }
    }

    pub fn snapshot(&self) -> &FolderSnapshot {
        &self.snapshot
    }

    pub fn thumbs(&self) -> &ThumbnailCache {
        &self.thumbs
    }

    pub fn visible(&self) -> &VisibleRange {
        &self.visible
    }

    pub fn row_height(&self, index: usize) -> f32 {
        self.window.item_size(index)
    }

    /// Top of row `index`; `index == len` gives the bottom of the last row
    pub fn row_offset(&self, index: usize) -> f32 {
        self.window.offset_of(index)
    }

    /// Height of the whole list, measured rows included
    pub fn total_height(&self) -> f32 {
        self.window.total_extent()
    }

    /// The list scrolled; returns fetches for rows that just came into view
    pub fn scrolled(&mut self, offset: f32, viewport_height: f32) -> Vec<ThumbnailFetch> {
        self.window.scroll_to(offset);
        self.window.resize(viewport_height);
        self.refresh()
    }

    /// Same as `scrolled` for a size change at the current offset
    pub fn resized(&mut self, viewport_height: f32) -> Vec<ThumbnailFetch> {
        self.window.resize(viewport_height);
        self.refresh()
    }

    /// Store an arrival. `None` when it belongs to another snapshot or the
    /// item was already resolved.
    pub fn thumbnail_arrived(&mut self, arrival: ThumbnailArrival) -> Option<Arrived> {
        let record = self.thumbs.complete(arrival)?;
        let item_path = record.item_path.clone();
        let thumbnail = record.thumbnail.clone();

        // An absent thumbnail shrinks the row, which can pull new rows in
        let mut fetches = Vec::new();
        if thumbnail.is_none() {
            if let Some(index) = self.snapshot.index_of(&item_path) {
                if self.window.measure(index, self.layout.compact_height) {
                    debug!("↕️  Row {} collapsed", index);
                    fetches = self.refresh();
                }
            }
        }

        Some(Arrived {
            item_path,
            thumbnail,
            fetches,
        })
    }

    /// Recompute the visible rows and ensure each of them
    fn refresh(&mut self) -> Vec<ThumbnailFetch> {
        self.visible = self.window.visible();
        self.thumbs.ensure_range(&self.snapshot, &self.visible)
    }
}

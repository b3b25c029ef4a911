/// Viewport window for the virtualized item list
///
/// Works out which rows must exist for the current scroll position. Rows
/// start at an estimated size and can be corrected once their real size is
/// known; corrections live in a Fenwick tree so both offsets and the
/// "which row is at pixel y" lookup stay O(log n).

/// Rows rendered beyond each edge of the viewport
pub const DEFAULT_OVERSCAN: usize = 3;

/// Contiguous run of rows to render, with each row's top offset in pixels
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VisibleRange {
    pub start: usize,
    /// Exclusive
    pub end: usize,
    pub offsets: Vec<f32>,
}

impl VisibleRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// `(index, top offset)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        (self.start..self.end).zip(self.offsets.iter().copied())
    }
}

/// Visible rows for uniformly sized items, widened by `overscan` on each
/// side. O(1) plus the rows returned.
pub fn compute_visible(
    total_count: usize,
    scroll_offset: f32,
    viewport_size: f32,
    estimated_item_size: f32,
    overscan: usize,
) -> VisibleRange {
    if total_count == 0 || viewport_size <= 0.0 || estimated_item_size <= 0.0 {
        return VisibleRange::default();
    }

    let extent = total_count as f32 * estimated_item_size;
    let scroll = clamp_scroll(scroll_offset, viewport_size, extent);

    let first = ((scroll / estimated_item_size).floor() as usize).min(total_count - 1);
    let last = (((scroll + viewport_size) / estimated_item_size).floor() as usize + 1).clamp(first + 1, total_count);

    let start = first.saturating_sub(overscan);
    let end = (last + overscan).min(total_count);
    let offsets = (start..end).map(|i| i as f32 * estimated_item_size).collect();

    VisibleRange { start, end, offsets }
}

fn clamp_scroll(scroll_offset: f32, viewport_size: f32, extent: f32) -> f32 {
    let max_scroll = (extent - viewport_size).max(0.0);
    if scroll_offset.is_nan() {
        return 0.0;
    }
    scroll_offset.clamp(0.0, max_scroll)
}

/// Scroll state plus per-row size corrections for one snapshot
#[derive(Debug, Clone)]
pub struct ViewportWindow {
    /// Size every row starts with
    estimate: f32,
    overscan: usize,
    /// Scroll offset as last reported, clamped on use
    scroll: f32,
    /// Height of the visible area
    viewport: f32,
    /// measured size minus estimate, per row
    deltas: Vec<f32>,
    /// Rows whose delta is non-zero
    measured: usize,
    /// Fenwick tree over `deltas`, 1-based
    tree: Vec<f32>,
}

impl ViewportWindow {
    pub fn new(total_count: usize, estimated_item_size: f32, overscan: usize) -> Self {
        Self {
            estimate: estimated_item_size.max(1.0),
            overscan,
            scroll: 0.0,
            viewport: 0.0,
            deltas: vec![0.0; total_count],
            measured: 0,
            tree: vec![0.0; total_count + 1],
        }
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Size of row `index`, measured if known, estimated otherwise
    pub fn item_size(&self, index: usize) -> f32 {
        self.estimate + self.deltas.get(index).copied().unwrap_or(0.0)
    }

    /// Top pixel offset of row `index` (`index == len` gives the total extent)
    pub fn offset_of(&self, index: usize) -> f32 {
        let index = index.min(self.len());
        index as f32 * self.estimate + self.prefix_delta(index)
    }

    /// Height of all rows together
    pub fn total_extent(&self) -> f32 {
        self.offset_of(self.len())
    }

    /// Record the real size of a row. Returns true if anything changed.
    pub fn measure(&mut self, index: usize, size: f32) -> bool {
        if index >= self.len() || !size.is_finite() || size < 0.0 {
            return false;
        }

        // Point update of the tree with the difference to the old delta
        let delta = size - self.estimate;
        let change = delta - self.deltas[index];
        if change.abs() <= f32::EPSILON {
            return false;
        }

        match (self.deltas[index] == 0.0, delta == 0.0) {
            (true, false) => self.measured += 1,
            (false, true) => self.measured -= 1,
            _ => {}
        }
        self.deltas[index] = delta;
        let mut i = index + 1;
        while i < self.tree.len() {
            self.tree[i] += change;
            i += i & i.wrapping_neg();
        }
        true
    }

    pub fn scroll_to(&mut self, scroll_offset: f32) {
        self.scroll = scroll_offset;
    }

    pub fn resize(&mut self, viewport_size: f32) {
        self.viewport = viewport_size.max(0.0);
    }

    /// Rows to render for the current scroll position and viewport size
    pub fn visible(&self) -> VisibleRange {
        let total = self.len();
        if total == 0 || self.viewport <= 0.0 {
            return VisibleRange::default();
        }

        // Nothing measured yet: every row has the estimated size
        if self.measured == 0 {
            return compute_visible(total, self.scroll, self.viewport, self.estimate, self.overscan);
        }

        let scroll = clamp_scroll(self.scroll, self.viewport, self.total_extent());
        let first = self.index_at(scroll).min(total - 1);
        let last = (self.index_at(scroll + self.viewport) + 1).clamp(first + 1, total);

        let start = first.saturating_sub(self.overscan);
        let end = (last + self.overscan).min(total);

        let mut offsets = Vec::with_capacity(end - start);
        let mut top = self.offset_of(start);
        for index in start..end {
            offsets.push(top);
            top += self.item_size(index);
        }

        VisibleRange { start, end, offsets }
    }

    /// Sum of `deltas[..index]`
    fn prefix_delta(&self, index: usize) -> f32 {
        let mut sum = 0.0;
        let mut i = index;
        while i > 0 {
            sum += self.tree[i];
            i -= i & i.wrapping_neg();
        }
        sum
    }

    /// Index of the row containing pixel `y`: the number of rows that end at or before `y`
    fn index_at(&self, y: f32) -> usize {
        let total = self.len();
        let mut pos = 0;
        let mut acc = 0.0;
        let mut step = if total == 0 { 0 } else { 1usize << (usize::BITS - 1 - total.leading_zeros()) };

        while step > 0 {
            let next = pos + step;
            if next <= total {
                let span = step as f32 * self.estimate + self.tree[next];
                if acc + span <= y {
                    pos = next;
                    acc += span;
                }
            }
            step >>= 1;
        }
        pos
    }
}

//! TTL heap: a binary min-heap whose items report every move they make.
//!
//! Each item carries the key of the entry that owns it. The owner stores the
//! item's current heap position so a TTL can be updated or cancelled in
//! O(log n); to keep that position accurate, every movement inside the heap
//! funnels through one `place` primitive that fires an `on_move` callback
//! with the item's new index. The store points the callback at the entry's
//! `ttl_slot`.

/// A pending expiration: monotonic-microsecond deadline plus owning key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlItem {
    pub expires_at: u64,
    pub key: Vec<u8>,
}

/// Min-heap on `expires_at` with position tracking.
#[derive(Debug, Default)]
pub struct TtlHeap {
    items: Vec<TtlItem>,
}

impl TtlHeap {
    pub fn new() -> Self {
        TtlHeap { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The earliest pending expiration, if any.
    pub fn peek_min(&self) -> Option<&TtlItem> {
        self.items.first()
    }

    pub fn item(&self, pos: usize) -> &TtlItem {
        &self.items[pos]
    }

    pub fn push(&mut self, item: TtlItem, mut on_move: impl FnMut(&TtlItem, usize)) {
        let pos = self.items.len();
        self.items.push(item);
        on_move(&self.items[pos], pos);
        self.sift_up(pos, &mut on_move);
    }

    pub fn pop_min(&mut self, mut on_move: impl FnMut(&TtlItem, usize)) -> Option<TtlItem> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let min = self.items.pop().expect("nonempty heap");
        if !self.items.is_empty() {
            on_move(&self.items[0], 0);
            self.sift_down(0, &mut on_move);
        }
        Some(min)
    }

    /// Re-establish heap order after the deadline at `pos` changed.
    pub fn update(&mut self, pos: usize, expires_at: u64, mut on_move: impl FnMut(&TtlItem, usize)) {
        self.items[pos].expires_at = expires_at;
        if pos > 0 && self.items[pos].expires_at < self.items[parent(pos)].expires_at {
            self.sift_up(pos, &mut on_move);
        } else {
            self.sift_down(pos, &mut on_move);
        }
    }

    /// Remove the item at `pos`, returning it. The displaced tail item is
    /// re-heapified from `pos`.
    pub fn remove(&mut self, pos: usize, mut on_move: impl FnMut(&TtlItem, usize)) -> TtlItem {
        let last = self.items.len() - 1;
        self.items.swap(pos, last);
        let removed = self.items.pop().expect("nonempty heap");
        if pos < self.items.len() {
            on_move(&self.items[pos], pos);
            let deadline = self.items[pos].expires_at;
            self.update(pos, deadline, &mut on_move);
        }
        removed
    }

    fn sift_up(&mut self, mut pos: usize, on_move: &mut impl FnMut(&TtlItem, usize)) {
        while pos > 0 {
            let up = parent(pos);
            if self.items[pos].expires_at >= self.items[up].expires_at {
                break;
            }
            self.swap_places(pos, up, on_move);
            pos = up;
        }
    }

    fn sift_down(&mut self, mut pos: usize, on_move: &mut impl FnMut(&TtlItem, usize)) {
        loop {
            let mut min = pos;
            let left = 2 * pos + 1;
            let right = 2 * pos + 2;
            if left < self.items.len() && self.items[left].expires_at < self.items[min].expires_at {
                min = left;
            }
            if right < self.items.len() && self.items[right].expires_at < self.items[min].expires_at
            {
                min = right;
            }
            if min == pos {
                break;
            }
            self.swap_places(pos, min, on_move);
            pos = min;
        }
    }

    /// The single movement primitive: swap two slots and report both new
    /// positions to the owner callback.
    fn swap_places(&mut self, a: usize, b: usize, on_move: &mut impl FnMut(&TtlItem, usize)) {
        self.items.swap(a, b);
        on_move(&self.items[a], a);
        on_move(&self.items[b], b);
    }
}

fn parent(pos: usize) -> usize {
    (pos - 1) / 2
}

//! Hash index: byte-string keys, chained buckets, incremental resizing.
//!
//! Two closed-addressing tables back one logical map. When the active table
//! crosses the load-factor ceiling it is demoted to a draining table and a
//! fresh active table at double capacity takes over; every subsequent call
//! migrates a bounded batch of entries, so no single operation pays for the
//! whole rehash.

/// Mean chain length that triggers a resize.
const MAX_LOAD_FACTOR: usize = 8;
/// Entries migrated from the draining table per public operation.
const RESIZE_WORK: usize = 128;
const MIN_CAPACITY: usize = 4;

/// FNV-1a over the key bytes.
pub fn hash_key(key: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x1000_0000_01b3;
    let mut hash = FNV_OFFSET;
    for &b in key {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[derive(Debug)]
struct Slot<V> {
    key: Vec<u8>,
    hash: u64,
    value: V,
    next: Option<Box<Slot<V>>>,
}

#[derive(Debug)]
struct Table<V> {
    buckets: Vec<Option<Box<Slot<V>>>>,
    mask: u64,
    len: usize,
}

impl<V> Table<V> {
    fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let mut buckets = Vec::new();
        buckets.resize_with(capacity, || None);
        Table {
            buckets,
            mask: (capacity - 1) as u64,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn bucket(&self, hash: u64) -> usize {
        (hash & self.mask) as usize
    }

    fn insert(&mut self, mut slot: Box<Slot<V>>) {
        let pos = self.bucket(slot.hash);
        slot.next = self.buckets[pos].take();
        self.buckets[pos] = Some(slot);
        self.len += 1;
    }

    fn get(&self, hash: u64, key: &[u8]) -> Option<&Slot<V>> {
        let mut cur = self.buckets[self.bucket(hash)].as_deref();
        while let Some(slot) = cur {
            if slot.hash == hash && slot.key == key {
                return Some(slot);
            }
            cur = slot.next.as_deref();
        }
        None
    }

    fn get_mut(&mut self, hash: u64, key: &[u8]) -> Option<&mut Slot<V>> {
        let pos = self.bucket(hash);
        let mut cur = self.buckets[pos].as_deref_mut();
        while let Some(slot) = cur {
            if slot.hash == hash && slot.key == key {
                return Some(slot);
            }
            cur = slot.next.as_deref_mut();
        }
        None
    }

    fn remove(&mut self, hash: u64, key: &[u8]) -> Option<Box<Slot<V>>> {
        let pos = self.bucket(hash);
        let mut link = &mut self.buckets[pos];
        while link
            .as_ref()
            .is_some_and(|slot| slot.hash != hash || slot.key != key)
        {
            link = &mut link.as_mut().expect("checked non-empty").next;
        }
        let mut removed = link.take()?;
        *link = removed.next.take();
        self.len -= 1;
        Some(removed)
    }
}

/// One logical map over the (active, draining) table pair.
#[derive(Debug)]
pub struct HashIndex<V> {
    active: Table<V>,
    draining: Option<Table<V>>,
    drain_pos: usize,
}

impl<V> Default for HashIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HashIndex<V> {
    pub fn new() -> Self {
        HashIndex {
            active: Table::with_capacity(MIN_CAPACITY),
            draining: None,
            drain_pos: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.active.len + self.draining.as_ref().map_or(0, |t| t.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a key that is not already present. Callers look up first; the
    /// index itself does not reject duplicates.
    pub fn insert(&mut self, key: Vec<u8>, value: V) {
        self.help_resize();
        let hash = hash_key(&key);
        self.active.insert(Box::new(Slot {
            key,
            hash,
            value,
            next: None,
        }));
        if self.draining.is_none() && self.active.len >= self.active.capacity() * MAX_LOAD_FACTOR {
            self.start_resize();
        }
    }

    pub fn get(&mut self, key: &[u8]) -> Option<&V> {
        self.help_resize();
        let hash = hash_key(key);
        if let Some(slot) = self.active.get(hash, key) {
            return Some(&slot.value);
        }
        self.draining
            .as_ref()
            .and_then(|t| t.get(hash, key))
            .map(|slot| &slot.value)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        self.help_resize();
        let hash = hash_key(key);
        // Split the probe in two to keep the borrow checker satisfied.
        if self.active.get(hash, key).is_some() {
            return self.active.get_mut(hash, key).map(|slot| &mut slot.value);
        }
        self.draining
            .as_mut()
            .and_then(|t| t.get_mut(hash, key))
            .map(|slot| &mut slot.value)
    }

    pub fn contains(&mut self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        self.help_resize();
        let hash = hash_key(key);
        if let Some(slot) = self.active.remove(hash, key) {
            return Some(slot.value);
        }
        self.draining
            .as_mut()
            .and_then(|t| t.remove(hash, key))
            .map(|slot| slot.value)
    }

    /// Visit every (key, value) pair, across both tables.
    pub fn for_each(&self, mut f: impl FnMut(&[u8], &V)) {
        let tables = std::iter::once(&self.active).chain(self.draining.iter());
        for table in tables {
            for bucket in &table.buckets {
                let mut cur = bucket.as_deref();
                while let Some(slot) = cur {
                    f(&slot.key, &slot.value);
                    cur = slot.next.as_deref();
                }
            }
        }
    }

    fn start_resize(&mut self) {
        debug_assert!(self.draining.is_none());
        let capacity = self.active.capacity() * 2;
        let old = std::mem::replace(&mut self.active, Table::with_capacity(capacity));
        self.draining = Some(old);
        self.drain_pos = 0;
    }

    /// Migrate a bounded batch of entries from the draining table.
    fn help_resize(&mut self) {
        let Some(draining) = self.draining.as_mut() else {
            return;
        };
        let mut moved = 0;
        while moved < RESIZE_WORK && draining.len > 0 {
            if self.drain_pos >= draining.capacity() {
                self.drain_pos = 0;
            }
            match draining.buckets[self.drain_pos].take() {
                Some(mut slot) => {
                    draining.buckets[self.drain_pos] = slot.next.take();
                    draining.len -= 1;
                    self.active.insert(slot);
                    moved += 1;
                }
                None => self.drain_pos += 1,
            }
        }
        if self
            .draining
            .as_ref()
            .is_some_and(|t| t.len == 0)
        {
            self.draining = None;
            self.drain_pos = 0;
        }
    }
}

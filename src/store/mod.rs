pub mod entry;

use crate::index::hash::HashIndex;
use crate::index::heap::{TtlHeap, TtlItem};
use entry::Entry;

/// The single process-wide key space: the key index plus the TTL heap,
/// owned by the event-loop thread. Every mutation that touches a TTL goes
/// through here so the `ttl_slot` ⇔ heap-position coupling stays intact.
#[derive(Default)]
pub struct Store {
    entries: HashIndex<Entry>,
    expirations: TtlHeap,
}

impl Store {
    pub fn new() -> Self {
        Store {
            entries: HashIndex::new(),
            expirations: TtlHeap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&mut self, key: &[u8]) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Entry> {
        self.entries.get_mut(key)
    }

    /// Insert a fresh entry; callers insert only after a lookup miss.
    pub fn insert(&mut self, key: Vec<u8>, entry: Entry) {
        debug_assert!(entry.ttl_slot.is_none());
        self.entries.insert(key, entry);
    }

    /// Remove an entry, cancelling any pending expiration first.
    pub fn remove(&mut self, key: &[u8]) -> Option<Entry> {
        let slot = self.entries.get(key)?.ttl_slot;
        if let Some(pos) = slot {
            let entries = &mut self.entries;
            self.expirations.remove(pos, |item, new_pos| {
                if let Some(owner) = entries.get_mut(&item.key) {
                    owner.ttl_slot = Some(new_pos);
                }
            });
        }
        self.entries.remove(key)
    }

    pub fn keys(&self) -> Vec<Vec<u8>> {
        let mut keys = Vec::with_capacity(self.entries.len());
        self.entries.for_each(|key, _| keys.push(key.to_vec()));
        keys
    }

    /// Set, update or cancel a TTL. `ttl_ms <= 0` cancels any pending
    /// expiration and leaves the entry alive. Returns false when the key
    /// does not exist.
    pub fn set_ttl(&mut self, key: &[u8], ttl_ms: i64, now_us: u64) -> bool {
        let slot = match self.entries.get(key) {
            Some(entry) => entry.ttl_slot,
            None => return false,
        };
        let entries = &mut self.entries;
        let on_move = |item: &TtlItem, pos: usize| {
            if let Some(owner) = entries.get_mut(&item.key) {
                owner.ttl_slot = Some(pos);
            }
        };
        if ttl_ms <= 0 {
            if let Some(pos) = slot {
                self.expirations.remove(pos, on_move);
                if let Some(owner) = self.entries.get_mut(key) {
                    owner.ttl_slot = None;
                }
            }
            return true;
        }
        let expires_at = now_us + ttl_ms as u64 * 1000;
        match slot {
            Some(pos) => self.expirations.update(pos, expires_at, on_move),
            None => self.expirations.push(
                TtlItem {
                    expires_at,
                    key: key.to_vec(),
                },
                on_move,
            ),
        }
        true
    }

    /// Remaining TTL in milliseconds: −2 when the key is absent, −1 when it
    /// has no TTL, otherwise the time left clamped at zero.
    pub fn pttl(&mut self, key: &[u8], now_us: u64) -> i64 {
        match self.entries.get(key) {
            None => -2,
            Some(entry) => match entry.ttl_slot {
                None => -1,
                Some(pos) => {
                    let expires_at = self.expirations.item(pos).expires_at;
                    (expires_at.saturating_sub(now_us) / 1000) as i64
                }
            },
        }
    }

    /// Deadline of the next pending expiration, for the poll timeout.
    pub fn next_expiry(&self) -> Option<u64> {
        self.expirations.peek_min().map(|item| item.expires_at)
    }

    /// Pop and remove every entry whose deadline has passed, up to `budget`
    /// per call. The removed entries are returned for disposal.
    pub fn expire_cycle(&mut self, now_us: u64, budget: usize) -> Vec<Entry> {
        let mut expired = Vec::new();
        while expired.len() < budget {
            let due = self
                .expirations
                .peek_min()
                .is_some_and(|item| item.expires_at <= now_us);
            if !due {
                break;
            }
            let entries = &mut self.entries;
            let item = self
                .expirations
                .pop_min(|moved, pos| {
                    if let Some(owner) = entries.get_mut(&moved.key) {
                        owner.ttl_slot = Some(pos);
                    }
                })
                .expect("deadline was peeked");
            if let Some(entry) = self.entries.remove(&item.key) {
                expired.push(entry);
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SortedSet, Value};

    fn string_entry(value: &str) -> Entry {
        Entry::new(Value::String(value.as_bytes().to_vec()))
    }

    fn assert_slots_consistent(store: &mut Store) {
        let keys = store.keys();
        for key in keys {
            if let Some(slot) = store.get(&key).and_then(|e| e.ttl_slot) {
                assert_eq!(
                    store.expirations.item(slot).key,
                    key,
                    "ttl_slot points at someone else's heap item"
                );
            }
        }
    }

    #[test]
    fn test_insert_get_remove_idempotent() {
        let mut store = Store::new();
        store.insert(b"k".to_vec(), string_entry("v"));
        assert!(store.get(b"k").is_some());
        assert!(store.remove(b"k").is_some());
        assert!(store.remove(b"k").is_none());
        assert!(store.get(b"k").is_none());
    }

    #[test]
    fn test_ttl_set_read_and_cancel() {
        let mut store = Store::new();
        store.insert(b"k".to_vec(), string_entry("v"));
        assert_eq!(store.pttl(b"k", 0), -1);
        assert_eq!(store.pttl(b"missing", 0), -2);

        assert!(store.set_ttl(b"k", 50, 0));
        assert_eq!(store.pttl(b"k", 10_000), 40);
        assert_eq!(store.pttl(b"k", 60_000), 0, "clamped at zero");

        // Cancel: both the negative and zero forms.
        assert!(store.set_ttl(b"k", 0, 60_000));
        assert_eq!(store.pttl(b"k", 60_000), -1);
        assert!(store.set_ttl(b"k", -1, 60_000));
        assert_eq!(store.pttl(b"k", 60_000), -1);
        assert!(store.get(b"k").is_some(), "cancel never deletes");
        assert!(!store.set_ttl(b"missing", 50, 0));
    }

    #[test]
    fn test_ttl_update_in_place() {
        let mut store = Store::new();
        store.insert(b"k".to_vec(), string_entry("v"));
        store.set_ttl(b"k", 50, 0);
        store.set_ttl(b"k", 500, 0);
        assert_eq!(store.expirations.len(), 1, "update reuses the heap item");
        assert_eq!(store.pttl(b"k", 0), 500);
    }

    #[test]
    fn test_expire_cycle_removes_due_entries() {
        let mut store = Store::new();
        for i in 0..10u8 {
            let key = vec![b'k', i];
            store.insert(key.clone(), string_entry("v"));
            store.set_ttl(&key, i64::from(i) + 1, 0);
        }
        assert_slots_consistent(&mut store);
        // At 5ms, keys with TTLs 1..=5 are due.
        let expired = store.expire_cycle(5_000, 2000);
        assert_eq!(expired.len(), 5);
        assert_eq!(store.len(), 5);
        assert_slots_consistent(&mut store);
        assert!(store.get(&[b'k', 0]).is_none());
        assert!(store.get(&[b'k', 9]).is_some());
    }

    #[test]
    fn test_expire_cycle_honors_budget() {
        let mut store = Store::new();
        for i in 0..10u8 {
            let key = vec![b'k', i];
            store.insert(key.clone(), string_entry("v"));
            store.set_ttl(&key, 1, 0);
        }
        let expired = store.expire_cycle(10_000, 3);
        assert_eq!(expired.len(), 3);
        assert_eq!(store.len(), 7);
        assert_slots_consistent(&mut store);
    }

    #[test]
    fn test_remove_cancels_pending_expiration() {
        let mut store = Store::new();
        store.insert(b"a".to_vec(), string_entry("1"));
        store.insert(b"b".to_vec(), string_entry("2"));
        store.set_ttl(b"a", 100, 0);
        store.set_ttl(b"b", 200, 0);
        store.remove(b"a");
        assert_eq!(store.expirations.len(), 1);
        assert_slots_consistent(&mut store);
        assert_eq!(store.expire_cycle(1_000_000, 2000).len(), 1);
    }

    #[test]
    fn test_large_entry_detection() {
        let mut set = SortedSet::new();
        for i in 0..entry::LARGE_SET_LEN {
            set.add(format!("m{i}").as_bytes(), i as f64);
        }
        assert!(Entry::new(Value::SortedSet(set)).is_large());
        assert!(!string_entry("small").is_large());
    }
}

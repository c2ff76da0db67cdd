//! Change-counter store
//!
//! Last-known value of each server-side revision counter. A stored value of
//! `UNKNOWN_COUNTER` forces the next poll to refetch that resource. This
//! component never issues remote calls.

use ingest_common::CounterClass;

/// Stored value meaning "unknown, refetch unconditionally"
pub const UNKNOWN_COUNTER: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeCounterStore {
    values: [i64; 4],
}

impl ChangeCounterStore {
    /// All counters start unknown
    pub fn new() -> Self {
        Self {
            values: [UNKNOWN_COUNTER; 4],
        }
    }

    pub fn get(&self, class: CounterClass) -> i64 {
        self.values[class.slot()]
    }

    pub fn observe(&mut self, class: CounterClass, value: i64) {
        self.values[class.slot()] = value;
    }

    /// True if the stored value differs from the status value or is unknown
    pub fn is_stale(&self, class: CounterClass, status_value: i64) -> bool {
        let stored = self.get(class);
        stored == UNKNOWN_COUNTER || stored != status_value
    }

    pub fn invalidate(&mut self, class: CounterClass) {
        self.values[class.slot()] = UNKNOWN_COUNTER;
    }

    pub fn invalidate_all(&mut self) {
        self.values = [UNKNOWN_COUNTER; 4];
    }

    /// Any of `classes` sitting at unknown
    ///
    /// Callers pass the counters followed in the current state; the others
    /// stay at unknown without meaning anything.
    pub fn reload_required(&self, classes: &[CounterClass]) -> bool {
        classes.iter().any(|c| self.get(*c) == UNKNOWN_COUNTER)
    }
}

impl Default for ChangeCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unknown_and_stale() {
        let store = ChangeCounterStore::new();
        assert!(store.reload_required(&CounterClass::ALL));
        for class in CounterClass::ALL {
            assert_eq!(store.get(class), UNKNOWN_COUNTER);
            assert!(store.is_stale(class, 0));
        }
    }

    #[test]
    fn test_observe_then_compare() {
        let mut store = ChangeCounterStore::new();
        store.observe(CounterClass::ItemOrder, 5);

        assert!(!store.is_stale(CounterClass::ItemOrder, 5));
        assert!(store.is_stale(CounterClass::ItemOrder, 6));
        // Older values are stale too; any difference means refetch
        assert!(store.is_stale(CounterClass::ItemOrder, 4));
        // Other classes untouched
        assert!(store.is_stale(CounterClass::ItemClips, 5));
    }

    #[test]
    fn test_invalidate() {
        let mut store = ChangeCounterStore::new();
        for class in CounterClass::ALL {
            store.observe(class, 1);
        }
        assert!(!store.reload_required(&CounterClass::ALL));

        store.invalidate(CounterClass::Comments);
        assert!(store.reload_required(&CounterClass::ALL));
        assert!(store.is_stale(CounterClass::Comments, 1));
        assert!(!store.reload_required(&[CounterClass::ItemOrder, CounterClass::ItemClips]));
        assert!(store.reload_required(&[CounterClass::ItemOrder, CounterClass::Comments]));
    }

    #[test]
    fn test_unknown_is_stale_even_against_unknown() {
        let store = ChangeCounterStore::new();
        assert!(store.is_stale(CounterClass::CacheContents, UNKNOWN_COUNTER));
    }

    #[test]
    fn test_invalidate_all() {
        let mut store = ChangeCounterStore::new();
        store.observe(CounterClass::ItemOrder, 3);
        store.invalidate_all();
        for class in CounterClass::ALL {
            assert_eq!(store.get(class), UNKNOWN_COUNTER);
        }
    }
}

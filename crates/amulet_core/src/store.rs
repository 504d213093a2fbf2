use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::{Entry, Rarity};

/// Default cap on the number of entries exposed by the ordered view.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Sort key: observation time, then insertion sequence for equal timestamps.
type OrderKey = (DateTime<Utc>, u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Loaded from the durable log; already persisted.
    History,
    /// Recorded during this run.
    Session,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    entry: Entry,
    origin: Origin,
}

/// Deduplicating store of matches keyed by post text.
///
/// Entries live in a single time-ordered map; `index` only maps text to its
/// position in that map. Trimming to `max_entries` applies to the derived view
/// alone, the map keeps every match of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    by_time: BTreeMap<OrderKey, Slot>,
    index: HashMap<String, OrderKey>,
    next_seq: u64,
    newest_first: bool,
    min_rarity: Rarity,
    max_entries: usize,
    view: Vec<Entry>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, Rarity::MIN)
    }
}

impl Store {
    pub fn new(max_entries: usize, min_rarity: Rarity) -> Self {
        Self {
            by_time: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
            newest_first: true,
            min_rarity,
            max_entries,
            view: Vec::new(),
        }
    }

    /// Inserts a match seen during this run. Returns `false` without touching
    /// the store when the text is already present.
    pub fn record(&mut self, entry: Entry) -> bool {
        let inserted = self.insert(entry, Origin::Session);
        if inserted {
            self.rebuild_view();
        }
        inserted
    }

    /// Replaces the history portion of the store with `history`.
    ///
    /// Session entries are kept: they may not have reached the log yet, and a
    /// history copy of the same text is ignored in their favour. History
    /// entries that come back unchanged keep their position, so ties on equal
    /// timestamps do not reshuffle across reloads.
    pub fn replace_history(&mut self, history: Vec<Entry>) {
        {
            let incoming: HashMap<&str, &Entry> = history
                .iter()
                .map(|entry| (entry.text.as_str(), entry))
                .collect();
            self.by_time.retain(|_, slot| match slot.origin {
                Origin::Session => true,
                Origin::History => incoming.get(slot.entry.text.as_str()) == Some(&&slot.entry),
            });
        }
        self.index = self
            .by_time
            .iter()
            .map(|(key, slot)| (slot.entry.text.clone(), *key))
            .collect();
        for entry in history {
            self.insert(entry, Origin::History);
        }
        self.rebuild_view();
    }

    pub fn toggle_order(&mut self) {
        self.newest_first = !self.newest_first;
        self.rebuild_view();
    }

    pub fn set_newest_first(&mut self, newest_first: bool) {
        if self.newest_first != newest_first {
            self.toggle_order();
        }
    }

    pub fn set_min_rarity(&mut self, min_rarity: Rarity) {
        self.min_rarity = min_rarity;
        self.rebuild_view();
    }

    pub fn set_max_entries(&mut self, max_entries: usize) {
        self.max_entries = max_entries;
        self.rebuild_view();
    }

    /// Cached ordered view: at most `max_entries` of the newest entries at or
    /// above `min_rarity`, in the current direction.
    pub fn view(&self) -> &[Entry] {
        &self.view
    }

    pub fn contains(&self, text: &str) -> bool {
        self.index.contains_key(text)
    }

    pub fn get(&self, text: &str) -> Option<&Entry> {
        self.index
            .get(text)
            .and_then(|key| self.by_time.get(key))
            .map(|slot| &slot.entry)
    }

    pub fn origin(&self, text: &str) -> Option<Origin> {
        self.index
            .get(text)
            .and_then(|key| self.by_time.get(key))
            .map(|slot| slot.origin)
    }

    pub fn len(&self) -> usize {
        self.by_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_time.is_empty()
    }

    pub fn newest_first(&self) -> bool {
        self.newest_first
    }

    pub fn min_rarity(&self) -> Rarity {
        self.min_rarity
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn insert(&mut self, entry: Entry, origin: Origin) -> bool {
        if self.index.contains_key(&entry.text) {
            return false;
        }
        let key = (entry.observed_at, self.next_seq);
        self.next_seq += 1;
        self.index.insert(entry.text.clone(), key);
        self.by_time.insert(key, Slot { entry, origin });
        true
    }

    fn rebuild_view(&mut self) {
        let min_rarity = self.min_rarity;
        let mut newest: Vec<Entry> = self
            .by_time
            .values()
            .rev()
            .filter(|slot| slot.entry.rarity >= min_rarity)
            .take(self.max_entries)
            .map(|slot| slot.entry.clone())
            .collect();
        if !self.newest_first {
            newest.reverse();
        }
        self.view = newest;
    }
}

use chrono::{DateTime, Utc};

use crate::rate::RateEstimator;
use crate::store::{Store, DEFAULT_MAX_ENTRIES};
use crate::view_model::AppViewModel;
use crate::{Entry, Rarity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistenceStatus {
    #[default]
    Active,
    /// The log could not be opened; nothing recorded this run reaches disk.
    MemoryOnly,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stats {
    pub posts_seen: u64,
    pub matches_this_session: u64,
    /// Matches held in the store, history included.
    pub matches_total: u64,
    pub rate_per_second: f64,
    pub classifier_failures: u64,
    pub duplicates_skipped: u64,
    pub persistence: PersistenceStatus,
}

/// Knobs the operator sets at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSettings {
    pub min_rarity: Rarity,
    pub max_entries: usize,
    pub newest_first: bool,
    pub load_history: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            min_rarity: Rarity::MIN,
            max_entries: DEFAULT_MAX_ENTRIES,
            newest_first: true,
            load_history: true,
        }
    }
}

/// Everything the state owner mutates. Only `update` touches it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    store: Store,
    rate: RateEstimator,
    stats: Stats,
    load_history: bool,
    dirty: bool,
}

impl AppState {
    pub fn new(settings: ViewSettings, started_at: DateTime<Utc>) -> Self {
        let mut store = Store::new(settings.max_entries, settings.min_rarity);
        store.set_newest_first(settings.newest_first);
        Self {
            store,
            rate: RateEstimator::new(started_at),
            stats: Stats::default(),
            load_history: settings.load_history,
            dirty: false,
        }
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            stats: self.stats.clone(),
            entries: self.store.view().to_vec(),
            newest_first: self.store.newest_first(),
            min_rarity: self.store.min_rarity(),
            max_entries: self.store.max_entries(),
            started_at: self.rate.started_at(),
            dirty: self.dirty,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn rate(&self) -> &RateEstimator {
        &self.rate
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn min_rarity(&self) -> Rarity {
        self.store.min_rarity()
    }

    pub fn load_history(&self) -> bool {
        self.load_history
    }

    /// Returns whether anything changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn observe_post(&mut self, observed_at: DateTime<Utc>) {
        self.rate.on_event(observed_at);
        self.stats.posts_seen += 1;
        self.stats.rate_per_second = self.rate.current_rate();
    }

    /// Returns the entry back when it was new and must be persisted.
    pub(crate) fn record_match(&mut self, entry: Entry) -> Option<Entry> {
        if self.store.record(entry.clone()) {
            self.stats.matches_this_session += 1;
            self.stats.matches_total = self.store.len() as u64;
            Some(entry)
        } else {
            self.stats.duplicates_skipped += 1;
            None
        }
    }

    pub(crate) fn record_classifier_failure(&mut self) {
        self.stats.classifier_failures += 1;
    }

    pub(crate) fn apply_history(&mut self, entries: Vec<Entry>) {
        self.store.replace_history(entries);
        self.stats.matches_total = self.store.len() as u64;
    }

    pub(crate) fn set_min_rarity(&mut self, min_rarity: Rarity) {
        self.store.set_min_rarity(min_rarity);
    }

    pub(crate) fn toggle_order(&mut self) {
        self.store.toggle_order();
    }

    pub(crate) fn set_persistence(&mut self, status: PersistenceStatus) {
        self.stats.persistence = status;
    }
}

use chrono::{DateTime, Utc};

use crate::{Entry, Rarity, Stats};

/// Immutable snapshot handed to renderers and other observers.
#[derive(Debug, Clone, PartialEq)]
pub struct AppViewModel {
    pub stats: Stats,
    pub entries: Vec<Entry>,
    pub newest_first: bool,
    pub min_rarity: Rarity,
    pub max_entries: usize,
    pub started_at: DateTime<Utc>,
    pub dirty: bool,
}

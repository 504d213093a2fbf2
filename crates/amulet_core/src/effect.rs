use crate::{Entry, Rarity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append a newly recorded match to the durable log.
    PersistEntry(Entry),
    /// Re-read the durable log at a new threshold and send back `Msg::HistoryLoaded`.
    ReloadHistory { min_rarity: Rarity },
}

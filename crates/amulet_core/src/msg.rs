use chrono::{DateTime, Utc};

use crate::{Entry, Rarity};

/// Result of running the classifier over one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Match(Rarity),
    NoMatch,
    /// The classifier could not produce a verdict; the post is skipped.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A worker finished classifying one post.
    PostClassified {
        text: String,
        outcome: Outcome,
        observed_at: DateTime<Utc>,
    },
    /// History read from the durable log at `min_rarity`.
    HistoryLoaded {
        min_rarity: Rarity,
        entries: Vec<Entry>,
    },
    /// Operator changed the rarity threshold.
    SetMinRarity(Rarity),
    /// Operator flipped between newest-first and oldest-first.
    ToggleOrder,
    /// The durable log could not be opened; matches stay in memory only.
    PersistenceUnavailable,
    /// Render tick.
    Tick,
    NoOp,
}

use crate::{AppState, Effect, Entry, Msg, Outcome, PersistenceStatus};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::PostClassified {
            text,
            outcome,
            observed_at,
        } => {
            // Every post counts towards throughput, matched or not.
            state.observe_post(observed_at);
            state.mark_dirty();
            match outcome {
                Outcome::Match(rarity) => state
                    .record_match(Entry::new(text, rarity, observed_at))
                    .map(Effect::PersistEntry)
                    .into_iter()
                    .collect(),
                Outcome::NoMatch => Vec::new(),
                Outcome::Failed => {
                    state.record_classifier_failure();
                    Vec::new()
                }
            }
        }
        Msg::HistoryLoaded {
            min_rarity,
            entries,
        } => {
            // A reload requested for an older threshold lost the race; drop it.
            if min_rarity != state.min_rarity() {
                return (state, Vec::new());
            }
            state.apply_history(entries);
            state.mark_dirty();
            Vec::new()
        }
        Msg::SetMinRarity(min_rarity) => {
            if min_rarity == state.min_rarity() {
                return (state, Vec::new());
            }
            state.set_min_rarity(min_rarity);
            state.mark_dirty();
            if state.load_history() {
                vec![Effect::ReloadHistory { min_rarity }]
            } else {
                Vec::new()
            }
        }
        Msg::ToggleOrder => {
            state.toggle_order();
            state.mark_dirty();
            Vec::new()
        }
        Msg::PersistenceUnavailable => {
            state.set_persistence(PersistenceStatus::MemoryOnly);
            state.mark_dirty();
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

//! Amulet collector core: match store, rate estimator and the pure state machine.
mod effect;
mod entry;
mod msg;
mod rate;
mod state;
mod store;
mod update;
mod view_model;

pub use effect::Effect;
pub use entry::{Entry, Rarity};
pub use msg::{Msg, Outcome};
pub use rate::{RateEstimator, RATE_WINDOW_SECS};
pub use state::{AppState, PersistenceStatus, Stats, ViewSettings};
pub use store::{Origin, Store, DEFAULT_MAX_ENTRIES};
pub use update::update;
pub use view_model::AppViewModel;

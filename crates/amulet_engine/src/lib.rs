//! Amulet engine: classifier workers, match log IO and history loading.
mod classify;
mod dispatch;
mod history;
mod persist;
mod record;
mod types;
mod writer;

pub use classify::{
    rarity_for_run, sha256_hex, ClassifyError, Classifier, Sha256Classifier, MAX_AMULET_BYTES,
    MIN_EIGHTS,
};
pub use dispatch::{
    DispatchError, Dispatcher, DispatcherSettings, DEFAULT_QUEUE_DEPTH_PER_WORKER,
};
pub use history::{load_history, load_history_with_report, HistoryReport};
pub use persist::{backup_path, ensure_log_dir, refresh_backup, PersistError};
pub use record::{decode_entry, encode_entry, RecordError};
pub use types::ClassifiedPost;
pub use writer::{LogWriter, LogWriterHandle, WriterCounters, WriterSettings};

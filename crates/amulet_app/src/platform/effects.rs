use std::path::PathBuf;

use amulet_core::{Effect, Msg, Rarity};
use amulet_engine::{load_history_with_report, LogWriterHandle};
use amulet_logging::{amulet_error, amulet_info, amulet_trace, amulet_warn};
use tokio::sync::mpsc;

use super::app::Control;

/// Executes the effects returned by `update` on behalf of the state owner.
pub struct EffectRunner {
    writer: LogWriterHandle,
    control: mpsc::Sender<Control>,
    log_file: PathBuf,
}

impl EffectRunner {
    pub fn new(writer: LogWriterHandle, control: mpsc::Sender<Control>, log_file: PathBuf) -> Self {
        Self {
            writer,
            control,
            log_file,
        }
    }

    pub async fn run(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PersistEntry(entry) => {
                    amulet_trace!("PersistEntry rarity={} text_len={}", entry.rarity, entry.text.len());
                    // Waits when the writer is behind; workers feel it through the event channel.
                    if let Err(err) = self.writer.enqueue(entry).await {
                        amulet_warn!("Match not persisted: {}", err);
                    }
                }
                Effect::ReloadHistory { min_rarity } => self.spawn_reload(min_rarity),
            }
        }
    }

    /// Read the log off the state owner's task and post the result back as a message.
    fn spawn_reload(&self, min_rarity: Rarity) {
        let path = self.log_file.clone();
        let control = self.control.clone();
        tokio::spawn(async move {
            let loaded =
                tokio::task::spawn_blocking(move || load_history_with_report(&path, min_rarity))
                    .await;
            let entries = match loaded {
                Ok(Ok((entries, report))) => {
                    amulet_info!(
                        "Reloaded history at {}: {} entries ({} below threshold, {} malformed)",
                        min_rarity,
                        report.loaded,
                        report.below_threshold,
                        report.malformed
                    );
                    entries
                }
                Ok(Err(err)) => {
                    amulet_warn!("History reload at {} failed: {}", min_rarity, err);
                    return;
                }
                Err(err) => {
                    amulet_error!("History reload task failed: {}", err);
                    return;
                }
            };
            let msg = Msg::HistoryLoaded {
                min_rarity,
                entries,
            };
            if control.send(Control::Apply(msg)).await.is_err() {
                amulet_trace!("State owner gone before history reload finished");
            }
        });
    }
}

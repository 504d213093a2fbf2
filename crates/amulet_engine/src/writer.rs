use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use amulet_core::Entry;
use amulet_logging::{amulet_debug, amulet_error, amulet_info, amulet_warn};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::persist::PersistError;
use crate::record::encode_entry;

#[derive(Debug, Clone)]
pub struct WriterSettings {
    /// Entries buffered between the state owner and the writer task.
    pub channel_capacity: usize,
    /// Flush as soon as this many entries are pending.
    pub batch_size: usize,
    /// Flush whatever is pending at this period.
    pub flush_interval: Duration,
    /// `fsync` the data after every flush.
    pub sync_data: bool,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
            batch_size: 100,
            flush_interval: Duration::from_secs(1),
            sync_data: true,
        }
    }
}

/// Counters kept by the writer task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterCounters {
    pub flushes: u64,
    pub records_written: u64,
    pub failed_flushes: u64,
    /// Entries dropped because the log never opened or a flush failed.
    pub discarded: u64,
}

#[derive(Debug, Default)]
struct SharedCounters {
    flushes: AtomicU64,
    records_written: AtomicU64,
    failed_flushes: AtomicU64,
    discarded: AtomicU64,
}

impl SharedCounters {
    fn snapshot(&self) -> WriterCounters {
        WriterCounters {
            flushes: self.flushes.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

enum WriterCommand {
    Append(Entry),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Cloneable sender side of the match log writer.
#[derive(Clone)]
pub struct LogWriterHandle {
    tx: mpsc::Sender<WriterCommand>,
}

impl LogWriterHandle {
    /// Queue an entry for the next batch. Waits only if the buffer is full.
    pub async fn enqueue(&self, entry: Entry) -> Result<(), PersistError> {
        self.tx
            .send(WriterCommand::Append(entry))
            .await
            .map_err(|_| PersistError::WriterClosed)
    }

    /// Write out everything queued so far and wait until it is on disk.
    pub async fn flush(&self) -> Result<(), PersistError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(WriterCommand::Flush(ack))
            .await
            .map_err(|_| PersistError::WriterClosed)?;
        done.await.map_err(|_| PersistError::WriterClosed)
    }
}

/// Append-only match log writer.
///
/// A single task owns the file and batches entries, flushing when a batch
/// fills up or the flush interval elapses. If the file cannot be opened the
/// writer stays up but discards everything, so the pipeline keeps running in
/// memory only.
pub struct LogWriter {
    handle: LogWriterHandle,
    task: JoinHandle<()>,
    counters: Arc<SharedCounters>,
    path: PathBuf,
    persisting: bool,
}

impl LogWriter {
    /// Open `path` for appending and spawn the writer task on the current runtime.
    pub async fn start(path: impl Into<PathBuf>, settings: WriterSettings) -> Self {
        let path = path.into();
        let (tx, rx) = mpsc::channel(settings.channel_capacity.max(1));
        let counters = Arc::new(SharedCounters::default());

        let opened = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await;
        let (task, persisting) = match opened {
            Ok(file) => {
                amulet_info!("Appending matches to {:?}", path);
                let task = tokio::spawn(run_writer(file, rx, settings, counters.clone()));
                (task, true)
            }
            Err(err) => {
                amulet_error!(
                    "Cannot open match log {:?}: {}. Matches will NOT be saved this run.",
                    path,
                    err
                );
                (tokio::spawn(run_discard(rx, counters.clone())), false)
            }
        };

        Self {
            handle: LogWriterHandle { tx },
            task,
            counters,
            path,
            persisting,
        }
    }

    pub fn handle(&self) -> LogWriterHandle {
        self.handle.clone()
    }

    pub async fn enqueue(&self, entry: Entry) -> Result<(), PersistError> {
        self.handle.enqueue(entry).await
    }

    pub async fn flush(&self) -> Result<(), PersistError> {
        self.handle.flush().await
    }

    /// False when the log could not be opened and entries are being dropped.
    pub fn is_persisting(&self) -> bool {
        self.persisting
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn counters(&self) -> WriterCounters {
        self.counters.snapshot()
    }

    /// Flush the pending batch and wait for the task to exit.
    ///
    /// Entries queued by any handle before this call are written; anything
    /// sent afterwards is rejected.
    pub async fn shutdown(self) -> WriterCounters {
        if self.handle.tx.send(WriterCommand::Shutdown).await.is_err() {
            amulet_warn!("Match log writer already stopped");
        }
        if let Err(err) = self.task.await {
            amulet_error!("Match log writer task failed: {}", err);
        }
        self.counters.snapshot()
    }
}

async fn run_writer(
    file: File,
    mut rx: mpsc::Receiver<WriterCommand>,
    settings: WriterSettings,
    counters: Arc<SharedCounters>,
) {
    let batch_size = settings.batch_size.max(1);
    let mut log = MatchLog::new(file, settings.sync_data);
    let mut batch: Vec<Entry> = Vec::with_capacity(batch_size);
    // First tick one full period from now, not immediately.
    let mut ticker = interval_at(
        Instant::now() + settings.flush_interval,
        settings.flush_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(WriterCommand::Append(entry)) => {
                    batch.push(entry);
                    if batch.len() >= batch_size {
                        write_batch(&mut log, &mut batch, &counters).await;
                    }
                }
                Some(WriterCommand::Flush(ack)) => {
                    write_batch(&mut log, &mut batch, &counters).await;
                    let _ = ack.send(());
                }
                Some(WriterCommand::Shutdown) | None => break,
            },
            _ = ticker.tick() => {
                write_batch(&mut log, &mut batch, &counters).await;
            }
        }
    }

    write_batch(&mut log, &mut batch, &counters).await;
    let totals = counters.snapshot();
    amulet_info!(
        "Match log writer drained: {} records in {} flushes ({} failed)",
        totals.records_written,
        totals.flushes,
        totals.failed_flushes
    );
}

async fn write_batch(log: &mut MatchLog, batch: &mut Vec<Entry>, counters: &SharedCounters) {
    if batch.is_empty() {
        return;
    }
    let count = batch.len() as u64;
    match log.append(batch).await {
        Ok(()) => {
            counters.flushes.fetch_add(1, Ordering::Relaxed);
            counters.records_written.fetch_add(count, Ordering::Relaxed);
            amulet_debug!("Flushed {} matches", count);
        }
        Err(err) => {
            counters.failed_flushes.fetch_add(1, Ordering::Relaxed);
            counters.discarded.fetch_add(count, Ordering::Relaxed);
            amulet_warn!("Failed to flush {} matches: {}", count, err);
        }
    }
    batch.clear();
}

/// The open log file. A batch either lands whole or not at all: a write that
/// fails partway is cut back to where the batch started.
struct MatchLog {
    file: File,
    sync_data: bool,
    /// A failed batch could not be cut back, so the file may end mid-record.
    torn_tail: bool,
}

impl MatchLog {
    fn new(file: File, sync_data: bool) -> Self {
        Self {
            file,
            sync_data,
            torn_tail: false,
        }
    }

    async fn append(&mut self, batch: &[Entry]) -> Result<(), PersistError> {
        let mut buffer = String::new();
        if self.torn_tail {
            buffer.push('\n');
        }
        for entry in batch {
            buffer.push_str(&encode_entry(entry)?);
            buffer.push('\n');
        }

        let start = self.file.metadata().await?.len();
        match self.write_all(buffer.as_bytes()).await {
            Ok(()) => {
                self.torn_tail = false;
                Ok(())
            }
            Err(err) => {
                self.rollback(start).await;
                Err(err)
            }
        }
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), PersistError> {
        self.file.write_all(bytes).await?;
        self.file.flush().await?;
        if self.sync_data {
            self.file.sync_data().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self, len: u64) {
        match self.file.set_len(len).await {
            Ok(()) => amulet_debug!("Cut match log back to {} bytes", len),
            Err(err) => {
                self.torn_tail = true;
                amulet_warn!(
                    "Could not cut match log back to {} bytes: {}; next batch starts on a new line",
                    len,
                    err
                );
            }
        }
    }
}

async fn run_discard(mut rx: mpsc::Receiver<WriterCommand>, counters: Arc<SharedCounters>) {
    while let Some(command) = rx.recv().await {
        match command {
            WriterCommand::Append(_) => {
                counters.discarded.fetch_add(1, Ordering::Relaxed);
            }
            WriterCommand::Flush(ack) => {
                let _ = ack.send(());
            }
            WriterCommand::Shutdown => break,
        }
    }
}

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use amulet_core::{update, AppState, AppViewModel, Entry, Msg, Rarity, Stats, ViewSettings};
use amulet_engine::{
    ensure_log_dir, load_history_with_report, refresh_backup, ClassifiedPost, Classifier,
    Dispatcher, DispatcherSettings, LogWriter, Sha256Classifier, WriterCounters, WriterSettings,
};
use amulet_logging::{amulet_debug, amulet_error, amulet_info, amulet_warn};
use anyhow::{anyhow, Context};
use chrono::{Local, Utc};
use clap::Parser;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::config::Cli;
use super::effects::EffectRunner;
use super::source;
use super::ui;

/// Classified posts buffered between the workers and the state owner.
const EVENT_CHANNEL_CAPACITY: usize = 1024;
const CONTROL_CHANNEL_CAPACITY: usize = 64;
const RENDER_INTERVAL: Duration = Duration::from_millis(250);

pub async fn run_app() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if !amulet_logging::initialize(&cli.log_destination(), cli.log_level()) {
        amulet_warn!("A logger was already installed; keeping it");
    }
    let config = cli.pipeline_config()?;
    amulet_info!("Starting amulet collector: {:?}", config);

    let pipeline =
        Pipeline::start(config, Arc::new(Sha256Classifier), Box::new(io::stdout())).await?;

    let cancel = CancellationToken::new();
    let mut finished = source::spawn_stdin_source(pipeline.ingress(), cancel.clone())
        .context("failed to start stdin reader")?;

    let interrupted = tokio::select! {
        signal = tokio::signal::ctrl_c() => Some(signal),
        _ = &mut finished => None,
    };
    match interrupted {
        Some(Ok(())) => amulet_info!("Interrupted; shutting down"),
        Some(Err(err)) => {
            amulet_warn!("Cannot listen for Ctrl-C: {}", err);
            let _ = finished.await;
            amulet_info!("Input closed; shutting down");
        }
        None => amulet_info!("Input closed; shutting down"),
    }
    cancel.cancel();

    let report = pipeline.shutdown().await?;
    amulet_info!(
        "Done: {} posts, {} new matches, {} records written",
        report.stats.posts_seen,
        report.stats.matches_this_session,
        report.writer.records_written
    );
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub view: ViewSettings,
    pub dispatcher: DispatcherSettings,
    pub writer: WriterSettings,
    pub log_file: PathBuf,
    /// Upper bound on the whole shutdown sequence.
    pub shutdown_grace: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            view: ViewSettings::default(),
            dispatcher: DispatcherSettings::default(),
            writer: WriterSettings::default(),
            log_file: PathBuf::from("amulets.json"),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Requests to the state owner that do not come from the workers.
pub enum Control {
    Apply(Msg),
    Snapshot(oneshot::Sender<AppViewModel>),
}

/// Rendered frames go here.
pub type FrameSink = Box<dyn Write + Send>;

#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub stats: Stats,
    pub writer: WriterCounters,
}

/// Everything one collector run owns: the worker pool, the state owner task
/// and the match log writer.
pub struct Pipeline {
    dispatcher: Arc<Dispatcher>,
    control: mpsc::Sender<Control>,
    state_task: JoinHandle<AppState>,
    writer: LogWriter,
    shutdown_grace: Duration,
}

impl Pipeline {
    /// Back up and load the match log, open the writer, then start the state
    /// owner and the classifier workers.
    pub async fn start(
        config: PipelineConfig,
        classifier: Arc<dyn Classifier>,
        frames: FrameSink,
    ) -> anyhow::Result<Self> {
        let log_file = config.log_file.clone();
        if let Err(err) = ensure_log_dir(&log_file) {
            amulet_warn!("Cannot prepare directory for {:?}: {}", log_file, err);
        }
        match refresh_backup(&log_file) {
            Ok(Some(backup)) => amulet_info!("Backed up match log to {:?}", backup),
            Ok(None) => amulet_debug!("Match log backup is current"),
            Err(err) => amulet_warn!("Could not back up {:?}: {}", log_file, err),
        }

        let mut state = AppState::new(config.view, Utc::now());
        if state.load_history() {
            let min_rarity = state.min_rarity();
            let entries = initial_history(log_file.clone(), min_rarity).await;
            state = update(
                state,
                Msg::HistoryLoaded {
                    min_rarity,
                    entries,
                },
            )
            .0;
        }

        let writer = LogWriter::start(log_file.clone(), config.writer.clone()).await;
        if !writer.is_persisting() {
            state = update(state, Msg::PersistenceUnavailable).0;
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);

        let dispatcher = match Dispatcher::start(classifier, &config.dispatcher, event_tx) {
            Ok(dispatcher) => Arc::new(dispatcher),
            Err(err) => {
                writer.shutdown().await;
                return Err(err).context("failed to start classifier workers");
            }
        };

        let effects = EffectRunner::new(writer.handle(), control_tx.clone(), log_file);
        let state_task = tokio::spawn(run_state_owner(
            state, event_rx, control_rx, effects, frames,
        ));

        Ok(Self {
            dispatcher,
            control: control_tx,
            state_task,
            writer,
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Where sources submit posts. `submit` blocks while the queue is full.
    pub fn ingress(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    pub async fn send(&self, msg: Msg) -> anyhow::Result<()> {
        self.control
            .send(Control::Apply(msg))
            .await
            .map_err(|_| anyhow!("state owner has stopped"))
    }

    pub async fn set_min_rarity(&self, min_rarity: Rarity) -> anyhow::Result<()> {
        self.send(Msg::SetMinRarity(min_rarity)).await
    }

    pub async fn toggle_order(&self) -> anyhow::Result<()> {
        self.send(Msg::ToggleOrder).await
    }

    /// Current view, taken by the state owner between messages.
    pub async fn snapshot(&self) -> anyhow::Result<AppViewModel> {
        let (reply, view) = oneshot::channel();
        self.control
            .send(Control::Snapshot(reply))
            .await
            .map_err(|_| anyhow!("state owner has stopped"))?;
        view.await.map_err(|_| anyhow!("state owner has stopped"))
    }

    /// Stop intake and drain every stage in order: workers, state owner, writer.
    pub async fn shutdown(self) -> anyhow::Result<ShutdownReport> {
        let Pipeline {
            dispatcher,
            control,
            state_task,
            writer,
            shutdown_grace,
        } = self;
        drop(control);

        let drain = async move {
            amulet_info!("Shutdown: closing dispatcher");
            tokio::task::spawn_blocking(move || dispatcher.close())
                .await
                .context("dispatcher close panicked")?;

            amulet_info!("Shutdown: workers stopped, draining state owner");
            let state = state_task.await.context("state owner panicked")?;

            amulet_info!("Shutdown: stopping match log writer");
            let counters = writer.shutdown().await;
            Ok::<_, anyhow::Error>(ShutdownReport {
                stats: state.stats().clone(),
                writer: counters,
            })
        };

        match tokio::time::timeout(shutdown_grace, drain).await {
            Ok(report) => report,
            Err(_) => {
                amulet_error!(
                    "Shutdown did not finish within {:?}; pending matches may be lost",
                    shutdown_grace
                );
                Err(anyhow!("shutdown timed out after {:?}", shutdown_grace))
            }
        }
    }
}

async fn initial_history(path: PathBuf, min_rarity: Rarity) -> Vec<Entry> {
    let display = path.clone();
    match tokio::task::spawn_blocking(move || load_history_with_report(&path, min_rarity)).await {
        Ok(Ok((entries, report))) => {
            amulet_info!(
                "Loaded {} entries from {:?} ({} below {}, {} malformed)",
                report.loaded,
                display,
                report.below_threshold,
                min_rarity,
                report.malformed
            );
            entries
        }
        Ok(Err(err)) => {
            amulet_warn!("Could not read history from {:?}: {}", display, err);
            Vec::new()
        }
        Err(err) => {
            amulet_error!("History load task failed: {}", err);
            Vec::new()
        }
    }
}

/// The only task that touches `AppState`. Ends once every worker has exited
/// and the event channel is empty.
async fn run_state_owner(
    mut state: AppState,
    mut events: mpsc::Receiver<ClassifiedPost>,
    mut control: mpsc::Receiver<Control>,
    effects: EffectRunner,
    mut frames: FrameSink,
) -> AppState {
    let mut ticker = interval(RENDER_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let msg = tokio::select! {
            post = events.recv() => match post {
                Some(post) => Msg::from(post),
                None => break,
            },
            Some(command) = control.recv() => match command {
                Control::Apply(msg) => msg,
                Control::Snapshot(reply) => {
                    let _ = reply.send(state.view());
                    continue;
                }
            },
            _ = ticker.tick() => Msg::Tick,
        };

        let tick = matches!(msg, Msg::Tick);
        let (next, pending) = update(state, msg);
        state = next;
        effects.run(pending).await;
        if tick {
            draw_if_dirty(&mut state, &mut frames);
        }
    }

    draw_if_dirty(&mut state, &mut frames);
    amulet_info!(
        "State owner drained after {} posts",
        state.stats().posts_seen
    );
    state
}

fn draw_if_dirty(state: &mut AppState, frames: &mut FrameSink) {
    if !state.consume_dirty() {
        return;
    }
    let frame = ui::render::render(&state.view(), Utc::now(), &Local);
    if let Err(err) = frames
        .write_all(frame.as_bytes())
        .and_then(|()| frames.flush())
    {
        amulet_warn!("Failed to draw frame: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::fs;
    use std::sync::Mutex;

    use super::*;
    use amulet_core::PersistenceStatus;
    use amulet_engine::{backup_path, load_history, ClassifyError};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// `amulet:<rarity> ...` matches at that rarity, `boom` fails, the rest never match.
    fn prefix_classifier(text: &str) -> Result<Option<Rarity>, ClassifyError> {
        if text == "boom" {
            return Err(ClassifyError::new("boom"));
        }
        Ok(text
            .strip_prefix("amulet:")
            .and_then(|rest| rest.get(..1))
            .and_then(|digit| digit.parse::<u8>().ok())
            .and_then(Rarity::new))
    }

    #[derive(Clone, Default)]
    struct SharedFrames(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedFrames {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn config(log_file: PathBuf, worker_count: usize) -> PipelineConfig {
        PipelineConfig {
            dispatcher: DispatcherSettings {
                worker_count,
                queue_depth_per_worker: 4,
            },
            writer: WriterSettings {
                flush_interval: Duration::from_secs(3600),
                ..WriterSettings::default()
            },
            log_file,
            ..PipelineConfig::default()
        }
    }

    async fn start(config: PipelineConfig) -> Pipeline {
        Pipeline::start(config, Arc::new(prefix_classifier), Box::new(io::sink()))
            .await
            .unwrap()
    }

    async fn submit_all(pipeline: &Pipeline, posts: &[&str]) {
        let dispatcher = pipeline.ingress();
        let posts: Vec<String> = posts.iter().map(|p| p.to_string()).collect();
        tokio::task::spawn_blocking(move || {
            for post in posts {
                dispatcher.submit(post).unwrap();
            }
        })
        .await
        .unwrap();
    }

    async fn wait_for(
        pipeline: &Pipeline,
        ready: impl Fn(&AppViewModel) -> bool,
    ) -> AppViewModel {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let view = pipeline.snapshot().await.unwrap();
                if ready(&view) {
                    return view;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap()
    }

    fn texts(view: &AppViewModel) -> Vec<&str> {
        view.entries.iter().map(|e| e.text.as_str()).collect()
    }

    fn history_line(text: &str, rarity: u8, second: u32) -> String {
        format!("{{\"Text\":\"{text}\",\"Rarity\":{rarity},\"Time\":\"2024-11-20T12:00:{second:02}Z\"}}\n")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn every_match_seen_before_shutdown_is_persisted_once() {
        amulet_logging::initialize_for_tests();
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("amulets.json");
        let pipeline = start(config(log.clone(), 3)).await;

        submit_all(
            &pipeline,
            &[
                "amulet:3 one",
                "plain",
                "amulet:3 one",
                "amulet:5 two",
                "boom",
                "also plain",
            ],
        )
        .await;
        let report = pipeline.shutdown().await.unwrap();

        assert_eq!(report.stats.posts_seen, 6);
        assert_eq!(report.stats.matches_this_session, 2);
        assert_eq!(report.stats.duplicates_skipped, 1);
        assert_eq!(report.stats.classifier_failures, 1);
        assert_eq!(report.writer.records_written, 2);

        let saved: BTreeSet<_> = load_history(&log, Rarity::MIN)
            .unwrap()
            .into_iter()
            .map(|e| e.text)
            .collect();
        assert_eq!(
            saved,
            BTreeSet::from(["amulet:3 one".to_string(), "amulet:5 two".to_string()])
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn history_seeds_the_store_and_threshold_change_reloads_it() {
        amulet_logging::initialize_for_tests();
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("amulets.json");
        fs::write(
            &log,
            [
                history_line("h5", 5, 30),
                history_line("h1", 1, 10),
                history_line("h3", 3, 20),
            ]
            .concat(),
        )
        .unwrap();

        let pipeline = start(config(log.clone(), 1)).await;
        assert!(backup_path(&log).exists());

        let view = pipeline.snapshot().await.unwrap();
        assert_eq!(view.stats.matches_total, 3);
        assert_eq!(texts(&view), vec!["h5", "h3", "h1"]);

        pipeline.set_min_rarity(Rarity::EPIC).await.unwrap();
        let view = wait_for(&pipeline, |v| v.stats.matches_total == 1).await;
        assert_eq!(view.min_rarity, Rarity::EPIC);
        assert_eq!(texts(&view), vec!["h5"]);

        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn order_toggle_reaches_the_state_owner() {
        amulet_logging::initialize_for_tests();
        let temp = TempDir::new().unwrap();
        let pipeline = start(config(temp.path().join("amulets.json"), 1)).await;

        submit_all(&pipeline, &["amulet:1 a", "amulet:1 b", "amulet:1 c"]).await;
        let view = wait_for(&pipeline, |v| v.entries.len() == 3).await;
        assert_eq!(texts(&view), vec!["amulet:1 c", "amulet:1 b", "amulet:1 a"]);

        pipeline.toggle_order().await.unwrap();
        let view = pipeline.snapshot().await.unwrap();
        assert!(!view.newest_first);
        assert_eq!(texts(&view), vec!["amulet:1 a", "amulet:1 b", "amulet:1 c"]);

        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unopenable_log_runs_in_memory() {
        amulet_logging::initialize_for_tests();
        let temp = TempDir::new().unwrap();
        // A directory where the log file should be.
        let pipeline = start(config(temp.path().to_path_buf(), 1)).await;

        let view = pipeline.snapshot().await.unwrap();
        assert_eq!(view.stats.persistence, PersistenceStatus::MemoryOnly);

        submit_all(&pipeline, &["amulet:2 kept in memory"]).await;
        let view = wait_for(&pipeline, |v| v.entries.len() == 1).await;
        assert_eq!(view.stats.matches_this_session, 1);

        let report = pipeline.shutdown().await.unwrap();
        assert_eq!(report.writer.records_written, 0);
        assert_eq!(report.writer.discarded, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dirty_state_is_drawn() {
        amulet_logging::initialize_for_tests();
        let temp = TempDir::new().unwrap();
        let frames = SharedFrames::default();
        let pipeline = Pipeline::start(
            config(temp.path().join("amulets.json"), 1),
            Arc::new(prefix_classifier),
            Box::new(frames.clone()),
        )
        .await
        .unwrap();

        submit_all(&pipeline, &["amulet:6 shiny"]).await;
        pipeline.shutdown().await.unwrap();

        let drawn = String::from_utf8(frames.0.lock().unwrap().clone()).unwrap();
        assert!(drawn.contains("New: 1"));
        assert!(drawn.contains(" M amulet:6 shiny"));
    }
}

//! Watch mode scheduling
//!
//! Filesystem events from both watched directories feed a per-path
//! debouncer; a pipeline pass starts only once every recently-touched path
//! has been quiet for the configured window, so a burst of exports (or one
//! file still being written) collapses into a single pass. A periodic tick
//! covers events the platform watcher missed. Shutdown is cooperative: an
//! in-flight pass always finishes and commits before the loop exits.

use crate::config::MeetbearConfig;
use crate::error::{Error, Result};
use crate::pipeline::PipelineRunner;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Per-path quiet-window bookkeeping, kept separate from the event loop so
/// the debounce behavior is testable without timers.
///
/// Every event for a path resets that path's timer. The batch is `ready`
/// only when all tracked paths have been quiet for the full window, which
/// means a file still being written keeps holding the pass back.
pub struct Debouncer {
    window: Duration,
    last_seen: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: HashMap::new(),
        }
    }

    pub fn note_event(&mut self, path: PathBuf, now: Instant) {
        self.last_seen.insert(path, now);
    }

    pub fn is_idle(&self) -> bool {
        self.last_seen.is_empty()
    }

    /// True when at least one event is pending and every tracked path has
    /// been quiet for the full window.
    pub fn ready(&self, now: Instant) -> bool {
        !self.last_seen.is_empty()
            && self
                .last_seen
                .values()
                .all(|seen| now.duration_since(*seen) >= self.window)
    }

    /// The instant at which the batch could become ready, if one is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.last_seen
            .values()
            .max()
            .map(|latest| *latest + self.window)
    }

    /// Forget the pending batch, returning how many paths it covered.
    pub fn drain(&mut self) -> usize {
        let count = self.last_seen.len();
        self.last_seen.clear();
        count
    }
}

/// Runs the pipeline continuously: once at startup, after each debounced
/// burst of directory changes, and on a periodic safety-net tick.
pub struct WatchScheduler {
    runner: PipelineRunner,
    dirs: Vec<PathBuf>,
    debounce: Duration,
    interval: Duration,
}

impl WatchScheduler {
    pub fn new(config: &MeetbearConfig, runner: PipelineRunner) -> Self {
        Self {
            runner,
            dirs: vec![
                config.directories.summary_dir.clone(),
                config.directories.transcript_dir.clone(),
            ],
            debounce: Duration::from_secs(config.service.debounce_secs),
            interval: Duration::from_secs(config.service.interval_secs),
        }
    }

    /// Watch until `shutdown` flips to true. The current pass, if any,
    /// completes before this returns.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<PathBuf>(256);
        // Dropping the watcher stops event delivery, so it lives for the
        // whole loop even though nothing reads it directly.
        let _watcher = start_watcher(tx, &self.dirs)?;

        tracing::info!(
            dirs = ?self.dirs,
            debounce_secs = self.debounce.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Watching for changes"
        );

        self.runner.run_once().await;

        let mut debouncer = Debouncer::new(self.debounce);
        let mut tick = tokio::time::interval_at(
            tokio::time::Instant::now() + self.interval,
            self.interval,
        );
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let deadline = debouncer.next_deadline();
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = rx.recv() => {
                    match event {
                        Some(path) => {
                            tracing::debug!(path = %path.display(), "Change observed");
                            debouncer.note_event(path, Instant::now());
                        }
                        None => break,
                    }
                }
                _ = sleep_until_opt(deadline) => {
                    let now = Instant::now();
                    if debouncer.ready(now) {
                        let paths = debouncer.drain();
                        tracing::info!(paths, "Directories settled, running pass");
                        self.runner.run_once().await;
                    }
                }
                _ = tick.tick() => {
                    // Skip the safety-net pass while a burst is settling;
                    // the debounce deadline will run it shortly anyway.
                    if debouncer.is_idle() {
                        tracing::debug!("Interval tick, running pass");
                        self.runner.run_once().await;
                    }
                }
            }
        }

        tracing::info!("Watch loop stopped");
        Ok(())
    }
}

/// Sleep until `deadline`, or forever when no batch is pending.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
        None => std::future::pending().await,
    }
}

fn start_watcher(tx: mpsc::Sender<PathBuf>, dirs: &[PathBuf]) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |result: notify::Result<Event>| match result {
            Ok(event) => {
                if event.kind.is_access() {
                    return;
                }
                for path in event.paths {
                    if !is_pdf(&path) {
                        continue;
                    }
                    // blocking_send: the notify callback runs on its own
                    // thread, outside the runtime.
                    if tx.blocking_send(path).is_err() {
                        return;
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Watcher error"),
        },
        notify::Config::default(),
    )
    .map_err(|e| Error::Internal(format!("create file watcher: {e}")))?;

    for dir in dirs {
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Internal(format!("watch {}: {e}", dir.display())))?;
    }
    Ok(watcher)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

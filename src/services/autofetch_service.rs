//! Auto-fetch service for periodic repository fetching

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::services::git_service::{FetchOptions, GitBackend};
use crate::services::signals::{DirtyCategory, RepoSignals};

/// When the repository was last fetched and how often it should be
#[derive(Debug)]
pub struct FetchSchedule {
    enabled: AtomicBool,
    interval_minutes: AtomicU32,
    /// Unix seconds of the last successful fetch
    last_fetch: AtomicI64,
}

impl FetchSchedule {
    pub fn new(enabled: bool, interval_minutes: u32) -> Arc<Self> {
        Arc::new(Self {
            enabled: AtomicBool::new(enabled),
            interval_minutes: AtomicU32::new(interval_minutes.max(1)),
            last_fetch: AtomicI64::new(chrono::Utc::now().timestamp()),
        })
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_interval_minutes(&self, minutes: u32) {
        self.interval_minutes.store(minutes.max(1), Ordering::SeqCst);
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes.load(Ordering::SeqCst)
    }

    pub fn mark_fetched(&self, now: i64) {
        self.last_fetch.store(now, Ordering::SeqCst);
    }

    pub fn last_fetch(&self) -> i64 {
        self.last_fetch.load(Ordering::SeqCst)
    }
}

/// Whether a tick at `now` should start a fetch
pub fn should_fetch(
    schedule: &FetchSchedule,
    signals: &RepoSignals,
    git_dir: &Path,
    now: i64,
) -> bool {
    if !schedule.is_enabled() || signals.is_fetching() {
        return false;
    }
    if git_dir.join("index.lock").exists() {
        return false;
    }
    let interval = i64::from(schedule.interval_minutes()) * 60;
    now - schedule.last_fetch() >= interval
}

/// Everything an auto-fetch task needs, shared with the repository
#[derive(Clone)]
pub struct AutoFetchContext {
    pub backend: Arc<dyn GitBackend>,
    pub signals: Arc<RepoSignals>,
    pub schedule: Arc<FetchSchedule>,
    pub git_dir: PathBuf,
}

/// Runs one timer task per open repository
#[derive(Default)]
pub struct AutoFetchService {
    task: Option<JoinHandle<()>>,
}

impl AutoFetchService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking; any previous task is stopped first
    pub fn start(&mut self, context: AutoFetchContext, tick: Duration) {
        self.stop();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // the first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                run_tick(&context).await;
            }
        });

        self.task = Some(task);
    }

    /// Stop the timer task
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for AutoFetchService {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Check the schedule and fetch if due. Errors are logged, never surfaced.
pub async fn run_tick(context: &AutoFetchContext) -> bool {
    let now = chrono::Utc::now().timestamp();
    if !should_fetch(&context.schedule, &context.signals, &context.git_dir, now) {
        return false;
    }
    let Some(guard) = context.signals.try_begin_fetch(true) else {
        return false;
    };

    let workdir = context.backend.workdir().display().to_string();
    tracing::info!("Auto-fetching repository: {}", workdir);

    let backend = Arc::clone(&context.backend);
    let result = tokio::task::spawn_blocking(move || {
        backend.fetch(&FetchOptions {
            remote: None,
            prune: false,
            no_tags: false,
        })
    })
    .await;
    drop(guard);

    match result {
        Ok(Ok(())) => {
            tracing::info!("Auto-fetch complete for {}", workdir);
            context.schedule.mark_fetched(chrono::Utc::now().timestamp());
            context.signals.mark_dirty(DirtyCategory::Refs);
            true
        }
        Ok(Err(e)) => {
            tracing::warn!("Auto-fetch failed for {}: {}", workdir, e);
            false
        }
        Err(e) => {
            tracing::warn!("Auto-fetch task failed for {}: {}", workdir, e);
            false
        }
    }
}

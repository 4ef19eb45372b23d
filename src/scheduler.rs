//! Self-indexing scheduler.
//!
//! [`SelfIndexer`] periodically runs an indexing pass over the project: the
//! documentation, code, history and structure sweeps, in that order, each
//! submitting what it finds through [`Ingestor::add_document`].
//!
//! # Single flight
//!
//! At most one pass runs at a time. Timer ticks and manual
//! [`trigger_indexing`](SelfIndexer::trigger_indexing) calls share one
//! atomic flag; a trigger that finds it set returns
//! [`TriggerOutcome::AlreadyRunning`] without queueing. The flag is held by
//! a guard that clears it on drop, so a panicking or cancelled pass cannot
//! leave the scheduler stuck.
//!
//! # Failure isolation
//!
//! A sweep error is logged and recorded in the [`PassReport`]; later sweeps
//! still run. A file that fails to ingest is counted and skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SelfIndexConfig;
use crate::ingest::Ingestor;
use crate::sweep::{SweepKind, SweepScan};
use crate::{sweep_fs, sweep_git, sweep_tree};

/// Outcome of one sweep within a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub sweep: &'static str,
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Set when the sweep itself could not run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sweeps: Vec<SweepReport>,
}

impl PassReport {
    pub fn indexed(&self) -> usize {
        self.sweeps.iter().map(|s| s.indexed).sum()
    }

    pub fn failed(&self) -> usize {
        self.sweeps.iter().map(|s| s.failed).sum()
    }

    pub fn sweep_errors(&self) -> usize {
        self.sweeps.iter().filter(|s| s.error.is_some()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Completed { report: PassReport },
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexingStatus {
    pub is_indexing: bool,
    pub enabled: bool,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub last_report: Option<PassReport>,
}

/// Holds the single-flight flag for the lifetime of a pass.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct History {
    last_indexed_at: Option<DateTime<Utc>>,
    last_report: Option<PassReport>,
}

struct Timer {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Inner {
    ingestor: Arc<Ingestor>,
    config: SelfIndexConfig,
    running: AtomicBool,
    history: Mutex<History>,
    timer: Mutex<Option<Timer>>,
}

/// Periodic, single-flight self-indexer. Cheap to clone.
#[derive(Clone)]
pub struct SelfIndexer {
    inner: Arc<Inner>,
}

impl SelfIndexer {
    pub fn new(ingestor: Arc<Ingestor>, config: SelfIndexConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                ingestor,
                config,
                running: AtomicBool::new(false),
                history: Mutex::new(History::default()),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Run one pass now, then every `interval_ms` until [`stop`](Self::stop).
    ///
    /// Returns `false` (and does nothing) when self-indexing is disabled or
    /// the timer is already running.
    pub fn start(&self) -> bool {
        if !self.inner.config.enabled {
            info!("self-indexing disabled, scheduler not started");
            return false;
        }
        let Ok(mut timer) = self.inner.timer.lock() else {
            return false;
        };
        if timer.is_some() {
            debug!("scheduler already started");
            return false;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let inner = self.inner.clone();
        let interval = self.inner.config.interval();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        inner.trigger("timer").await;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("scheduler timer stopped");
        });

        *timer = Some(Timer { stop_tx, handle });
        info!(
            interval_ms = self.inner.config.interval_ms,
            root = %self.inner.config.project_root.display(),
            "self-indexing scheduler started"
        );
        true
    }

    /// Cancel the timer. An in-flight pass runs to completion first.
    pub async fn stop(&self) {
        let timer = match self.inner.timer.lock() {
            Ok(mut timer) => timer.take(),
            Err(_) => None,
        };
        if let Some(timer) = timer {
            let _ = timer.stop_tx.send(true);
            if let Err(e) = timer.handle.await {
                warn!(error = %e, "scheduler task ended abnormally");
            }
            info!("self-indexing scheduler stopped");
        }
    }

    /// Run a pass now unless one is already in progress.
    pub async fn trigger_indexing(&self) -> TriggerOutcome {
        self.inner.trigger("manual").await
    }

    pub fn status(&self) -> IndexingStatus {
        let (last_indexed_at, last_report) = match self.inner.history.lock() {
            Ok(h) => (h.last_indexed_at, h.last_report.clone()),
            Err(_) => (None, None),
        };
        IndexingStatus {
            is_indexing: self.inner.running.load(Ordering::Acquire),
            enabled: self.inner.config.enabled,
            last_indexed_at,
            last_report,
        }
    }
}

impl Inner {
    async fn trigger(&self, source: &str) -> TriggerOutcome {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            info!(source, "indexing already in progress, trigger ignored");
            return TriggerOutcome::AlreadyRunning;
        };

        info!(source, "indexing pass started");
        let report = self.run_pass().await;
        info!(
            indexed = report.indexed(),
            failed = report.failed(),
            sweep_errors = report.sweep_errors(),
            "indexing pass complete"
        );

        if let Ok(mut history) = self.history.lock() {
            history.last_indexed_at = Some(report.finished_at);
            history.last_report = Some(report.clone());
        }
        TriggerOutcome::Completed { report }
    }

    async fn run_pass(&self) -> PassReport {
        let started_at = Utc::now();
        let mut sweeps = Vec::with_capacity(SweepKind::ALL.len());
        for kind in SweepKind::ALL {
            sweeps.push(self.run_sweep(kind).await);
        }
        PassReport {
            started_at,
            finished_at: Utc::now(),
            sweeps,
        }
    }

    async fn run_sweep(&self, kind: SweepKind) -> SweepReport {
        let mut report = SweepReport {
            sweep: kind.label(),
            indexed: 0,
            skipped: 0,
            failed: 0,
            error: None,
        };

        let scan = match self.scan(kind).await {
            Ok(scan) => scan,
            Err(e) => {
                warn!(sweep = kind.label(), error = %e, "sweep failed");
                report.error = Some(format!("{e:#}"));
                return report;
            }
        };
        report.skipped = scan.skipped;
        report.failed = scan.failed;

        for item in scan.items {
            let title = item.title.clone();
            match self.ingestor.add_document(item.into_request()).await {
                Ok(_) => report.indexed += 1,
                Err(e) => {
                    warn!(
                        sweep = kind.label(),
                        item = %title,
                        code = e.code(),
                        error = %e,
                        "failed to index item"
                    );
                    report.failed += 1;
                }
            }
        }

        debug!(
            sweep = kind.label(),
            indexed = report.indexed,
            skipped = report.skipped,
            failed = report.failed,
            "sweep complete"
        );
        report
    }

    /// Directory walks, file reads and `git` run on the blocking pool.
    async fn scan(&self, kind: SweepKind) -> anyhow::Result<SweepScan> {
        let config = self.config.clone();
        off_runtime(kind.label(), move || match kind {
            SweepKind::Documentation => sweep_fs::scan_documentation(&config),
            SweepKind::Code => sweep_fs::scan_code(&config),
            SweepKind::History => sweep_git::scan_history(&config),
            SweepKind::Structure => sweep_tree::scan_structure(&config),
        })
        .await
    }
}

async fn off_runtime<T, F>(label: &str, work: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .with_context(|| format!("{label} sweep task did not complete"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, RetrievalConfig};
    use crate::embedding::{EmbeddingClient, HashProvider};
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;
    use context_indexer_core::embedding::EmbeddingProvider;
    use context_indexer_core::store::memory::InMemoryStore;
    use std::time::Duration;
    use tokio::sync::{Notify, Semaphore};

    /// Blocks every embed call until a permit is released.
    struct GateProvider {
        entered: Notify,
        gate: Semaphore,
        inner: HashProvider,
    }

    #[async_trait]
    impl EmbeddingProvider for GateProvider {
        fn name(&self) -> &str {
            "gate"
        }
        fn model_name(&self) -> &str {
            "gate"
        }
        fn dims(&self) -> usize {
            8
        }
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.entered.notify_one();
            let _permit = self.gate.acquire().await?;
            self.inner.embed(text).await
        }
        async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.inner.embed_batch(texts).await
        }
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "# Demo\nSelf indexing.").unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn demo() {}").unwrap();
        dir
    }

    fn config(root: &std::path::Path) -> SelfIndexConfig {
        SelfIndexConfig {
            project_root: root.to_path_buf(),
            interval_ms: 20,
            ..Default::default()
        }
    }

    fn indexer(
        provider: Arc<dyn EmbeddingProvider>,
        config: SelfIndexConfig,
    ) -> (SelfIndexer, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let ingestor = Arc::new(Ingestor::new(
            store.clone(),
            EmbeddingClient::new(provider, RetryPolicy::default()),
            ChunkingConfig::default(),
            RetrievalConfig::default(),
        ));
        (SelfIndexer::new(ingestor, config), store)
    }

    #[tokio::test]
    async fn test_manual_pass_indexes_all_sweeps() {
        let dir = project();
        let (indexer, store) = indexer(Arc::new(HashProvider::new(8)), config(dir.path()));

        let report = match indexer.trigger_indexing().await {
            TriggerOutcome::Completed { report } => report,
            TriggerOutcome::AlreadyRunning => panic!("nothing else was running"),
        };
        let labels: Vec<&str> = report.sweeps.iter().map(|s| s.sweep).collect();
        assert_eq!(
            labels,
            vec!["documentation", "code", "git_history", "project_structure"]
        );
        assert_eq!(report.sweeps[0].indexed, 1);
        assert_eq!(report.sweeps[1].indexed, 1);
        assert_eq!(report.sweeps[3].indexed, 1);

        let status = indexer.status();
        assert!(!status.is_indexing);
        assert!(status.last_indexed_at.is_some());
        assert_eq!(status.last_report, Some(report));
        assert!(store.len() >= 3);
    }

    #[tokio::test]
    async fn test_trigger_while_running_is_noop() {
        let dir = project();
        let provider = Arc::new(GateProvider {
            entered: Notify::new(),
            gate: Semaphore::new(0),
            inner: HashProvider::new(8),
        });
        let (indexer, _store) = indexer(provider.clone(), config(dir.path()));

        let first = {
            let indexer = indexer.clone();
            tokio::spawn(async move { indexer.trigger_indexing().await })
        };
        provider.entered.notified().await;

        assert!(indexer.status().is_indexing);
        let before = indexer.status();
        assert_eq!(indexer.trigger_indexing().await, TriggerOutcome::AlreadyRunning);
        assert_eq!(indexer.status(), before);

        provider.gate.add_permits(1);
        let outcome = first.await.unwrap();
        assert!(matches!(outcome, TriggerOutcome::Completed { .. }));
        assert!(!indexer.status().is_indexing);
    }

    #[tokio::test]
    async fn test_failing_sweep_does_not_abort_pass() {
        let dir = project();
        let mut cfg = config(dir.path());
        // Invalid glob breaks both file sweeps.
        cfg.exclude_globs = vec!["src/[".into()];
        let (indexer, _store) = indexer(Arc::new(HashProvider::new(8)), cfg);

        let TriggerOutcome::Completed { report } = indexer.trigger_indexing().await else {
            panic!("expected a completed pass");
        };
        assert!(report.sweeps[0].error.is_some());
        assert!(report.sweeps[1].error.is_some());
        assert_eq!(report.sweeps[3].indexed, 1);
        assert!(!indexer.status().is_indexing);
    }

    #[tokio::test]
    async fn test_start_runs_immediately_and_stops() {
        let dir = project();
        let (indexer, _store) = indexer(Arc::new(HashProvider::new(8)), config(dir.path()));

        assert!(indexer.start());
        assert!(!indexer.start());
        for _ in 0..200 {
            if indexer.status().last_indexed_at.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(indexer.status().last_indexed_at.is_some());

        indexer.stop().await;
        assert!(!indexer.status().is_indexing);
        let after_stop = indexer.status().last_indexed_at;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(indexer.status().last_indexed_at, after_stop);
    }

    #[tokio::test]
    async fn test_disabled_start_is_noop() {
        let dir = project();
        let mut cfg = config(dir.path());
        cfg.enabled = false;
        let (indexer, store) = indexer(Arc::new(HashProvider::new(8)), cfg);

        assert!(!indexer.start());
        tokio::time::sleep(Duration::from_millis(30)).await;
        let status = indexer.status();
        assert!(!status.enabled);
        assert!(status.last_indexed_at.is_none());
        assert!(store.is_empty());
        indexer.stop().await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_scan_work_does_not_block_the_runtime() {
        let (tx, rx) = std::sync::mpsc::channel::<u32>();
        let sender = tokio::spawn(async move {
            tokio::task::yield_now().await;
            tx.send(7).unwrap();
        });

        let received = off_runtime("test", move || {
            Ok(rx.recv_timeout(Duration::from_secs(5))?)
        })
        .await
        .unwrap();
        assert_eq!(received, 7);
        sender.await.unwrap();
    }
}

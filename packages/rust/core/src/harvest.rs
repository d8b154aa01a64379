//! Concurrent ingestion across every (room, source) pair.
//!
//! Runs are spawned on tokio and bounded by a semaphore. Each run holds an
//! async lock on its storage key `(room, sent file)` for its whole duration,
//! so two runs that would read-modify-write the same sent list never overlap.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use jobdigest_fetch::Fetcher;
use jobdigest_shared::{HarvestConfig, Result};
use jobdigest_sources::JobSource;
use jobdigest_storage::KeyValueStore;

use crate::pipeline::{IngestReport, IngestionPipeline, PipelineSettings, ProgressReporter};

// ---------------------------------------------------------------------------
// Key locks
// ---------------------------------------------------------------------------

type LockTable = HashMap<(String, String), Arc<Mutex<()>>>;

/// Lazily created async mutexes, one per storage key.
#[derive(Debug, Clone, Default)]
pub struct KeyLocks {
    table: Arc<std::sync::Mutex<LockTable>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `(room, sent_file)`.
    pub async fn lock(&self, room: &str, sent_file: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                table
                    .entry((room.to_string(), sent_file.to_string()))
                    .or_default(),
            )
        };
        mutex.lock_owned().await
    }
}

// ---------------------------------------------------------------------------
// Harvester
// ---------------------------------------------------------------------------

/// Outcome of one (room, source) run.
#[derive(Debug)]
pub struct HarvestOutcome {
    pub room: String,
    pub source: String,
    pub result: Result<IngestReport>,
}

impl HarvestOutcome {
    /// The run succeeded and its sent records are durable.
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(report) if report.is_durable())
    }
}

/// Runs a set of pipelines for a set of rooms.
pub struct Harvester<F, S> {
    pipelines: Vec<Arc<IngestionPipeline<F, S>>>,
    semaphore: Arc<Semaphore>,
    locks: KeyLocks,
}

impl<F, S> Harvester<F, S>
where
    F: Fetcher + 'static,
    S: KeyValueStore + 'static,
{
    /// At most `concurrency` runs execute at once (minimum 1).
    pub fn new(pipelines: Vec<IngestionPipeline<F, S>>, concurrency: usize) -> Self {
        Self {
            pipelines: pipelines.into_iter().map(Arc::new).collect(),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            locks: KeyLocks::new(),
        }
    }

    /// One pipeline per configured source, all sharing `fetcher` and `store`.
    pub fn from_config(config: &HarvestConfig, fetcher: F, store: S) -> Result<Self>
    where
        F: Clone,
        S: Clone,
    {
        let settings = PipelineSettings::from(config);
        let pipelines = config
            .sources
            .iter()
            .map(|source| {
                IngestionPipeline::new(
                    JobSource::from_config(source),
                    fetcher.clone(),
                    store.clone(),
                    settings,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(pipelines, config.concurrency))
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &IngestionPipeline<F, S>> {
        self.pipelines.iter().map(Arc::as_ref)
    }

    /// Run every pipeline for every room. Outcomes come back in
    /// source-major order regardless of completion order; one failing run
    /// never affects the others.
    #[instrument(skip_all, fields(rooms = rooms.len(), sources = self.pipelines.len()))]
    pub async fn harvest(
        &self,
        rooms: &[String],
        progress: Arc<dyn ProgressReporter>,
    ) -> Vec<HarvestOutcome> {
        let start = Instant::now();
        let mut handles: Vec<(String, String, JoinHandle<Result<IngestReport>>)> = Vec::new();

        for pipeline in &self.pipelines {
            for room in rooms {
                let pipeline = Arc::clone(pipeline);
                let semaphore = Arc::clone(&self.semaphore);
                let locks = self.locks.clone();
                let progress = Arc::clone(&progress);
                let source = pipeline.source().name.clone();
                let task_room = room.clone();

                let handle = tokio::spawn(async move {
                    let _guard = locks.lock(&task_room, &pipeline.source().sent_file).await;
                    let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                    pipeline.run(&task_room, progress.as_ref()).await
                });
                handles.push((room.clone(), source, handle));
            }
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (room, source, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => std::panic::resume_unwind(e.into_panic()),
            };
            if let Err(e) = &result {
                warn!(%room, %source, error = %e, "ingestion failed");
            }
            outcomes.push(HarvestOutcome {
                room,
                source,
                result,
            });
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            runs = outcomes.len(),
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "harvest complete"
        );
        outcomes
    }
}

//! Single-source ingestion: fetch → extract → window → dedup → batch.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use jobdigest_fetch::Fetcher;
use jobdigest_shared::{HarvestConfig, Posting, Result};
use jobdigest_sources::JobSource;
use jobdigest_storage::KeyValueStore;

use crate::batcher::MessageBatcher;
use crate::dedup::{DedupStore, WriteStatus};
use crate::window::DateWindowFilter;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Extracting,
    Filtering,
    Deduping,
    Batching,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Filtering => "filtering",
            Self::Deduping => "deduping",
            Self::Batching => "batching",
        };
        f.write_str(name)
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a run for `(room, source)` enters a new stage.
    fn stage(&self, room: &str, source: &str, stage: Stage);
    /// Called when a run completes without a fatal error.
    fn done(&self, report: &IngestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _room: &str, _source: &str, _stage: Stage) {}
    fn done(&self, _report: &IngestReport) {}
}

// ---------------------------------------------------------------------------
// Settings & report
// ---------------------------------------------------------------------------

/// The subset of [`HarvestConfig`] a single pipeline needs.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub max_days: u32,
    pub jobs_per_message: usize,
}

impl From<&HarvestConfig> for PipelineSettings {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            max_days: config.max_days,
            jobs_per_message: config.jobs_per_message,
        }
    }
}

/// Result of one pipeline run for one room.
#[derive(Debug)]
pub struct IngestReport {
    pub run_id: Uuid,
    pub room: String,
    pub source: String,
    /// Postings extracted from the document.
    pub extracted: usize,
    /// Postings inside the date window.
    pub kept: usize,
    /// Postings dropped for an unresolvable date.
    pub invalid: usize,
    /// Postings not previously sent to this room, stamped as sent.
    pub fresh: Vec<Posting>,
    /// Rendered messages for `fresh`.
    pub messages: Vec<String>,
    /// Whether `fresh` was durably recorded.
    pub write: WriteStatus,
    pub elapsed: Duration,
}

impl IngestReport {
    pub fn is_durable(&self) -> bool {
        self.write.is_durable()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// One source wired to a fetcher and a sent-record store.
///
/// The same pipeline serves every room; the room is the storage key.
#[derive(Debug)]
pub struct IngestionPipeline<F, S> {
    source: JobSource,
    fetcher: F,
    dedup: DedupStore<S>,
    window: DateWindowFilter,
    batcher: MessageBatcher,
}

impl<F: Fetcher, S: KeyValueStore> IngestionPipeline<F, S> {
    /// Fails with a config error on invalid settings.
    pub fn new(source: JobSource, fetcher: F, store: S, settings: PipelineSettings) -> Result<Self> {
        let window = DateWindowFilter::new(settings.max_days)?;
        let batcher = MessageBatcher::new(settings.jobs_per_message)?;
        let dedup = DedupStore::new(store, source.sent_file.clone());
        Ok(Self {
            source,
            fetcher,
            dedup,
            window,
            batcher,
        })
    }

    pub fn source(&self) -> &JobSource {
        &self.source
    }

    pub fn dedup(&self) -> &DedupStore<S> {
        &self.dedup
    }

    /// Run for `room` against the local calendar day and current time.
    pub async fn run(&self, room: &str, progress: &dyn ProgressReporter) -> Result<IngestReport> {
        self.run_at(room, Local::now().date_naive(), Utc::now(), progress)
            .await
    }

    /// Run for `room` with an explicit `today` (window) and `now` (send stamp).
    ///
    /// Fetch and extraction failures return before storage is touched. A
    /// failed sent-record write does not fail the run; it is reported in
    /// [`IngestReport::write`] and the messages are still rendered.
    #[instrument(skip_all, fields(room = %room, source = %self.source.name))]
    pub async fn run_at(
        &self,
        room: &str,
        today: NaiveDate,
        now: DateTime<Utc>,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestReport> {
        let start = Instant::now();
        let run_id = Uuid::now_v7();
        let source = self.source.name.as_str();

        debug!(%run_id, url = %self.source.url, "starting ingestion");

        // --- Fetch ---
        progress.stage(room, source, Stage::Fetching);
        let document = self.fetcher.fetch(&self.source.url).await?;

        // --- Extract ---
        progress.stage(room, source, Stage::Extracting);
        let postings = self.source.extractor().extract(&document)?;
        let extracted = postings.len();
        debug!(extracted, "extracted postings");

        // --- Filter ---
        progress.stage(room, source, Stage::Filtering);
        let window = self.window.apply_at(postings, today);
        let (kept, invalid) = (window.kept.len(), window.invalid.len());
        debug!(kept, invalid, max_days = self.window.max_days(), "applied date window");

        // --- Dedup ---
        progress.stage(room, source, Stage::Deduping);
        let reconciliation = self.dedup.reconcile_at(room, &window.kept, now)?;

        // --- Batch ---
        progress.stage(room, source, Stage::Batching);
        let extractor = self.source.extractor();
        let messages = self.batcher.batch(
            &reconciliation.fresh,
            &self.source.header(),
            |p| extractor.render(p),
        );

        let report = IngestReport {
            run_id,
            room: room.to_string(),
            source: source.to_string(),
            extracted,
            kept,
            invalid,
            fresh: reconciliation.fresh,
            messages,
            write: reconciliation.write,
            elapsed: start.elapsed(),
        };

        info!(
            %run_id,
            extracted,
            kept,
            invalid,
            fresh = report.fresh.len(),
            messages = report.messages.len(),
            write = %report.write,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "ingestion complete"
        );

        progress.done(&report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;
    use jobdigest_fetch::{FetchOptions, HttpFetcher};
    use jobdigest_shared::{AppConfig, JobDigestError};
    use jobdigest_storage::MemoryStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/markdown/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 6, 9, 0, 0).unwrap()
    }

    fn internships() -> JobSource {
        JobSource::from_config(&AppConfig::default().sources[0])
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            max_days: 7,
            jobs_per_message: 2,
        }
    }

    /// Serves a fixed document, or fails when there is none.
    #[derive(Debug)]
    struct StubFetcher {
        document: Option<String>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn serving(document: impl Into<String>) -> Self {
            Self {
                document: Some(document.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                document: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Fetcher for StubFetcher {
        async fn fetch(&self, locator: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.document
                .clone()
                .ok_or_else(|| JobDigestError::Fetch(format!("{locator}: connection refused")))
        }
    }

    /// Counts every storage access.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        accesses: AtomicUsize,
    }

    impl KeyValueStore for CountingStore {
        fn exists(&self, key: &str, name: &str) -> Result<bool> {
            self.accesses.fetch_add(1, Ordering::SeqCst);
            self.inner.exists(key, name)
        }
        fn read_raw(&self, key: &str, name: &str) -> Result<String> {
            self.accesses.fetch_add(1, Ordering::SeqCst);
            self.inner.read_raw(key, name)
        }
        fn write_raw(&self, key: &str, name: &str, contents: &str) -> Result<()> {
            self.accesses.fetch_add(1, Ordering::SeqCst);
            self.inner.write_raw(key, name, contents)
        }
    }

    /// Records stage transitions.
    #[derive(Default)]
    struct RecordingProgress {
        stages: Mutex<Vec<Stage>>,
        done: AtomicUsize,
    }

    impl ProgressReporter for RecordingProgress {
        fn stage(&self, _room: &str, _source: &str, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }
        fn done(&self, _report: &IngestReport) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn full_run_filters_dedups_and_batches() {
        let store = MemoryStore::new();
        let fetcher = StubFetcher::serving(load_fixture("internships.md"));
        let pipeline = IngestionPipeline::new(internships(), fetcher, &store, settings()).unwrap();
        let progress = RecordingProgress::default();

        let report = pipeline
            .run_at("general", today(), now(), &progress)
            .await
            .unwrap();

        assert_eq!(report.extracted, 6);
        assert_eq!(report.kept, 5);
        assert_eq!(report.invalid, 0);
        let order: Vec<_> = report.fresh.iter().map(|p| p.company.as_str()).collect();
        assert_eq!(
            order,
            vec!["Figma", "Jane Street", "Citadel", "Stripe", "Stripe"]
        );
        assert!(report.fresh.iter().all(|p| p.date_message_sent == Some(now())));
        assert!(matches!(report.write, WriteStatus::Committed));

        assert_eq!(report.messages.len(), 3);
        let header = pipeline.source().header();
        assert!(report.messages.iter().all(|m| m.starts_with(&header)));
        assert!(report.messages[0].contains("Figma"));

        assert_eq!(
            *progress.stages.lock().unwrap(),
            vec![
                Stage::Fetching,
                Stage::Extracting,
                Stage::Filtering,
                Stage::Deduping,
                Stage::Batching
            ]
        );
        assert_eq!(progress.done.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.dedup().load("general").unwrap().len(), 5);
    }

    #[tokio::test]
    async fn second_run_sends_nothing() {
        let store = MemoryStore::new();
        let fetcher = StubFetcher::serving(load_fixture("internships.md"));
        let pipeline = IngestionPipeline::new(internships(), fetcher, &store, settings()).unwrap();

        pipeline
            .run_at("general", today(), now(), &SilentProgress)
            .await
            .unwrap();
        let again = pipeline
            .run_at("general", today(), now(), &SilentProgress)
            .await
            .unwrap();

        assert!(again.fresh.is_empty());
        assert!(again.messages.is_empty());
        assert!(matches!(again.write, WriteStatus::Unchanged));

        // Another room has its own history.
        let other = pipeline
            .run_at("other", today(), now(), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(other.fresh.len(), 5);
    }

    #[tokio::test]
    async fn fetch_failure_never_touches_storage() {
        let store = CountingStore::default();
        let fetcher = StubFetcher::failing();
        let pipeline = IngestionPipeline::new(internships(), fetcher, &store, settings()).unwrap();
        let progress = RecordingProgress::default();

        let err = pipeline
            .run_at("general", today(), now(), &progress)
            .await
            .unwrap_err();

        assert!(matches!(err, JobDigestError::Fetch(_)));
        assert_eq!(store.accesses.load(Ordering::SeqCst), 0);
        assert_eq!(*progress.stages.lock().unwrap(), vec![Stage::Fetching]);
        assert_eq!(progress.done.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn extraction_failure_never_touches_storage() {
        let store = CountingStore::default();
        let fetcher = StubFetcher::serving("# nothing here\n");
        let pipeline = IngestionPipeline::new(internships(), fetcher, &store, settings()).unwrap();

        let err = pipeline
            .run_at("general", today(), now(), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, JobDigestError::Extraction { .. }));
        assert_eq!(store.accesses.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_dates_are_counted_not_fatal() {
        let doc = "| Company | Role | Location | Link | Date Posted |\n\
                   | --- | --- | --- | --- | --- |\n\
                   | Acme | Intern | Remote | [Apply](https://acme.example.com) | Jan 05 |\n\
                   | Bogus | Intern | Remote | [Apply](https://bogus.example.com) | Feb 30 |\n";
        let store = MemoryStore::new();
        let pipeline =
            IngestionPipeline::new(internships(), StubFetcher::serving(doc), &store, settings())
                .unwrap();

        let report = pipeline
            .run_at("general", today(), now(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.extracted, 2);
        assert_eq!(report.invalid, 1);
        assert_eq!(report.fresh.len(), 1);
        assert_eq!(report.fresh[0].company, "Acme");
    }

    #[tokio::test]
    async fn write_failure_keeps_messages() {
        struct NoWrites(MemoryStore);

        impl KeyValueStore for NoWrites {
            fn exists(&self, key: &str, name: &str) -> Result<bool> {
                self.0.exists(key, name)
            }
            fn read_raw(&self, key: &str, name: &str) -> Result<String> {
                self.0.read_raw(key, name)
            }
            fn write_raw(&self, key: &str, name: &str, _contents: &str) -> Result<()> {
                Err(JobDigestError::persistence(format!("{key}/{name}"), "permission denied"))
            }
        }

        let fetcher = StubFetcher::serving(load_fixture("internships.md"));
        let pipeline =
            IngestionPipeline::new(internships(), fetcher, NoWrites(MemoryStore::new()), settings())
                .unwrap();

        let report = pipeline
            .run_at("general", today(), now(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.fresh.len(), 5);
        assert_eq!(report.messages.len(), 3);
        assert!(!report.is_durable());
    }

    #[test]
    fn invalid_settings_fail_fast() {
        let err = IngestionPipeline::new(
            internships(),
            StubFetcher::failing(),
            MemoryStore::new(),
            PipelineSettings {
                max_days: 7,
                jobs_per_message: 0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, JobDigestError::Config { .. }));

        let err = IngestionPipeline::new(
            internships(),
            StubFetcher::failing(),
            MemoryStore::new(),
            PipelineSettings {
                max_days: 400,
                jobs_per_message: 10,
            },
        )
        .unwrap_err();
        assert!(matches!(err, JobDigestError::Config { .. }));
    }

    #[tokio::test]
    async fn runs_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/README.md"))
            .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("new-grad.md")))
            .expect(1)
            .mount(&server)
            .await;

        let app = AppConfig::default();
        let config = &app.sources[1];
        let source = JobSource::new(
            &config.name,
            &config.job_type,
            format!("{}/README.md", server.uri()),
            &config.sent_file,
            jobdigest_sources::extractor_for(config.kind),
        );
        let fetcher = HttpFetcher::new(&FetchOptions::default()).unwrap();
        let store = MemoryStore::new();
        let pipeline = IngestionPipeline::new(source, fetcher, &store, settings()).unwrap();

        let report = pipeline
            .run_at("general", today(), now(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.source, "new-grad");
        assert_eq!(report.fresh.len(), 3);
        assert_eq!(report.fresh[0].company, "Notion");
        assert!(store.exists("general", "sent_new_grad.json").unwrap());
    }
}

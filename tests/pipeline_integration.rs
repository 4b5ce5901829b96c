//! Integration tests for the trip pipeline.
//!
//! Each test runs the real four-stage pipeline against in-process fakes of the
//! email source and job service, with an in-memory libSQL trip store.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::time::timeout;
use tracing::Level;

use trip_pipeline::backend::{EmailSource, JobService};
use trip_pipeline::error::{JobServiceError, SourceError, StoreError};
use trip_pipeline::model::{Email, JobId, JobStatus, ParsingJob, Trip, TripStepKind};
use trip_pipeline::provider::{Address, AirProduct, ParsedItinerary, Product};
use trip_pipeline::store::{LibSqlTripStore, TripStore};
use trip_pipeline::{PipelineConfig, StatusCheckFailurePolicy, TripPipeline};

/// Maximum time any test is allowed to wait before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

// ── Fakes ───────────────────────────────────────────────────────────

fn email(subject: &str) -> Email {
    Email {
        external_id: format!("<{subject}@example.com>"),
        subject: subject.to_string(),
        size: 42,
        received_at: Utc.with_ymd_and_hms(2020, 4, 20, 9, 30, 0).unwrap(),
        snippet: "Your booking is confirmed".to_string(),
        content: b"Subject: TEST EMAIL\r\n\r\nYour booking is confirmed".to_vec(),
    }
}

/// Email source handing out scripted batches, then empty ones.
struct ScriptedSource {
    batches: Mutex<VecDeque<Vec<Email>>>,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    fn new(batches: Vec<Vec<Email>>) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(batches.into()),
            fetches: AtomicUsize::new(0),
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailSource for ScriptedSource {
    async fn fetch(&self, filter: &str) -> Result<Vec<Email>, SourceError> {
        assert_eq!(filter, "unread");
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// One scripted answer to a status check.
#[derive(Clone)]
enum StatusStep {
    Status(JobStatus),
    Failed(&'static str),
    CallFails,
}

/// Job service that walks every job through the same status script.
struct ScriptedJobs {
    script: Vec<StatusStep>,
    fail_create: bool,
    created: AtomicUsize,
    positions: Mutex<HashMap<JobId, usize>>,
    status_calls: AtomicUsize,
    result_calls: AtomicUsize,
}

impl ScriptedJobs {
    fn build(script: Vec<StatusStep>, fail_create: bool) -> Arc<Self> {
        Arc::new(Self {
            script,
            fail_create,
            created: AtomicUsize::new(0),
            positions: Mutex::new(HashMap::new()),
            status_calls: AtomicUsize::new(0),
            result_calls: AtomicUsize::new(0),
        })
    }

    fn new(script: Vec<StatusStep>) -> Arc<Self> {
        Self::build(script, false)
    }

    fn failing_create() -> Arc<Self> {
        Self::build(Vec::new(), true)
    }

    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn result_calls(&self) -> usize {
        self.result_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobService for ScriptedJobs {
    async fn create_job(&self, email: &Email) -> Result<ParsingJob, JobServiceError> {
        if self.fail_create {
            return Err(JobServiceError::InvalidResponse {
                reason: "quota exceeded".into(),
            });
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(ParsingJob::new(
            format!("job-{n}"),
            email.subject.clone(),
            JobStatus::Pending,
        ))
    }

    async fn job_status(&self, job: &ParsingJob) -> Result<ParsingJob, JobServiceError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        let step = {
            let mut positions = self.positions.lock().unwrap();
            let position = positions.entry(job.id.clone()).or_insert(0);
            let step = self
                .script
                .get(*position)
                .or(self.script.last())
                .cloned()
                .unwrap_or(StatusStep::Status(JobStatus::Pending));
            *position += 1;
            step
        };

        match step {
            StatusStep::Status(status) => Ok(ParsingJob::new(
                job.id.clone(),
                job.subject.clone(),
                status,
            )),
            StatusStep::Failed(detail) => Ok(ParsingJob::failed(
                job.id.clone(),
                job.subject.clone(),
                detail,
            )),
            StatusStep::CallFails => Err(JobServiceError::RequestFailed {
                job_id: job.id.clone(),
                reason: "connection reset".into(),
            }),
        }
    }

    async fn job_result(&self, job: &ParsingJob) -> Result<ParsingJob, JobServiceError> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        let trip = itinerary().into_trip()?;
        Ok(ParsingJob::new(job.id.clone(), job.subject.clone(), JobStatus::Done).with_trip(trip))
    }
}

fn city(name: &str) -> Address {
    Address {
        city_name: Some(name.to_string()),
        ..Default::default()
    }
}

/// One flight, Nice to Paris.
fn itinerary() -> ParsedItinerary {
    ParsedItinerary {
        reference: "JKW499".to_string(),
        start: Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2020, 5, 3, 0, 0, 0).unwrap(),
        products: vec![Product::Air(AirProduct {
            carrier: "Air France".to_string(),
            departure_at: Utc.with_ymd_and_hms(2020, 5, 1, 8, 0, 0).unwrap(),
            departure_address: city("Nice"),
            arrival_at: Utc.with_ymd_and_hms(2020, 5, 1, 9, 30, 0).unwrap(),
            arrival_address: city("Paris"),
        })],
    }
}

/// Trip store wrapper that counts `create` calls.
struct RecordingStore {
    inner: LibSqlTripStore,
    creates: AtomicUsize,
    fail: bool,
}

impl RecordingStore {
    async fn build(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            inner: LibSqlTripStore::new_memory().await.unwrap(),
            creates: AtomicUsize::new(0),
            fail,
        })
    }

    async fn new() -> Arc<Self> {
        Self::build(false).await
    }

    async fn failing() -> Arc<Self> {
        Self::build(true).await
    }

    fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TripStore for RecordingStore {
    async fn create(&self, trip: &Trip) -> Result<(), StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::Query("disk full".into()));
        }
        self.inner.create(trip).await
    }

    async fn list(&self) -> Result<Vec<Trip>, StoreError> {
        self.inner.list().await
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Trip>, StoreError> {
        self.inner.find_by_reference(reference).await
    }
}

// ── Log capture ─────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Capture log lines at `level` and above for the current thread.
fn capture_logs(level: Level) -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

// ── Helpers ─────────────────────────────────────────────────────────

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        fetch_interval: Duration::from_millis(20),
        job_interval: Duration::from_millis(2),
        ..Default::default()
    }
}

/// Poll `condition` until it holds or TEST_TIMEOUT elapses.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(TEST_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Let the pipeline run idle for a while.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(60)).await;
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn pending_twice_then_done_stores_one_trip() {
    let source = ScriptedSource::new(vec![vec![email("TEST EMAIL")]]);
    let jobs = ScriptedJobs::new(vec![
        StatusStep::Status(JobStatus::Pending),
        StatusStep::Status(JobStatus::Pending),
        StatusStep::Status(JobStatus::Done),
    ]);
    let store = RecordingStore::new().await;

    let handle = TripPipeline::new(fast_config(), source.clone(), jobs.clone(), store.clone()).start();

    wait_until(|| store.creates() == 1).await;
    settle().await;
    handle.shutdown().await;

    assert_eq!(jobs.created(), 1);
    assert_eq!(jobs.status_calls(), 3, "no poll after the terminal state");
    assert_eq!(jobs.result_calls(), 1);
    assert_eq!(store.creates(), 1);

    let trip = store.find_by_reference("JKW499").await.unwrap().unwrap();
    assert_eq!(trip.reference, "JKW499");
    let kinds: Vec<_> = trip.steps.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![TripStepKind::FlightStart, TripStepKind::FlightEnd]);
    assert_eq!(trip.steps[0].description, "Flight start with Air France");
    assert_eq!(trip.steps[1].location, "Paris");
}

#[tokio::test]
async fn error_status_is_logged_once_and_not_stored() {
    let (logs, _guard) = capture_logs(Level::WARN);

    let source = ScriptedSource::new(vec![vec![email("TEST EMAIL")]]);
    let jobs = ScriptedJobs::new(vec![StatusStep::Failed("malformed content")]);
    let store = RecordingStore::new().await;

    let handle = TripPipeline::new(fast_config(), source.clone(), jobs.clone(), store.clone()).start();

    wait_until(|| jobs.status_calls() == 1).await;
    settle().await;
    handle.shutdown().await;

    assert_eq!(jobs.status_calls(), 1);
    assert_eq!(jobs.result_calls(), 0);
    assert_eq!(store.creates(), 0);

    let lines = logs.lines();
    assert_eq!(lines.len(), 1, "expected one log entry, got {lines:?}");
    assert!(lines[0].contains("malformed content"));
    assert!(lines[0].contains("job-0"));
}

#[tokio::test]
async fn empty_batches_cause_no_downstream_activity() {
    let source = ScriptedSource::new(Vec::new());
    let jobs = ScriptedJobs::new(vec![StatusStep::Status(JobStatus::Done)]);
    let store = RecordingStore::new().await;

    let handle = TripPipeline::new(fast_config(), source.clone(), jobs.clone(), store.clone()).start();

    wait_until(|| source.fetches() >= 3).await;
    handle.shutdown().await;

    assert_eq!(jobs.created(), 0);
    assert_eq!(jobs.status_calls(), 0);
    assert_eq!(jobs.result_calls(), 0);
    assert_eq!(store.creates(), 0);
}

#[tokio::test]
async fn same_email_twice_gives_two_trips() {
    let source = ScriptedSource::new(vec![vec![email("TEST EMAIL"), email("TEST EMAIL")]]);
    let jobs = ScriptedJobs::new(vec![StatusStep::Status(JobStatus::Done)]);
    let store = RecordingStore::new().await;

    let handle = TripPipeline::new(fast_config(), source.clone(), jobs.clone(), store.clone()).start();

    wait_until(|| store.creates() == 2).await;
    handle.shutdown().await;

    let trips = store.list().await.unwrap();
    assert_eq!(trips.len(), 2);
    assert_eq!(trips[0].reference, trips[1].reference);
    assert_ne!(trips[0].id, trips[1].id);
}

#[tokio::test]
async fn failed_job_creation_drops_email_with_one_error() {
    let (logs, _guard) = capture_logs(Level::ERROR);

    let source = ScriptedSource::new(vec![vec![email("TEST EMAIL")]]);
    let jobs = ScriptedJobs::failing_create();
    let store = RecordingStore::new().await;

    let handle = TripPipeline::new(fast_config(), source.clone(), jobs.clone(), store.clone()).start();

    wait_until(|| source.fetches() >= 2).await;
    settle().await;
    handle.shutdown().await;

    assert_eq!(jobs.status_calls(), 0);
    assert_eq!(store.creates(), 0);

    let lines = logs.lines();
    assert_eq!(lines.len(), 1, "expected one error, got {lines:?}");
    assert!(lines[0].contains("TEST EMAIL"));
}

#[tokio::test]
async fn store_failure_is_not_retried() {
    let source = ScriptedSource::new(vec![vec![email("TEST EMAIL")]]);
    let jobs = ScriptedJobs::new(vec![StatusStep::Status(JobStatus::Done)]);
    let store = RecordingStore::failing().await;

    let handle = TripPipeline::new(fast_config(), source.clone(), jobs.clone(), store.clone()).start();

    wait_until(|| store.creates() == 1).await;
    settle().await;
    handle.shutdown().await;

    assert_eq!(store.creates(), 1);
    assert_eq!(jobs.result_calls(), 1);
    assert_eq!(jobs.status_calls(), 1);
}

#[tokio::test]
async fn status_check_failure_is_retried_by_default() {
    let source = ScriptedSource::new(vec![vec![email("TEST EMAIL")]]);
    // Three retries: the fourth call is the one that succeeds
    let jobs = ScriptedJobs::new(vec![
        StatusStep::CallFails,
        StatusStep::CallFails,
        StatusStep::CallFails,
        StatusStep::Status(JobStatus::Done),
    ]);
    let store = RecordingStore::new().await;

    let config = PipelineConfig::from_lookup(|key| match key {
        "TRIP_PIPELINE_FETCH_INTERVAL_SECS" => Some("3600".into()),
        _ => None,
    })
    .unwrap();
    assert_eq!(
        config.status_failure_policy,
        StatusCheckFailurePolicy::Retry { max_retries: 3 }
    );
    let config = PipelineConfig {
        job_interval: Duration::from_millis(2),
        ..config
    };

    let handle = TripPipeline::new(config, source.clone(), jobs.clone(), store.clone()).start();

    wait_until(|| store.creates() == 1).await;
    handle.shutdown().await;

    assert_eq!(jobs.status_calls(), 4);
}

#[tokio::test]
async fn status_check_failure_drops_job_when_retries_disabled() {
    let source = ScriptedSource::new(vec![vec![email("TEST EMAIL")]]);
    let jobs = ScriptedJobs::new(vec![
        StatusStep::CallFails,
        StatusStep::Status(JobStatus::Done),
    ]);
    let store = RecordingStore::new().await;

    let config = PipelineConfig {
        status_failure_policy: StatusCheckFailurePolicy::Drop,
        ..fast_config()
    };
    let handle = TripPipeline::new(config, source.clone(), jobs.clone(), store.clone()).start();

    wait_until(|| jobs.status_calls() == 1).await;
    settle().await;
    handle.shutdown().await;

    assert_eq!(jobs.status_calls(), 1);
    assert_eq!(store.creates(), 0);
}

#[tokio::test]
async fn shutdown_stops_every_stage_under_backpressure() {
    // Many emails, a single-slot queue and jobs that never finish: every
    // stage ends up blocked somewhere when shutdown arrives.
    let batch: Vec<_> = (0..50).map(|i| email(&format!("EMAIL {i}"))).collect();
    let source = ScriptedSource::new(vec![batch]);
    let jobs = ScriptedJobs::new(vec![StatusStep::Status(JobStatus::Pending)]);
    let store = RecordingStore::new().await;

    let config = PipelineConfig {
        queue_capacity: 1,
        max_outstanding_rechecks: 2,
        ..fast_config()
    };
    let handle = TripPipeline::new(config, source.clone(), jobs.clone(), store.clone()).start();

    wait_until(|| jobs.status_calls() >= 5).await;

    timeout(TEST_TIMEOUT, handle.shutdown())
        .await
        .expect("pipeline did not shut down");

    let fetches = source.fetches();
    let created = jobs.created();
    let status_calls = jobs.status_calls();
    settle().await;

    assert_eq!(source.fetches(), fetches);
    assert_eq!(jobs.created(), created);
    assert_eq!(jobs.status_calls(), status_calls);
    assert!(created < 50, "backpressure should have held most emails back");
    assert_eq!(store.creates(), 0);
}

//! Engine lifecycle tests: validation, execution, timeouts, and the
//! consistency guarantees around the success and failure paths.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use transmute_convert::{ConvertError, ConvertRequest, Converter, ConverterRegistry};
use transmute_core::models::{ConversionParams, FileKind, FileRecord, JobErrorKind, JobStatus};
use transmute_core::{AppError, Format};
use transmute_db::{connect_memory, FileRepository, JobRepository, SettingsRepository};
use transmute_engine::{ConversionEngine, EngineConfig};
use transmute_storage::{LocalStorage, Storage};

/// Mock converter over text-ish formats; uppercases the payload.
struct UppercaseConverter;

#[async_trait]
impl Converter for UppercaseConverter {
    fn name(&self) -> &'static str {
        "uppercase"
    }

    fn inputs(&self) -> BTreeSet<Format> {
        ["txt", "md"].iter().map(|s| s.parse().unwrap()).collect()
    }

    fn compatible_outputs(&self, input: &Format) -> BTreeSet<Format> {
        let mut outputs: BTreeSet<Format> =
            ["txt", "md"].iter().map(|s| s.parse().unwrap()).collect();
        outputs.remove(input);
        outputs
    }

    async fn convert(
        &self,
        data: &[u8],
        _request: &ConvertRequest,
    ) -> Result<Vec<u8>, ConvertError> {
        Ok(data.to_ascii_uppercase())
    }
}

/// Mock converter that always fails.
struct BrokenConverter;

#[async_trait]
impl Converter for BrokenConverter {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn inputs(&self) -> BTreeSet<Format> {
        ["bin"].iter().map(|s| s.parse().unwrap()).collect()
    }

    fn compatible_outputs(&self, _input: &Format) -> BTreeSet<Format> {
        ["hex"].iter().map(|s| s.parse().unwrap()).collect()
    }

    async fn convert(
        &self,
        _data: &[u8],
        _request: &ConvertRequest,
    ) -> Result<Vec<u8>, ConvertError> {
        Err(ConvertError::Failed("deliberately broken".to_string()))
    }
}

/// Mock converter that never finishes within the test timeout.
struct StallingConverter;

#[async_trait]
impl Converter for StallingConverter {
    fn name(&self) -> &'static str {
        "stalling"
    }

    fn inputs(&self) -> BTreeSet<Format> {
        ["slow"].iter().map(|s| s.parse().unwrap()).collect()
    }

    fn compatible_outputs(&self, _input: &Format) -> BTreeSet<Format> {
        ["fast"].iter().map(|s| s.parse().unwrap()).collect()
    }

    async fn convert(
        &self,
        data: &[u8],
        _request: &ConvertRequest,
    ) -> Result<Vec<u8>, ConvertError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(data.to_vec())
    }
}

struct TestHarness {
    engine: ConversionEngine,
    files: FileRepository,
    jobs: JobRepository,
    settings: SettingsRepository,
    storage: Arc<dyn Storage>,
    _dir: tempfile::TempDir,
}

async fn harness() -> TestHarness {
    let pool = connect_memory().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()).await.unwrap());

    let files = FileRepository::new(pool.clone());
    let jobs = JobRepository::new(pool.clone());
    let settings = SettingsRepository::new(pool);
    settings.seed_defaults().await.unwrap();

    let mut registry = ConverterRegistry::new();
    registry.register(Arc::new(UppercaseConverter));
    registry.register(Arc::new(BrokenConverter));
    registry.register(Arc::new(StallingConverter));

    let config = EngineConfig {
        max_workers: 4,
        poll_interval_ms: 50,
        job_timeout_secs: 1,
    };

    let engine = ConversionEngine::new(
        files.clone(),
        jobs.clone(),
        settings.clone(),
        storage.clone(),
        Arc::new(registry),
        config,
    );

    TestHarness {
        engine,
        files,
        jobs,
        settings,
        storage,
        _dir: dir,
    }
}

async fn seed_file(h: &TestHarness, media_type: &str, data: &[u8]) -> FileRecord {
    let id = Uuid::new_v4();
    let key = format!("uploads/{}.{}", id, media_type);
    if !data.is_empty() {
        h.storage.put(&key, data.to_vec()).await.unwrap();
    }
    let record = FileRecord {
        id,
        kind: FileKind::Upload,
        storage_key: key,
        original_filename: format!("fixture.{}", media_type),
        media_type: media_type.to_string(),
        extension: format!(".{}", media_type),
        size_bytes: data.len() as i64,
        checksum: hex::encode(Sha256::digest(data)),
        created_at: Utc::now(),
    };
    h.files.create(&record).await.unwrap();
    record
}

fn fmt(s: &str) -> Format {
    s.parse().unwrap()
}

const WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn submit_unknown_source_is_not_found() {
    let h = harness().await;
    let result = h
        .engine
        .submit(Uuid::new_v4(), None, fmt("md"), ConversionParams::default())
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn submit_empty_source_is_rejected_before_any_job_row() {
    let h = harness().await;
    let source = seed_file(&h, "txt", b"").await;

    let result = h
        .engine
        .submit(source.id, None, fmt("md"), ConversionParams::default())
        .await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
    assert!(h.jobs.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn submit_mismatched_input_format_is_rejected() {
    let h = harness().await;
    let source = seed_file(&h, "txt", b"hello").await;

    let result = h
        .engine
        .submit(
            source.id,
            Some(fmt("png")),
            fmt("md"),
            ConversionParams::default(),
        )
        .await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
    assert!(h.jobs.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn submit_unsupported_pair_creates_no_job_row() {
    let h = harness().await;
    let source = seed_file(&h, "txt", b"hello").await;

    let result = h
        .engine
        .submit(source.id, None, fmt("mp3"), ConversionParams::default())
        .await;
    assert!(matches!(result, Err(AppError::UnsupportedFormat { .. })));
    assert!(h.jobs.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn successful_conversion_reaches_complete_with_output() {
    let h = harness().await;
    let source = seed_file(&h, "txt", b"hello world").await;

    let job_id = h
        .engine
        .submit(source.id, Some(fmt("txt")), fmt("md"), ConversionParams::default())
        .await
        .unwrap();

    let job = h.engine.wait_for_terminal(job_id, WAIT).await.unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.progress, 100);
    assert!(job.started_at.is_some());
    assert!(job.finished_at.is_some());
    assert!(job.error.is_none());

    let output_id = job.output_file_id.unwrap();
    assert_ne!(output_id, source.id);

    let output = h.files.get(output_id).await.unwrap().unwrap();
    assert_eq!(output.kind, FileKind::Conversion);
    assert_eq!(output.media_type, "md");
    assert_eq!(output.extension, ".md");

    let bytes = h.storage.get(&output.storage_key).await.unwrap();
    assert_eq!(bytes, b"HELLO WORLD");
    assert_eq!(output.size_bytes, bytes.len() as i64);
    assert_eq!(output.checksum, hex::encode(Sha256::digest(&bytes)));

    // Source untouched (keep_originals defaults to true)
    assert!(h.files.get(source.id).await.unwrap().is_some());
    assert!(h.storage.get(&source.storage_key).await.is_ok());
}

#[tokio::test]
async fn passthrough_same_format_produces_distinct_record() {
    let h = harness().await;
    let source = seed_file(&h, "txt", b"identity").await;

    let job_id = h
        .engine
        .submit(source.id, None, fmt("txt"), ConversionParams::default())
        .await
        .unwrap();

    let job = h.engine.wait_for_terminal(job_id, WAIT).await.unwrap();
    assert_eq!(job.status, JobStatus::Complete);

    let output = h
        .files
        .get(job.output_file_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_ne!(output.id, source.id);
    assert_ne!(output.storage_key, source.storage_key);
    assert_eq!(h.storage.get(&output.storage_key).await.unwrap(), b"identity");
    assert_eq!(output.checksum, source.checksum);
}

#[tokio::test]
async fn failing_converter_leaves_no_partial_output() {
    let h = harness().await;
    let source = seed_file(&h, "bin", b"\x00\x01\x02").await;

    let job_id = h
        .engine
        .submit(source.id, None, fmt("hex"), ConversionParams::default())
        .await
        .unwrap();

    let job = h.engine.wait_for_terminal(job_id, WAIT).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.output_file_id.is_none());

    let error = job.error.unwrap();
    assert_eq!(error.kind, JobErrorKind::ConverterCrashed);
    assert!(error.message.contains("deliberately broken"));

    // No output row and no orphaned payload
    assert!(h
        .files
        .list(Some(FileKind::Conversion))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn slow_converter_times_out_and_fails() {
    let h = harness().await;
    let source = seed_file(&h, "slow", b"zzz").await;

    let job_id = h
        .engine
        .submit(source.id, None, fmt("fast"), ConversionParams::default())
        .await
        .unwrap();

    let job = h.engine.wait_for_terminal(job_id, WAIT).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.unwrap().kind, JobErrorKind::Timeout);
    assert!(job.output_file_id.is_none());
}

#[tokio::test]
async fn keep_originals_false_deletes_source_after_success() {
    let h = harness().await;
    h.settings
        .update(transmute_core::models::SettingsUpdate {
            keep_originals: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();

    let source = seed_file(&h, "txt", b"ephemeral").await;
    let job_id = h
        .engine
        .submit(source.id, None, fmt("md"), ConversionParams::default())
        .await
        .unwrap();

    let job = h.engine.wait_for_terminal(job_id, WAIT).await.unwrap();
    assert_eq!(job.status, JobStatus::Complete);

    assert!(h.files.get(source.id).await.unwrap().is_none());
    assert!(!h.storage.exists(&source.storage_key).await.unwrap());

    // The output survives and the job snapshot still names the source
    assert!(h.files.get(job.output_file_id.unwrap()).await.unwrap().is_some());
    assert_eq!(job.source_filename, "fixture.txt");
}

#[tokio::test]
async fn concurrent_jobs_complete_independently() {
    let h = harness().await;

    let mut submissions = Vec::new();
    for i in 0..4 {
        let payload = format!("payload number {}", i);
        let source = seed_file(&h, "txt", payload.as_bytes()).await;
        let job_id = h
            .engine
            .submit(source.id, None, fmt("md"), ConversionParams::default())
            .await
            .unwrap();
        submissions.push((job_id, payload));
    }

    for (job_id, payload) in submissions {
        let job = h.engine.wait_for_terminal(job_id, WAIT).await.unwrap();
        assert_eq!(job.status, JobStatus::Complete);

        let output = h
            .files
            .get(job.output_file_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        let bytes = h.storage.get(&output.storage_key).await.unwrap();
        // Each job's output derives from its own source, nothing else
        assert_eq!(bytes, payload.to_ascii_uppercase().as_bytes());
    }
}

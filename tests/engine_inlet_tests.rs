use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use streamprobe::buffers::ChunkRing;
use streamprobe::engine::{InletWorker, WorkerStatus};
use streamprobe::error::{InletError, PullError};
use streamprobe::resilience::RetryStrategy;
use streamprobe::source::mock::{ScriptStep, ScriptedResolver};
use streamprobe::source::{Pulled, Selector, SourceRegistry, StreamInfo, StreamInlet, StreamResolver};
use tokio_test::assert_err;

fn registry_with(resolver: ScriptedResolver) -> (SourceRegistry, Arc<AtomicBool>) {
    let closed = resolver.closed_flag();
    let mut registry = SourceRegistry::new();
    registry.register(resolver);
    (registry, closed)
}

fn scripted(script: Vec<ScriptStep>) -> ScriptedResolver {
    let info = ScriptedResolver::stream("scripted", "TestStream", "EEG", 100.0);
    ScriptedResolver::new(info, script)
}

fn worker(ring: &ChunkRing) -> InletWorker {
    InletWorker::new(Selector::new("type", "EEG"), 4, ring.clone())
        .with_pull_timeout(Duration::from_millis(20))
        .with_resolve_timeout(Duration::from_millis(500))
        .with_retry(RetryStrategy::Immediate)
}

async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[tokio::test]
async fn test_worker_pushes_chunks_in_order() -> Result<()> {
    let (registry, closed) = registry_with(scripted(vec![
        ScriptStep::Chunk(vec![0.00, 0.01]),
        ScriptStep::Chunk(vec![0.02, 0.03]),
        ScriptStep::Chunk(vec![0.04]),
    ]));
    let ring = ChunkRing::new(16);
    let mut worker = worker(&ring);
    assert_eq!(worker.status(), WorkerStatus::Idle);

    let info = worker.start(&registry).await?;
    assert_eq!(info.name, "TestStream");
    assert_eq!(worker.status(), WorkerStatus::Running);
    assert_eq!(worker.stream().map(|s| s.name.as_str()), Some("TestStream"));

    assert!(wait_for(|| ring.len() == 3).await);
    let chunks = ring.drain_upto(10);
    let sequences: Vec<u64> = chunks.iter().map(|c| c.sequence()).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
    assert_eq!(chunks[1].timestamps(), &[0.02, 0.03]);
    assert!(chunks.windows(2).all(|w| w[0].received_at() <= w[1].received_at()));

    let exit = worker.shutdown(Duration::from_secs(1));
    assert!(matches!(exit, Some(Ok(()))));
    assert_eq!(worker.status(), WorkerStatus::Stopped);
    assert!(closed.load(Ordering::SeqCst));

    let stats = worker.stats().snapshot();
    assert_eq!(stats.chunks_pushed, 3);
    assert_eq!(stats.samples_pushed, 5);
    Ok(())
}

#[tokio::test]
async fn test_unmatched_selector_is_stream_not_found() {
    let (registry, _) = registry_with(scripted(vec![]));
    let ring = ChunkRing::new(4);
    let mut worker = InletWorker::new(Selector::new("type", "Markers"), 4, ring)
        .with_resolve_timeout(Duration::from_millis(200));

    let started = Instant::now();
    let err = worker.start(&registry).await.unwrap_err();

    assert!(matches!(err, InletError::StreamNotFound { ref value, .. } if value == "Markers"));
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(worker.status(), WorkerStatus::Failed);
    assert!(worker.poll_exit().is_none());
}

#[tokio::test]
async fn test_resolution_waits_for_late_stream() -> Result<()> {
    let resolver = scripted(vec![]).visible_after(Duration::from_millis(250));
    let (registry, _) = registry_with(resolver);
    let ring = ChunkRing::new(4);
    let mut worker = worker(&ring).with_resolve_timeout(Duration::from_secs(3));

    let info = worker.start(&registry).await?;
    assert_eq!(info.stream_type, "EEG");
    worker.shutdown(Duration::from_secs(1));
    Ok(())
}

#[tokio::test]
async fn test_second_start_is_rejected() -> Result<()> {
    let (registry, _) = registry_with(scripted(vec![]));
    let ring = ChunkRing::new(4);
    let mut worker = worker(&ring);

    worker.start(&registry).await?;
    let err = assert_err!(worker.start(&registry).await);
    assert!(matches!(err, InletError::AlreadyStarted));

    worker.shutdown(Duration::from_secs(1));
    Ok(())
}

#[tokio::test]
async fn test_open_failure_is_reported() {
    let (registry, _) = registry_with(scripted(vec![]).failing_open("device busy"));
    let ring = ChunkRing::new(4);
    let mut worker = worker(&ring);

    let err = worker.start(&registry).await.unwrap_err();
    match err {
        InletError::Open { stream, reason } => {
            assert_eq!(stream, "TestStream");
            assert!(reason.contains("device busy"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(worker.status(), WorkerStatus::Failed);
}

#[tokio::test]
async fn test_transient_errors_are_logged_and_retried() -> Result<()> {
    let (registry, _) = registry_with(scripted(vec![
        ScriptStep::Transient("buffer underrun".to_string()),
        ScriptStep::Transient("buffer underrun".to_string()),
        ScriptStep::Chunk(vec![1.0, 1.01]),
    ]));
    let ring = ChunkRing::new(4);
    let mut worker = worker(&ring);
    worker.start(&registry).await?;

    assert!(wait_for(|| ring.len() == 1).await);
    assert_eq!(worker.stats().snapshot().transient_errors, 2);
    assert!(worker.poll_exit().is_none());
    assert_eq!(worker.status(), WorkerStatus::Running);

    assert!(matches!(worker.shutdown(Duration::from_secs(1)), Some(Ok(()))));
    Ok(())
}

#[tokio::test]
async fn test_empty_pulls_are_not_errors() -> Result<()> {
    let (registry, _) = registry_with(scripted(vec![
        ScriptStep::Empty,
        ScriptStep::Empty,
        ScriptStep::Chunk(vec![2.0]),
    ]));
    let ring = ChunkRing::new(4);
    let mut worker = worker(&ring);
    worker.start(&registry).await?;

    assert!(wait_for(|| ring.len() == 1).await);
    let snapshot = worker.stats().snapshot();
    assert!(snapshot.empty_pulls >= 2);
    assert_eq!(snapshot.transient_errors, 0);
    assert!(worker.poll_exit().is_none());

    worker.shutdown(Duration::from_secs(1));
    Ok(())
}

#[tokio::test]
async fn test_disconnect_surfaces_exactly_once() -> Result<()> {
    let (registry, closed) = registry_with(scripted(vec![
        ScriptStep::Chunk(vec![0.0, 0.01]),
        ScriptStep::Disconnect("outlet vanished".to_string()),
        ScriptStep::Chunk(vec![0.02]),
    ]));
    let ring = ChunkRing::new(4);
    let mut worker = worker(&ring);
    worker.start(&registry).await?;

    let deadline = Instant::now() + Duration::from_secs(3);
    let exit = loop {
        if let Some(exit) = worker.poll_exit() {
            break exit;
        }
        assert!(Instant::now() < deadline, "worker never exited");
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    match exit {
        Err(InletError::StreamDisconnected { stream, reason }) => {
            assert_eq!(stream, "TestStream");
            assert_eq!(reason, "outlet vanished");
        }
        other => panic!("unexpected exit: {:?}", other),
    }
    assert!(worker.poll_exit().is_none());
    assert!(worker.shutdown(Duration::from_millis(100)).is_none());
    assert_eq!(worker.status(), WorkerStatus::Failed);
    assert!(closed.load(Ordering::SeqCst));

    // Only the chunk before the disconnect made it
    assert_eq!(ring.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_stop_does_not_wait_for_in_flight_pull() -> Result<()> {
    let (registry, _) = registry_with(scripted(vec![ScriptStep::Slow {
        delay: Duration::from_millis(300),
        timestamps: vec![5.0, 5.01],
    }]));
    let ring = ChunkRing::new(4);
    let mut worker = worker(&ring);
    worker.start(&registry).await?;

    let stats = worker.stats();
    assert!(wait_for(|| stats.snapshot().pull_attempts >= 1).await);

    let before = Instant::now();
    worker.stop();
    assert!(before.elapsed() < Duration::from_millis(50));
    assert!(worker.is_stop_requested());

    let exit = worker.shutdown(Duration::from_secs(2));
    assert!(matches!(exit, Some(Ok(()))));

    // The in-flight pull still completed and pushed once
    assert_eq!(ring.len(), 1);
    assert_eq!(stats.chunks_pushed(), 1);
    Ok(())
}

#[tokio::test]
async fn test_idle_worker_stops_within_one_pull_timeout() -> Result<()> {
    let (registry, _) = registry_with(scripted(vec![]));
    let ring = ChunkRing::new(4);
    let mut worker = worker(&ring).with_pull_timeout(Duration::from_millis(50));
    worker.start(&registry).await?;
    tokio::time::sleep(Duration::from_millis(60)).await;

    let before = Instant::now();
    let exit = worker.shutdown(Duration::from_secs(2));
    assert!(matches!(exit, Some(Ok(()))));
    assert!(before.elapsed() < Duration::from_millis(500));
    assert!(ring.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_worker_overflow_drops_oldest() -> Result<()> {
    let script = (0..5).map(|i| ScriptStep::Chunk(vec![i as f64])).collect();
    let (registry, _) = registry_with(scripted(script));
    let ring = ChunkRing::new(2);
    let mut worker = worker(&ring);
    worker.start(&registry).await?;

    let stats = worker.stats();
    assert!(wait_for(|| stats.chunks_pushed() == 5).await);
    worker.shutdown(Duration::from_secs(1));

    assert_eq!(ring.drops(), 3);
    let sequences: Vec<u64> = ring.drain_upto(10).iter().map(|c| c.sequence()).collect();
    assert_eq!(sequences, vec![3, 4]);
    Ok(())
}

#[tokio::test]
async fn test_non_finite_pull_is_discarded() -> Result<()> {
    let (registry, _) = registry_with(scripted(vec![
        ScriptStep::Chunk(vec![0.0, f64::NAN]),
        ScriptStep::Chunk(vec![0.02, 0.03]),
    ]));
    let ring = ChunkRing::new(4);
    let mut worker = worker(&ring);
    worker.start(&registry).await?;

    assert!(wait_for(|| ring.len() == 1).await);
    let chunks = ring.drain_upto(4);
    assert_eq!(chunks[0].timestamps(), &[0.02, 0.03]);
    assert_eq!(chunks[0].sequence(), 0);
    assert!(worker.stats().snapshot().empty_pulls >= 1);
    assert!(worker.poll_exit().is_none());

    worker.shutdown(Duration::from_secs(1));
    Ok(())
}

/// Resolver whose inlet panics on the first pull.
struct PanickingResolver {
    info: StreamInfo,
}

struct PanickingInlet;

impl StreamInlet for PanickingInlet {
    fn pull_chunk(&mut self, _max_samples: usize, _timeout: Duration) -> Result<Option<Pulled>, PullError> {
        panic!("inlet driver crashed");
    }
}

#[async_trait]
impl StreamResolver for PanickingResolver {
    fn resolver_id(&self) -> &str {
        "panicking"
    }

    async fn discover(&self) -> Result<Vec<StreamInfo>> {
        Ok(vec![self.info.clone()])
    }

    fn open(&self, _info: &StreamInfo) -> Result<Box<dyn StreamInlet>> {
        Ok(Box::new(PanickingInlet))
    }
}

#[tokio::test]
async fn test_panicked_worker_reports_failed_status() -> Result<()> {
    let mut registry = SourceRegistry::new();
    registry.register(PanickingResolver {
        info: ScriptedResolver::stream("panicking", "Crashy", "EEG", 100.0),
    });
    let ring = ChunkRing::new(4);
    let mut worker = worker(&ring);
    worker.start(&registry).await?;

    let deadline = Instant::now() + Duration::from_secs(3);
    let exit = loop {
        if let Some(exit) = worker.poll_exit() {
            break exit;
        }
        assert!(Instant::now() < deadline, "worker never exited");
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    assert!(matches!(exit, Err(InletError::WorkerLost)));
    assert_eq!(worker.status(), WorkerStatus::Failed);
    assert!(worker.poll_exit().is_none());
    assert!(ring.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_panicked_worker_fails_on_shutdown() -> Result<()> {
    let mut registry = SourceRegistry::new();
    registry.register(PanickingResolver {
        info: ScriptedResolver::stream("panicking", "Crashy", "EEG", 100.0),
    });
    let ring = ChunkRing::new(4);
    let mut worker = worker(&ring);
    worker.start(&registry).await?;

    let exit = worker.shutdown(Duration::from_secs(2));
    assert!(matches!(exit, Some(Err(InletError::WorkerLost))));
    assert_eq!(worker.status(), WorkerStatus::Failed);
    Ok(())
}

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::MissedTickBehavior;

use crate::buffers::ChunkRing;
use crate::clock::local_clock;
use crate::config::MeasureSettings;
use crate::core::Chunk;
use crate::engine::InletWorker;
use crate::metrics::{compute_metrics, Summary};
use crate::observability::{InletStatsSnapshot, ResourceMonitor, ResourceUsage};
use crate::source::{SourceRegistry, StreamInfo};

/// How long the run waits for the pull thread after stopping it.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct MeasureOutcome {
    pub stream: StreamInfo,
    pub chunks: Vec<Chunk>,
    pub summary: Summary,
    pub resources: Option<ResourceUsage>,
    pub inlet: InletStatsSnapshot,
    /// True when `cancel` fired before the configured duration
    pub interrupted: bool,
}

/// Run for the configured duration.
pub async fn run_measurement(
    settings: &MeasureSettings,
    registry: &SourceRegistry,
    monitor: Option<&mut ResourceMonitor>,
) -> Result<MeasureOutcome> {
    run_measurement_until(settings, registry, monitor, std::future::pending::<()>()).await
}

/// Run until the configured duration elapses, the worker dies, or `cancel`
/// completes, whichever comes first.
///
/// The ring is drained every `drain_interval_ms` in batches of
/// `drain_batch`; after the worker is stopped whatever is left is drained
/// in full before metrics are computed.
pub async fn run_measurement_until<F>(
    settings: &MeasureSettings,
    registry: &SourceRegistry,
    mut monitor: Option<&mut ResourceMonitor>,
    cancel: F,
) -> Result<MeasureOutcome>
where
    F: Future<Output = ()>,
{
    let ring = ChunkRing::new(settings.ring_capacity);
    let mut worker = InletWorker::new(settings.selector(), settings.chunk_size, ring.clone())
        .with_pull_timeout(settings.pull_timeout())
        .with_resolve_timeout(settings.resolve_timeout())
        .with_retry(settings.retry.clone());

    let stream = worker.start(registry).await?;
    let stats = worker.stats();

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut fatal = None;
    let mut interrupted = false;

    let mut ticker = tokio::time::interval(settings.drain_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = tokio::time::sleep(settings.duration());
    tokio::pin!(deadline);
    tokio::pin!(cancel);

    tracing::info!(
        stream = %stream.name,
        duration_s = settings.duration_seconds,
        "measurement started"
    );

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = &mut cancel => {
                tracing::info!("measurement interrupted, finishing early");
                interrupted = true;
                break;
            }
            _ = ticker.tick() => {
                chunks.extend(ring.drain_upto(settings.drain_batch));
                if let Some(monitor) = monitor.as_deref_mut() {
                    monitor.maybe_sample(local_clock());
                }
                if let Some(exit) = worker.poll_exit() {
                    if let Err(e) = exit {
                        fatal = Some(e);
                    }
                    break;
                }
            }
        }
    }

    let exit = tokio::task::spawn_blocking(move || worker.shutdown(JOIN_TIMEOUT))
        .await
        .context("Inlet shutdown task failed")?;
    if let Some(Err(e)) = exit {
        fatal.get_or_insert(e);
    }
    if let Some(e) = fatal {
        return Err(e).context("Measurement aborted");
    }

    chunks.extend(ring.drain_upto(usize::MAX));
    if let Some(monitor) = monitor.as_deref_mut() {
        monitor.finalize(local_clock());
    }

    let summary = compute_metrics(&chunks, settings.nominal_sample_rate, ring.drops())?;
    tracing::info!(
        chunks = chunks.len(),
        samples = summary.total_sample_count,
        ring_drops = summary.ring_drops,
        "measurement finished"
    );

    Ok(MeasureOutcome {
        stream,
        chunks,
        summary,
        resources: monitor.and_then(|m| m.snapshot()),
        inlet: stats.snapshot(),
        interrupted,
    })
}

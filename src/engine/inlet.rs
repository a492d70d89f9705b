use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};

use crate::buffers::ChunkRing;
use crate::core::Chunk;
use crate::engine::state::{self, WorkerStatus};
use crate::error::{InletError, PullError};
use crate::observability::InletStats;
use crate::resilience::RetryStrategy;
use crate::source::{Selector, SourceRegistry, StreamInfo, StreamInlet};

pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Granularity of stop checks while backing off.
const STOP_POLL_SLICE: Duration = Duration::from_millis(10);

type ExitResult = Result<(), InletError>;

/// Background puller feeding a [`ChunkRing`].
///
/// `start` resolves and opens the stream on the caller's task, then moves
/// the blocking pull loop onto a dedicated thread. The loop checks a shared
/// stop flag before every pull, so cancellation completes within one pull
/// timeout. A fatal exit is reported once through [`InletWorker::poll_exit`]
/// or [`InletWorker::shutdown`].
pub struct InletWorker {
    selector: Selector,
    chunk_size: usize,
    ring: ChunkRing,
    pull_timeout: Duration,
    resolve_timeout: Duration,
    retry: RetryStrategy,

    /// Cooperative cancellation flag shared with the pull thread
    stop_flag: Arc<AtomicBool>,

    status: Arc<AtomicU8>,
    stats: Arc<InletStats>,
    stream: Option<StreamInfo>,

    exit_rx: Option<Receiver<ExitResult>>,
    handle: Option<JoinHandle<()>>,
}

impl InletWorker {
    /// A `chunk_size` of 0 is treated as 1.
    pub fn new(selector: Selector, chunk_size: usize, ring: ChunkRing) -> Self {
        Self {
            selector,
            chunk_size: chunk_size.max(1),
            ring,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            retry: RetryStrategy::default(),
            stop_flag: Arc::new(AtomicBool::new(false)),
            status: Arc::new(AtomicU8::new(WorkerStatus::Idle as u8)),
            stats: Arc::new(InletStats::new()),
            stream: None,
            exit_rx: None,
            handle: None,
        }
    }

    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> Arc<InletStats> {
        self.stats.clone()
    }

    /// Stream the worker resolved, once started.
    pub fn stream(&self) -> Option<&StreamInfo> {
        self.stream.as_ref()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    fn set_status(&self, target: WorkerStatus) {
        if let Err(current) = state::transition(&self.status, target) {
            tracing::debug!(from = current.name(), to = target.name(), "ignored worker status change");
        }
    }

    /// Resolve the stream, open it, and launch the pull thread.
    ///
    /// Resolution failure is fatal and not retried.
    pub async fn start(&mut self, registry: &SourceRegistry) -> Result<StreamInfo, InletError> {
        if state::transition(&self.status, WorkerStatus::Resolving).is_err() {
            return Err(InletError::AlreadyStarted);
        }
        tracing::info!(
            selector = %self.selector,
            timeout_ms = self.resolve_timeout.as_millis() as u64,
            "resolving stream"
        );

        let info = match registry.resolve(&self.selector, self.resolve_timeout).await {
            Ok(info) => info,
            Err(e) => {
                self.set_status(WorkerStatus::Failed);
                tracing::error!(selector = %self.selector, error = %e, "stream resolution failed");
                return Err(e);
            }
        };

        let inlet = match registry.open(&info) {
            Ok(inlet) => inlet,
            Err(e) => {
                self.set_status(WorkerStatus::Failed);
                return Err(InletError::Open {
                    stream: info.name.clone(),
                    reason: format!("{:#}", e),
                });
            }
        };

        let (exit_tx, exit_rx) = bounded(1);
        let pull_loop = PullLoop {
            stream: info.name.clone(),
            chunk_size: self.chunk_size,
            pull_timeout: self.pull_timeout,
            retry: self.retry.clone(),
            ring: self.ring.clone(),
            stop_flag: self.stop_flag.clone(),
            status: self.status.clone(),
            stats: self.stats.clone(),
        };

        // Running before spawn so the thread's terminal status is never overwritten
        self.set_status(WorkerStatus::Running);
        let handle = std::thread::Builder::new()
            .name("inlet-worker".to_string())
            .spawn(move || {
                let result = pull_loop.run(inlet);
                let _ = exit_tx.send(result);
            });

        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                self.set_status(WorkerStatus::Failed);
                return Err(InletError::Spawn(e));
            }
        };

        tracing::info!(
            stream = %info.name,
            stream_type = %info.stream_type,
            nominal_srate = info.nominal_srate,
            chunk_size = self.chunk_size,
            "inlet worker started"
        );

        self.handle = Some(handle);
        self.exit_rx = Some(exit_rx);
        self.stream = Some(info.clone());
        Ok(info)
    }

    /// Request cancellation and return immediately.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    /// Non-blocking check for the worker's exit.
    ///
    /// Yields the exit result exactly once; `None` while still running or
    /// after the result has been taken.
    pub fn poll_exit(&mut self) -> Option<ExitResult> {
        let rx = self.exit_rx.as_ref()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                self.set_status(WorkerStatus::Failed);
                Err(InletError::WorkerLost)
            }
        };
        self.exit_rx = None;
        self.join();
        Some(result)
    }

    /// Stop and wait up to `timeout` for the pull thread to finish.
    ///
    /// Returns the exit result if it had not been taken yet. A worker that
    /// does not finish in time is logged and left detached.
    pub fn shutdown(&mut self, timeout: Duration) -> Option<ExitResult> {
        self.stop();

        let Some(rx) = self.exit_rx.take() else {
            self.join();
            return None;
        };

        match rx.recv_timeout(timeout) {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "inlet worker did not stop in time; detaching"
                );
                self.handle = None;
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.set_status(WorkerStatus::Failed);
                self.join();
                Some(Err(InletError::WorkerLost))
            }
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("inlet worker thread panicked");
            }
        }
    }
}

impl Drop for InletWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved onto the pull thread.
struct PullLoop {
    stream: String,
    chunk_size: usize,
    pull_timeout: Duration,
    retry: RetryStrategy,
    ring: ChunkRing,
    stop_flag: Arc<AtomicBool>,
    status: Arc<AtomicU8>,
    stats: Arc<InletStats>,
}

impl PullLoop {
    fn run(self, mut inlet: Box<dyn StreamInlet>) -> ExitResult {
        let result = self.pull_until_stopped(inlet.as_mut());
        inlet.close();

        let status = if result.is_ok() {
            WorkerStatus::Stopped
        } else {
            WorkerStatus::Failed
        };
        if let Err(current) = state::transition(&self.status, status) {
            tracing::debug!(stream = %self.stream, from = current.name(), to = status.name(), "ignored worker status change");
        }
        tracing::debug!(stream = %self.stream, status = status.name(), "inlet worker exited");
        result
    }

    fn pull_until_stopped(&self, inlet: &mut dyn StreamInlet) -> ExitResult {
        let mut sequence: u64 = 0;
        let mut failures: u32 = 0;

        while !self.stop_flag.load(Ordering::Acquire) {
            self.stats.record_pull();

            match inlet.pull_chunk(self.chunk_size, self.pull_timeout) {
                Ok(Some(pulled)) => {
                    failures = 0;
                    let pulled_samples = pulled.timestamps.len();
                    match Chunk::new(sequence, pulled.timestamps, pulled.received_at) {
                        Some(chunk) => {
                            let samples = chunk.len();
                            if self.ring.push(chunk) {
                                tracing::trace!(stream = %self.stream, sequence, "ring full, evicted oldest chunk");
                            }
                            self.stats.record_chunk(samples);
                            sequence += 1;
                        }
                        None => {
                            if pulled_samples > 0 {
                                tracing::warn!(
                                    stream = %self.stream,
                                    samples = pulled_samples,
                                    "discarded pull with non-finite timestamps"
                                );
                            }
                            self.stats.record_empty();
                        }
                    }
                }
                Ok(None) => {
                    failures = 0;
                    self.stats.record_empty();
                    std::thread::yield_now();
                }
                Err(PullError::Transient(reason)) => {
                    failures = failures.saturating_add(1);
                    self.stats.record_transient_error();
                    tracing::warn!(
                        stream = %self.stream,
                        attempt = failures,
                        reason = %reason,
                        "transient pull error"
                    );
                    self.pause(self.retry.delay_for(failures));
                }
                Err(PullError::Disconnected(reason)) => {
                    tracing::error!(stream = %self.stream, reason = %reason, "stream disconnected");
                    return Err(InletError::StreamDisconnected {
                        stream: self.stream.clone(),
                        reason,
                    });
                }
            }
        }

        Ok(())
    }

    /// Sleep for `delay`, cut short by a stop request.
    fn pause(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        loop {
            if self.stop_flag.load(Ordering::Acquire) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep((deadline - now).min(STOP_POLL_SLICE));
        }
    }
}

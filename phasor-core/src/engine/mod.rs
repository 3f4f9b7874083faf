//! `PhasorEngine`: top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! PhasorEngine::new(config)
//!     ├─► spawn_analysis()    → batch worker spawned, AnalysisEvent::Started
//!     │       └─► (worker)    → Completed | Cancelled | Failed, exactly one
//!     ├─► cancel_analysis()   → cooperative, observed within one offset step
//!     └─► start_monitor()     → 20 Hz loop spawned, MonitorEvent per tick
//!             └─► stop_monitor()
//! ```
//!
//! Starting the monitor while it runs and stopping it while it doesn't are
//! no-ops (they return `false`). Spawning a second batch while one is in
//! flight returns `AnalysisInProgress` rather than queueing.
//!
//! ## Threading
//!
//! Both workers run under `tokio::task::spawn_blocking`, so the engine must
//! be driven from within a Tokio runtime (the host application provides
//! one). All handle methods are synchronous and non-blocking.

pub mod monitor;

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    analysis::{analyze_all, DEFAULT_MAX_OFFSET_SAMPLES},
    cancel::CancelToken,
    capture::AudioCapture,
    error::{PhasorError, Result},
    ipc::events::{AnalysisEvent, MonitorEvent},
};

/// Broadcast channel capacity: 256 events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Configuration for `PhasorEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Half-range of the offset sweep used by `spawn_analysis`.
    /// Default: 1000 samples.
    pub max_offset_samples: usize,
    /// Live monitor tick cadence. Default: 50 ms (20 Hz).
    pub monitor_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_offset_samples: DEFAULT_MAX_OFFSET_SAMPLES,
            monitor_interval: Duration::from_millis(50),
        }
    }
}

/// Cumulative engine counters for observability.
pub struct EngineDiagnostics {
    pub batches_started: AtomicUsize,
    pub batches_completed: AtomicUsize,
    pub batches_cancelled: AtomicUsize,
    pub batches_failed: AtomicUsize,
    pub targets_analyzed: AtomicUsize,
    pub targets_skipped: AtomicUsize,
    pub monitor_ticks: AtomicU64,
}

impl Default for EngineDiagnostics {
    fn default() -> Self {
        Self {
            batches_started: AtomicUsize::new(0),
            batches_completed: AtomicUsize::new(0),
            batches_cancelled: AtomicUsize::new(0),
            batches_failed: AtomicUsize::new(0),
            targets_analyzed: AtomicUsize::new(0),
            targets_skipped: AtomicUsize::new(0),
            monitor_ticks: AtomicU64::new(0),
        }
    }
}

impl EngineDiagnostics {
    pub fn reset(&self) {
        self.batches_started.store(0, Ordering::Relaxed);
        self.batches_completed.store(0, Ordering::Relaxed);
        self.batches_cancelled.store(0, Ordering::Relaxed);
        self.batches_failed.store(0, Ordering::Relaxed);
        self.targets_analyzed.store(0, Ordering::Relaxed);
        self.targets_skipped.store(0, Ordering::Relaxed);
        self.monitor_ticks.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            batches_started: self.batches_started.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            batches_cancelled: self.batches_cancelled.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            targets_analyzed: self.targets_analyzed.load(Ordering::Relaxed),
            targets_skipped: self.targets_skipped.load(Ordering::Relaxed),
            monitor_ticks: self.monitor_ticks.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub batches_started: usize,
    pub batches_completed: usize,
    pub batches_cancelled: usize,
    pub batches_failed: usize,
    pub targets_analyzed: usize,
    pub targets_skipped: usize,
    pub monitor_ticks: u64,
}

/// The top-level engine handle.
///
/// `PhasorEngine` is `Send + Sync`; all fields use interior mutability.
/// Wrap in `Arc<PhasorEngine>` to share between the host app state and
/// event-forwarding async tasks.
pub struct PhasorEngine {
    config: EngineConfig,
    /// `true` while a batch analysis worker is in flight.
    analysis_running: Arc<AtomicBool>,
    /// Token wired to the in-flight batch; replaced on every spawn.
    analysis_cancel: Mutex<CancelToken>,
    /// Stop flag of the active monitor loop, if any. Each start gets a
    /// fresh flag so a stopped loop can never observe a successor's.
    monitor_stop: Mutex<Option<Arc<AtomicBool>>>,
    /// Monitor settings + last reading, shared with the loop.
    monitor_shared: Arc<monitor::MonitorShared>,
    /// Broadcast sender for batch lifecycle events.
    analysis_tx: broadcast::Sender<AnalysisEvent>,
    /// Broadcast sender for live monitor ticks.
    monitor_tx: broadcast::Sender<MonitorEvent>,
    /// Monotonically increasing sequence for analysis events.
    seq: Arc<AtomicU64>,
    /// Shared diagnostics counters.
    diagnostics: Arc<EngineDiagnostics>,
}

impl PhasorEngine {
    /// Create a new engine. Does not spawn anything on its own.
    pub fn new(config: EngineConfig) -> Self {
        let (analysis_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (monitor_tx, _) = broadcast::channel(BROADCAST_CAP);

        Self {
            config,
            analysis_running: Arc::new(AtomicBool::new(false)),
            analysis_cancel: Mutex::new(CancelToken::new()),
            monitor_stop: Mutex::new(None),
            monitor_shared: Arc::new(monitor::MonitorShared::default()),
            analysis_tx,
            monitor_tx,
            seq: Arc::new(AtomicU64::new(0)),
            diagnostics: Arc::new(EngineDiagnostics::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a batch analysis of `reference` against `targets` on a
    /// background worker.
    ///
    /// Emits `AnalysisEvent::Started` before returning, then exactly one
    /// terminal event (`Completed`, `Cancelled` or `Failed`) from the
    /// worker. By the time a subscriber sees the terminal event the engine
    /// accepts a new batch.
    ///
    /// # Errors
    /// - `PhasorError::EmptyReference` / `PhasorError::NoTargets` on
    ///   configuration errors, before any work is scheduled.
    /// - `PhasorError::AnalysisInProgress` if a batch is already running.
    pub fn spawn_analysis(
        &self,
        reference: AudioCapture,
        targets: Vec<AudioCapture>,
    ) -> Result<()> {
        if reference.is_empty() {
            return Err(PhasorError::EmptyReference);
        }
        if targets.is_empty() {
            return Err(PhasorError::NoTargets);
        }
        if self.analysis_running.swap(true, Ordering::SeqCst) {
            return Err(PhasorError::AnalysisInProgress);
        }

        let cancel = CancelToken::new();
        *self.analysis_cancel.lock() = cancel.clone();

        let max_offset_samples = self.config.max_offset_samples;
        let started_seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let _ = self.analysis_tx.send(AnalysisEvent::Started {
            seq: started_seq,
            target_count: targets.len(),
            max_offset_samples,
        });
        info!(
            reference = %reference.id,
            targets = targets.len(),
            max_offset_samples,
            "batch analysis spawned"
        );

        let running = Arc::clone(&self.analysis_running);
        let analysis_tx = self.analysis_tx.clone();
        let seq = Arc::clone(&self.seq);
        let diagnostics = Arc::clone(&self.diagnostics);
        diagnostics.batches_started.fetch_add(1, Ordering::Relaxed);

        tokio::task::spawn_blocking(move || {
            let outcome = analyze_all(&reference, &targets, max_offset_samples, &cancel);
            let terminal_seq = seq.fetch_add(1, Ordering::Relaxed);
            let event = match outcome {
                Ok(results) => {
                    diagnostics
                        .targets_analyzed
                        .fetch_add(results.len(), Ordering::Relaxed);
                    diagnostics
                        .targets_skipped
                        .fetch_add(targets.len() - results.len(), Ordering::Relaxed);
                    diagnostics.batches_completed.fetch_add(1, Ordering::Relaxed);
                    AnalysisEvent::Completed {
                        seq: terminal_seq,
                        results,
                    }
                }
                Err(PhasorError::Cancelled) => {
                    diagnostics.batches_cancelled.fetch_add(1, Ordering::Relaxed);
                    info!("batch analysis cancelled");
                    AnalysisEvent::Cancelled { seq: terminal_seq }
                }
                Err(e) => {
                    diagnostics.batches_failed.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "batch analysis failed");
                    AnalysisEvent::Failed {
                        seq: terminal_seq,
                        detail: e.to_string(),
                    }
                }
            };
            // Release the slot before publishing so a subscriber acting on
            // the terminal event can spawn the next batch immediately.
            running.store(false, Ordering::SeqCst);
            let _ = analysis_tx.send(event);
        });

        Ok(())
    }

    /// Request cancellation of the in-flight batch, if any.
    ///
    /// Cooperative: the worker observes the request within one offset
    /// evaluation and emits `AnalysisEvent::Cancelled`.
    pub fn cancel_analysis(&self) {
        debug!("batch cancellation requested");
        self.analysis_cancel.lock().cancel();
    }

    pub fn analysis_running(&self) -> bool {
        self.analysis_running.load(Ordering::SeqCst)
    }

    /// Start the live monitor over mono snapshots of `reference` and
    /// `target` at the given initial settings.
    ///
    /// Returns `false` (and changes nothing) when a monitor is already
    /// running. The offset and polarity flag remain adjustable through
    /// `set_monitor_offset` / `set_monitor_flip` while the loop runs.
    pub fn start_monitor(
        &self,
        reference: &AudioCapture,
        target: &AudioCapture,
        offset_samples: i64,
        flip_polarity: bool,
    ) -> bool {
        let running = {
            let mut slot = self.monitor_stop.lock();
            if slot.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                debug!("live monitor already running");
                return false;
            }
            let running = Arc::new(AtomicBool::new(true));
            *slot = Some(Arc::clone(&running));
            running
        };

        self.monitor_shared.set_offset(offset_samples);
        self.monitor_shared.set_flip(flip_polarity);
        self.monitor_shared.clear_correlation();

        info!(
            reference = %reference.id,
            target = %target.id,
            offset_samples,
            flip_polarity,
            "live monitor starting"
        );

        let ctx = monitor::MonitorContext {
            reference: Arc::new(reference.to_mono()),
            target: Arc::new(target.to_mono()),
            interval: self.config.monitor_interval,
            running,
            shared: Arc::clone(&self.monitor_shared),
            monitor_tx: self.monitor_tx.clone(),
            diagnostics: Arc::clone(&self.diagnostics),
        };
        tokio::task::spawn_blocking(move || monitor::run(ctx));
        true
    }

    /// Stop the live monitor. Returns `false` when none is running.
    pub fn stop_monitor(&self) -> bool {
        let mut slot = self.monitor_stop.lock();
        match slot.take() {
            Some(flag) => {
                let was_running = flag.swap(false, Ordering::SeqCst);
                if was_running {
                    info!("live monitor stop requested");
                }
                was_running
            }
            None => false,
        }
    }

    pub fn monitor_running(&self) -> bool {
        self.monitor_stop
            .lock()
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Adjust the monitored offset; takes effect on the next tick. Also
    /// valid before the loop starts.
    pub fn set_monitor_offset(&self, offset_samples: i64) {
        debug!(offset_samples, "monitor offset updated");
        self.monitor_shared.set_offset(offset_samples);
    }

    /// Adjust the monitored polarity flag; takes effect on the next tick.
    pub fn set_monitor_flip(&self, flip_polarity: bool) {
        debug!(flip_polarity, "monitor polarity updated");
        self.monitor_shared.set_flip(flip_polarity);
    }

    /// Last correlation the monitor published; `None` before the first
    /// tick or when the configured offset is not evaluable.
    pub fn last_monitor_correlation(&self) -> Option<f64> {
        self.monitor_shared.last_correlation()
    }

    /// Subscribe to batch lifecycle events.
    pub fn subscribe_analysis(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.analysis_tx.subscribe()
    }

    /// Subscribe to live monitor ticks.
    pub fn subscribe_monitor(&self) -> broadcast::Receiver<MonitorEvent> {
        self.monitor_tx.subscribe()
    }

    /// Snapshot of engine counters for observability.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }
}

//! Blocking live-monitor loop.
//!
//! ## Per tick
//!
//! ```text
//! 1. Check running flag
//! 2. Load the user's current offset/flip settings (atomics)
//! 3. correlate(reference, target, offset), sign-flipped when requested
//! 4. Publish: shared atomic word + MonitorEvent broadcast
//! 5. Sleep out the remainder of the tick interval
//! ```
//!
//! The loop runs in `spawn_blocking`, keeping the Tokio executor free.
//! Reference and target are mono snapshots taken at start; the offset and
//! polarity flag stay live-adjustable while the loop runs.

use std::sync::{
    atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::info;

use crate::analysis::correlate::correlate;
use crate::engine::EngineDiagnostics;
use crate::ipc::events::MonitorEvent;

/// State the monitor shares with the engine handle: the user-adjustable
/// settings and the last published reading.
///
/// The loop is the only writer of the correlation word; everything else
/// reads snapshots, so a single atomic suffices.
pub struct MonitorShared {
    offset_samples: AtomicI64,
    flip_polarity: AtomicBool,
    /// f64 bits of the last reading; NaN bits mean "nothing published yet
    /// or not evaluable at the configured offset".
    correlation_bits: AtomicU64,
}

impl Default for MonitorShared {
    fn default() -> Self {
        Self {
            offset_samples: AtomicI64::new(0),
            flip_polarity: AtomicBool::new(false),
            correlation_bits: AtomicU64::new(f64::NAN.to_bits()),
        }
    }
}

impl MonitorShared {
    pub fn set_offset(&self, offset_samples: i64) {
        self.offset_samples.store(offset_samples, Ordering::Relaxed);
    }

    pub fn offset(&self) -> i64 {
        self.offset_samples.load(Ordering::Relaxed)
    }

    pub fn set_flip(&self, flip: bool) {
        self.flip_polarity.store(flip, Ordering::Relaxed);
    }

    pub fn flip(&self) -> bool {
        self.flip_polarity.load(Ordering::Relaxed)
    }

    pub fn clear_correlation(&self) {
        self.correlation_bits
            .store(f64::NAN.to_bits(), Ordering::Relaxed);
    }

    pub fn store_correlation(&self, correlation: Option<f64>) {
        let bits = correlation.unwrap_or(f64::NAN).to_bits();
        self.correlation_bits.store(bits, Ordering::Relaxed);
    }

    pub fn last_correlation(&self) -> Option<f64> {
        let value = f64::from_bits(self.correlation_bits.load(Ordering::Relaxed));
        if value.is_nan() {
            None
        } else {
            Some(value)
        }
    }
}

/// All context the monitor loop needs, passed as one struct so the closure
/// stays tidy.
pub struct MonitorContext {
    /// Mono snapshot of the reference capture.
    pub reference: Arc<Vec<f32>>,
    /// Mono snapshot of the monitored target.
    pub target: Arc<Vec<f32>>,
    /// Tick cadence (50 ms / 20 Hz by default).
    pub interval: Duration,
    pub running: Arc<AtomicBool>,
    pub shared: Arc<MonitorShared>,
    pub monitor_tx: broadcast::Sender<MonitorEvent>,
    pub diagnostics: Arc<EngineDiagnostics>,
}

/// Run the blocking monitor loop until `ctx.running` becomes false.
pub fn run(ctx: MonitorContext) {
    info!(
        interval_ms = ctx.interval.as_millis() as u64,
        reference_frames = ctx.reference.len(),
        target_frames = ctx.target.len(),
        "live monitor started"
    );

    let mut seq = 0u64;
    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }
        let tick_started = Instant::now();

        let offset_samples = ctx.shared.offset();
        let flip_polarity = ctx.shared.flip();
        // Inverting a signal negates its Pearson coefficient, so the
        // flipped reading is a sign change on the same evaluation.
        let correlation = correlate(&ctx.reference, &ctx.target, offset_samples)
            .map(|c| if flip_polarity { -c } else { c });

        ctx.shared.store_correlation(correlation);
        ctx.diagnostics.monitor_ticks.fetch_add(1, Ordering::Relaxed);
        let _ = ctx.monitor_tx.send(MonitorEvent {
            seq,
            offset_samples,
            flip_polarity,
            correlation,
        });
        seq = seq.saturating_add(1);

        if let Some(remaining) = ctx.interval.checked_sub(tick_started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    info!(ticks = seq, "live monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tokio::sync::broadcast::error::TryRecvError;

    fn sine(len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| (2.0 * std::f32::consts::PI * 440.0 * n as f32 / 44_100.0).sin())
            .collect()
    }

    struct TestMonitor {
        running: Arc<AtomicBool>,
        shared: Arc<MonitorShared>,
        rx: broadcast::Receiver<MonitorEvent>,
        diagnostics: Arc<EngineDiagnostics>,
        handle: thread::JoinHandle<()>,
    }

    fn start_monitor(
        reference: Vec<f32>,
        target: Vec<f32>,
        offset_samples: i64,
        flip_polarity: bool,
    ) -> TestMonitor {
        let (monitor_tx, rx) = broadcast::channel(64);
        let running = Arc::new(AtomicBool::new(true));
        let shared = Arc::new(MonitorShared::default());
        shared.set_offset(offset_samples);
        shared.set_flip(flip_polarity);
        let diagnostics = Arc::new(EngineDiagnostics::default());

        let ctx = MonitorContext {
            reference: Arc::new(reference),
            target: Arc::new(target),
            interval: Duration::from_millis(2),
            running: Arc::clone(&running),
            shared: Arc::clone(&shared),
            monitor_tx,
            diagnostics: Arc::clone(&diagnostics),
        };
        let handle = thread::spawn(move || run(ctx));
        TestMonitor {
            running,
            shared,
            rx,
            diagnostics,
            handle,
        }
    }

    fn recv_event_with_timeout(
        rx: &mut broadcast::Receiver<MonitorEvent>,
        timeout: Duration,
    ) -> MonitorEvent {
        let start = Instant::now();
        loop {
            match rx.try_recv() {
                Ok(ev) => return ev,
                Err(TryRecvError::Empty) => {
                    if start.elapsed() >= timeout {
                        panic!("timed out waiting for monitor event");
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => panic!("monitor channel closed unexpectedly"),
            }
        }
    }

    fn assert_no_event_for(rx: &mut broadcast::Receiver<MonitorEvent>, timeout: Duration) {
        let start = Instant::now();
        loop {
            match rx.try_recv() {
                Ok(ev) => panic!("expected no event, got seq={}", ev.seq),
                Err(TryRecvError::Empty) => {
                    if start.elapsed() >= timeout {
                        return;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => return,
            }
        }
    }

    /// Waits for a tick whose payload satisfies `accept`.
    fn wait_for_tick(
        rx: &mut broadcast::Receiver<MonitorEvent>,
        accept: impl Fn(&MonitorEvent) -> bool,
    ) -> MonitorEvent {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let ev = recv_event_with_timeout(rx, deadline.saturating_duration_since(Instant::now()));
            if accept(&ev) {
                return ev;
            }
            if Instant::now() >= deadline {
                panic!("no matching monitor tick before deadline");
            }
        }
    }

    #[test]
    fn ticks_publish_correlation_and_settings() {
        let wave = sine(2048);
        let mut monitor = start_monitor(wave.clone(), wave, 0, false);

        let ev = recv_event_with_timeout(&mut monitor.rx, Duration::from_secs(1));
        assert_eq!(ev.offset_samples, 0);
        assert!(!ev.flip_polarity);
        let c = ev.correlation.expect("tick should be evaluable");
        assert!(c > 0.999, "got {c}");
        assert_eq!(ev.seq, 0);

        // The shared word carries the same reading.
        let last = monitor.shared.last_correlation().unwrap();
        assert!(last > 0.999);

        monitor.running.store(false, Ordering::SeqCst);
        monitor.handle.join().expect("monitor thread panicked");
        assert!(monitor.diagnostics.snapshot().monitor_ticks >= 1);
    }

    #[test]
    fn flip_negates_the_published_reading() {
        let wave = sine(2048);
        let mut monitor = start_monitor(wave.clone(), wave, 0, false);

        let ev = wait_for_tick(&mut monitor.rx, |ev| !ev.flip_polarity);
        assert!(ev.correlation.unwrap() > 0.999);

        monitor.shared.set_flip(true);
        let flipped = wait_for_tick(&mut monitor.rx, |ev| ev.flip_polarity);
        assert!(flipped.correlation.unwrap() < -0.999);

        monitor.running.store(false, Ordering::SeqCst);
        monitor.handle.join().expect("monitor thread panicked");
    }

    #[test]
    fn offset_can_be_nudged_while_running() {
        let wave = sine(4096);
        let mut delayed = vec![0.0f32; 5];
        delayed.extend_from_slice(&wave);
        let mut monitor = start_monitor(wave, delayed, 0, false);

        // Misaligned at first, then aligned once the user lands on -5.
        let _ = recv_event_with_timeout(&mut monitor.rx, Duration::from_secs(1));
        monitor.shared.set_offset(-5);
        let aligned = wait_for_tick(&mut monitor.rx, |ev| {
            ev.offset_samples == -5 && ev.correlation.is_some_and(|c| c > 0.999)
        });
        assert!(!aligned.flip_polarity);

        monitor.running.store(false, Ordering::SeqCst);
        monitor.handle.join().expect("monitor thread panicked");
    }

    #[test]
    fn out_of_range_offset_publishes_none() {
        let wave = sine(256);
        let mut monitor = start_monitor(wave.clone(), wave, 10_000, false);

        let ev = recv_event_with_timeout(&mut monitor.rx, Duration::from_secs(1));
        assert_eq!(ev.offset_samples, 10_000);
        assert!(ev.correlation.is_none());
        assert!(monitor.shared.last_correlation().is_none());

        monitor.running.store(false, Ordering::SeqCst);
        monitor.handle.join().expect("monitor thread panicked");
    }

    #[test]
    fn stop_halts_publication() {
        let wave = sine(1024);
        let mut monitor = start_monitor(wave.clone(), wave, 0, false);

        let _ = recv_event_with_timeout(&mut monitor.rx, Duration::from_secs(1));
        monitor.running.store(false, Ordering::SeqCst);
        monitor.handle.join().expect("monitor thread panicked");

        // Drain anything sent before the stop landed, then expect silence.
        while monitor.rx.try_recv().is_ok() {}
        assert_no_event_for(&mut monitor.rx, Duration::from_millis(30));
    }

    #[test]
    fn seq_increments_per_tick() {
        let wave = sine(1024);
        let mut monitor = start_monitor(wave.clone(), wave, 0, false);

        let first = recv_event_with_timeout(&mut monitor.rx, Duration::from_secs(1));
        let second = recv_event_with_timeout(&mut monitor.rx, Duration::from_secs(1));
        assert_eq!(second.seq, first.seq + 1);

        monitor.running.store(false, Ordering::SeqCst);
        monitor.handle.join().expect("monitor thread panicked");
    }
}

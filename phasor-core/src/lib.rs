//! # phasor-core
//!
//! Reusable phase-alignment analysis engine SDK.
//!
//! ## Architecture
//!
//! ```text
//! AudioCapture (reference + targets)
//!      │ reduce_to_mono / invert_polarity
//!      ▼
//! Offset × polarity sweep ──► correlate() per candidate
//!      │                            ▲
//!      │ best (offset, flip)        │ one fixed (offset, flip) per tick
//!      ▼                            │
//! AlignmentResult            Live monitor loop (20 Hz, spawn_blocking)
//!      │                            │
//! broadcast::Sender<AnalysisEvent>  broadcast::Sender<MonitorEvent>
//! ```
//!
//! The analysis functions are pure and synchronous; `PhasorEngine` runs
//! them on blocking workers and publishes the outcomes as events.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod analysis;
pub mod cancel;
pub mod capture;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod signal;

// Convenience re-exports for downstream crates
pub use analysis::{
    analyze_all, correlate, search_alignment, AlignmentResult, PhaseStatus,
    DEFAULT_MAX_OFFSET_SAMPLES,
};
pub use cancel::CancelToken;
pub use capture::AudioCapture;
pub use engine::{DiagnosticsSnapshot, EngineConfig, PhasorEngine};
pub use error::PhasorError;
pub use ipc::events::{AnalysisEvent, MonitorEvent};
pub use signal::{invert_polarity, reduce_to_mono};

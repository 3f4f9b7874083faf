//! Event types emitted over the engine's broadcast channels.
//!
//! ## Channel names
//!
//! | Event | Channel |
//! |-------|---------|
//! | `AnalysisEvent` | `"phasor://analysis"` |
//! | `MonitorEvent` | `"phasor://monitor"` |
//!
//! Hosts that bridge to a UI event bus should reuse these names so both
//! sides agree on the schema.

use serde::{Deserialize, Serialize};

use crate::analysis::AlignmentResult;

// ---------------------------------------------------------------------------
// Batch analysis events
// ---------------------------------------------------------------------------

/// Emitted on channel `"phasor://analysis"` for batch lifecycle changes.
///
/// Every spawned batch produces one `Started` followed by exactly one
/// terminal event: `Completed`, `Cancelled`, or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum AnalysisEvent {
    /// A batch worker has been spawned.
    #[serde(rename_all = "camelCase")]
    Started {
        /// Monotonically increasing event sequence number.
        seq: u64,
        /// Number of targets handed to the batch (including any that will
        /// be skipped for having no samples).
        target_count: usize,
        /// Sweep half-range the batch will use.
        max_offset_samples: usize,
    },
    /// The batch ran to completion; one result per analyzable target.
    #[serde(rename_all = "camelCase")]
    Completed { seq: u64, results: Vec<AlignmentResult> },
    /// The batch was cancelled; partial results were discarded.
    Cancelled { seq: u64 },
    /// The batch stopped on an error other than cancellation.
    #[serde(rename_all = "camelCase")]
    Failed { seq: u64, detail: String },
}

// ---------------------------------------------------------------------------
// Live monitor events
// ---------------------------------------------------------------------------

/// Emitted on channel `"phasor://monitor"` once per monitor tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorEvent {
    /// Tick counter, local to one monitor run (resets on restart).
    pub seq: u64,
    /// Offset the tick was evaluated at.
    pub offset_samples: i64,
    /// Polarity flag the tick was evaluated with.
    pub flip_polarity: bool,
    /// Correlation reading; `None` when the offset leaves no overlapping
    /// window between the monitored pair.
    pub correlation: Option<f64>,
}

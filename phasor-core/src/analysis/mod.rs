//! Phase-alignment analysis: correlation evaluation, offset/polarity
//! search, and batch orchestration.
//!
//! Everything in this module is synchronous and thread-agnostic. Long runs
//! belong on a worker; [`crate::engine::PhasorEngine`] wraps the batch in
//! one and publishes the outcome as events.

pub mod batch;
pub mod correlate;
pub mod search;

pub use batch::analyze_all;
pub use correlate::correlate;
pub use search::{search_alignment, DEFAULT_MAX_OFFSET_SAMPLES};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one reference/target alignment search.
///
/// Immutable once created; re-analysis produces a fresh record. Offset sign
/// convention: positive means the target leads and should be shifted later
/// (or the reference earlier) to align, so a target that is a delayed copy
/// of the reference reports a negative offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentResult {
    /// Id of the capture this result applies to.
    pub target_id: String,
    /// Best-scoring shift, within `[-max_offset, +max_offset]`.
    pub offset_samples: i64,
    /// `offset_samples` expressed in milliseconds at the reference rate.
    pub offset_ms: f64,
    /// Pearson coefficient of the winning candidate, in [-1, 1].
    pub correlation: f64,
    /// True when inverting the target's polarity improves alignment.
    pub flip_polarity: bool,
    /// False when the search could not evaluate this pair (degenerate or
    /// corrupt input). Cancellation is never reported this way.
    pub success: bool,
}

impl AlignmentResult {
    /// Safe-default record for a pair the search could not evaluate.
    pub(crate) fn failed(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            offset_samples: 0,
            offset_ms: 0.0,
            correlation: -1.0,
            flip_polarity: false,
            success: false,
        }
    }

    /// Qualitative phase health, recomputed from `correlation` on read.
    pub fn status(&self) -> PhaseStatus {
        PhaseStatus::from_correlation(self.correlation)
    }
}

/// Human-facing classification of a correlation value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    InPhase,
    MostlyInPhase,
    PartialPhase,
    PhaseIssues,
    OutOfPhase,
}

impl PhaseStatus {
    pub fn from_correlation(correlation: f64) -> Self {
        if correlation > 0.9 {
            Self::InPhase
        } else if correlation > 0.5 {
            Self::MostlyInPhase
        } else if correlation > 0.0 {
            Self::PartialPhase
        } else if correlation > -0.5 {
            Self::PhaseIssues
        } else {
            Self::OutOfPhase
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::InPhase => "In Phase",
            Self::MostlyInPhase => "Mostly In Phase",
            Self::PartialPhase => "Partial Phase",
            Self::PhaseIssues => "Phase Issues",
            Self::OutOfPhase => "Out of Phase",
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_thresholds_are_strict() {
        assert_eq!(PhaseStatus::from_correlation(0.95), PhaseStatus::InPhase);
        assert_eq!(PhaseStatus::from_correlation(0.9), PhaseStatus::MostlyInPhase);
        assert_eq!(PhaseStatus::from_correlation(0.51), PhaseStatus::MostlyInPhase);
        assert_eq!(PhaseStatus::from_correlation(0.5), PhaseStatus::PartialPhase);
        assert_eq!(PhaseStatus::from_correlation(0.001), PhaseStatus::PartialPhase);
        assert_eq!(PhaseStatus::from_correlation(0.0), PhaseStatus::PhaseIssues);
        assert_eq!(PhaseStatus::from_correlation(-0.49), PhaseStatus::PhaseIssues);
        assert_eq!(PhaseStatus::from_correlation(-0.5), PhaseStatus::OutOfPhase);
        assert_eq!(PhaseStatus::from_correlation(-1.0), PhaseStatus::OutOfPhase);
    }

    #[test]
    fn status_labels_match_ui_wording() {
        assert_eq!(PhaseStatus::InPhase.label(), "In Phase");
        assert_eq!(PhaseStatus::OutOfPhase.to_string(), "Out of Phase");
    }

    #[test]
    fn failed_record_carries_safe_defaults() {
        let result = AlignmentResult::failed("tgt-3");
        assert_eq!(result.target_id, "tgt-3");
        assert_eq!(result.offset_samples, 0);
        assert_eq!(result.offset_ms, 0.0);
        assert_eq!(result.correlation, -1.0);
        assert!(!result.flip_polarity);
        assert!(!result.success);
        assert_eq!(result.status(), PhaseStatus::OutOfPhase);
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = AlignmentResult {
            target_id: "mic-2".into(),
            offset_samples: -37,
            offset_ms: -0.839,
            correlation: 0.97,
            flip_polarity: true,
            success: true,
        };
        let v = serde_json::to_value(&result).unwrap();
        assert_eq!(v["targetId"], "mic-2");
        assert_eq!(v["offsetSamples"], -37);
        assert_eq!(v["flipPolarity"], true);
        assert_eq!(v["success"], true);
        let back: AlignmentResult = serde_json::from_value(v).unwrap();
        assert_eq!(back, result);
    }
}

//! Brute-force offset × polarity search for one reference/target pair.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::analysis::correlate::correlate;
use crate::analysis::AlignmentResult;
use crate::cancel::CancelToken;
use crate::capture::AudioCapture;
use crate::error::{PhasorError, Result};
use crate::signal::invert_polarity;

/// Sweep half-range used when the caller has no better idea.
pub const DEFAULT_MAX_OFFSET_SAMPLES: usize = 1000;

/// One evaluated sweep candidate. `order` is its position in the canonical
/// sequential sweep, used to break score ties deterministically.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    order: usize,
    offset_samples: i64,
    flip: bool,
    correlation: f64,
}

/// Picks the candidate the canonical sequential sweep would keep: higher
/// correlation wins, and on an exact tie the earlier sweep position wins.
fn prefer(a: Candidate, b: Candidate) -> Candidate {
    if b.correlation > a.correlation || (b.correlation == a.correlation && b.order < a.order) {
        b
    } else {
        a
    }
}

/// Finds the offset/polarity combination that maximizes correlation between
/// `reference` and `target`.
///
/// Both captures are reduced to mono first. The sweep covers `flip = false`
/// entirely before `flip = true`, each over every integer offset in
/// `[-max_offset_samples, +max_offset_samples]`; the first maximum in that
/// order wins ties. Offsets are evaluated in parallel, with a reduction that
/// reproduces the sequential winner exactly.
///
/// Cancellation is polled once per offset evaluation and surfaces as
/// `Err(Cancelled)`; a cancelled search never returns a partial result.
/// Non-finite input samples, or a sweep in which no offset had an
/// overlapping window, yield a `success = false` record instead.
pub fn search_alignment(
    reference: &AudioCapture,
    target: &AudioCapture,
    max_offset_samples: usize,
    cancel: &CancelToken,
) -> Result<AlignmentResult> {
    let reference_mono = reference.to_mono();
    let target_mono = target.to_mono();

    if !is_finite(&reference_mono) || !is_finite(&target_mono) {
        warn!(target = %target.id, "non-finite samples, search not evaluable");
        return Ok(AlignmentResult::failed(&target.id));
    }

    debug!(
        target = %target.id,
        reference_frames = reference_mono.len(),
        target_frames = target_mono.len(),
        max_offset_samples,
        "offset/polarity search started"
    );

    let inverted = invert_polarity(&target_mono);
    let span = 2 * max_offset_samples + 1;

    let best = (0..2 * span)
        .into_par_iter()
        .filter_map(|order| {
            if cancel.is_cancelled() {
                return None;
            }
            let flip = order >= span;
            let offset_samples = (order % span) as i64 - max_offset_samples as i64;
            let candidate_target = if flip { &inverted } else { &target_mono };
            correlate(&reference_mono, candidate_target, offset_samples).map(|correlation| {
                Candidate {
                    order,
                    offset_samples,
                    flip,
                    correlation,
                }
            })
        })
        .reduce_with(prefer);

    // A cancelled sweep also produces an empty or truncated candidate set;
    // the token, not the candidates, decides how that is reported.
    if cancel.is_cancelled() {
        debug!(target = %target.id, "search cancelled");
        return Err(PhasorError::Cancelled);
    }

    let result = match best {
        Some(c) => AlignmentResult {
            target_id: target.id.clone(),
            offset_samples: c.offset_samples,
            offset_ms: offset_to_ms(c.offset_samples, reference.sample_rate),
            correlation: c.correlation,
            flip_polarity: c.flip,
            success: true,
        },
        None => {
            warn!(target = %target.id, "no evaluable offset in sweep");
            AlignmentResult::failed(&target.id)
        }
    };

    debug!(
        target = %result.target_id,
        offset_samples = result.offset_samples,
        correlation = result.correlation,
        flip_polarity = result.flip_polarity,
        "offset/polarity search finished"
    );
    Ok(result)
}

fn is_finite(samples: &[f32]) -> bool {
    samples.iter().all(|s| s.is_finite())
}

fn offset_to_ms(offset_samples: i64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    offset_samples as f64 * 1000.0 / sample_rate as f64
}

//! Batch analysis of one reference against many targets.

use tracing::{debug, info};

use crate::analysis::search::search_alignment;
use crate::analysis::AlignmentResult;
use crate::cancel::CancelToken;
use crate::capture::AudioCapture;
use crate::error::{PhasorError, Result};

/// Runs the offset/polarity search for `reference` against every target,
/// sequentially, producing one result per analyzable target.
///
/// Configuration errors (empty reference samples, empty target list) are
/// returned before any computation starts. Targets with no samples are
/// skipped and simply absent from the output. A pair the search cannot
/// evaluate contributes a `success = false` record without disturbing the
/// rest of the batch. Cancellation aborts the whole batch with
/// `Err(Cancelled)` and discards partial results, so callers always see an
/// all-or-nothing result set.
pub fn analyze_all(
    reference: &AudioCapture,
    targets: &[AudioCapture],
    max_offset_samples: usize,
    cancel: &CancelToken,
) -> Result<Vec<AlignmentResult>> {
    if reference.is_empty() {
        return Err(PhasorError::EmptyReference);
    }
    if targets.is_empty() {
        return Err(PhasorError::NoTargets);
    }

    info!(
        reference = %reference.id,
        targets = targets.len(),
        max_offset_samples,
        "batch analysis started"
    );

    let mut results = Vec::with_capacity(targets.len());
    for target in targets {
        if cancel.is_cancelled() {
            return Err(PhasorError::Cancelled);
        }
        if target.is_empty() {
            debug!(target = %target.id, "skipping target with no samples");
            continue;
        }
        results.push(search_alignment(
            reference,
            target,
            max_offset_samples,
            cancel,
        )?);
    }

    info!(results = results.len(), "batch analysis finished");
    Ok(results)
}

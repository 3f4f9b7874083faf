//! Pure sample-buffer transforms shared by the search and the live monitor.
//!
//! Both functions are stateless and reentrant; they may be called from any
//! thread without synchronization.

/// Collapses an interleaved multi-channel buffer to mono by averaging each
/// frame's channels.
///
/// The channel count is explicit; it is never inferred from buffer length.
/// A `channel_count` of 0 or 1 returns the input unchanged. A trailing
/// incomplete frame (fewer than `channel_count` samples) is dropped.
pub fn reduce_to_mono(samples: &[f32], channel_count: u16) -> Vec<f32> {
    let ch = channel_count as usize;
    if ch <= 1 {
        return samples.to_vec();
    }

    let frames = samples.len() / ch;
    let mut mono = vec![0.0f32; frames];
    for (f, out) in mono.iter_mut().enumerate() {
        let mut sum = 0f32;
        let base = f * ch;
        for c in 0..ch {
            sum += samples[base + c];
        }
        *out = sum / ch as f32;
    }
    mono
}

/// Returns a polarity-inverted (180° phase-flipped) copy of the signal.
pub fn invert_polarity(samples: &[f32]) -> Vec<f32> {
    samples.iter().map(|s| -s).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_frames_average_pairwise() {
        let interleaved = [0.2f32, 0.4, -1.0, 1.0, 0.5, 0.1];
        let mono = reduce_to_mono(&interleaved, 2);
        assert_eq!(mono.len(), 3);
        assert!((mono[0] - 0.3).abs() < 1e-7);
        assert!(mono[1].abs() < 1e-7);
        assert!((mono[2] - 0.3).abs() < 1e-7);
    }

    #[test]
    fn quad_frames_average_all_channels() {
        let interleaved = [1.0f32, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1.0];
        let mono = reduce_to_mono(&interleaved, 4);
        assert_eq!(mono, vec![0.25, -0.25]);
    }

    #[test]
    fn mono_input_passes_through_even_lengths() {
        // An even-length mono buffer must NOT be halved.
        let buf = [0.1f32, 0.2, 0.3, 0.4];
        assert_eq!(reduce_to_mono(&buf, 1), buf.to_vec());
        assert_eq!(reduce_to_mono(&buf, 0), buf.to_vec());
    }

    #[test]
    fn trailing_partial_frame_is_dropped() {
        let interleaved = [0.5f32, 0.5, 0.5, 0.5, 0.9];
        assert_eq!(reduce_to_mono(&interleaved, 2), vec![0.5, 0.5]);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(reduce_to_mono(&[], 2).is_empty());
        assert!(invert_polarity(&[]).is_empty());
    }

    #[test]
    fn inversion_negates_every_sample() {
        let buf = [0.25f32, -0.5, 0.0, 1.0];
        assert_eq!(invert_polarity(&buf), vec![-0.25, 0.5, 0.0, -1.0]);
    }
}

//! Typed audio capture handed to the engine by the host layer.

use std::sync::Arc;

use crate::signal::reduce_to_mono;

/// An immutable, interleaved PCM capture at a known sample rate.
///
/// Captures are shared between the host and any number of concurrent
/// analyses, so the sample storage is reference-counted; cloning a capture
/// never copies audio.
#[derive(Debug, Clone)]
pub struct AudioCapture {
    /// Opaque identifier echoed back in results.
    pub id: String,
    /// Interleaved f32 samples in [-1.0, 1.0], `channel_count` per frame.
    pub samples: Arc<[f32]>,
    /// Sample rate in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Interleaved channels per frame. `0` is tolerated and read as mono.
    pub channel_count: u16,
}

impl AudioCapture {
    pub fn new(
        id: impl Into<String>,
        samples: impl Into<Arc<[f32]>>,
        sample_rate: u32,
        channel_count: u16,
    ) -> Self {
        Self {
            id: id.into(),
            samples: samples.into(),
            sample_rate,
            channel_count,
        }
    }

    /// Number of whole interleaved frames in the capture.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channel_count.max(1) as usize
    }

    /// Returns the duration of this capture in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Returns true if the capture contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Collapses the interleaved samples to a single analysis channel.
    pub fn to_mono(&self) -> Vec<f32> {
        reduce_to_mono(&self.samples, self.channel_count)
    }
}

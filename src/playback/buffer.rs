//! Sample buffer shared between the producer pipeline and the output thread
//!
//! Holds interleaved stereo samples (32-bit left-justified, the pipeline's
//! working format) plus at most one pending track-boundary marker. The
//! boundary records where the current track's audio ends and which format
//! the next track plays in; extraction never reads across it, so one
//! extracted block never mixes two tracks.

use std::collections::VecDeque;

use crate::constants::DSD_SILENCE_WORD;
use crate::protocol::{PlaybackFormat, StreamVariant};

/// Pending track boundary inside the queue
#[derive(Debug, Clone, Copy)]
struct Boundary {
    /// Samples (not frames) of the old track still queued ahead of it
    remaining: usize,
    /// Format the new track plays in
    format: PlaybackFormat,
}

/// Frame queue with track-boundary tracking and silence fallback
pub struct SampleBuffer {
    samples: VecDeque<i32>,
    boundary: Option<Boundary>,
    frames_pushed: u64,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::new(),
            boundary: None,
            frames_pushed: 0,
        }
    }

    /// Queue interleaved stereo samples. Length must be even.
    pub fn push_frames(&mut self, samples: &[i32]) {
        debug_assert!(samples.len() % 2 == 0, "interleaved stereo expected");
        self.samples.extend(samples.iter().copied());
        self.frames_pushed += (samples.len() / 2) as u64;
    }

    /// Mark a track boundary at the current queue tail.
    ///
    /// Audio already queued belongs to the old track; everything pushed
    /// afterwards plays in `format`. Only one boundary can be pending; a
    /// second call before the first is crossed replaces it.
    pub fn begin_track(&mut self, format: PlaybackFormat) {
        if self.boundary.is_some() {
            tracing::warn!("track boundary replaced before the previous one was crossed");
        }
        self.boundary = Some(Boundary {
            remaining: self.samples.len(),
            format,
        });
    }

    /// Total queued frames
    pub fn available_frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Frames left before the pending boundary, if one is queued
    pub fn frames_until_boundary(&self) -> Option<usize> {
        self.boundary.map(|b| b.remaining / 2)
    }

    /// Consume the pending boundary, returning the new track's format.
    /// Must only be called once `frames_until_boundary()` reports zero.
    pub fn cross_boundary(&mut self) -> Option<PlaybackFormat> {
        match self.boundary {
            Some(b) if b.remaining == 0 => {
                self.boundary = None;
                Some(b.format)
            }
            _ => None,
        }
    }

    /// Move up to `frames` frames into `dst` (appended), never crossing a
    /// pending boundary. Returns the number of frames moved.
    pub fn read_into(&mut self, dst: &mut Vec<i32>, frames: usize) -> usize {
        let limit = self
            .frames_until_boundary()
            .unwrap_or(usize::MAX)
            .min(self.available_frames())
            .min(frames);
        let samples = limit * 2;
        dst.extend(self.samples.drain(..samples));
        if let Some(b) = self.boundary.as_mut() {
            b.remaining -= samples;
        }
        limit
    }

    /// Append `frames` frames of the silence pattern for `variant` to `dst`
    pub fn fill_silence(dst: &mut Vec<i32>, variant: StreamVariant, frames: usize) {
        let word = match variant {
            StreamVariant::Pcm => 0,
            _ => DSD_SILENCE_WORD,
        };
        dst.extend(std::iter::repeat(word).take(frames * 2));
    }

    /// Total frames ever pushed (statistics)
    pub fn frames_pushed(&self) -> u64 {
        self.frames_pushed
    }

    /// Drop all queued audio and any pending boundary
    pub fn clear(&mut self) {
        self.samples.clear();
        self.boundary = None;
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PcmFormat;

    fn frames(n: usize, value: i32) -> Vec<i32> {
        vec![value; n * 2]
    }

    #[test]
    fn test_read_respects_boundary() {
        let mut buf = SampleBuffer::new();
        buf.push_frames(&frames(4, 1));
        buf.begin_track(PlaybackFormat::pcm(48000, PcmFormat::S24_3Le));
        buf.push_frames(&frames(4, 2));

        assert_eq!(buf.available_frames(), 8);
        assert_eq!(buf.frames_until_boundary(), Some(4));

        // A large request still stops at the boundary
        let mut dst = Vec::new();
        assert_eq!(buf.read_into(&mut dst, 100), 4);
        assert!(dst.iter().all(|&s| s == 1));
        assert_eq!(buf.frames_until_boundary(), Some(0));

        // Nothing more until the boundary is crossed
        let mut dst = Vec::new();
        assert_eq!(buf.read_into(&mut dst, 100), 0);

        let format = buf.cross_boundary().unwrap();
        assert_eq!(format.sample_rate, 48000);

        let mut dst = Vec::new();
        assert_eq!(buf.read_into(&mut dst, 100), 4);
        assert!(dst.iter().all(|&s| s == 2));
    }

    #[test]
    fn test_cross_boundary_only_when_reached() {
        let mut buf = SampleBuffer::new();
        buf.push_frames(&frames(2, 1));
        buf.begin_track(PlaybackFormat::pcm(44100, PcmFormat::S16Le));
        assert!(buf.cross_boundary().is_none());

        let mut dst = Vec::new();
        buf.read_into(&mut dst, 2);
        assert!(buf.cross_boundary().is_some());
        assert!(buf.cross_boundary().is_none());
    }

    #[test]
    fn test_boundary_at_empty_queue() {
        let mut buf = SampleBuffer::new();
        buf.begin_track(PlaybackFormat::pcm(44100, PcmFormat::S16Le));
        assert_eq!(buf.frames_until_boundary(), Some(0));
        assert!(buf.cross_boundary().is_some());
    }

    #[test]
    fn test_silence_patterns() {
        let mut pcm = Vec::new();
        SampleBuffer::fill_silence(&mut pcm, StreamVariant::Pcm, 3);
        assert_eq!(pcm, vec![0; 6]);

        let mut dsd = Vec::new();
        SampleBuffer::fill_silence(&mut dsd, StreamVariant::DsdU32Le, 2);
        assert_eq!(dsd, vec![DSD_SILENCE_WORD; 4]);
    }
}

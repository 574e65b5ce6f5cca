//! Shared playback state
//!
//! One `parking_lot::Mutex` guards the whole of [`PlaybackShared`]: the
//! current format, the track-boundary flag, timing bookkeeping and the
//! sample queue. The producer pipeline mutates it; the output thread reads
//! it once per cycle and does all blocking writes after releasing the lock.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::output::convert::GAIN_UNITY;
use crate::playback::buffer::SampleBuffer;
use crate::protocol::PlaybackFormat;

/// Playback state read by the output thread under the shared lock
pub struct PlaybackState {
    /// Format of the audio currently leaving the buffer
    pub format: PlaybackFormat,
    /// Set when extraction crosses into a new track; cleared by the
    /// producer's reporting step via [`PlaybackShared::ack_track_started`]
    pub track_started: bool,
    /// While set, an empty buffer yields silence frames instead of idling
    pub playing: bool,
    /// Output thread keeps cycling while set; cleared under the lock
    pub running: bool,
    /// Invert playback polarity (DSD variants only)
    pub invert: bool,
    /// Left channel gain, 16.16 fixed point
    pub gain_left: i32,
    /// Right channel gain, 16.16 fixed point
    pub gain_right: i32,
    /// Frames handed to the sink so far
    pub frames_played: u64,
    /// Snapshot of `frames_played` taken at the last output cycle
    pub frames_reported: u64,
    /// Frames queued downstream of this driver (always 0 for a pipe sink)
    pub device_frames: u32,
    /// Timestamp of the last output cycle
    pub updated: Instant,
}

impl PlaybackState {
    pub fn new(format: PlaybackFormat) -> Self {
        Self {
            format,
            track_started: false,
            playing: false,
            running: false,
            invert: false,
            gain_left: GAIN_UNITY,
            gain_right: GAIN_UNITY,
            frames_played: 0,
            frames_reported: 0,
            device_frames: 0,
            updated: Instant::now(),
        }
    }
}

/// Everything guarded by the single shared playback lock
pub struct PlaybackShared {
    pub state: PlaybackState,
    pub buffer: SampleBuffer,
}

impl PlaybackShared {
    pub fn new(format: PlaybackFormat) -> Self {
        Self {
            state: PlaybackState::new(format),
            buffer: SampleBuffer::new(),
        }
    }

    /// Producer: announce a new track starting at the current queue tail
    pub fn begin_track(&mut self, format: PlaybackFormat) {
        self.buffer.begin_track(format);
    }

    /// Producer: queue interleaved stereo samples for the current track
    pub fn push_frames(&mut self, samples: &[i32]) {
        self.buffer.push_frames(samples);
    }

    /// Producer reporting step: clear the boundary flag once the new track
    /// has been reported downstream, re-arming boundary detection
    pub fn ack_track_started(&mut self) {
        self.state.track_started = false;
    }

    /// Producer: enable/disable silence fill on buffer underrun
    pub fn set_playing(&mut self, playing: bool) {
        self.state.playing = playing;
    }

    /// Producer: per-channel replay gain, 16.16 fixed point
    pub fn set_gain(&mut self, left: i32, right: i32) {
        self.state.gain_left = left;
        self.state.gain_right = right;
    }

    /// Producer: invert playback polarity (applied to DSD variants)
    pub fn set_invert(&mut self, invert: bool) {
        self.state.invert = invert;
    }
}

/// Handle shared between the producer pipeline and the output thread
pub type SharedPlayback = Arc<Mutex<PlaybackShared>>;

/// Create a new shared playback handle with the given initial format
pub fn create_shared(format: PlaybackFormat) -> SharedPlayback {
    Arc::new(Mutex::new(PlaybackShared::new(format)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PcmFormat;

    #[test]
    fn test_initial_state() {
        let shared = create_shared(PlaybackFormat::pcm(44100, PcmFormat::S32Le));
        let guard = shared.lock();
        assert!(!guard.state.running);
        assert!(!guard.state.track_started);
        assert!(!guard.state.playing);
        assert_eq!(guard.state.gain_left, GAIN_UNITY);
        assert_eq!(guard.buffer.available_frames(), 0);
    }

    #[test]
    fn test_ack_clears_boundary_flag() {
        let shared = create_shared(PlaybackFormat::pcm(44100, PcmFormat::S16Le));
        let mut guard = shared.lock();
        guard.state.track_started = true;
        guard.ack_track_started();
        assert!(!guard.state.track_started);
    }
}

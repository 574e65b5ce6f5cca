//! # Pipe Audio Out
//!
//! Output-stage driver for a streaming audio player: drains a shared,
//! lock-protected sample buffer at playback rate, packs samples into the
//! configured byte layout and pushes them to a downstream byte sink (a pipe
//! consumed by another process), signaling format changes in-band with a
//! fixed 16-byte header so gapless same-format tracks flow uninterrupted.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                       PRODUCER (pipeline thread)                     │
//! │   decode / resample / crossfade ──► push_frames() / begin_track()    │
//! └───────────────────────────────┬──────────────────────────────────────┘
//!                                 │ single shared lock
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │             PlaybackShared (playback::state + playback::buffer)      │
//! │   PlaybackState: format, track_started, gains, timing bookkeeping    │
//! │   SampleBuffer:  interleaved frames + track-boundary marker          │
//! └───────────────────────────────┬──────────────────────────────────────┘
//!                                 │ bounded extraction (under lock)
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                  PipeDriver output thread (output::driver)           │
//! │   extract ─► DoP/DSD transforms ─► gain + pack ─► local byte buffer  │
//! │   GaplessTracker ─► FormatHeader (only on real format changes)       │
//! │   blocking writes OUTSIDE the lock:                                  │
//! │      [old-track audio] [header if format changed] [new-track audio]  │
//! └───────────────────────────────┬──────────────────────────────────────┘
//!                                 │
//!                                 ▼
//!                   byte sink (stdout / pipe / any Write)
//! ```

pub mod config;
pub mod error;
pub mod output;
pub mod playback;
pub mod protocol;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default sample rate when the configured rate table is empty
    pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

    /// Channel count (this driver is stereo-only)
    pub const DEFAULT_CHANNELS: u8 = 2;

    /// Maximum frames extracted from the shared buffer per cycle
    pub const FRAME_BLOCK: usize = 2048;

    /// Widest supported output layout: 2 channels x 4 bytes
    pub const MAX_BYTES_PER_FRAME: usize = 8;

    /// Default idle interval between empty cycles, in milliseconds.
    /// Tunable via [`crate::config::OutputConfig::idle_interval_ms`].
    pub const DEFAULT_IDLE_INTERVAL_MS: u64 = 10;

    /// DSD idle pattern used for DoP / native DSD silence
    pub const DSD_SILENCE_WORD: i32 = 0x69696969_u32 as i32;
}

//! Shared playback state and sample buffer
//!
//! Everything the producer pipeline and the output thread exchange lives
//! behind one mutual-exclusion lock: the current playback format, the
//! track-boundary flag, timing bookkeeping and the frame queue. Blocking
//! I/O never happens while this lock is held.

pub mod buffer;
pub mod state;

pub use buffer::SampleBuffer;
pub use state::{create_shared, PlaybackShared, PlaybackState, SharedPlayback};

//! Output scheduling loop and driver lifecycle
//!
//! A single dedicated thread drives the whole output cycle: acquire the
//! shared lock, extract and convert one bounded frame block, run the gapless
//! tracker, release the lock, then perform the blocking sink writes. The
//! lock is never held across a write or flush, so a stalled sink can never
//! stall the producer pipeline.
//!
//! Stream ordering guarantee: for two format regions A (ending) and B
//! (beginning), every audio byte of A precedes B's header, which precedes
//! every audio byte of B. The cycle writes buffered audio before any pending
//! header, and extraction yields zero frames on the cycle that crosses a
//! track boundary, so B's audio can only start on the following cycle.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error, info};

use crate::config::OutputConfig;
use crate::constants::MAX_BYTES_PER_FRAME;
use crate::error::{Error, OutputError};
use crate::output::convert::{self, DopMarker, GAIN_UNITY};
use crate::output::gapless::GaplessTracker;
use crate::playback::{PlaybackShared, SampleBuffer, SharedPlayback};
use crate::protocol::{PcmFormat, StreamVariant, HEADER_LEN};

/// Output thread counters, shared with the driver handle
#[derive(Default)]
pub struct DriverStats {
    blocks_written: AtomicU64,
    bytes_written: AtomicU64,
    headers_written: AtomicU64,
    silence_frames: AtomicU64,
}

impl DriverStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            headers_written: self.headers_written.load(Ordering::Relaxed),
            silence_frames: self.silence_frames.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DriverStats`]
#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub blocks_written: u64,
    pub bytes_written: u64,
    pub headers_written: u64,
    pub silence_frames: u64,
}

/// Output-stage driver: owns the dedicated output thread
pub struct PipeDriver {
    shared: SharedPlayback,
    thread_handle: Option<JoinHandle<()>>,
    error_rx: Option<Receiver<OutputError>>,
    stats: Arc<DriverStats>,
}

impl PipeDriver {
    /// Allocate the thread-local buffers, apply the configured output
    /// format and launch the scheduling loop on a dedicated thread.
    ///
    /// The sink is any ordered byte stream; writes to it block the output
    /// thread only, never the producer side of `shared`.
    pub fn start<W>(shared: SharedPlayback, sink: W, config: &OutputConfig) -> Result<Self, Error>
    where
        W: Write + Send + 'static,
    {
        let frame_block = config.frame_block.max(1);
        let pcm_format = config.pcm_format();
        let initial_rate = config.initial_rate();

        info!(
            "init pipe output: {} bit, {} Hz, block {} frames",
            pcm_format.bit_depth(),
            initial_rate,
            frame_block
        );

        let buf_bytes = frame_block * MAX_BYTES_PER_FRAME;
        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(buf_bytes)
            .map_err(|_| OutputError::BufferAlloc(buf_bytes))?;
        let mut scratch: Vec<i32> = Vec::new();
        scratch
            .try_reserve_exact(frame_block * 2)
            .map_err(|_| OutputError::BufferAlloc(frame_block * 2 * 4))?;

        {
            let mut guard = shared.lock();
            guard.state.format.pcm = pcm_format;
            guard.state.format.sample_rate = initial_rate;
            guard.state.running = true;
        }

        let (error_tx, error_rx) = bounded::<OutputError>(16);
        let stats = Arc::new(DriverStats::default());

        let worker = OutputWorker {
            shared: shared.clone(),
            sink,
            buf,
            scratch,
            frame_block,
            idle: config.idle_interval(),
            gapless: GaplessTracker::new(),
            dop: DopMarker::new(),
            stats: stats.clone(),
            error_tx,
        };

        let handle = thread::Builder::new()
            .name("pipe-output".to_string())
            .spawn(move || worker.run())
            .map_err(|e| OutputError::ThreadSpawn(e.to_string()))?;

        Ok(Self {
            shared,
            thread_handle: Some(handle),
            error_rx: Some(error_rx),
            stats,
        })
    }

    /// Clear the running flag under the lock and join the output thread.
    /// Bytes still buffered are dropped; playback is ending.
    pub fn stop(&mut self) {
        info!("close pipe output");
        self.shared.lock().state.running = false;
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Whether the output thread is still cycling
    pub fn is_running(&self) -> bool {
        self.shared.lock().state.running
    }

    /// Check for a fatal sink error reported by the output thread
    pub fn check_errors(&self) -> Option<OutputError> {
        self.error_rx.as_ref().and_then(|rx| rx.try_recv().ok())
    }

    /// Get output statistics
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for PipeDriver {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}

/// State owned by the output thread; nothing here needs synchronization
struct OutputWorker<W> {
    shared: SharedPlayback,
    sink: W,
    /// Converted audio bytes produced under the lock, written after release
    buf: Vec<u8>,
    /// Extraction scratch, interleaved i32 samples
    scratch: Vec<i32>,
    frame_block: usize,
    idle: Duration,
    gapless: GaplessTracker,
    dop: DopMarker,
    stats: Arc<DriverStats>,
    error_tx: Sender<OutputError>,
}

impl<W: Write> OutputWorker<W> {
    fn run(mut self) {
        let shared = Arc::clone(&self.shared);
        loop {
            // Phase 1, under the lock: bookkeeping, bounded extraction,
            // boundary detection. No blocking I/O in here.
            let header = {
                let mut shared = shared.lock();
                if !shared.state.running {
                    break;
                }
                shared.state.device_frames = 0;
                shared.state.updated = Instant::now();
                shared.state.frames_reported = shared.state.frames_played;

                self.extract_block(&mut shared);
                self.gapless.observe(&shared.state)
            };

            // Phase 2, lock released: blocking writes.
            if !self.gapless.first_track_seen() {
                // The consumer's first bytes must be a format header, so
                // anything extracted before the first track is discarded.
                self.buf.clear();
                thread::sleep(self.idle);
                continue;
            }

            let mut wrote = false;

            // Old-track tail always goes out before a pending header
            if !self.buf.is_empty() {
                let len = self.buf.len();
                match self.write_all_flush_buf() {
                    Ok(()) => {
                        self.stats.blocks_written.fetch_add(1, Ordering::Relaxed);
                        self.stats.bytes_written.fetch_add(len as u64, Ordering::Relaxed);
                        wrote = true;
                    }
                    Err(e) => {
                        self.fail(e);
                        break;
                    }
                }
            }

            if let Some(header) = header {
                let raw = header.encode();
                if let Err(e) = self.sink.write_all(&raw).and_then(|_| self.sink.flush()) {
                    self.fail(e);
                    break;
                }
                self.stats.headers_written.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .bytes_written
                    .fetch_add(HEADER_LEN as u64, Ordering::Relaxed);
                debug!(
                    "format header written: {} Hz, {} bit, variant {}",
                    header.sample_rate, header.bit_depth, header.variant_code
                );
                wrote = true;
            }

            if !wrote {
                thread::sleep(self.idle);
            }
        }

        debug!("output thread exiting");
    }

    /// Pull up to one frame block from the shared buffer into the local
    /// byte buffer. Runs under the shared lock; bounded, no blocking I/O.
    fn extract_block(&mut self, shared: &mut PlaybackShared) {
        // Crossing a boundary extracts nothing this cycle, so new-track
        // audio can only follow the header emitted for it.
        if shared.buffer.frames_until_boundary() == Some(0) {
            if let Some(format) = shared.buffer.cross_boundary() {
                // The pipeline may ack the previous boundary and queue the
                // next one between two cycles, so no cycle ever sees the
                // flag clear; re-arm the tracker here in that case.
                if !shared.state.track_started {
                    self.gapless.boundary_cleared();
                }
                debug!(
                    "track boundary: {} Hz, {} bit, variant {}",
                    format.sample_rate,
                    format.bit_depth(),
                    format.variant.code()
                );
                shared.state.format = format;
                shared.state.track_started = true;
            }
            return;
        }

        let variant = shared.state.format.variant;
        let invert = shared.state.invert;

        self.scratch.clear();
        let mut silence = false;
        let mut frames = shared.buffer.read_into(&mut self.scratch, self.frame_block);
        if frames == 0 {
            if !shared.state.playing || !self.gapless.first_track_seen() {
                return;
            }
            // Underrun while playing: keep the consumer fed with silence
            SampleBuffer::fill_silence(&mut self.scratch, variant, self.frame_block);
            frames = self.frame_block;
            silence = true;
            self.stats
                .silence_frames
                .fetch_add(frames as u64, Ordering::Relaxed);
        }

        match variant {
            StreamVariant::Dop => {
                convert::insert_dop_markers(&mut self.scratch, &mut self.dop, invert && !silence);
            }
            StreamVariant::DsdU32Le | StreamVariant::DsdU32Be => {
                if invert && !silence {
                    convert::invert_dsd(&mut self.scratch);
                }
            }
            StreamVariant::Pcm => {}
        }

        // DSD words must stay bit-exact: fixed 32-bit layout, unity gain
        let (pack_format, gain_left, gain_right) = if variant.is_dsd() {
            (PcmFormat::S32Le, GAIN_UNITY, GAIN_UNITY)
        } else {
            (
                shared.state.format.pcm,
                shared.state.gain_left,
                shared.state.gain_right,
            )
        };

        convert::pack_frames(&mut self.buf, &self.scratch, pack_format, gain_left, gain_right);
        shared.state.frames_played += frames as u64;
    }

    fn write_all_flush_buf(&mut self) -> io::Result<()> {
        self.sink.write_all(&self.buf)?;
        self.sink.flush()?;
        self.buf.clear();
        Ok(())
    }

    /// Sink failure policy: fatal. Report, clear the running flag, exit.
    /// A closed pipe is a normal end of playback and not reported.
    fn fail(&mut self, err: io::Error) {
        if err.kind() == io::ErrorKind::BrokenPipe {
            info!("downstream closed the pipe, stopping output");
        } else {
            error!("sink write failed, stopping output: {}", err);
            let _ = self
                .error_tx
                .try_send(OutputError::SinkWrite(err.to_string()));
        }
        self.shared.lock().state.running = false;
    }
}

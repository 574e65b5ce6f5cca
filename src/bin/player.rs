//! Demo player
//!
//! Synthesizes a short gapless track sequence and streams it to stdout:
//! 44100/16 PCM, a second 44100/16 track (no header between them), then a
//! 48000/24 track announced by a new in-band header. Pipe the output to a
//! consumer that understands the 16-byte format headers, e.g.
//!
//! ```text
//! RUST_LOG=debug cargo run --bin player > stream.raw
//! ```
//!
//! All logging goes to stderr; stdout carries the audio stream.

use anyhow::Result;
use std::f32::consts::TAU;
use std::io;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipe_audio_out::{
    config::AppConfig,
    output::PipeDriver,
    playback::{create_shared, SharedPlayback},
    protocol::{PcmFormat, PlaybackFormat},
};

/// Frames pushed per pacing step
const CHUNK_FRAMES: usize = 1024;

/// Full-scale sine amplitude, kept conservative
const AMPLITUDE: f32 = 0.25;

struct DemoTrack {
    label: &'static str,
    format: PlaybackFormat,
    tone_hz: f32,
    seconds: f32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is the audio stream, so logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    tracing::info!("Starting pipe audio player");

    let config = AppConfig::load(None).unwrap_or_default();

    let initial = PlaybackFormat::pcm(config.output.initial_rate(), config.output.pcm_format());
    let shared = create_shared(initial);
    let mut driver = PipeDriver::start(shared.clone(), io::stdout(), &config.output)?;

    let tracks = [
        DemoTrack {
            label: "track A (44100/16)",
            format: PlaybackFormat::pcm(44100, PcmFormat::S16Le),
            tone_hz: 440.0,
            seconds: 2.0,
        },
        DemoTrack {
            label: "track B (44100/16, gapless)",
            format: PlaybackFormat::pcm(44100, PcmFormat::S16Le),
            tone_hz: 880.0,
            seconds: 2.0,
        },
        DemoTrack {
            label: "track C (48000/24)",
            format: PlaybackFormat::pcm(48000, PcmFormat::S24_3Le),
            tone_hz: 660.0,
            seconds: 2.0,
        },
    ];

    let mut last_log = Instant::now();

    for track in &tracks {
        tracing::info!("{}: {:.1} Hz tone for {}s", track.label, track.tone_hz, track.seconds);
        shared.lock().begin_track(track.format);

        let rate = track.format.sample_rate;
        let total_frames = (track.seconds * rate as f32) as usize;
        let chunk_duration = Duration::from_secs_f32(CHUNK_FRAMES as f32 / rate as f32);
        let phase_step = TAU * track.tone_hz / rate as f32;
        let mut phase = 0.0f32;
        let mut pushed = 0usize;
        let mut acked = false;

        while pushed < total_frames {
            if !driver.is_running() {
                break;
            }

            let frames = CHUNK_FRAMES.min(total_frames - pushed);
            let mut chunk = Vec::with_capacity(frames * 2);
            for _ in 0..frames {
                let sample = ((phase.sin() * AMPLITUDE) * i32::MAX as f32) as i32;
                phase = (phase + phase_step) % TAU;
                chunk.push(sample);
                chunk.push(sample);
            }

            {
                let mut guard = shared.lock();
                guard.push_frames(&chunk);
                // Reporting step: clear the boundary flag once the driver
                // has picked up this track's start
                if !acked && guard.state.track_started {
                    guard.ack_track_started();
                    acked = true;
                }
            }
            pushed += frames;

            if last_log.elapsed() >= Duration::from_secs(1) {
                let stats = driver.stats();
                tracing::info!(
                    "Stats: {} blocks, {:.1} KB, {} headers written",
                    stats.blocks_written,
                    stats.bytes_written as f64 / 1024.0,
                    stats.headers_written
                );
                last_log = Instant::now();
            }

            tokio::time::sleep(chunk_duration).await;
        }

        ack_when_started(&shared, &mut acked);
    }

    // Let the driver drain what the tracks queued
    while driver.is_running() && shared.lock().buffer.available_frames() > 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let stats = driver.stats();
    tracing::info!(
        "Done: {} blocks, {} bytes, {} headers",
        stats.blocks_written,
        stats.bytes_written,
        stats.headers_written
    );

    driver.stop();
    if let Some(err) = driver.check_errors() {
        tracing::warn!("output stopped with error: {}", err);
    }

    Ok(())
}

/// Very short tracks can finish pushing before the driver crosses the
/// boundary; make sure the reporting step still runs
fn ack_when_started(shared: &SharedPlayback, acked: &mut bool) {
    if *acked {
        return;
    }
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        let mut guard = shared.lock();
        if guard.state.track_started {
            guard.ack_track_started();
            *acked = true;
            return;
        }
        drop(guard);
        std::thread::sleep(Duration::from_millis(2));
    }
}

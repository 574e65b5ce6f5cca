//! Per-frame conversion: gain, variant transforms, scale-and-pack
//!
//! Samples arrive as 32-bit left-justified stereo words. PCM frames get the
//! per-channel gain applied and are scaled down to the output layout with
//! explicit little-endian writes. DoP frames get their alternating marker
//! byte injected; native DSD frames pass through bit-exact apart from
//! optional polarity inversion. Everything here is pure computation with no
//! blocking I/O, so it is safe to run while the shared lock is held.

use bytes::BufMut;

use crate::protocol::PcmFormat;

/// Unity gain in 16.16 fixed point
pub const GAIN_UNITY: i32 = 1 << 16;

/// DoP marker byte for even frames
const DOP_MARKER_A: u32 = 0x05;
/// DoP marker byte for odd frames
const DOP_MARKER_B: u32 = 0xFA;

#[inline]
fn apply_gain(sample: i32, gain: i32) -> i32 {
    ((sample as i64 * gain as i64) >> 16) as i32
}

/// Scale interleaved stereo samples and pack them into `dst` in the given
/// layout. Samples are 32-bit left-justified; gains are 16.16 fixed point.
pub fn pack_frames<B: BufMut>(
    dst: &mut B,
    samples: &[i32],
    format: PcmFormat,
    gain_left: i32,
    gain_right: i32,
) {
    debug_assert!(samples.len() % 2 == 0, "interleaved stereo expected");

    for frame in samples.chunks_exact(2) {
        let left = apply_gain(frame[0], gain_left);
        let right = apply_gain(frame[1], gain_right);

        match format {
            PcmFormat::S16Le => {
                dst.put_i16_le((left >> 16) as i16);
                dst.put_i16_le((right >> 16) as i16);
            }
            PcmFormat::S24_3Le => {
                dst.put_slice(&(left >> 8).to_le_bytes()[..3]);
                dst.put_slice(&(right >> 8).to_le_bytes()[..3]);
            }
            PcmFormat::S32Le => {
                dst.put_i32_le(left);
                dst.put_i32_le(right);
            }
        }
    }
}

/// Alternating DoP marker phase, carried across extraction blocks so the
/// marker sequence stays unbroken at block boundaries
pub struct DopMarker {
    phase: bool,
}

impl DopMarker {
    pub fn new() -> Self {
        Self { phase: false }
    }

    #[inline]
    fn next(&mut self) -> u32 {
        let marker = if self.phase { DOP_MARKER_B } else { DOP_MARKER_A };
        self.phase = !self.phase;
        marker
    }
}

impl Default for DopMarker {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrite each 32-bit word as a DoP frame: marker in bits 24-31, the 16
/// DSD bits (taken from the word's top half) in bits 8-23. Both channels of
/// a frame carry the same marker; the marker alternates per frame.
pub fn insert_dop_markers(samples: &mut [i32], marker: &mut DopMarker, invert: bool) {
    for frame in samples.chunks_exact_mut(2) {
        let m = marker.next();
        for sample in frame {
            let mut bits = ((*sample as u32) >> 8) & 0x00FF_FF00;
            if invert {
                bits = !bits & 0x00FF_FF00;
            }
            *sample = ((m << 24) | bits) as i32;
        }
    }
}

/// Invert native DSD playback polarity by complementing every bit
pub fn invert_dsd(samples: &mut [i32]) {
    for sample in samples {
        *sample = !*sample;
    }
}

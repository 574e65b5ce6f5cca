//! In-band format signaling protocol
//!
//! The byte sink carries raw packed audio with no side channel, so the audio
//! format is announced in-band: a fixed 16-byte header precedes the first
//! audio of every format region. Same-format gapless tracks flow without any
//! header. The consumer reads exactly [`HEADER_LEN`] bytes at stream start
//! and after every announced format boundary; all other bytes are audio in
//! the previously announced layout.
//!
//! Wire layout (packed, no padding, endian-exact):
//!
//! | offset | field         | encoding                                  |
//! |--------|---------------|-------------------------------------------|
//! | 0-3    | magic         | ASCII `"SQFH"`                            |
//! | 4      | version       | u8, currently 1                           |
//! | 5      | channel count | u8, fixed at 2                            |
//! | 6      | bit depth     | u8: 16/24/32 PCM, 24 DoP, 1 native DSD    |
//! | 7      | variant code  | u8: 0=PCM, 1=DoP, 2=DSD LE, 3=DSD BE      |
//! | 8-11   | sample rate   | u32 little-endian, Hz                     |
//! | 12-15  | reserved      | zero-filled                               |

use bytes::{Buf, BufMut};

use crate::constants::DEFAULT_CHANNELS;
use crate::error::FormatError;

/// Header magic constant
pub const HEADER_MAGIC: [u8; 4] = *b"SQFH";

/// Current protocol version
pub const HEADER_VERSION: u8 = 1;

/// Fixed header size in bytes
pub const HEADER_LEN: usize = 16;

/// PCM output sample layout (stereo interleaved, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmFormat {
    /// 16-bit signed
    S16Le,
    /// 24-bit signed, 3 bytes per sample
    S24_3Le,
    /// 32-bit signed
    S32Le,
}

impl PcmFormat {
    pub fn bit_depth(&self) -> u8 {
        match self {
            PcmFormat::S16Le => 16,
            PcmFormat::S24_3Le => 24,
            PcmFormat::S32Le => 32,
        }
    }

    /// Bytes per stereo frame in this layout
    pub fn bytes_per_frame(&self) -> usize {
        match self {
            PcmFormat::S16Le => 2 * 2,
            PcmFormat::S24_3Le => 3 * 2,
            PcmFormat::S32Le => 4 * 2,
        }
    }
}

/// Stream variant: plain PCM, DSD-over-PCM, or native DSD in u32 words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamVariant {
    Pcm,
    Dop,
    DsdU32Le,
    DsdU32Be,
}

impl StreamVariant {
    /// Wire code carried in the header
    pub fn code(&self) -> u8 {
        match self {
            StreamVariant::Pcm => 0,
            StreamVariant::Dop => 1,
            StreamVariant::DsdU32Le => 2,
            StreamVariant::DsdU32Be => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, FormatError> {
        match code {
            0 => Ok(StreamVariant::Pcm),
            1 => Ok(StreamVariant::Dop),
            2 => Ok(StreamVariant::DsdU32Le),
            3 => Ok(StreamVariant::DsdU32Be),
            other => Err(FormatError::UnknownVariant(other)),
        }
    }

    pub fn is_dsd(&self) -> bool {
        !matches!(self, StreamVariant::Pcm)
    }
}

/// Complete description of the current playback format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackFormat {
    /// Sample/frame rate in Hz
    pub sample_rate: u32,
    /// PCM sub-format; only meaningful while `variant` is PCM
    pub pcm: PcmFormat,
    /// Active stream variant
    pub variant: StreamVariant,
}

impl PlaybackFormat {
    pub fn pcm(sample_rate: u32, pcm: PcmFormat) -> Self {
        Self {
            sample_rate,
            pcm,
            variant: StreamVariant::Pcm,
        }
    }

    pub fn dsd(sample_rate: u32, variant: StreamVariant) -> Self {
        debug_assert!(variant.is_dsd());
        Self {
            sample_rate,
            pcm: PcmFormat::S32Le,
            variant,
        }
    }

    /// Announced bit depth: PCM takes it from the sub-format, DoP and native
    /// DSD carry fixed depths
    pub fn bit_depth(&self) -> u8 {
        match self.variant {
            StreamVariant::Pcm => self.pcm.bit_depth(),
            StreamVariant::Dop => 24,
            StreamVariant::DsdU32Le | StreamVariant::DsdU32Be => 1,
        }
    }
}

/// The {sample rate, bit depth, variant code} triple compared across track
/// boundaries to decide whether a header must be emitted
pub type FormatSignature = (u32, u8, u8);

/// Fixed 16-byte in-band format descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version: u8,
    pub channels: u8,
    pub bit_depth: u8,
    pub variant_code: u8,
    pub sample_rate: u32,
}

impl FormatHeader {
    /// Build a header from the current playback format.
    ///
    /// Pure and deterministic: identical formats yield byte-identical
    /// headers. Callers must hold the shared playback lock while reading the
    /// format this is built from.
    pub fn build(format: &PlaybackFormat) -> Self {
        Self {
            version: HEADER_VERSION,
            channels: DEFAULT_CHANNELS,
            bit_depth: format.bit_depth(),
            variant_code: format.variant.code(),
            sample_rate: format.sample_rate,
        }
    }

    /// Gapless comparison key
    pub fn signature(&self) -> FormatSignature {
        (self.sample_rate, self.bit_depth, self.variant_code)
    }

    /// Encode into the fixed wire layout, field by field at fixed offsets
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut raw = [0u8; HEADER_LEN];
        let mut buf = &mut raw[..];
        buf.put_slice(&HEADER_MAGIC);
        buf.put_u8(self.version);
        buf.put_u8(self.channels);
        buf.put_u8(self.bit_depth);
        buf.put_u8(self.variant_code);
        buf.put_u32_le(self.sample_rate);
        // offsets 12-15 stay reserved / zero
        raw
    }

    /// Decode a header read from the stream
    pub fn decode(raw: &[u8]) -> Result<Self, FormatError> {
        if raw.len() < HEADER_LEN {
            return Err(FormatError::Truncated(raw.len()));
        }
        let mut buf = &raw[..HEADER_LEN];
        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        if magic != HEADER_MAGIC {
            return Err(FormatError::BadMagic);
        }
        let version = buf.get_u8();
        if version != HEADER_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }
        let channels = buf.get_u8();
        let bit_depth = buf.get_u8();
        let variant_code = buf.get_u8();
        StreamVariant::from_code(variant_code)?;
        let sample_rate = buf.get_u32_le();
        Ok(Self {
            version,
            channels,
            bit_depth,
            variant_code,
            sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_wire_layout() {
        let format = PlaybackFormat::pcm(44100, PcmFormat::S16Le);
        let raw = FormatHeader::build(&format).encode();

        let expected: [u8; 16] = [
            b'S', b'Q', b'F', b'H', // magic
            1,    // version
            2,    // channels
            16,   // bit depth
            0,    // variant: PCM
            0x44, 0xAC, 0x00, 0x00, // 44100 LE
            0, 0, 0, 0, // reserved
        ];
        assert_eq!(raw, expected);
    }

    #[test]
    fn test_header_determinism() {
        let format = PlaybackFormat::dsd(88200, StreamVariant::Dop);
        let a = FormatHeader::build(&format).encode();
        let b = FormatHeader::build(&format).encode();
        assert_eq!(a, b);
    }

    #[test]
    fn test_variant_bit_depths() {
        assert_eq!(PlaybackFormat::pcm(48000, PcmFormat::S24_3Le).bit_depth(), 24);
        assert_eq!(PlaybackFormat::pcm(48000, PcmFormat::S32Le).bit_depth(), 32);
        assert_eq!(PlaybackFormat::dsd(176400, StreamVariant::Dop).bit_depth(), 24);
        assert_eq!(PlaybackFormat::dsd(2822400, StreamVariant::DsdU32Le).bit_depth(), 1);
        assert_eq!(PlaybackFormat::dsd(2822400, StreamVariant::DsdU32Be).bit_depth(), 1);
    }

    #[test]
    fn test_decode_roundtrip() {
        let format = PlaybackFormat::pcm(192000, PcmFormat::S24_3Le);
        let header = FormatHeader::build(&format);
        let decoded = FormatHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.signature(), (192000, 24, 0));
    }

    #[test]
    fn test_decode_errors() {
        let good = FormatHeader::build(&PlaybackFormat::pcm(44100, PcmFormat::S16Le)).encode();

        assert_eq!(FormatHeader::decode(&good[..8]), Err(FormatError::Truncated(8)));

        let mut bad_magic = good;
        bad_magic[0] = b'X';
        assert_eq!(FormatHeader::decode(&bad_magic), Err(FormatError::BadMagic));

        let mut bad_version = good;
        bad_version[4] = 9;
        assert_eq!(
            FormatHeader::decode(&bad_version),
            Err(FormatError::UnsupportedVersion(9))
        );

        let mut bad_variant = good;
        bad_variant[7] = 7;
        assert_eq!(
            FormatHeader::decode(&bad_variant),
            Err(FormatError::UnknownVariant(7))
        );
    }
}

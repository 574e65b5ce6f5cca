//! Gapless transition tracking
//!
//! Owned exclusively by the output thread, so no locking of its own. Once
//! per observed track boundary it decides whether the format actually
//! changed and a header must go out. Same-format consecutive tracks emit
//! nothing, which is what lets them flow as one uninterrupted byte stream.
//! The very first track always emits, so the consumer's first bytes are
//! always a header.

use crate::playback::PlaybackState;
use crate::protocol::{FormatHeader, FormatSignature};

/// Per-track header emission state machine
pub struct GaplessTracker {
    /// At least one track boundary has ever been observed
    first_track_seen: bool,
    /// Boundary handled for the currently starting track; re-armed when the
    /// shared flag clears
    header_emitted: bool,
    /// Signature of the last header actually written
    last_emitted: Option<FormatSignature>,
}

impl GaplessTracker {
    pub fn new() -> Self {
        Self {
            first_track_seen: false,
            header_emitted: false,
            last_emitted: None,
        }
    }

    /// Run once per output cycle while the shared lock is held.
    ///
    /// Returns the header to write after this cycle's audio, or `None` when
    /// no boundary is pending or the format is unchanged (gapless).
    pub fn observe(&mut self, state: &PlaybackState) -> Option<FormatHeader> {
        let mut pending = None;

        if state.track_started && !self.header_emitted {
            let header = FormatHeader::build(&state.format);
            let signature = header.signature();

            if !self.first_track_seen || self.last_emitted != Some(signature) {
                self.last_emitted = Some(signature);
                pending = Some(header);
            }

            self.first_track_seen = true;
            self.header_emitted = true;
        }

        if !state.track_started {
            // Pipeline has advanced past the boundary; arm for the next one
            self.header_emitted = false;
        }

        pending
    }

    /// The shared boundary flag was observed clear; arm detection for the
    /// next track. Also happens implicitly in [`observe`](Self::observe)
    /// whenever a cycle sees the flag down.
    pub fn boundary_cleared(&mut self) {
        self.header_emitted = false;
    }

    /// False until the first track boundary is observed; while false the
    /// driver discards extracted bytes so no audio precedes the first header
    pub fn first_track_seen(&self) -> bool {
        self.first_track_seen
    }
}

impl Default for GaplessTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PcmFormat, PlaybackFormat, StreamVariant};
    use proptest::prelude::*;

    fn state_with(format: PlaybackFormat, track_started: bool) -> PlaybackState {
        let mut state = PlaybackState::new(format);
        state.track_started = track_started;
        state
    }

    #[test]
    fn test_first_track_always_emits() {
        let mut tracker = GaplessTracker::new();
        assert!(!tracker.first_track_seen());

        let state = state_with(PlaybackFormat::dsd(88200, StreamVariant::Dop), true);
        let header = tracker.observe(&state).expect("first track must emit");
        assert_eq!(header.signature(), (88200, 24, 1));
        assert!(tracker.first_track_seen());
    }

    #[test]
    fn test_no_reemission_while_boundary_flag_set() {
        let mut tracker = GaplessTracker::new();
        let state = state_with(PlaybackFormat::pcm(44100, PcmFormat::S16Le), true);
        assert!(tracker.observe(&state).is_some());
        // Flag still set in later cycles: no second header
        assert!(tracker.observe(&state).is_none());
        assert!(tracker.observe(&state).is_none());
    }

    #[test]
    fn test_gapless_suppression() {
        let mut tracker = GaplessTracker::new();
        let format = PlaybackFormat::pcm(44100, PcmFormat::S16Le);

        assert!(tracker.observe(&state_with(format, true)).is_some());
        // Boundary clears, next same-format track begins
        tracker.observe(&state_with(format, false));
        assert!(tracker.observe(&state_with(format, true)).is_none());
    }

    #[test]
    fn test_format_change_emits_once() {
        let mut tracker = GaplessTracker::new();
        let a = PlaybackFormat::pcm(44100, PcmFormat::S16Le);
        let c = PlaybackFormat::pcm(48000, PcmFormat::S24_3Le);

        assert!(tracker.observe(&state_with(a, true)).is_some());
        tracker.observe(&state_with(a, false));

        let header = tracker.observe(&state_with(c, true)).expect("change must emit");
        assert_eq!(header.signature(), (48000, 24, 0));
        assert!(tracker.observe(&state_with(c, true)).is_none());
    }

    #[test]
    fn test_idle_observes_nothing() {
        let mut tracker = GaplessTracker::new();
        let state = state_with(PlaybackFormat::pcm(44100, PcmFormat::S32Le), false);
        for _ in 0..10 {
            assert!(tracker.observe(&state).is_none());
        }
        assert!(!tracker.first_track_seen());
    }

    fn arb_format() -> impl Strategy<Value = PlaybackFormat> {
        (
            prop_oneof![Just(44100u32), Just(48000), Just(88200), Just(96000)],
            prop_oneof![
                Just(PcmFormat::S16Le),
                Just(PcmFormat::S24_3Le),
                Just(PcmFormat::S32Le)
            ],
            prop_oneof![
                Just(StreamVariant::Pcm),
                Just(StreamVariant::Dop),
                Just(StreamVariant::DsdU32Le),
                Just(StreamVariant::DsdU32Be)
            ],
        )
            .prop_map(|(sample_rate, pcm, variant)| PlaybackFormat {
                sample_rate,
                pcm,
                variant,
            })
    }

    proptest! {
        /// Emitted headers are exactly the consecutive-dedup of the track
        /// format sequence, with the first track always announced.
        #[test]
        fn prop_emissions_match_format_changes(formats in prop::collection::vec(arb_format(), 1..20)) {
            let mut tracker = GaplessTracker::new();
            let mut emitted = Vec::new();

            for format in &formats {
                if let Some(header) = tracker.observe(&state_with(*format, true)) {
                    emitted.push(header.signature());
                }
                tracker.observe(&state_with(*format, false));
            }

            let mut expected = Vec::new();
            for format in &formats {
                let sig = FormatHeader::build(format).signature();
                if expected.last() != Some(&sig) {
                    expected.push(sig);
                }
            }

            prop_assert_eq!(emitted, expected);
        }
    }
}

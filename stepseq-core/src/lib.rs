#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

#[macro_use]
mod fmt;

mod edge;
mod engine;
mod midi;
mod pattern;
mod shared;
mod tempo;

pub use edge::{EdgeDetector, Flags, Pull, PullConfig};
pub use engine::{Cursor, Sequencer, Timer};
pub use midi::{MidiOut, NoteOn, SerialMidi};
pub use pattern::{Field, Note, Patterns, SeqIndex, Sequence, Slot, Step, Track, TrackIndex};
pub use shared::Shared;
pub use tempo::{timer_reload, Timebase};

/// 16th steps per bar
pub const NUM_STEPS: usize = 16;
pub const NUM_TRACKS: usize = 8;
pub const NUM_SEQ: usize = 2;

pub const DEFAULT_BPM: u8 = 120;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    ZeroTempo,
    /// step period overflows the timer
    TempoTooSlow,
    /// step period shorter than one timer tick
    TempoTooFast,
    SequenceOutOfRange,
    TrackOutOfRange,
    StepOutOfRange,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::ZeroTempo => f.write_str("tempo must be non-zero"),
            Error::TempoTooSlow => f.write_str("tempo too slow for timer width"),
            Error::TempoTooFast => f.write_str("tempo too fast for timer resolution"),
            Error::SequenceOutOfRange => f.write_str("sequence index out of range"),
            Error::TrackOutOfRange => f.write_str("track index out of range"),
            Error::StepOutOfRange => f.write_str("step index out of range"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

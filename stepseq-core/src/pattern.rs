//! note grid data types

use crate::{Error, NUM_SEQ, NUM_STEPS, NUM_TRACKS};

const MIDI_MAX: u8 = 0x7f;

/// generates a range-checked index newtype over `0..$len`
macro_rules! index {
    ($(#[$meta:meta])* $name:ident, $len:expr, $err:expr) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name(u8);

        impl $name {
            pub const COUNT: usize = $len;

            pub const fn new(index: u8) -> Option<Self> {
                if (index as usize) < $len {
                    Some(Self(index))
                } else {
                    None
                }
            }

            pub const fn get(self) -> u8 {
                self.0
            }

            pub fn all() -> impl Iterator<Item = Self> {
                (0..$len as u8).map(Self)
            }
        }

        impl TryFrom<u8> for $name {
            type Error = Error;

            fn try_from(index: u8) -> Result<Self, Self::Error> {
                Self::new(index).ok_or($err)
            }
        }

        impl From<$name> for usize {
            fn from(value: $name) -> Self {
                value.0 as usize
            }
        }
    };
}

index!(
    /// 16th step within a bar
    Step,
    NUM_STEPS,
    Error::StepOutOfRange
);
index!(TrackIndex, NUM_TRACKS, Error::TrackOutOfRange);
index!(SeqIndex, NUM_SEQ, Error::SequenceOutOfRange);

impl Step {
    /// following step, wrapping at the end of the bar
    pub const fn next(self) -> Self {
        if self.0 as usize + 1 >= NUM_STEPS {
            Self(0)
        } else {
            Self(self.0 + 1)
        }
    }

    /// first step of each quarter note
    pub const fn is_beat(self) -> bool {
        self.0 & 0x03 == 0
    }
}

impl TrackIndex {
    /// midi channel in 1..=16
    pub const fn channel(self) -> u8 {
        self.0 + 1
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Velocity,
    Pitch,
}

/// zero velocity marks a rest; pitch is ignored for rests
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
}

impl Note {
    pub const REST: Self = Self {
        pitch: 0,
        velocity: 0,
    };

    /// both values clamped to 0..=127
    pub const fn new(pitch: u8, velocity: u8) -> Self {
        Self {
            pitch: if pitch > MIDI_MAX { MIDI_MAX } else { pitch },
            velocity: if velocity > MIDI_MAX {
                MIDI_MAX
            } else {
                velocity
            },
        }
    }

    pub const fn is_rest(&self) -> bool {
        self.velocity == 0
    }

    pub fn get(&self, field: Field) -> u8 {
        match field {
            Field::Velocity => self.velocity,
            Field::Pitch => self.pitch,
        }
    }

    pub fn set(&mut self, field: Field, value: u8) {
        let value = value.min(MIDI_MAX);
        match field {
            Field::Velocity => self.velocity = value,
            Field::Pitch => self.pitch = value,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub notes: [Note; NUM_STEPS],
}

impl Default for Track {
    fn default() -> Self {
        Self {
            notes: [Note::REST; NUM_STEPS],
        }
    }
}

impl Track {
    pub fn note(&self, step: Step) -> &Note {
        &self.notes[usize::from(step)]
    }

    pub fn note_mut(&mut self, step: Step) -> &mut Note {
        &mut self.notes[usize::from(step)]
    }

    pub fn clear(&mut self) {
        self.notes = [Note::REST; NUM_STEPS];
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Sequence {
    pub tracks: [Track; NUM_TRACKS],
}

impl Sequence {
    pub fn track(&self, track: TrackIndex) -> &Track {
        &self.tracks[usize::from(track)]
    }

    pub fn track_mut(&mut self, track: TrackIndex) -> &mut Track {
        &mut self.tracks[usize::from(track)]
    }

    pub fn note_mut(&mut self, track: TrackIndex, step: Step) -> &mut Note {
        self.track_mut(track).note_mut(step)
    }

    /// sounding notes at `step`, paired with their track
    pub fn column(&self, step: Step) -> impl Iterator<Item = (TrackIndex, Note)> + '_ {
        TrackIndex::all()
            .map(move |t| (t, *self.track(t).note(step)))
            .filter(|(_, n)| !n.is_rest())
    }

    pub fn clear(&mut self) {
        for track in self.tracks.iter_mut() {
            track.clear();
        }
    }
}

/// sequence selector for pattern edits
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slot {
    /// whichever sequence is selected for playback
    #[default]
    Current,
    Index(SeqIndex),
}

impl Slot {
    pub const fn resolve(self, selected: SeqIndex) -> SeqIndex {
        match self {
            Slot::Current => selected,
            Slot::Index(index) => index,
        }
    }
}

/// raw indices past the last sequence select the current one
impl From<u8> for Slot {
    fn from(index: u8) -> Self {
        SeqIndex::new(index).map_or(Slot::Current, Slot::Index)
    }
}

impl From<SeqIndex> for Slot {
    fn from(index: SeqIndex) -> Self {
        Slot::Index(index)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Patterns {
    sequences: [Sequence; NUM_SEQ],
}

impl Patterns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: impl Into<Slot>, selected: SeqIndex) -> &Sequence {
        &self.sequences[usize::from(slot.into().resolve(selected))]
    }

    pub fn get_mut(&mut self, slot: impl Into<Slot>, selected: SeqIndex) -> &mut Sequence {
        &mut self.sequences[usize::from(slot.into().resolve(selected))]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SeqIndex, &Sequence)> + '_ {
        SeqIndex::all().zip(self.sequences.iter())
    }
}

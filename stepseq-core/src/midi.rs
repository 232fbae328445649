//! note-on triggers and their wire encoding

use embedded_io::Write;

const NOTE_ON: u8 = 0x90;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoteOn {
    /// 1..=16
    pub channel: u8,
    pub pitch: u8,
    pub velocity: u8,
}

impl NoteOn {
    /// data bytes past 127 saturate
    pub const fn new(channel: u8, pitch: u8, velocity: u8) -> Self {
        Self {
            channel,
            pitch: clamp_data(pitch),
            velocity: clamp_data(velocity),
        }
    }

    /// data bytes saturate rather than wrap, so an oversized velocity can
    /// never go out as 0 and read as a note-off
    pub fn to_bytes(&self) -> [u8; 3] {
        [
            NOTE_ON | (self.channel.saturating_sub(1) & 0x0f),
            clamp_data(self.pitch),
            clamp_data(self.velocity),
        ]
    }
}

const fn clamp_data(value: u8) -> u8 {
    if value > 0x7f {
        0x7f
    } else {
        value
    }
}

/// midi sink driven from the step interrupt; never asked for note-offs
pub trait MidiOut {
    type Error;

    fn note_on(&mut self, event: NoteOn) -> Result<(), Self::Error>;
}

/// 31250 baud serial transmitter
pub struct SerialMidi<W: Write> {
    writer: W,
}

impl<W: Write> SerialMidi<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> MidiOut for SerialMidi<W> {
    type Error = W::Error;

    fn note_on(&mut self, event: NoteOn) -> Result<(), Self::Error> {
        self.writer.write_all(&event.to_bytes())
    }
}

//! step clock and note triggering

use core::sync::atomic::{AtomicU8, Ordering};
use embedded_hal::digital::OutputPin;

use crate::{
    midi::{MidiOut, NoteOn},
    pattern::{Patterns, SeqIndex, Sequence, Slot, Step},
    tempo::{timer_reload, Timebase},
    Error, DEFAULT_BPM,
};

/// up-counting hardware timer that interrupts on overflow
pub trait Timer {
    /// restart counting from `reload`; clears a pending overflow
    fn load(&mut self, reload: u32);

    /// enable the periodic overflow interrupt
    fn arm(&mut self);
}

/// byte-wide mirror of the playback state, readable from foreground code
/// without a critical section
pub struct Cursor {
    step: AtomicU8,
    sequence: AtomicU8,
    bpm: AtomicU8,
}

impl Cursor {
    pub const fn new() -> Self {
        Self {
            step: AtomicU8::new(0),
            sequence: AtomicU8::new(0),
            bpm: AtomicU8::new(DEFAULT_BPM),
        }
    }

    pub fn step(&self) -> Step {
        Step::new(self.step.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn sequence(&self) -> SeqIndex {
        SeqIndex::new(self.sequence.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn bpm(&self) -> u8 {
        self.bpm.load(Ordering::Relaxed)
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Playback engine. `on_overflow` belongs in the timer interrupt; everything
/// else is foreground and should run inside [`crate::Shared::with`] once the
/// timer is armed.
///
/// Notes are only ever switched on. Receivers are left to end them through
/// their own voice allocation.
pub struct Sequencer<'c, T, M, B> {
    patterns: Patterns,
    timebase: Timebase,
    bpm: u8,
    /// always `timer_reload(bpm, timebase)`
    reload: u32,
    selected: SeqIndex,
    step: Step,
    timer: T,
    midi: M,
    beat: B,
    cursor: &'c Cursor,
}

impl<'c, T: Timer, M: MidiOut, B: OutputPin> Sequencer<'c, T, M, B> {
    /// fails if the timebase cannot represent the default tempo
    pub fn new(
        timebase: Timebase,
        timer: T,
        midi: M,
        beat: B,
        cursor: &'c Cursor,
    ) -> Result<Self, Error> {
        let reload = timer_reload(DEFAULT_BPM, &timebase)?;
        let sequencer = Self {
            patterns: Patterns::new(),
            timebase,
            bpm: DEFAULT_BPM,
            reload,
            selected: SeqIndex::default(),
            step: Step::default(),
            timer,
            midi,
            beat,
            cursor,
        };
        sequencer.publish();
        Ok(sequencer)
    }

    fn publish(&self) {
        self.cursor.step.store(self.step.get(), Ordering::Relaxed);
        self.cursor
            .sequence
            .store(self.selected.get(), Ordering::Relaxed);
        self.cursor.bpm.store(self.bpm, Ordering::Relaxed);
    }

    /// load the current reload value and enable the step interrupt
    pub fn start(&mut self) {
        debug!("start at {} bpm, reload {}", self.bpm, self.reload);
        self.timer.load(self.reload);
        self.timer.arm();
    }

    /// reload value for `bpm` without installing it
    pub fn validate_tempo(&self, bpm: u8) -> Result<u32, Error> {
        timer_reload(bpm, &self.timebase)
    }

    /// takes effect from the next period; the current one runs out unchanged
    pub fn set_tempo(&mut self, bpm: u8) -> Result<(), Error> {
        let reload = match self.validate_tempo(bpm) {
            Ok(reload) => reload,
            Err(e) => {
                warn!("tempo {} rejected: {}", bpm, e);
                return Err(e);
            }
        };
        self.bpm = bpm;
        self.reload = reload;
        self.cursor.bpm.store(bpm, Ordering::Relaxed);
        Ok(())
    }

    pub fn select(&mut self, sequence: SeqIndex) {
        self.selected = sequence;
        self.cursor.sequence.store(sequence.get(), Ordering::Relaxed);
    }

    /// leaves the selection untouched on an out-of-range index
    pub fn select_sequence(&mut self, index: u8) -> Result<(), Error> {
        self.select(SeqIndex::try_from(index)?);
        Ok(())
    }

    /// interrupt entry: restart the counter, then step
    pub fn on_overflow(&mut self) -> Step {
        self.timer.load(self.reload);
        self.advance()
    }

    /// move to the next step and trigger every sounding note on it
    pub fn advance(&mut self) -> Step {
        self.step = self.step.next();
        self.cursor.step.store(self.step.get(), Ordering::Relaxed);

        let sequence = self.patterns.get(Slot::Current, self.selected);
        for (track, note) in sequence.column(self.step) {
            let event = NoteOn::new(track.channel(), note.pitch, note.velocity);
            if self.midi.note_on(event).is_err() {
                warn!("note-on dropped on channel {}", event.channel);
            }
        }

        let level = if self.step.is_beat() {
            self.beat.set_high()
        } else {
            self.beat.set_low()
        };
        if level.is_err() {
            warn!("beat indicator write failed on step {}", self.step.get());
        }
        self.step
    }

    pub fn bpm(&self) -> u8 {
        self.bpm
    }

    pub fn reload(&self) -> u32 {
        self.reload
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn sequence(&self) -> SeqIndex {
        self.selected
    }

    pub fn pattern(&self, slot: impl Into<Slot>) -> &Sequence {
        self.patterns.get(slot, self.selected)
    }

    /// `Slot::Current` edits whatever is playing
    pub fn pattern_mut(&mut self, slot: impl Into<Slot>) -> &mut Sequence {
        self.patterns.get_mut(slot, self.selected)
    }

    pub fn patterns(&self) -> &Patterns {
        &self.patterns
    }

    pub fn midi(&mut self) -> &mut M {
        &mut self.midi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pattern::TrackIndex, Note, SerialMidi, Shared, NUM_STEPS};
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorKind, ErrorType};
    use std::vec::Vec;

    #[derive(Default)]
    struct FakeTimer {
        loads: Vec<u32>,
        armed: bool,
    }

    impl Timer for FakeTimer {
        fn load(&mut self, reload: u32) {
            self.loads.push(reload);
        }

        fn arm(&mut self) {
            self.armed = true;
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<NoteOn>,
    }

    impl MidiOut for Recorder {
        type Error = Infallible;

        fn note_on(&mut self, event: NoteOn) -> Result<(), Self::Error> {
            self.events.push(event);
            Ok(())
        }
    }

    /// rejects every write
    struct Unplugged;

    impl MidiOut for Unplugged {
        type Error = ();

        fn note_on(&mut self, _event: NoteOn) -> Result<(), Self::Error> {
            Err(())
        }
    }

    #[derive(Default)]
    struct Led {
        levels: Vec<bool>,
    }

    impl ErrorType for Led {
        type Error = Infallible;
    }

    impl OutputPin for Led {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.levels.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.levels.push(true);
            Ok(())
        }
    }

    type TestSequencer<'c> = Sequencer<'c, FakeTimer, Recorder, Led>;

    fn sequencer(cursor: &Cursor) -> TestSequencer<'_> {
        Sequencer::new(
            Timebase::AVR_TIMER1,
            FakeTimer::default(),
            Recorder::default(),
            Led::default(),
            cursor,
        )
        .unwrap()
    }

    fn at(track: u8, step: u8) -> (TrackIndex, Step) {
        (TrackIndex::new(track).unwrap(), Step::new(step).unwrap())
    }

    #[test]
    fn start_loads_default_tempo_and_arms() {
        let cursor = Cursor::new();
        let mut seq = sequencer(&cursor);
        assert!(!seq.timer.armed);
        seq.start();
        assert_eq!(seq.bpm(), DEFAULT_BPM);
        assert_eq!(seq.timer.loads, [65536 - 7812]);
        assert!(seq.timer.armed);
    }

    #[test]
    fn unusable_timebase_rejected_up_front() {
        let cursor = Cursor::new();
        let result = Sequencer::new(
            Timebase::new(16, 8),
            FakeTimer::default(),
            Recorder::default(),
            Led::default(),
            &cursor,
        );
        assert!(matches!(result, Err(Error::TempoTooSlow)));
    }

    #[test]
    fn cursor_wraps_every_bar_for_each_sequence() {
        let cursor = Cursor::new();
        let mut seq = sequencer(&cursor);
        for index in SeqIndex::all() {
            seq.select(index);
            assert_eq!(seq.step().get(), 0);
            for i in 1..=NUM_STEPS {
                let step = seq.advance();
                assert_eq!(step.get() as usize, i % NUM_STEPS);
            }
            assert_eq!(seq.step().get(), 0);
        }
    }

    #[test]
    fn rests_are_silent_and_notes_fire_once() {
        let cursor = Cursor::new();
        let mut seq = sequencer(&cursor);
        let (track, step) = at(3, 1);
        *seq.pattern_mut(Slot::Current).note_mut(track, step) = Note::new(40, 0);
        seq.advance();
        assert!(seq.midi.events.is_empty());

        seq.pattern_mut(Slot::Current)
            .note_mut(track, step)
            .velocity = 70;
        for _ in 0..NUM_STEPS {
            seq.advance();
        }
        assert_eq!(
            seq.midi.events,
            [NoteOn {
                channel: 4,
                pitch: 40,
                velocity: 70
            }]
        );
    }

    #[test]
    fn single_note_fires_on_fifth_advance() {
        let cursor = Cursor::new();
        let mut seq = sequencer(&cursor);
        let (track, step) = at(0, 4);
        *seq.pattern_mut(0u8).note_mut(track, step) = Note::new(60, 100);
        seq.select_sequence(0).unwrap();

        let mut fired_on = Vec::new();
        for call in 1..=NUM_STEPS {
            let before = seq.midi.events.len();
            seq.advance();
            if seq.midi.events.len() > before {
                fired_on.push(call);
            }
        }
        assert_eq!(fired_on, [5]);
        assert_eq!(
            seq.midi.events,
            [NoteOn {
                channel: 1,
                pitch: 60,
                velocity: 100
            }]
        );
    }

    #[test]
    fn all_tracks_fire_in_track_order() {
        let cursor = Cursor::new();
        let mut seq = sequencer(&cursor);
        for track in TrackIndex::all() {
            *seq.pattern_mut(Slot::Current)
                .note_mut(track, Step::new(1).unwrap()) = Note::new(36 + track.get(), 100);
        }
        seq.advance();
        let channels: Vec<u8> = seq.midi.events.iter().map(|e| e.channel).collect();
        assert_eq!(channels, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(seq.midi.events[7].pitch, 43);
    }

    #[test]
    fn only_selected_sequence_plays() {
        let cursor = Cursor::new();
        let mut seq = sequencer(&cursor);
        let (track, step) = at(1, 1);
        *seq.pattern_mut(1u8).note_mut(track, step) = Note::new(50, 90);
        seq.advance();
        assert!(seq.midi.events.is_empty());

        seq.select_sequence(1).unwrap();
        for _ in 0..NUM_STEPS {
            seq.advance();
        }
        assert_eq!(seq.midi.events.len(), 1);
    }

    #[test]
    fn invalid_selection_is_ignored() {
        let cursor = Cursor::new();
        let mut seq = sequencer(&cursor);
        seq.select_sequence(1).unwrap();
        assert_eq!(seq.select_sequence(2), Err(Error::SequenceOutOfRange));
        let _ = seq.select_sequence(0xff);
        assert_eq!(seq.sequence().get(), 1);
        assert_eq!(cursor.sequence().get(), 1);
    }

    #[test]
    fn raw_sentinel_edits_selected_sequence() {
        let cursor = Cursor::new();
        let mut seq = sequencer(&cursor);
        seq.select_sequence(1).unwrap();
        let (track, step) = at(2, 2);
        *seq.pattern_mut(0xffu8).note_mut(track, step) = Note::new(62, 80);
        assert!(!seq.pattern(1u8).track(track).note(step).is_rest());
        assert!(seq.pattern(0u8).track(track).note(step).is_rest());
    }

    #[test]
    fn tempo_change_applies_on_next_reload() {
        let cursor = Cursor::new();
        let mut seq = sequencer(&cursor);
        seq.start();
        seq.set_tempo(60).unwrap();
        // nothing touches the running counter until it overflows
        assert_eq!(seq.timer.loads.len(), 1);
        seq.on_overflow();
        assert_eq!(seq.timer.loads, [65536 - 7812, 65536 - 15625]);
        assert_eq!(seq.reload(), 65536 - 15625);
        assert_eq!(cursor.bpm(), 60);
    }

    #[test]
    fn bad_tempo_keeps_previous_state() {
        let cursor = Cursor::new();
        let mut seq = sequencer(&cursor);
        seq.set_tempo(90).unwrap();
        let reload = seq.reload();
        assert_eq!(seq.set_tempo(0), Err(Error::ZeroTempo));
        assert_eq!(seq.set_tempo(10), Err(Error::TempoTooSlow));
        assert_eq!(seq.bpm(), 90);
        assert_eq!(seq.reload(), reload);
        assert_eq!(seq.validate_tempo(90), Ok(reload));
    }

    #[test]
    fn beat_indicator_follows_quarter_notes() {
        let cursor = Cursor::new();
        let mut seq = sequencer(&cursor);
        for _ in 0..NUM_STEPS {
            seq.advance();
        }
        let expected: Vec<bool> = (1..=NUM_STEPS).map(|s| s % 4 == 0).collect();
        assert_eq!(seq.beat.levels, expected);
    }

    #[test]
    fn cursor_mirrors_engine_state() {
        let cursor = Cursor::new();
        let mut seq = sequencer(&cursor);
        seq.advance();
        seq.advance();
        seq.select_sequence(1).unwrap();
        assert_eq!(cursor.step(), seq.step());
        assert_eq!(cursor.step().get(), 2);
        assert_eq!(cursor.sequence(), seq.sequence());
        assert_eq!(cursor.bpm(), DEFAULT_BPM);
    }

    #[test]
    fn midi_errors_do_not_stall_the_clock() {
        let cursor = Cursor::new();
        let mut seq = Sequencer::new(
            Timebase::AVR_TIMER1,
            FakeTimer::default(),
            Unplugged,
            Led::default(),
            &cursor,
        )
        .unwrap();
        let (track, step) = at(0, 1);
        *seq.pattern_mut(Slot::Current).note_mut(track, step) = Note::new(60, 100);
        assert_eq!(seq.advance().get(), 1);
        assert_eq!(seq.advance().get(), 2);
    }

    #[test]
    fn oversized_velocity_goes_out_at_full_scale() {
        let cursor = Cursor::new();
        let mut buf = [0u8; 3];
        {
            let mut seq = Sequencer::new(
                Timebase::AVR_TIMER1,
                FakeTimer::default(),
                SerialMidi::new(&mut buf[..]),
                Led::default(),
                &cursor,
            )
            .unwrap();
            let (track, step) = at(0, 1);
            let note = seq.pattern_mut(Slot::Current).note_mut(track, step);
            note.pitch = 60;
            note.velocity = 128;
            seq.advance();
        }
        // a zero velocity byte would be read as a note-off
        assert_eq!(buf, [0x90, 60, 0x7f]);
    }

    /// rejects every write
    struct BrokenLed;

    impl ErrorType for BrokenLed {
        type Error = ErrorKind;
    }

    impl OutputPin for BrokenLed {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }
    }

    #[test]
    fn beat_pin_errors_do_not_stall_the_clock() {
        let cursor = Cursor::new();
        let mut seq = Sequencer::new(
            Timebase::AVR_TIMER1,
            FakeTimer::default(),
            Recorder::default(),
            BrokenLed,
            &cursor,
        )
        .unwrap();
        let (track, step) = at(0, 4);
        *seq.pattern_mut(Slot::Current).note_mut(track, step) = Note::new(36, 100);
        for _ in 0..4 {
            seq.advance();
        }
        assert_eq!(seq.step().get(), 4);
        assert_eq!(seq.midi.events.len(), 1);
    }

    #[test]
    fn interrupt_and_foreground_share_through_cell() {
        static CURSOR: Cursor = Cursor::new();
        let cell: Shared<TestSequencer<'static>> = Shared::new();
        cell.init(sequencer(&CURSOR));
        cell.with(|s| {
            let (track, step) = at(5, 1);
            let note = s.pattern_mut(Slot::Current).note_mut(track, step);
            note.pitch = 48;
            note.velocity = 127;
            s.start();
        });
        // timer interrupt
        cell.with(|s| s.on_overflow());
        assert_eq!(CURSOR.step().get(), 1);
        let events = cell.with(|s| s.midi().events.clone()).unwrap();
        assert_eq!(
            events,
            [NoteOn {
                channel: 6,
                pitch: 48,
                velocity: 127
            }]
        );
    }
}

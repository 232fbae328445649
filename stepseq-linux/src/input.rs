use crate::SEQUENCER;

use core::convert::Infallible;
use crossterm::event::KeyCode;
use embedded_hal::digital::{ErrorType, InputPin};
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use stepseq_core::{EdgeDetector, Field, Flags, Pull, PullConfig, Slot, Step, TrackIndex};

/// how long a key tap holds the virtual button down
const TAP: Duration = Duration::from_millis(60);
const DEFAULT_VELOCITY: u8 = 100;
/// pitch for notes entered on an empty cell, per track
const DEFAULT_PITCHES: [u8; 8] = [36, 38, 42, 46, 45, 48, 39, 49];

#[derive(Default)]
struct ButtonState {
    pull: Option<Pull>,
    down_until: Option<Instant>,
}

/// active-low push button driven by key taps
#[derive(Clone, Default)]
pub struct VirtualButton(Arc<Mutex<ButtonState>>);

impl VirtualButton {
    pub fn tap(&self) {
        if let Ok(mut state) = self.0.lock() {
            state.down_until = Some(Instant::now() + TAP);
        }
    }
}

impl ErrorType for VirtualButton {
    type Error = Infallible;
}

impl InputPin for VirtualButton {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let Ok(state) = self.0.lock() else {
            return Ok(false);
        };
        let down = state.down_until.is_some_and(|t| Instant::now() < t);
        // floats low without the pull-up
        Ok(state.pull == Some(Pull::Up) && !down)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|v| !v)
    }
}

impl PullConfig for VirtualButton {
    fn set_pull(&mut self, pull: Pull) -> Result<(), Self::Error> {
        if let Ok(mut state) = self.0.lock() {
            state.pull = Some(pull);
        }
        Ok(())
    }
}

pub enum Action {
    None,
    Quit,
    Log(String),
}

pub struct InputHandler {
    button: VirtualButton,
    detector: EdgeDetector<VirtualButton>,
    /// edit cursor
    track: TrackIndex,
    step: Step,
}

impl InputHandler {
    pub fn new() -> Self {
        let button = VirtualButton::default();
        let mut detector = EdgeDetector::new(button.clone(), Flags::NONE);
        let _ = detector.begin();
        Self {
            button,
            detector,
            track: TrackIndex::default(),
            step: Step::default(),
        }
    }

    pub fn track(&self) -> TrackIndex {
        self.track
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// sample the button; a press cycles the playing sequence
    pub fn poll(&mut self) -> Option<String> {
        if !self.detector.poll().unwrap_or(false) {
            return None;
        }
        SEQUENCER.with(|s| {
            let next = (s.sequence().get() + 1) % stepseq_core::NUM_SEQ as u8;
            let _ = s.select_sequence(next);
            format!("sequence {}", next + 1)
        })
    }

    pub fn key(&mut self, code: KeyCode) -> Action {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
            KeyCode::Char(' ') => self.button.tap(),
            KeyCode::Char(c @ ('1' | '2')) => {
                let index = c as u8 - b'1';
                let _ = SEQUENCER.with(|s| s.select_sequence(index));
            }
            KeyCode::Char('+') | KeyCode::Char('=') => return self.offset_tempo(1),
            KeyCode::Char('-') => return self.offset_tempo(-1),
            KeyCode::Char('>') => return self.offset_tempo(10),
            KeyCode::Char('<') => return self.offset_tempo(-10),
            KeyCode::Left => {
                self.step = Step::new(self.step.get().wrapping_sub(1)).unwrap_or(last_step())
            }
            KeyCode::Right => self.step = self.step.next(),
            KeyCode::Up => {
                self.track = TrackIndex::new(self.track.get().wrapping_sub(1))
                    .unwrap_or(last_track())
            }
            KeyCode::Down => {
                self.track = TrackIndex::new(self.track.get() + 1).unwrap_or_default()
            }
            KeyCode::Enter => self.toggle_note(),
            KeyCode::Char(']') => self.offset_field(Field::Pitch, 1),
            KeyCode::Char('[') => self.offset_field(Field::Pitch, -1),
            KeyCode::Char('}') => self.offset_field(Field::Velocity, 8),
            KeyCode::Char('{') => self.offset_field(Field::Velocity, -8),
            KeyCode::Char('c') => {
                SEQUENCER.with(|s| s.pattern_mut(Slot::Current).clear());
                return Action::Log("cleared".to_string());
            }
            _ => (),
        }
        Action::None
    }

    fn offset_tempo(&mut self, offset: i16) -> Action {
        let result = SEQUENCER.with(|s| {
            let bpm = (s.bpm() as i16 + offset).clamp(0, u8::MAX as i16) as u8;
            s.set_tempo(bpm).map(|_| bpm)
        });
        match result {
            Some(Ok(bpm)) => Action::Log(format!("{} bpm", bpm)),
            Some(Err(e)) => Action::Log(e.to_string()),
            None => Action::None,
        }
    }

    fn toggle_note(&mut self) {
        let (track, step) = (self.track, self.step);
        SEQUENCER.with(|s| {
            let note = s.pattern_mut(Slot::Current).note_mut(track, step);
            if note.is_rest() {
                if note.pitch == 0 {
                    note.pitch = DEFAULT_PITCHES[usize::from(track)];
                }
                note.velocity = DEFAULT_VELOCITY;
            } else {
                note.velocity = 0;
            }
        });
    }

    fn offset_field(&mut self, field: Field, offset: i16) {
        let (track, step) = (self.track, self.step);
        SEQUENCER.with(|s| {
            let note = s.pattern_mut(Slot::Current).note_mut(track, step);
            let value = (note.get(field) as i16 + offset).clamp(0, 127) as u8;
            note.set(field, value);
        });
    }
}

fn last_step() -> Step {
    Step::new(stepseq_core::NUM_STEPS as u8 - 1).unwrap_or_default()
}

fn last_track() -> TrackIndex {
    TrackIndex::new(stepseq_core::NUM_TRACKS as u8 - 1).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_idles_high_with_pull_up() {
        let mut button = VirtualButton::default();
        // unbiased pin reads low
        assert!(!button.is_high().unwrap());
        button.set_pull(Pull::Up).unwrap();
        assert!(button.is_high().unwrap());
    }

    #[test]
    fn tap_reports_single_falling_edge() {
        let button = VirtualButton::default();
        let mut detector = EdgeDetector::new(button.clone(), Flags::NONE);
        detector.begin().unwrap();
        assert!(!detector.poll().unwrap());
        button.tap();
        assert!(detector.poll().unwrap());
        assert!(!detector.poll().unwrap());
        std::thread::sleep(TAP + Duration::from_millis(20));
        assert!(!detector.poll().unwrap());
        button.tap();
        assert!(detector.poll().unwrap());
    }
}

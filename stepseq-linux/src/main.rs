mod clock;
mod input;
mod midi;
mod tui;

use clock::{BeatLamp, Clock, ThreadTimer};
use color_eyre::eyre::{eyre, Result};
use midi::MidiPort;
use stepseq_core::{Cursor, Note, SeqIndex, Sequencer, Shared, Step, Timebase, TrackIndex};

/// 16 us ticks on a 16-bit counter, as on a 16 MHz AVR with a /256 prescaler
const TIMEBASE: Timebase = Timebase::AVR_TIMER1;
const DEMO_VELOCITY: u8 = 100;

pub type HostSequencer = Sequencer<'static, ThreadTimer, MidiPort, BeatLamp>;

pub static CURSOR: Cursor = Cursor::new();
pub static SEQUENCER: Shared<HostSequencer> = Shared::new();

fn main() -> Result<()> {
    color_eyre::install()?;

    let index = match std::env::args().nth(1).as_deref() {
        Some("--list") => {
            for (i, name) in MidiPort::ports()?.iter().enumerate() {
                println!("{}: {}", i, name);
            }
            return Ok(());
        }
        Some(arg) => Some(
            arg.parse::<usize>()
                .map_err(|_| eyre!("usage: stepseq-linux [--list | PORT_INDEX]"))?,
        ),
        None => None,
    };
    let port = MidiPort::connect(index)?;
    let name = port.name().to_string();

    let clock = Clock::new(TIMEBASE);
    let lamp = BeatLamp::default();
    let mut sequencer = Sequencer::new(TIMEBASE, clock.timer(), port, lamp.clone(), &CURSOR)?;
    demo(&mut sequencer);
    SEQUENCER.init(sequencer);

    let handle = clock.spawn(|| {
        SEQUENCER.with(|s| s.on_overflow());
    });
    SEQUENCER.with(|s| s.start());

    let mut terminal = ratatui::init();
    let result = tui::TuiHandler::new(lamp, name).run(&mut terminal);
    ratatui::restore();

    clock.stop();
    handle
        .join()
        .map_err(|_| eyre!("clock thread panicked"))?;
    // closes the midi port
    drop(SEQUENCER.take());
    result
}

/// basic beat on the first sequence, a busier variation on the second
fn demo(sequencer: &mut HostSequencer) {
    let mut hits = |seq: u8, track: u8, pitch: u8, steps: &[u8]| {
        let (Some(seq), Some(track)) = (SeqIndex::new(seq), TrackIndex::new(track)) else {
            return;
        };
        let sequence = sequencer.pattern_mut(seq);
        for step in steps.iter().filter_map(|&s| Step::new(s)) {
            *sequence.note_mut(track, step) = Note::new(pitch, DEMO_VELOCITY);
        }
    };
    hits(0, 0, 36, &[0, 4, 8, 12]);
    hits(0, 1, 38, &[4, 12]);
    hits(0, 2, 42, &[0, 2, 4, 6, 8, 10, 12, 14]);

    hits(1, 0, 36, &[0, 3, 6, 8, 11, 14]);
    hits(1, 1, 38, &[4, 12, 15]);
    hits(1, 2, 42, &[0, 1, 2, 4, 5, 6, 8, 9, 10, 12, 13, 14]);
    hits(1, 3, 46, &[3, 7, 11]);
}

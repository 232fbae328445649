use crate::{
    clock::BeatLamp,
    input::{Action, InputHandler},
    CURSOR, SEQUENCER,
};

use color_eyre::eyre::Result;
use crossterm::event::{self, KeyEvent, KeyEventKind};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Flex, Layout, Rect},
    style::Stylize,
    text::{Line, Span, Text},
    widgets::{Block, Padding, Paragraph, Widget},
    DefaultTerminal, Frame,
};
use stepseq_core::{Patterns, Sequence, Slot, Step, TrackIndex, NUM_STEPS, NUM_TRACKS};

const LOG_DURATION: std::time::Duration = std::time::Duration::from_millis(1000);

pub struct TuiHandler {
    input: InputHandler,
    lamp: BeatLamp,
    port: String,
    log: Option<(std::time::Instant, String)>,
}

impl TuiHandler {
    pub fn new(lamp: BeatLamp, port: String) -> Self {
        Self {
            input: InputHandler::new(),
            lamp,
            port,
            log: None,
        }
    }

    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            if let Some((start, ..)) = &self.log {
                if start.elapsed() >= LOG_DURATION {
                    self.log = None;
                }
            }
            if let Some(msg) = self.input.poll() {
                self.log = Some((std::time::Instant::now(), msg));
            }
            // playback moves on its own, so redraw every frame
            terminal.draw(|frame| self.draw(frame))?;
            if event::poll(std::time::Duration::from_millis(16))? && self.kbd()? {
                break;
            }
        }
        Ok(())
    }

    /// returns true if should exit
    fn kbd(&mut self) -> Result<bool> {
        if let event::Event::Key(KeyEvent {
            code,
            kind: KeyEventKind::Press,
            ..
        }) = event::read()?
        {
            match self.input.key(code) {
                Action::Quit => return Ok(true),
                Action::Log(msg) => self.log = Some((std::time::Instant::now(), msg)),
                Action::None => (),
            }
        }
        Ok(false)
    }

    fn draw(&self, frame: &mut Frame) {
        frame.render_widget(self, frame.area());
    }

    fn render_log(&self, area: Rect, buf: &mut Buffer) {
        if let Some((_, msg)) = &self.log {
            Paragraph::new(Text::raw(msg)).centered().render(area, buf);
        }
    }

    fn render_header(&self, area: Rect, buf: &mut Buffer) {
        let [lamp_area, text_area] =
            Layout::horizontal(vec![Constraint::Max(4), Constraint::Fill(1)]).areas(area);
        if self.lamp.is_lit() {
            Block::new().reversed().render(lamp_area, buf);
        }
        let text = format!(
            "{:>3} bpm  seq {}  step {:>2}  {}",
            CURSOR.bpm(),
            CURSOR.sequence().get() + 1,
            CURSOR.step().get() + 1,
            self.port,
        );
        Paragraph::new(Text::raw(text))
            .block(Block::new().padding(Padding::horizontal(1)))
            .render(text_area, buf);
    }

    /// one tab per sequence with its note count, playing one reversed
    fn render_tabs(&self, patterns: &Patterns, area: Rect, buf: &mut Buffer) {
        let selected = CURSOR.sequence();
        let mut spans = Vec::new();
        for (index, sequence) in patterns.iter() {
            let notes = sequence
                .tracks
                .iter()
                .flat_map(|t| t.notes.iter())
                .filter(|n| !n.is_rest())
                .count();
            let tab = Span::raw(format!(" seq {} ({:>3}) ", index.get() + 1, notes));
            spans.push(if index == selected { tab.reversed() } else { tab });
        }
        Paragraph::new(Line::from(spans))
            .centered()
            .render(area, buf);
    }

    fn render_grid(&self, sequence: &Sequence, area: Rect, buf: &mut Buffer) {
        let playing = CURSOR.step();
        let lines: Vec<_> = TrackIndex::all()
            .map(|track| {
                let mut spans = vec![Span::raw(format!("{} ", track.channel()))];
                for step in Step::all() {
                    let note = sequence.track(track).note(step);
                    let cell = match (note.is_rest(), step.is_beat()) {
                        (false, _) => "o",
                        (true, true) => ":",
                        (true, false) => ".",
                    };
                    let mut span = Span::raw(cell);
                    if step == playing {
                        span = span.reversed();
                    }
                    if (track, step) == (self.input.track(), self.input.step()) {
                        span = span.bold().underlined();
                    }
                    spans.push(span);
                }
                Line::from(spans)
            })
            .collect();
        Paragraph::new(Text::from(lines))
            .block(
                Block::bordered()
                    .title(format!(" seq {} ", CURSOR.sequence().get() + 1))
                    .padding(Padding::horizontal(1)),
            )
            .render(area, buf);
    }

    fn render_note(&self, sequence: &Sequence, area: Rect, buf: &mut Buffer) {
        let (track, step) = (self.input.track(), self.input.step());
        let note = sequence.track(track).note(step);
        let text = if note.is_rest() {
            format!("ch {:>2}  step {:>2}  rest", track.channel(), step.get() + 1)
        } else {
            format!(
                "ch {:>2}  step {:>2}  pitch {:>3}  vel {:>3}",
                track.channel(),
                step.get() + 1,
                note.pitch,
                note.velocity,
            )
        };
        Paragraph::new(Text::raw(text)).centered().render(area, buf);
    }
}

impl Widget for &TuiHandler {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let [area] = Layout::vertical(vec![Constraint::Max(NUM_TRACKS as u16 + 7)])
            .flex(Flex::Center)
            .areas(area);
        let [area] = Layout::horizontal(vec![Constraint::Max(NUM_STEPS as u16 + 40)])
            .flex(Flex::Center)
            .areas(area);
        let [header_area, tab_area, grid_area, note_area, log_area] =
            Layout::vertical(Constraint::from_maxes([1, 1, NUM_TRACKS as u16 + 2, 1, 1]))
                .flex(Flex::Center)
                .areas(area);
        let [grid_area] = Layout::horizontal(vec![Constraint::Max(NUM_STEPS as u16 + 6)])
            .flex(Flex::Center)
            .areas(grid_area);
        let patterns = SEQUENCER.with(|s| *s.patterns()).unwrap_or_default();
        let sequence = patterns.get(Slot::Current, CURSOR.sequence());
        self.render_header(header_area, buf);
        self.render_tabs(&patterns, tab_area, buf);
        self.render_grid(sequence, grid_area, buf);
        self.render_note(sequence, note_area, buf);
        self.render_log(log_area, buf);
    }
}

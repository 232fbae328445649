#![no_std]
#![no_main]

mod hw;

use embassy_executor::Spawner;
use embassy_stm32::{
    gpio::{Level, Output, Speed},
    interrupt,
    mode::Blocking,
    time::Hertz,
    usart::{self, UartTx},
};
use stepseq_core::{
    Cursor, EdgeDetector, Flags, Note, SerialMidi, Sequencer, Shared, Step, TrackIndex, NUM_SEQ,
};
use {defmt_rtt as _, panic_probe as _};

const MIDI_BAUD: u32 = 31_250;
/// slow enough to hide most contact bounce
const BUTTON_POLL: embassy_time::Duration = embassy_time::Duration::from_millis(10);

type Midi = SerialMidi<UartTx<'static, Blocking>>;
type BoardSequencer = Sequencer<'static, hw::StepTimer, Midi, Output<'static>>;

static CURSOR: Cursor = Cursor::new();
static SEQUENCER: Shared<BoardSequencer> = Shared::new();

#[interrupt]
fn TIM3() {
    hw::acknowledge_overflow();
    SEQUENCER.with(|s| s.on_overflow());
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let config = {
        use embassy_stm32::rcc::*;

        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz::mhz(16),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll1 = Some(Pll {
            source: PllSource::HSE,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL240,
            divp: Some(PllDiv::DIV2),
            divq: None,
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P; // 480 MHz

        config.rcc.ahb_pre = AHBPrescaler::DIV2; // 240 MHz
        config.rcc.apb1_pre = APBPrescaler::DIV2; // 120 MHz, timers 240 MHz
        config.rcc.apb2_pre = APBPrescaler::DIV2; // 120 MHz
        config.rcc.apb3_pre = APBPrescaler::DIV2; // 120 MHz
        config.rcc.apb4_pre = APBPrescaler::DIV2; // 120 MHz
        config.rcc.voltage_scale = VoltageScale::Scale0;
        config
    };
    let p = embassy_stm32::init(config);

    // user led doubles as beat indicator
    let led = Output::new(p.PC7, Level::Low, Speed::Low);

    // midi out on usart1
    let mut uart_config = usart::Config::default();
    uart_config.baudrate = MIDI_BAUD;
    let Ok(tx) = UartTx::new_blocking(p.USART1, p.PB6, uart_config) else {
        defmt::panic!("midi uart config rejected");
    };

    let mut sequencer = defmt::unwrap!(Sequencer::new(
        hw::TIMEBASE,
        hw::StepTimer::new(p.TIM3),
        SerialMidi::new(tx),
        led,
        &CURSOR,
    ));
    preset(&mut sequencer);
    SEQUENCER.init(sequencer);
    SEQUENCER.with(|s| s.start());
    defmt::info!("playing at {} bpm", CURSOR.bpm());

    let mut button = EdgeDetector::new(hw::Button::new(p.PB4), Flags::NONE);
    let _ = button.begin();
    loop {
        if button.poll().unwrap_or(false) {
            let next = (CURSOR.sequence().get() + 1) % NUM_SEQ as u8;
            SEQUENCER.with(|s| {
                let _ = s.select_sequence(next);
            });
            defmt::info!("sequence {}", next + 1);
        }
        embassy_time::Timer::after(BUTTON_POLL).await;
    }
}

/// kick on every beat of both sequences, offbeat hats on the second
fn preset(sequencer: &mut BoardSequencer) {
    let kick = TrackIndex::default();
    for step in Step::all().filter(|s| s.is_beat()) {
        *sequencer.pattern_mut(0u8).note_mut(kick, step) = Note::new(36, 100);
        *sequencer.pattern_mut(1u8).note_mut(kick, step) = Note::new(36, 100);
    }
    if let Some(hat) = TrackIndex::new(2) {
        for step in Step::all().filter(|s| s.get() % 4 == 2) {
            *sequencer.pattern_mut(1u8).note_mut(hat, step) = Note::new(42, 80);
        }
    }
}

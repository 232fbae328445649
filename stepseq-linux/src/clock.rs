//! thread standing in for the hardware step timer

use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, OutputPin};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};
use stepseq_core::{Timebase, Timer};

const IDLE: Duration = Duration::from_millis(5);

/// emulated up-counter: `count` is where the next period starts counting
pub struct Clock {
    timebase: Timebase,
    count: AtomicU32,
    armed: AtomicBool,
    running: AtomicBool,
}

impl Clock {
    pub fn new(timebase: Timebase) -> Arc<Self> {
        Arc::new(Self {
            timebase,
            count: AtomicU32::new(0),
            armed: AtomicBool::new(false),
            running: AtomicBool::new(true),
        })
    }

    pub fn timer(self: &Arc<Self>) -> ThreadTimer {
        ThreadTimer(self.clone())
    }

    /// length of the period that starts now
    pub fn period(&self) -> Duration {
        Duration::from_micros(self.timebase.period_us(self.count.load(Ordering::Relaxed)))
    }

    /// call `on_overflow` once per period until [`Clock::stop`]
    pub fn spawn(
        self: &Arc<Self>,
        mut on_overflow: impl FnMut() + Send + 'static,
    ) -> JoinHandle<()> {
        let clock = self.clone();
        std::thread::spawn(move || {
            let mut deadline = Instant::now();
            while clock.running.load(Ordering::Relaxed) {
                if !clock.armed.load(Ordering::Relaxed) {
                    std::thread::sleep(IDLE);
                    deadline = Instant::now();
                    continue;
                }
                // absolute deadlines keep sleep overshoot from accumulating
                deadline += clock.period();
                std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                on_overflow();
            }
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

pub struct ThreadTimer(Arc<Clock>);

impl Timer for ThreadTimer {
    fn load(&mut self, reload: u32) {
        self.0.count.store(reload, Ordering::Relaxed);
    }

    fn arm(&mut self) {
        self.0.armed.store(true, Ordering::Relaxed);
    }
}

/// beat indicator read by the terminal view
#[derive(Clone, Default)]
pub struct BeatLamp(Arc<AtomicBool>);

impl BeatLamp {
    pub fn is_lit(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl ErrorType for BeatLamp {
    type Error = Infallible;
}

impl OutputPin for BeatLamp {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.store(true, Ordering::Relaxed);
        Ok(())
    }
}

//! tempo to timer reload conversion

use crate::Error;

const US_PER_MINUTE: u32 = 60_000_000;
/// 16th steps per quarter note
const STEPS_PER_BEAT: u32 = 4;

/// resolution and width of an up-counting hardware timer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timebase {
    pub us_per_tick: u32,
    pub width_bits: u8,
}

impl Timebase {
    /// atmega328p timer1 at 16 MHz with a /256 prescaler
    pub const AVR_TIMER1: Self = Self::from_clock(16_000_000, 256, 16);

    pub const fn new(us_per_tick: u32, width_bits: u8) -> Self {
        Self {
            us_per_tick,
            width_bits,
        }
    }

    /// tick length truncated to whole microseconds
    pub const fn from_clock(clock_hz: u32, prescale: u32, width_bits: u8) -> Self {
        let us_per_tick = (1_000_000u64 * prescale as u64 / clock_hz as u64) as u32;
        Self::new(us_per_tick, width_bits)
    }

    /// counter value at which the timer overflows; widths past 32 bits are
    /// treated as 32 since reload values are handed out as `u32`
    pub const fn overflow(&self) -> u64 {
        1u64 << self.overflow_bits()
    }

    const fn overflow_bits(&self) -> u8 {
        if self.width_bits > 32 {
            32
        } else {
            self.width_bits
        }
    }

    /// timer ticks for one 16th step at `bpm`
    pub fn step_ticks(&self, bpm: u8) -> Result<u64, Error> {
        if bpm == 0 {
            return Err(Error::ZeroTempo);
        }
        if self.us_per_tick == 0 {
            return Err(Error::TempoTooFast);
        }
        let us = US_PER_MINUTE / bpm as u32 / STEPS_PER_BEAT;
        Ok((us / self.us_per_tick) as u64)
    }

    /// microseconds between two overflows when the counter starts at `reload`
    pub fn period_us(&self, reload: u32) -> u64 {
        self.overflow().saturating_sub(reload as u64) * self.us_per_tick as u64
    }
}

/// value to load into the counter so that it overflows once per 16th step
pub fn timer_reload(bpm: u8, timebase: &Timebase) -> Result<u32, Error> {
    let ticks = timebase.step_ticks(bpm)?;
    if ticks == 0 {
        return Err(Error::TempoTooFast);
    }
    let overflow = timebase.overflow();
    if ticks >= overflow {
        return Err(Error::TempoTooSlow);
    }
    Ok((overflow - ticks) as u32)
}

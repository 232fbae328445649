//! polled button state; no time debouncing, so contact bounce shows up as
//! repeated edges unless the poll cadence is slow enough to hide it

use embedded_hal::digital::{ErrorType, InputPin};

/// input biasing applied by [`EdgeDetector::begin`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    None,
    Up,
}

/// pins whose input biasing can be switched at runtime
pub trait PullConfig: ErrorType {
    fn set_pull(&mut self, pull: Pull) -> Result<(), Self::Error>;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Flags(u8);

impl Flags {
    pub const NONE: Self = Self(0);
    /// leave the pin floating instead of pulling it up
    pub const NO_PULLUP: Self = Self(1 << 0);
    /// report the sampled level instead of a transition
    pub const LEVEL: Self = Self(1 << 1);
    /// high (or low-to-high) triggers instead of low (or high-to-low)
    pub const RISING: Self = Self(1 << 2);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl core::ops::BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

pub struct EdgeDetector<P> {
    pin: P,
    flags: Flags,
    /// last sampled level, high = true
    state: bool,
}

impl<P: InputPin + PullConfig> EdgeDetector<P> {
    pub fn new(pin: P, flags: Flags) -> Self {
        Self {
            pin,
            flags,
            state: true,
        }
    }

    /// configure biasing and take the current level as baseline
    pub fn begin(&mut self) -> Result<(), P::Error> {
        let pull = if self.flags.contains(Flags::NO_PULLUP) {
            Pull::None
        } else {
            Pull::Up
        };
        self.pin.set_pull(pull)?;
        self.state = self.pin.is_high()?;
        Ok(())
    }

    /// true on the configured edge, or while at the configured level
    pub fn poll(&mut self) -> Result<bool, P::Error> {
        let high = self.pin.is_high()?;
        let rising = self.flags.contains(Flags::RISING);
        if self.flags.contains(Flags::LEVEL) {
            return Ok(high == rising);
        }
        let triggered = if rising {
            !self.state && high
        } else {
            self.state && !high
        };
        self.state = high;
        Ok(triggered)
    }
}

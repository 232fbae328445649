use core::convert::Infallible;
use embassy_stm32::{
    gpio::{self, Flex, Pin},
    interrupt::{self, InterruptExt, Priority},
    peripherals::TIM3,
    timer::low_level,
    Peri,
};
use embedded_hal::digital::{ErrorType, InputPin};
use stepseq_core::{Pull, PullConfig, Timebase, Timer};

/// apb1 timer kernel clock, twice the 120 MHz bus clock
const TIM_CLOCK_HZ: u32 = 240_000_000;
const PRESCALE: u32 = 3840;
/// 16 us ticks on the 16-bit TIM3 counter
pub const TIMEBASE: Timebase = Timebase::from_clock(TIM_CLOCK_HZ, PRESCALE, 16);

/// TIM3 free-running up to overflow; steps start counting from the loaded value
pub struct StepTimer {
    tim: low_level::Timer<'static, TIM3>,
}

impl StepTimer {
    pub fn new(tim: Peri<'static, TIM3>) -> Self {
        let tim = low_level::Timer::new(tim);
        let regs = tim.regs_core();
        regs.psc().write_value((PRESCALE - 1) as u16);
        regs.arr().write(|r| r.set_arr(u16::MAX));
        // latch the prescaler, then drop the update flag that raised
        regs.egr().write(|r| r.set_ug(true));
        tim.clear_update_interrupt();
        interrupt::TIM3.set_priority(Priority::P1);
        Self { tim }
    }
}

impl Timer for StepTimer {
    fn load(&mut self, reload: u32) {
        self.tim
            .regs_core()
            .cnt()
            .write(|r| r.set_cnt(reload as u16));
    }

    fn arm(&mut self) {
        self.tim.clear_update_interrupt();
        self.tim.enable_update_interrupt(true);
        unsafe { interrupt::TIM3.enable() };
        self.tim.start();
    }
}

/// clear the TIM3 update flag; call first thing in the handler
pub fn acknowledge_overflow() {
    embassy_stm32::pac::TIM3.sr().modify(|r| r.set_uif(false));
}

/// push button to ground
pub struct Button<'d>(Flex<'d>);

impl<'d> Button<'d> {
    pub fn new(pin: Peri<'d, impl Pin>) -> Self {
        Self(Flex::new(pin))
    }
}

impl ErrorType for Button<'_> {
    type Error = Infallible;
}

impl InputPin for Button<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.is_low())
    }
}

impl PullConfig for Button<'_> {
    fn set_pull(&mut self, pull: Pull) -> Result<(), Self::Error> {
        self.0.set_as_input(match pull {
            Pull::None => gpio::Pull::None,
            Pull::Up => gpio::Pull::Up,
        });
        Ok(())
    }
}

//! Clock tree bring-up.
//!
//! Brings the chip from its reset clock (OSC8M ÷ 8) to the DFLL48M running closed loop at
//! 48 MHz on GCLK0, with OSC32K feeding the RTC through GCLK2.
//!
//! The sequence is written against [`ClockHw`] so it can be replayed on a model of the
//! clock system. [`Samd21Clocks`] is the register-level implementation used by [`crate::init`].

mod config;
pub use config::*;

mod hw;
pub use hw::Samd21Clocks;

use core::sync::atomic::{AtomicBool, Ordering};

use crate::calibration::{self, CalibrationSource, NvmCalibration};
use crate::time::Hertz;

// =============================================================================
// Global Clock State
// =============================================================================

/// Whether `CLOCK_FREQS` has been initialized by `set_freqs()`.
static CLOCK_FREQS_INIT: AtomicBool = AtomicBool::new(false);

static mut CLOCK_FREQS: Clocks = Clocks::ZERO;

/// Sets the clock frequencies.
///
/// Safety: Sets a mutable global.
pub(crate) unsafe fn set_freqs(freqs: Clocks) {
    debug!("clock: {:?}", freqs);
    unsafe { CLOCK_FREQS = freqs };
    CLOCK_FREQS_INIT.store(true, Ordering::Release);
}

/// Get the clock tree configured by [`init`](crate::init).
///
/// # Panics
///
/// Panics if called before `init()`.
pub fn clocks() -> &'static Clocks {
    assert!(
        CLOCK_FREQS_INIT.load(Ordering::Acquire),
        "clock: clocks() called before init()"
    );
    unsafe { &*core::ptr::addr_of!(CLOCK_FREQS) }
}

// =============================================================================
// Constants
// =============================================================================

pub const OSC32K_FREQ: Hertz = Hertz::hz(32_768);
pub const OSC8M_FREQ: Hertz = Hertz::mhz(8);
pub const DFLL48M_FREQ: Hertz = Hertz::mhz(48);
/// USB start-of-frame rate used as the DFLL48M reference in USB clock recovery mode.
pub const USB_SOF_FREQ: Hertz = Hertz::khz(1);

/// OSC32K `STARTUP` = 6: 34 cycles, about 1 ms.
pub const OSC32K_STARTUP: u8 = 6;
/// `DFLLVAL.FINE` midpoint written before the loop locks.
pub const DFLL_FINE_MIDPOINT: u16 = 0x1FF;
/// `DFLLMUL.CSTEP`, a quarter of the coarse range.
pub const DFLL_CSTEP: u8 = 31 / 4;
/// `DFLLMUL.FSTEP`
pub const DFLL_FSTEP: u16 = 10;

// =============================================================================
// Clock Tree Types
// =============================================================================

/// Frequencies of the clock tree after bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Clocks {
    pub dfll48m: Hertz,
    /// Main clock
    pub gclk0: Hertz,
    /// DFLL48M reference
    pub gclk1: Hertz,
    pub gclk2: Hertz,
    pub gclk3: Hertz,
    pub cpu: Hertz,
    pub apba: Hertz,
    pub apbb: Hertz,
    pub apbc: Hertz,
    /// RTC counter clock (GCLK2)
    pub rtc: Hertz,
    /// `SERCOMx_CORE` clock of every enabled serial block (GCLK0)
    pub sercom_core: Hertz,
}

impl Clocks {
    const ZERO: Self = Self {
        dfll48m: Hertz(0),
        gclk0: Hertz(0),
        gclk1: Hertz(0),
        gclk2: Hertz(0),
        gclk3: Hertz(0),
        cpu: Hertz(0),
        apba: Hertz(0),
        apbb: Hertz(0),
        apbc: Hertz(0),
        rtc: Hertz(0),
        sercom_core: Hertz(0),
    };
}

/// Generic clock generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Generator {
    Gclk0 = 0,
    Gclk1 = 1,
    Gclk2 = 2,
    Gclk3 = 3,
    Gclk4 = 4,
    Gclk5 = 5,
    Gclk6 = 6,
    Gclk7 = 7,
    Gclk8 = 8,
}

/// Generator input (`GENCTRL.SRC`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Source {
    Xosc = 0,
    GclkIn = 1,
    GclkGen1 = 2,
    OscUlp32k = 3,
    Osc32k = 4,
    Xosc32k = 5,
    Osc8m = 6,
    Dfll48m = 7,
    Fdpll96m = 8,
}

/// Peripheral clock channel (`CLKCTRL.ID`). Only channels bring-up touches are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Channel {
    /// DFLL48M reference input
    Dfll48 = 0x00,
    Rtc = 0x04,
    Sercom0Core = 0x14,
    Sercom1Core = 0x15,
    Sercom2Core = 0x16,
    Sercom3Core = 0x17,
    Sercom4Core = 0x18,
    Sercom5Core = 0x19,
}

/// Serial communication block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Sercom {
    Sercom0 = 0,
    Sercom1 = 1,
    Sercom2 = 2,
    Sercom3 = 3,
    Sercom4 = 4,
    Sercom5 = 5,
}

impl Sercom {
    pub const ALL: [Sercom; 6] = [
        Sercom::Sercom0,
        Sercom::Sercom1,
        Sercom::Sercom2,
        Sercom::Sercom3,
        Sercom::Sercom4,
        Sercom::Sercom5,
    ];

    pub const fn index(self) -> u8 {
        self as u8
    }

    /// The `SERCOMx_CORE` generic clock channel.
    pub const fn core_channel(self) -> Channel {
        match self {
            Sercom::Sercom0 => Channel::Sercom0Core,
            Sercom::Sercom1 => Channel::Sercom1Core,
            Sercom::Sercom2 => Channel::Sercom2Core,
            Sercom::Sercom3 => Channel::Sercom3Core,
            Sercom::Sercom4 => Channel::Sercom4Core,
            Sercom::Sercom5 => Channel::Sercom5Core,
        }
    }
}

/// APB bus clock gate in the power manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApbGate {
    /// APBA, GCLK register interface
    Gclk,
    /// APBA, RTC register interface
    Rtc,
    /// APBC
    Sercom(Sercom),
}

/// DFLL48M control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DfllCtrl {
    pub enable: bool,
    /// Closed-loop operation
    pub mode: bool,
    /// Chill cycle disable
    pub ccdis: bool,
    /// USB clock recovery
    pub usbcrm: bool,
    /// Bypass coarse lock
    pub bplckc: bool,
    pub on_demand: bool,
}

impl DfllCtrl {
    pub const DISABLED: Self = Self {
        enable: false,
        mode: false,
        ccdis: false,
        usbcrm: false,
        bplckc: false,
        on_demand: false,
    };
}

/// DFLL48M multiplier word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DfllMul {
    pub mul: u16,
    pub fstep: u16,
    pub cstep: u8,
}

/// Generator control word, written together with the generator id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GenCtrl {
    pub source: Source,
    pub enable: bool,
    pub improve_duty_cycle: bool,
}

/// A hardware state bring-up waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Condition {
    /// `PCLKSR.OSC32KRDY`
    Osc32kReady,
    /// `PCLKSR.OSC8MRDY`
    Osc8mReady,
    /// `PCLKSR.DFLLRDY`, also the DFLL register synchronizer
    DfllReady,
    /// `CTRL.SWRST` cleared and the GCLK synchronizer idle
    GclkResetDone,
    /// `STATUS.SYNCBUSY` cleared
    GclkSynced,
}

impl Condition {
    pub const ALL: [Condition; 5] = [
        Condition::Osc32kReady,
        Condition::Osc8mReady,
        Condition::DfllReady,
        Condition::GclkResetDone,
        Condition::GclkSynced,
    ];
}

/// Register-level operations of the SYSCTRL, GCLK, PM and NVMCTRL blocks used by
/// [`bring_up`].
///
/// Every write returns as soon as the register interface accepts it. Completion is
/// observed through [`ClockHw::is_met`].
pub trait ClockHw {
    /// `NVMCTRL.CTRLB.RWS`
    fn set_flash_wait_states(&mut self, wait_states: u8);
    /// `NVMCTRL.CTRLB.MANW`
    fn set_manual_nvm_write(&mut self, manual: bool);
    fn set_apb_gate(&mut self, gate: ApbGate, enabled: bool);
    /// PM `CPUSEL` and `APBxSEL`
    fn set_bus_dividers(&mut self, dividers: BusDividers);
    /// Enable OSC32K with both outputs and the given trim.
    fn enable_osc32k(&mut self, calib: u8, startup: u8);
    fn configure_osc8m(&mut self, prescaler: Osc8mPrescaler, on_demand: bool);
    fn write_dfll_ctrl(&mut self, ctrl: DfllCtrl);
    fn write_dfll_val(&mut self, coarse: u8, fine: u16);
    fn write_dfll_mul(&mut self, mul: DfllMul);
    /// `GCLK.CTRL.SWRST`
    fn reset_gclk(&mut self);
    fn set_generator_divider(&mut self, generator: Generator, divider: u16);
    fn set_generator_control(&mut self, generator: Generator, ctrl: GenCtrl);
    /// Route `channel` to `generator` and enable it (`CLKCTRL.CLKEN`).
    fn route_channel(&mut self, channel: Channel, generator: Generator);
    /// Sample the hardware state `condition` refers to.
    fn is_met(&mut self, condition: Condition) -> bool;
}

/// Spin until `condition` holds. There is no timeout: a clock that never becomes ready
/// leaves the chip unusable anyway.
pub fn poll_until<H: ClockHw + ?Sized>(hw: &mut H, condition: Condition) {
    while !hw.is_met(condition) {
        core::hint::spin_loop();
    }
}

/// GCLK synchronization barrier: wait until the last GCLK register write has taken effect.
pub fn wait_for_sync<H: ClockHw + ?Sized>(hw: &mut H) {
    poll_until(hw, Condition::GclkSynced);
}

/// Program a generator from its row of the generator table, then enable it.
fn start_generator<H: ClockHw + ?Sized>(hw: &mut H, row: &GeneratorConfig) {
    let generator = row.generator;
    trace!("clock: {:?} <- {:?} / {}", generator, row.source, row.divider);
    hw.set_generator_divider(generator, row.divider);
    wait_for_sync(hw);
    hw.set_generator_control(
        generator,
        GenCtrl {
            source: row.source,
            enable: true,
            improve_duty_cycle: row.improve_duty_cycle,
        },
    );
    wait_for_sync(hw);
}

fn route<H: ClockHw + ?Sized>(hw: &mut H, channel: Channel, generator: Generator) {
    trace!("clock: {:?} -> {:?}", generator, channel);
    hw.route_channel(channel, generator);
    wait_for_sync(hw);
}

/// Bring the DFLL48M into closed-loop operation.
///
/// The DFLL register interface only accepts writes while the oscillator is enabled
/// (SAMD21 errata 1.2.1), so it is first started open loop with `ONDEMAND` cleared,
/// trimmed and given its multiplier, then stopped and restarted in closed-loop mode.
fn start_dfll<H: ClockHw + ?Sized>(hw: &mut H, config: &ConfigBuilder, coarse: u8) {
    let usb = config.dfll_reference == DfllReference::UsbSof;

    hw.write_dfll_ctrl(DfllCtrl {
        enable: true,
        ..DfllCtrl::DISABLED
    });
    poll_until(hw, Condition::DfllReady);

    hw.write_dfll_val(coarse, DFLL_FINE_MIDPOINT);
    poll_until(hw, Condition::DfllReady);

    let mul = DfllMul {
        mul: config.dfll_multiplier(),
        fstep: DFLL_FSTEP,
        cstep: DFLL_CSTEP,
    };
    trace!("clock: DFLL48M {:?}", mul);
    hw.write_dfll_mul(mul);
    poll_until(hw, Condition::DfllReady);

    hw.write_dfll_ctrl(DfllCtrl::DISABLED);
    poll_until(hw, Condition::DfllReady);

    let closed_loop = DfllCtrl {
        enable: false,
        mode: true,
        ccdis: true,
        usbcrm: usb,
        bplckc: true,
        on_demand: false,
    };
    hw.write_dfll_ctrl(closed_loop);
    poll_until(hw, Condition::DfllReady);

    hw.write_dfll_ctrl(DfllCtrl {
        enable: true,
        ..closed_loop
    });
    poll_until(hw, Condition::DfllReady);
}

/// Run the full clock tree bring-up on `hw` and return the resulting frequencies.
///
/// Generators are always started before a channel is routed to them, and a channel is
/// always routed before its APB gate is opened.
pub fn bring_up<H, S>(hw: &mut H, trims: &S, config: &Config) -> Clocks
where
    H: ClockHw + ?Sized,
    S: CalibrationSource + ?Sized,
{
    let config = config.builder();

    // The core runs undivided from GCLK0 until the bus dividers are written.
    let wait_states = config.flash_wait_states();
    trace!("clock: flash wait states = {}", wait_states);
    hw.set_flash_wait_states(wait_states);

    hw.set_apb_gate(ApbGate::Gclk, true);
    hw.set_apb_gate(ApbGate::Rtc, false);

    let cal = calibration::read_calibration(trims);
    hw.enable_osc32k(cal.osc32k, OSC32K_STARTUP);
    poll_until(hw, Condition::Osc32kReady);
    trace!("clock: OSC32K ready");

    hw.reset_gclk();
    poll_until(hw, Condition::GclkResetDone);

    start_generator(hw, &GENERATORS[Generator::Gclk1 as usize]);
    route(hw, Channel::Dfll48, Generator::Gclk1);

    start_dfll(hw, config, cal.dfll_coarse);
    trace!("clock: DFLL48M locked");

    // Core clock switches to the DFLL here.
    start_generator(hw, &GENERATORS[Generator::Gclk0 as usize]);

    hw.configure_osc8m(config.osc8m_prescaler, false);
    poll_until(hw, Condition::Osc8mReady);
    start_generator(hw, &GENERATORS[Generator::Gclk3 as usize]);

    start_generator(hw, &GENERATORS[Generator::Gclk2 as usize]);
    route(hw, Channel::Rtc, Generator::Gclk2);
    hw.set_apb_gate(ApbGate::Rtc, true);

    hw.set_bus_dividers(config.dividers);

    hw.set_manual_nvm_write(true);

    for sercom in config.sercoms.iter() {
        route(hw, sercom.core_channel(), Generator::Gclk0);
        hw.set_apb_gate(ApbGate::Sercom(sercom), true);
    }

    config.clocks()
}

/// Bring up the clock tree and publish the frequencies for [`clocks()`].
///
/// # Safety
///
/// Must be called once, before any peripheral is used.
pub(crate) unsafe fn init(config: Config) {
    let freqs = bring_up(&mut Samd21Clocks::new(), &NvmCalibration, &config);
    set_freqs(freqs);
}

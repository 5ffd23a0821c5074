//! Clock tree configuration and compile-time validation.

use crate::time::Hertz;

use super::{Clocks, Generator, Sercom, Source};
use super::{DFLL48M_FREQ, OSC32K_FREQ, OSC8M_FREQ, USB_SOF_FREQ};

/// Reference clock the DFLL48M locks to in closed-loop mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DfllReference {
    /// USB start-of-frame clock recovery (1 kHz). Requires a 48 MHz target.
    UsbSof,
    /// GCLK1, i.e. OSC32K undivided.
    Gclk1,
}

impl DfllReference {
    pub const fn frequency(self) -> Hertz {
        match self {
            DfllReference::UsbSof => USB_SOF_FREQ,
            DfllReference::Gclk1 => OSC32K_FREQ,
        }
    }
}

/// OSC8M output prescaler (`OSC8M.PRESC`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Osc8mPrescaler {
    Div1 = 0,
    Div2 = 1,
    Div4 = 2,
    Div8 = 3,
}

impl Osc8mPrescaler {
    pub const fn frequency(self) -> Hertz {
        Hertz(OSC8M_FREQ.0 >> (self as u32))
    }
}

/// PM bus clock divider (`CPUSEL`, `APBxSEL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BusDivider {
    Div1 = 0,
    Div2 = 1,
    Div4 = 2,
    Div8 = 3,
    Div16 = 4,
    Div32 = 5,
    Div64 = 6,
    Div128 = 7,
}

impl BusDivider {
    pub const fn divide(self, freq: Hertz) -> Hertz {
        Hertz(freq.0 >> (self as u32))
    }
}

/// Dividers applied to the main clock (GCLK0) for the CPU and each APB bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusDividers {
    pub cpu: BusDivider,
    pub apba: BusDivider,
    pub apbb: BusDivider,
    pub apbc: BusDivider,
}

impl BusDividers {
    pub const DIV1: Self = Self {
        cpu: BusDivider::Div1,
        apba: BusDivider::Div1,
        apbb: BusDivider::Div1,
        apbc: BusDivider::Div1,
    };
}

/// Set of SERCOM blocks whose core clock is enabled during bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SercomSet(u8);

impl SercomSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn with(self, sercom: Sercom) -> Self {
        Self(self.0 | 1 << sercom.index())
    }

    pub const fn without(self, sercom: Sercom) -> Self {
        Self(self.0 & !(1 << sercom.index()))
    }

    pub const fn contains(self, sercom: Sercom) -> bool {
        self.0 & (1 << sercom.index()) != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Sercom> {
        Sercom::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

/// One row of the generator assignment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GeneratorConfig {
    pub generator: Generator,
    pub source: Source,
    /// `GENDIV.DIV`; 0 and 1 both mean undivided.
    pub divider: u16,
    /// `GENCTRL.IDC`
    pub improve_duty_cycle: bool,
}

impl GeneratorConfig {
    pub const fn output(&self, source_freq: Hertz) -> Hertz {
        if self.divider <= 1 {
            source_freq
        } else {
            Hertz(source_freq.0 / self.divider as u32)
        }
    }
}

/// Generator assignment, in the order they are referenced by [`Generator`] index.
///
/// - GCLK0: CPU and serial cores, from the locked DFLL48M
/// - GCLK1: DFLL48M reference, OSC32K undivided
/// - GCLK2: RTC, OSC32K undivided
/// - GCLK3: auxiliary, OSC8M
pub const GENERATORS: [GeneratorConfig; 4] = [
    GeneratorConfig {
        generator: Generator::Gclk0,
        source: Source::Dfll48m,
        divider: 1,
        improve_duty_cycle: true,
    },
    GeneratorConfig {
        generator: Generator::Gclk1,
        source: Source::Osc32k,
        divider: 1,
        improve_duty_cycle: false,
    },
    GeneratorConfig {
        generator: Generator::Gclk2,
        source: Source::Osc32k,
        divider: 1,
        improve_duty_cycle: false,
    },
    GeneratorConfig {
        generator: Generator::Gclk3,
        source: Source::Osc8m,
        divider: 1,
        improve_duty_cycle: false,
    },
];

/// Look up the assignment of `generator` in [`GENERATORS`].
///
/// Returns `None` for generators bring-up leaves untouched.
pub const fn generator_config(generator: Generator) -> Option<GeneratorConfig> {
    let index = generator as usize;
    if index < GENERATORS.len() {
        Some(GENERATORS[index])
    } else {
        None
    }
}

/// Highest core frequency the ATSAMD21 is specified for.
pub const MAX_CPU_FREQ: Hertz = Hertz::mhz(48);

/// Flash read wait states needed at `cpu` with VDD in 2.7 V..3.63 V.
pub const fn flash_wait_states(cpu: Hertz) -> u8 {
    if cpu.0 <= Hertz::mhz(24).0 {
        0
    } else {
        1
    }
}

/// Clock configuration
///
/// Defaults:
/// - DFLL48M at 48 MHz, closed loop on USB SOF
/// - CPU and all APB bridges undivided
/// - OSC8M undivided on GCLK3
/// - SERCOM0 (console UART) and SERCOM3 (I2C) clocked from GCLK0
#[non_exhaustive]
pub struct ConfigBuilder {
    /// DFLL48M closed-loop reference
    pub dfll_reference: DfllReference,
    /// DFLL48M output frequency
    pub dfll_target: Hertz,
    /// OSC8M prescaler for GCLK3
    pub osc8m_prescaler: Osc8mPrescaler,
    /// CPU and APB dividers
    pub dividers: BusDividers,
    /// SERCOM blocks to clock from GCLK0
    pub sercoms: SercomSet,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub const fn new() -> Self {
        Self {
            dfll_reference: DfllReference::UsbSof,
            dfll_target: DFLL48M_FREQ,
            osc8m_prescaler: Osc8mPrescaler::Div1,
            dividers: BusDividers::DIV1,
            sercoms: SercomSet::empty().with(Sercom::Sercom0).with(Sercom::Sercom3),
        }
    }

    pub const fn with_dfll_reference(mut self, reference: DfllReference) -> Self {
        self.dfll_reference = reference;
        self
    }

    pub const fn with_dfll_target(mut self, target: Hertz) -> Self {
        self.dfll_target = target;
        self
    }

    pub const fn with_osc8m_prescaler(mut self, prescaler: Osc8mPrescaler) -> Self {
        self.osc8m_prescaler = prescaler;
        self
    }

    pub const fn with_dividers(mut self, dividers: BusDividers) -> Self {
        self.dividers = dividers;
        self
    }

    pub const fn with_sercoms(mut self, sercoms: SercomSet) -> Self {
        self.sercoms = sercoms;
        self
    }

    /// Validate the clock configuration at compile time.
    ///
    /// Panics with a descriptive message if the configuration is invalid.
    /// Use inside `const { }` blocks to get compile-time errors.
    ///
    /// Note: Uses `::core::panic!` to bypass defmt's panic override,
    /// which is not const-compatible.
    pub const fn check(&self) {
        let reference = self.dfll_reference.frequency();

        if self.dfll_target.0 < reference.0 {
            ::core::panic!("DFLL48M target is below its reference frequency");
        }

        if let DfllReference::UsbSof = self.dfll_reference {
            if self.dfll_target.0 != DFLL48M_FREQ.0 {
                ::core::panic!("USB clock recovery requires a 48 MHz DFLL48M target");
            }
        }

        if self.dfll_multiplier() as u32 != self.dfll_target.div_round(reference) {
            ::core::panic!("DFLL48M multiplier does not fit DFLLMUL.MUL (16 bits)");
        }

        // The core runs undivided from GCLK0 until `CPUSEL` is written, so the limit applies
        // to the DFLL48M target. Multiplier rounding is not counted against it.
        #[cfg(not(feature = "unchecked-overclocking"))]
        if self.dfll_target.0 > MAX_CPU_FREQ.0 {
            ::core::panic!("CPU frequency exceeds maximum limit (48 MHz)");
        }
    }

    /// Validate and return a [`Config`]. Use in `const { }` blocks for compile-time checking.
    ///
    /// ```rust,ignore
    /// const { clock::ConfigBuilder::new().with_dfll_reference(DfllReference::Gclk1).checked() }
    /// ```
    pub const fn checked(self) -> Config {
        self.check();
        Config(self)
    }

    /// `DFLLMUL.MUL`: target ÷ reference, rounded to nearest.
    pub const fn dfll_multiplier(&self) -> u16 {
        self.dfll_target.div_round(self.dfll_reference.frequency()) as u16
    }

    /// Locked DFLL48M output: the multiplier times the reference.
    pub const fn dfll_freq(&self) -> Hertz {
        Hertz(self.dfll_multiplier() as u32 * self.dfll_reference.frequency().0)
    }

    pub const fn cpu_freq(&self) -> Hertz {
        self.dividers.cpu.divide(self.gclk_freq(Generator::Gclk0))
    }

    /// Wait states for GCLK0, which clocks the core undivided from the DFLL48M switch until
    /// `CPUSEL` is written.
    pub const fn flash_wait_states(&self) -> u8 {
        flash_wait_states(self.gclk_freq(Generator::Gclk0))
    }

    pub(crate) const fn source_freq(&self, source: Source) -> Hertz {
        match source {
            Source::Osc32k => OSC32K_FREQ,
            Source::Osc8m => self.osc8m_prescaler.frequency(),
            Source::Dfll48m => self.dfll_freq(),
            // Bring-up never assigns the remaining sources.
            _ => Hertz(0),
        }
    }

    pub(crate) const fn gclk_freq(&self, generator: Generator) -> Hertz {
        match generator_config(generator) {
            Some(row) => row.output(self.source_freq(row.source)),
            None => Hertz(0),
        }
    }

    pub(crate) const fn clocks(&self) -> Clocks {
        let gclk0 = self.gclk_freq(Generator::Gclk0);
        Clocks {
            dfll48m: self.dfll_freq(),
            gclk0,
            gclk1: self.gclk_freq(Generator::Gclk1),
            gclk2: self.gclk_freq(Generator::Gclk2),
            gclk3: self.gclk_freq(Generator::Gclk3),
            cpu: self.dividers.cpu.divide(gclk0),
            apba: self.dividers.apba.divide(gclk0),
            apbb: self.dividers.apbb.divide(gclk0),
            apbc: self.dividers.apbc.divide(gclk0),
            rtc: self.gclk_freq(Generator::Gclk2),
            sercom_core: gclk0,
        }
    }
}

/// A validated clock configuration.
///
/// Can only be constructed via [`ConfigBuilder::checked()`], which validates at
/// compile time when used inside a `const { }` block.
pub struct Config(pub(crate) ConfigBuilder);

impl Default for Config {
    fn default() -> Self {
        const { ConfigBuilder::new().checked() }
    }
}

impl Config {
    pub fn builder(&self) -> &ConfigBuilder {
        &self.0
    }
}

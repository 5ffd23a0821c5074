//! NVM software calibration area (factory oscillator trims).
//!
//! The ATSAMD21 stores per-die trim values in the NVM software calibration area,
//! a 64-bit row at OTP4 (`0x0080_6020`). Clock bring-up needs two fields from its
//! second word: the OSC32K frequency trim and the DFLL48M coarse trim.

// `bitfield-struct` generates `const fn` setters that call `panic!` on out-of-range values.
// This crate defines a `panic!` macro that maps to `defmt::panic!` when `defmt` is enabled,
// which is not usable in const-eval. Shadow it here so the generated code uses `core::panic!`.
#[allow(unused_macros)]
macro_rules! panic {
    ($($x:tt)*) => {
        ::core::panic!($($x)*)
    };
}

use bitfield_struct::bitfield;

/// Second word of the NVM software calibration row (OTP4 + 4).
const SW_CALIB_WORD1: usize = 0x0080_6020 + 4;

/// Raw DFLL48M coarse value reserved to mean "not calibrated".
pub const DFLL_COARSE_SENTINEL: u8 = 0x3F;

/// Half-scale coarse value used in place of [`DFLL_COARSE_SENTINEL`].
pub const DFLL_COARSE_FALLBACK: u8 = 0x1F;

/// Second word of the NVM software calibration row (OTP4 + 4).
#[bitfield(u32, defmt = cfg(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct CalibrationWord {
    /// [34:32] upper bits of ADC_LINEARITY
    #[bits(3)]
    pub adc_linearity_hi: u8,
    /// [37:35] ADC_BIASCAL
    #[bits(3)]
    pub adc_biascal: u8,
    /// [44:38] OSC32K_CAL
    #[bits(7)]
    pub osc32k_cal: u8,
    /// [49:45] USB_TRANSN
    #[bits(5)]
    pub usb_transn: u8,
    /// [54:50] USB_TRANSP
    #[bits(5)]
    pub usb_transp: u8,
    /// [57:55] USB_TRIM
    #[bits(3)]
    pub usb_trim: u8,
    /// [63:58] DFLL48M_COARSE_CAL
    #[bits(6)]
    pub dfll48m_coarse_cal: u8,
}

/// Something that can produce the raw calibration word.
///
/// The hardware implementation is [`NvmCalibration`]; tests substitute fixed words.
pub trait CalibrationSource {
    /// Read the raw second word of the calibration row. Must have no side effects.
    fn read_word(&self) -> u32;
}

/// Reads the calibration word from its fixed NVM address.
#[derive(Debug, Clone, Copy, Default)]
pub struct NvmCalibration;

impl CalibrationSource for NvmCalibration {
    fn read_word(&self) -> u32 {
        // The calibration row is always mapped and readable.
        unsafe { core::ptr::read_volatile(SW_CALIB_WORD1 as *const u32) }
    }
}

impl CalibrationSource for u32 {
    fn read_word(&self) -> u32 {
        *self
    }
}

/// Oscillator trims ready to be written into SYSCTRL.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    /// OSC32K `CALIB` field, used verbatim.
    pub osc32k: u8,
    /// DFLL48M `DFLLVAL.COARSE`, never [`DFLL_COARSE_SENTINEL`].
    pub dfll_coarse: u8,
}

impl Calibration {
    /// Decode the trims, replacing an uncalibrated coarse value with half scale.
    pub fn decode(word: CalibrationWord) -> Self {
        let mut dfll_coarse = word.dfll48m_coarse_cal();
        if dfll_coarse == DFLL_COARSE_SENTINEL {
            warn!(
                "calibration: DFLL48M coarse is unprogrammed, using {:#x}",
                DFLL_COARSE_FALLBACK
            );
            dfll_coarse = DFLL_COARSE_FALLBACK;
        }

        Self {
            osc32k: word.osc32k_cal(),
            dfll_coarse,
        }
    }
}

/// Read and decode the oscillator trims from `source`.
pub fn read_calibration<S: CalibrationSource + ?Sized>(source: &S) -> Calibration {
    let calibration = Calibration::decode(CalibrationWord::from(source.read_word()));
    trace!("calibration: {:?}", calibration);
    calibration
}

#[cfg(test)]
mod tests;

//! Time units

use core::fmt::Display;

/// Monotonic timestamp, microseconds since the RTC counter was started.
pub type Instant = fugit::TimerInstantU64<1_000_000>;

/// Microsecond duration, as accepted by [`Monotonic::sleep_for`](crate::rtc::Monotonic::sleep_for).
pub type Duration = fugit::MicrosDurationU64;

/// Hertz
#[derive(PartialEq, PartialOrd, Clone, Copy, Debug, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hertz(pub u32);

impl Display for Hertz {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

impl Hertz {
    /// Create a `Hertz` from the given hertz.
    pub const fn hz(hertz: u32) -> Self {
        Self(hertz)
    }

    /// Create a `Hertz` from the given kilohertz.
    pub const fn khz(kilohertz: u32) -> Self {
        Self(kilohertz * 1_000)
    }

    /// Create a `Hertz` from the given megahertz.
    pub const fn mhz(megahertz: u32) -> Self {
        Self(megahertz * 1_000_000)
    }

    /// `self / other`, rounded to the nearest integer.
    pub const fn div_round(self, other: Hertz) -> u32 {
        (self.0 + other.0 / 2) / other.0
    }
}

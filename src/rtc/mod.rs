//! RTC-based monotonic timebase.
//!
//! The RTC runs free in 32-bit counter mode from OSC32K (GCLK2). [`Monotonic`] folds counter
//! readings into a 64-bit microsecond timestamp and sleeps by arming compare 0 and waiting
//! for its interrupt.
//!
//! ```rust,ignore
//! bind_interrupts!(struct Irqs {
//!     RTC => rtc::InterruptHandler;
//! });
//!
//! let p = samd21_timebase::init(Default::default());
//! let mut mono = rtc::Monotonic::new_rtc(p.RTC, Irqs, rtc::Config::default());
//! mono.sleep_for(Duration::millis(100));
//! ```

mod low_level;
pub use low_level::RtcCounter;

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_hal_internal::Peripheral;

use crate::interrupt::{self, Priority};
use crate::peripherals;
use crate::time::{Duration, Instant};

/// Microseconds per RTC tick at 32 768 Hz, truncated from 30.52.
///
/// The truncation makes the timebase run about 1.7 % slow against real time.
pub const TICK_SCALE_US: u64 = 30;

/// Longest single compare-match wait, in microseconds.
pub const MAX_CHUNK_US: u64 = u32::MAX as u64;

/// Wakeup signal from the compare-match interrupt to a sleeping caller.
///
/// Single producer, single consumer: only the interrupt handler calls [`signal`](Self::signal)
/// and only the sleeper calls [`clear`](Self::clear), before arming the compare.
pub struct WakeFlag(AtomicBool);

impl WakeFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for WakeFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Flag shared between [`InterruptHandler`] and [`Monotonic::new_rtc`].
static WAKE: WakeFlag = WakeFlag::new();

/// Free-running counter with a single compare channel.
pub trait Counter {
    /// Synchronized read of the current count.
    fn read_count(&mut self) -> u32;
    fn set_compare(&mut self, value: u32);
    fn enable_compare_interrupt(&mut self);
    /// Acknowledge a pending compare match. Called from interrupt context.
    fn clear_compare_flag(&self);
    /// Halt until any interrupt is taken.
    fn wait_for_interrupt(&mut self);
}

/// Compare-match service routine: acknowledge the match and wake the sleeper.
pub fn service_compare_match<C: Counter + ?Sized>(counter: &C, wake: &WakeFlag) {
    counter.clear_compare_flag();
    wake.signal();
}

/// Compare-match interrupt handler for the RTC.
pub struct InterruptHandler {
    _private: (),
}

impl interrupt::typelevel::Handler<interrupt::typelevel::RTC> for InterruptHandler {
    unsafe fn on_interrupt() {
        let counter = RtcCounter::steal();
        service_compare_match(&counter, &WAKE);
    }
}

/// RTC configuration
#[non_exhaustive]
#[derive(Clone, Copy)]
pub struct Config {
    /// NVIC priority of the `RTC` interrupt
    pub priority: Priority,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            priority: Priority::P3,
        }
    }
}

/// Wraparound-safe 64-bit microsecond clock over a 32-bit counter.
///
/// Only call from thread mode. Using it from an interrupt handler races with the
/// read-modify-write of the accumulated timestamp.
pub struct Monotonic<'a, C: Counter> {
    counter: C,
    wake: &'a WakeFlag,
    timestamp: u64,
    last_count: u32,
}

impl<'d> Monotonic<'static, RtcCounter<'d>> {
    /// Start the RTC and build a timebase on it.
    ///
    /// Requires [`init`](crate::init) to have run so the RTC has a clock.
    pub fn new_rtc(
        rtc: impl Peripheral<P = peripherals::RTC> + 'd,
        _irq: impl interrupt::typelevel::Binding<interrupt::typelevel::RTC, InterruptHandler> + 'd,
        config: Config,
    ) -> Self {
        Self::new(RtcCounter::new(rtc, config.priority), &WAKE)
    }
}

impl<'a, C: Counter> Monotonic<'a, C> {
    /// The timestamp starts at zero with the counter assumed to be at zero.
    pub fn new(counter: C, wake: &'a WakeFlag) -> Self {
        Self {
            counter,
            wake,
            timestamp: 0,
            last_count: 0,
        }
    }

    pub fn counter(&self) -> &C {
        &self.counter
    }

    /// Read the counter and advance the timestamp by the ticks elapsed since the last read.
    pub fn tick_now(&mut self) -> Instant {
        let count = self.counter.read_count();
        let ticks = count.wrapping_sub(self.last_count);
        self.timestamp += u64::from(ticks) * TICK_SCALE_US;
        self.last_count = count;
        Instant::from_ticks(self.timestamp)
    }

    /// Block for at least `duration`.
    ///
    /// Waits are split into chunks of at most [`MAX_CHUNK_US`]. Each chunk is rounded up to
    /// whole ticks, with a minimum of one, so a chunk may overshoot by up to one tick.
    pub fn sleep_for(&mut self, duration: Duration) {
        let mut remaining = duration.ticks();

        while remaining != 0 {
            self.tick_now();
            let base = self.last_count;

            let chunk = remaining.min(MAX_CHUNK_US);
            let ticks = chunk_ticks(chunk);

            self.wake.clear();
            self.counter.set_compare(base.wrapping_add(ticks));
            // Drop a match latched while the interrupt was masked.
            self.counter.clear_compare_flag();
            self.counter.enable_compare_interrupt();

            // The counter may pass a short compare before the write synchronizes. No match
            // fires in that case, so check the count once more.
            self.tick_now();
            if self.last_count.wrapping_sub(base) < ticks {
                // Other interrupts also end `wfi`.
                while !self.wake.is_set() {
                    self.counter.wait_for_interrupt();
                }
            }

            remaining -= chunk;
        }
    }
}

/// Counter ticks covering `chunk_us`, never zero.
fn chunk_ticks(chunk_us: u64) -> u32 {
    let ticks = chunk_us.div_ceil(TICK_SCALE_US).max(1);
    // chunk_us <= u32::MAX, so this is at most u32::MAX / 30 + 1.
    ticks as u32
}

impl<C: Counter> embedded_hal_1::delay::DelayNs for Monotonic<'_, C> {
    fn delay_ns(&mut self, ns: u32) {
        self.sleep_for(Duration::from_ticks(u64::from(ns.div_ceil(1_000))));
    }

    fn delay_us(&mut self, us: u32) {
        self.sleep_for(Duration::from_ticks(u64::from(us)));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.sleep_for(Duration::from_ticks(u64::from(ms) * 1_000));
    }
}

impl<C: Counter> embedded_hal_02::blocking::delay::DelayUs<u32> for Monotonic<'_, C> {
    fn delay_us(&mut self, us: u32) {
        self.sleep_for(Duration::from_ticks(u64::from(us)));
    }
}

impl<C: Counter> embedded_hal_02::blocking::delay::DelayMs<u32> for Monotonic<'_, C> {
    fn delay_ms(&mut self, ms: u32) {
        self.sleep_for(Duration::from_ticks(u64::from(ms) * 1_000));
    }
}

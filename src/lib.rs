#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]
#![allow(unsafe_op_in_unsafe_fn)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

#[cfg(feature = "unstable-pac")]
pub use atsamd21g as pac;
#[cfg(not(feature = "unstable-pac"))]
pub(crate) use atsamd21g as pac;

pub mod calibration;
pub mod clock;
pub mod interrupt;
pub mod rtc;
pub mod time;

#[cfg(test)]
mod mock;

// Reexports
pub use embassy_hal_internal::{into_ref, Peripheral, PeripheralRef};

embassy_hal_internal::peripherals!(RTC);

/// HAL configuration for the ATSAMD21
pub mod config {
    use crate::clock;

    /// HAL configuration passed when initializing.
    #[non_exhaustive]
    #[derive(Default)]
    pub struct Config {
        pub clocks: clock::Config,
    }
}
pub use config::Config;

/// Bring up the clock tree with the provided configuration.
///
/// This returns the peripheral singletons that can be used for creating drivers.
///
/// This should only be called once at startup, otherwise it panics.
pub fn init(config: Config) -> Peripherals {
    // Do this first, so that it panics if user is calling `init` a second time
    // before doing anything important.
    let p = Peripherals::take();

    unsafe {
        clock::init(config.clocks);
    }
    p
}

/// Macro to bind interrupts to handlers.
///
/// This defines the right interrupt handlers, and creates a unit struct (like `struct Irqs;`)
/// and implements the right [`Binding`](interrupt::typelevel::Binding)s for it. You can pass
/// this struct to drivers to prove at compile-time that the right interrupts have been bound.
///
/// ```rust,ignore
/// use samd21_timebase::{bind_interrupts, rtc};
///
/// bind_interrupts!(struct Irqs {
///     RTC => rtc::InterruptHandler;
/// });
/// ```
///
// developer note: this macro can't be in `embassy-hal-internal` due to the use of `$crate`.
#[macro_export]
macro_rules! bind_interrupts {
    ($vis:vis struct $name:ident {
        $(
            $(#[cfg($cond_irq:meta)])?
            $irq:ident => $(
                $(#[cfg($cond_handler:meta)])?
                $handler:ty
            ),*;
        )*
    }) => {
        #[derive(Copy, Clone)]
        $vis struct $name;

        $(
            #[allow(non_snake_case)]
            #[no_mangle]
            $(#[cfg($cond_irq)])?
            unsafe extern "C" fn $irq() {
                $(
                    $(#[cfg($cond_handler)])?
                    <$handler as $crate::interrupt::typelevel::Handler<$crate::interrupt::typelevel::$irq>>::on_interrupt();

                )*
            }

            $(#[cfg($cond_irq)])?
            $crate::bind_interrupts!(@inner
                $(
                    $(#[cfg($cond_handler)])?
                    unsafe impl $crate::interrupt::typelevel::Binding<$crate::interrupt::typelevel::$irq, $handler> for $name {}
                )*
            );
        )*
    };
    (@inner $($t:tt)*) => {
        $($t)*
    }
}

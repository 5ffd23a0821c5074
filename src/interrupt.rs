//! Interrupt numbers, priorities and handler binding.
//!
//! The vector table comes from the PAC (`rt` feature). [`bind_interrupts!`](crate::bind_interrupts)
//! overrides its weak `RTC` entry.

pub use embassy_hal_internal::interrupt::{InterruptExt, Priority};

pub use atsamd21g::Interrupt;

/// Type-level interrupt infrastructure.
///
/// Drivers that need an interrupt take an `impl Binding<I, H>` argument, which can only be
/// produced by [`bind_interrupts!`](crate::bind_interrupts). This proves at compile time that
/// the vector-table entry named `I` calls handler `H`.
pub mod typelevel {
    trait SealedInterrupt {}

    /// Type-level interrupt.
    #[allow(private_bounds)]
    pub trait Interrupt: SealedInterrupt {
        /// Runtime interrupt number.
        const IRQ: super::Interrupt;
    }

    /// Interrupt handler trait.
    pub trait Handler<I: Interrupt> {
        /// Interrupt handler function.
        ///
        /// # Safety
        ///
        /// Must only be called from the vector-table entry of interrupt `I`.
        unsafe fn on_interrupt();
    }

    /// Compile-time assertion that an interrupt has been bound to a handler.
    ///
    /// # Safety
    ///
    /// Only [`bind_interrupts!`](crate::bind_interrupts) may implement this trait.
    pub unsafe trait Binding<I: Interrupt, H: Handler<I>> {}

    macro_rules! interrupts {
        ($($irq:ident),* $(,)?) => {
            $(
                #[allow(non_camel_case_types, clippy::upper_case_acronyms)]
                #[doc = concat!(stringify!($irq), " typelevel interrupt.")]
                pub enum $irq {}
                impl SealedInterrupt for $irq {}
                impl Interrupt for $irq {
                    const IRQ: super::Interrupt = super::Interrupt::$irq;
                }
            )*
        };
    }

    interrupts!(RTC);
}

//! Low-level RTC driver (mode 0, 32-bit counter)

use embassy_hal_internal::{into_ref, Peripheral, PeripheralRef};

use super::Counter;
use crate::interrupt::{Interrupt, InterruptExt, Priority};
use crate::pac;
use crate::peripherals;

/// `READREQ.ADDR` of the COUNT register.
const COUNT_ADDR: u8 = 0x10;

fn regs() -> &'static pac::rtc::MODE0 {
    unsafe { (*pac::RTC::ptr()).mode0() }
}

/// RTC synchronization barrier: wait until the last RTC register access has crossed
/// into the GCLK2 domain.
fn wait_for_sync() {
    while regs().status.read().syncbusy().bit_is_set() {
        core::hint::spin_loop();
    }
}

/// The RTC as a free-running 32-bit counter with compare 0.
pub struct RtcCounter<'d> {
    _rtc: PeripheralRef<'d, peripherals::RTC>,
}

impl<'d> RtcCounter<'d> {
    /// Reset the RTC, start it counting from zero and unmask its interrupt.
    ///
    /// The compare-match interrupt itself stays disabled until the first
    /// [`Counter::enable_compare_interrupt`].
    pub fn new(rtc: impl Peripheral<P = peripherals::RTC> + 'd, priority: Priority) -> Self {
        into_ref!(rtc);
        debug_assert!(crate::clock::clocks().rtc.0 != 0, "rtc: GCLK2 is not running");

        let r = regs();

        r.ctrl.modify(|_, w| w.enable().clear_bit());
        wait_for_sync();
        r.ctrl.write(|w| w.swrst().set_bit());
        wait_for_sync();

        // No MATCHCLR: the counter must keep running past the compare value.
        r.ctrl.write(|w| {
            w.mode().count32();
            w.prescaler().div1();
            w.matchclr().clear_bit()
        });
        wait_for_sync();
        r.comp[0].write(|w| unsafe { w.comp().bits(u32::MAX) });
        wait_for_sync();
        r.intenclr.write(|w| w.cmp0().set_bit());
        r.intflag.write(|w| w.cmp0().set_bit());

        r.ctrl.modify(|_, w| w.enable().set_bit());
        wait_for_sync();

        Interrupt::RTC.unpend();
        Interrupt::RTC.set_priority(priority);
        unsafe { Interrupt::RTC.enable() };

        trace!("rtc: started, IRQ priority {:?}", priority);

        Self { _rtc: rtc }
    }

    /// Access the RTC without owning it.
    ///
    /// # Safety
    ///
    /// Only for the interrupt handler, which touches `INTFLAG` alone.
    pub(crate) unsafe fn steal() -> RtcCounter<'static> {
        RtcCounter {
            _rtc: peripherals::RTC::steal().into_ref(),
        }
    }
}

impl Counter for RtcCounter<'_> {
    fn read_count(&mut self) -> u32 {
        let r = regs();
        r.readreq.write(|w| {
            unsafe { w.bits(COUNT_ADDR as u16) };
            w.rreq().set_bit()
        });
        wait_for_sync();
        r.count.read().count().bits()
    }

    fn set_compare(&mut self, value: u32) {
        regs().comp[0].write(|w| unsafe { w.comp().bits(value) });
        wait_for_sync();
    }

    fn enable_compare_interrupt(&mut self) {
        regs().intenset.write(|w| w.cmp0().set_bit());
    }

    fn clear_compare_flag(&self) {
        regs().intflag.write(|w| w.cmp0().set_bit());
    }

    fn wait_for_interrupt(&mut self) {
        cortex_m::asm::wfi();
    }
}

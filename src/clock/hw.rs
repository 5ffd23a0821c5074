use super::{
    ApbGate, BusDividers, Channel, ClockHw, Condition, DfllCtrl, DfllMul, GenCtrl, Generator, Osc8mPrescaler, Sercom,
};
use crate::pac;

/// [`ClockHw`] on the ATSAMD21 registers.
pub struct Samd21Clocks {
    nvmctrl: &'static pac::nvmctrl::RegisterBlock,
    pm: &'static pac::pm::RegisterBlock,
    sysctrl: &'static pac::sysctrl::RegisterBlock,
    gclk: &'static pac::gclk::RegisterBlock,
}

impl Samd21Clocks {
    /// # Safety
    ///
    /// Takes the clock-system register blocks without ownership. Only bring-up may use them.
    pub(crate) unsafe fn new() -> Self {
        Self {
            nvmctrl: &*pac::NVMCTRL::ptr(),
            pm: &*pac::PM::ptr(),
            sysctrl: &*pac::SYSCTRL::ptr(),
            gclk: &*pac::GCLK::ptr(),
        }
    }
}

impl ClockHw for Samd21Clocks {
    fn set_flash_wait_states(&mut self, wait_states: u8) {
        self.nvmctrl
            .ctrlb
            .modify(|_, w| unsafe { w.rws().bits(wait_states) });
    }

    fn set_manual_nvm_write(&mut self, manual: bool) {
        self.nvmctrl.ctrlb.modify(|_, w| w.manw().bit(manual));
    }

    fn set_apb_gate(&mut self, gate: ApbGate, enabled: bool) {
        match gate {
            ApbGate::Gclk => self.pm.apbamask.modify(|_, w| w.gclk_().bit(enabled)),
            ApbGate::Rtc => self.pm.apbamask.modify(|_, w| w.rtc_().bit(enabled)),
            ApbGate::Sercom(sercom) => self.pm.apbcmask.modify(|_, w| match sercom {
                Sercom::Sercom0 => w.sercom0_().bit(enabled),
                Sercom::Sercom1 => w.sercom1_().bit(enabled),
                Sercom::Sercom2 => w.sercom2_().bit(enabled),
                Sercom::Sercom3 => w.sercom3_().bit(enabled),
                Sercom::Sercom4 => w.sercom4_().bit(enabled),
                Sercom::Sercom5 => w.sercom5_().bit(enabled),
            }),
        }
    }

    fn set_bus_dividers(&mut self, dividers: BusDividers) {
        unsafe {
            self.pm.cpusel.write(|w| w.cpudiv().bits(dividers.cpu as u8));
            self.pm.apbasel.write(|w| w.apbadiv().bits(dividers.apba as u8));
            self.pm.apbbsel.write(|w| w.apbbdiv().bits(dividers.apbb as u8));
            self.pm.apbcsel.write(|w| w.apbcdiv().bits(dividers.apbc as u8));
        }
    }

    fn enable_osc32k(&mut self, calib: u8, startup: u8) {
        self.sysctrl.osc32k.write(|w| {
            unsafe {
                w.calib().bits(calib);
                w.startup().bits(startup);
            }
            w.en32k().set_bit();
            w.en1k().set_bit();
            w.enable().set_bit()
        });
    }

    fn configure_osc8m(&mut self, prescaler: Osc8mPrescaler, on_demand: bool) {
        // CALIB and FRANGE keep their factory values.
        self.sysctrl.osc8m.modify(|_, w| {
            unsafe { w.presc().bits(prescaler as u8) };
            w.ondemand().bit(on_demand)
        });
    }

    fn write_dfll_ctrl(&mut self, ctrl: DfllCtrl) {
        self.sysctrl.dfllctrl.write(|w| {
            w.enable().bit(ctrl.enable);
            w.mode().bit(ctrl.mode);
            w.usbcrm().bit(ctrl.usbcrm);
            w.ccdis().bit(ctrl.ccdis);
            w.bplckc().bit(ctrl.bplckc);
            w.ondemand().bit(ctrl.on_demand)
        });
    }

    fn write_dfll_val(&mut self, coarse: u8, fine: u16) {
        self.sysctrl.dfllval.write(|w| unsafe {
            w.coarse().bits(coarse);
            w.fine().bits(fine)
        });
    }

    fn write_dfll_mul(&mut self, mul: DfllMul) {
        self.sysctrl.dfllmul.write(|w| unsafe {
            w.cstep().bits(mul.cstep);
            w.fstep().bits(mul.fstep);
            w.mul().bits(mul.mul)
        });
    }

    fn reset_gclk(&mut self) {
        self.gclk.ctrl.write(|w| w.swrst().set_bit());
    }

    fn set_generator_divider(&mut self, generator: Generator, divider: u16) {
        self.gclk.gendiv.write(|w| unsafe {
            w.id().bits(generator as u8);
            w.div().bits(divider)
        });
    }

    fn set_generator_control(&mut self, generator: Generator, ctrl: GenCtrl) {
        self.gclk.genctrl.write(|w| {
            unsafe {
                w.id().bits(generator as u8);
                w.src().bits(ctrl.source as u8);
            }
            w.genen().bit(ctrl.enable);
            w.idc().bit(ctrl.improve_duty_cycle)
        });
    }

    fn route_channel(&mut self, channel: Channel, generator: Generator) {
        self.gclk.clkctrl.write(|w| {
            unsafe {
                w.id().bits(channel as u8);
                w.gen().bits(generator as u8);
            }
            w.clken().set_bit()
        });
    }

    fn is_met(&mut self, condition: Condition) -> bool {
        let pclksr = self.sysctrl.pclksr.read();
        let synced = self.gclk.status.read().syncbusy().bit_is_clear();
        match condition {
            Condition::Osc32kReady => pclksr.osc32krdy().bit_is_set(),
            Condition::Osc8mReady => pclksr.osc8mrdy().bit_is_set(),
            Condition::DfllReady => pclksr.dfllrdy().bit_is_set(),
            Condition::GclkResetDone => self.gclk.ctrl.read().swrst().bit_is_clear() && synced,
            Condition::GclkSynced => synced,
        }
    }
}

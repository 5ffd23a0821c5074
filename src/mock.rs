//! Host-side models of the clock system and the RTC counter.

use core::cell::Cell;

use crate::clock::{
    ApbGate, BusDividers, Channel, ClockHw, Condition, DfllCtrl, DfllMul, GenCtrl, Generator, Osc8mPrescaler,
    Source,
};
use crate::rtc::{service_compare_match, Counter, WakeFlag};

/// One call made on [`MockClockHw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    FlashWaitStates(u8),
    ManualNvmWrite(bool),
    ApbGate(ApbGate, bool),
    BusDividers(BusDividers),
    Osc32k { calib: u8, startup: u8 },
    Osc8m { prescaler: Osc8mPrescaler, on_demand: bool },
    DfllCtrl(DfllCtrl),
    DfllVal { coarse: u8, fine: u16 },
    DfllMul(DfllMul),
    GclkReset,
    GenDiv(Generator, u16),
    GenCtrl(Generator, GenCtrl),
    Route(Channel, Generator),
    /// A poll of this condition returned true.
    Ready(Condition),
}

/// Ordering violation detected by [`MockClockHw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// A write was issued while an earlier one was still pending on `Condition`.
    Busy(Condition),
    /// A channel was routed to a generator that was not running.
    RouteToStoppedGenerator(Channel, Generator),
    /// An APB gate was opened before its peripheral had a running generic clock.
    GateBeforeClock(ApbGate),
    /// DFLLMUL was written with closed-loop mode active.
    DfllMulInClosedLoop,
}

/// Model of SYSCTRL, GCLK, PM and NVMCTRL.
///
/// Each write makes the condition it affects pending for `latency` polls and records
/// a [`Fault`] for anything the hardware would not tolerate.
pub struct MockClockHw {
    pub events: Vec<Event>,
    pub faults: Vec<Fault>,
    /// Running source of each generator, if enabled.
    pub generators: [Option<Source>; 9],
    /// Generator driving each channel, indexed by `CLKCTRL.ID`.
    pub routes: [Option<Generator>; 0x20],
    pub dfll: DfllCtrl,
    pub polls: usize,
    latency: u32,
    pending: [u32; 5],
}

impl MockClockHw {
    pub fn new() -> Self {
        Self::with_latency(0)
    }

    /// Every condition reads as not met `latency` times after the write that affects it.
    pub fn with_latency(latency: u32) -> Self {
        Self {
            events: Vec::new(),
            faults: Vec::new(),
            generators: [None; 9],
            routes: [None; 0x20],
            dfll: DfllCtrl::DISABLED,
            polls: 0,
            latency,
            pending: [0; 5],
        }
    }

    fn write(&mut self, event: Event, affects: Option<Condition>) {
        for condition in Condition::ALL {
            if self.pending[condition as usize] > 0 {
                self.faults.push(Fault::Busy(condition));
            }
        }
        self.events.push(event);
        if let Some(condition) = affects {
            // `is_met` reports false `latency` times, then true.
            self.pending[condition as usize] = self.latency + 1;
        }
    }

    fn clock_running(&self, channel: Channel) -> bool {
        match self.routes[channel as usize] {
            Some(generator) => self.generators[generator as usize].is_some(),
            None => false,
        }
    }

    /// Position of the first event matching `f`.
    pub fn position(&self, f: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events.iter().position(f)
    }

    /// Events other than [`Event::Ready`], in order.
    pub fn writes(&self) -> Vec<Event> {
        self.events
            .iter()
            .copied()
            .filter(|e| !matches!(e, Event::Ready(_)))
            .collect()
    }
}

impl ClockHw for MockClockHw {
    fn set_flash_wait_states(&mut self, wait_states: u8) {
        self.write(Event::FlashWaitStates(wait_states), None);
    }

    fn set_manual_nvm_write(&mut self, manual: bool) {
        self.write(Event::ManualNvmWrite(manual), None);
    }

    fn set_apb_gate(&mut self, gate: ApbGate, enabled: bool) {
        let clocked = match gate {
            ApbGate::Gclk => true,
            ApbGate::Rtc => self.clock_running(Channel::Rtc),
            ApbGate::Sercom(sercom) => self.clock_running(sercom.core_channel()),
        };
        if enabled && !clocked {
            self.faults.push(Fault::GateBeforeClock(gate));
        }
        self.write(Event::ApbGate(gate, enabled), None);
    }

    fn set_bus_dividers(&mut self, dividers: BusDividers) {
        self.write(Event::BusDividers(dividers), None);
    }

    fn enable_osc32k(&mut self, calib: u8, startup: u8) {
        self.write(Event::Osc32k { calib, startup }, Some(Condition::Osc32kReady));
    }

    fn configure_osc8m(&mut self, prescaler: Osc8mPrescaler, on_demand: bool) {
        self.write(Event::Osc8m { prescaler, on_demand }, Some(Condition::Osc8mReady));
    }

    fn write_dfll_ctrl(&mut self, ctrl: DfllCtrl) {
        self.dfll = ctrl;
        self.write(Event::DfllCtrl(ctrl), Some(Condition::DfllReady));
    }

    fn write_dfll_val(&mut self, coarse: u8, fine: u16) {
        self.write(Event::DfllVal { coarse, fine }, Some(Condition::DfllReady));
    }

    fn write_dfll_mul(&mut self, mul: DfllMul) {
        if self.dfll.mode {
            self.faults.push(Fault::DfllMulInClosedLoop);
        }
        self.write(Event::DfllMul(mul), Some(Condition::DfllReady));
    }

    fn reset_gclk(&mut self) {
        self.generators = [None; 9];
        self.routes = [None; 0x20];
        self.write(Event::GclkReset, Some(Condition::GclkResetDone));
    }

    fn set_generator_divider(&mut self, generator: Generator, divider: u16) {
        self.write(Event::GenDiv(generator, divider), Some(Condition::GclkSynced));
    }

    fn set_generator_control(&mut self, generator: Generator, ctrl: GenCtrl) {
        self.generators[generator as usize] = ctrl.enable.then_some(ctrl.source);
        self.write(Event::GenCtrl(generator, ctrl), Some(Condition::GclkSynced));
    }

    fn route_channel(&mut self, channel: Channel, generator: Generator) {
        if self.generators[generator as usize].is_none() {
            self.faults.push(Fault::RouteToStoppedGenerator(channel, generator));
        }
        self.routes[channel as usize] = Some(generator);
        self.write(Event::Route(channel, generator), Some(Condition::GclkSynced));
    }

    fn is_met(&mut self, condition: Condition) -> bool {
        self.polls += 1;
        let pending = &mut self.pending[condition as usize];
        if *pending > 1 {
            *pending -= 1;
            return false;
        }
        *pending = 0;
        self.events.push(Event::Ready(condition));
        true
    }
}

/// Model of the RTC in 32-bit counter mode.
///
/// `wait_for_interrupt` advances the counter straight to the armed compare value and
/// runs the compare-match handler, unless spurious wakeups are queued. A compare the
/// counter has already passed only matches after a full wrap, as on the RTC.
pub struct MockCounter {
    pub count: u32,
    pub compare: Option<u32>,
    /// `(last count read, compare value)` for every `set_compare`.
    pub armed: Vec<(u32, u32)>,
    last_read: u32,
    pub irq_enabled: bool,
    pub flag: Cell<bool>,
    pub flag_clears: Cell<u32>,
    pub wfi_calls: u32,
    /// Wakeups to deliver before the compare match fires.
    pub spurious: u32,
    /// Counter ticks that elapse on every read.
    pub drift: u32,
    /// Counter ticks that elapse while a compare write synchronizes.
    pub write_lag: u32,
    /// Ticks spent halted in `wait_for_interrupt`.
    pub halted: u64,
    pub wake: &'static WakeFlag,
}

impl MockCounter {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            compare: None,
            armed: Vec::new(),
            last_read: count,
            irq_enabled: false,
            flag: Cell::new(false),
            flag_clears: Cell::new(0),
            wfi_calls: 0,
            spurious: 0,
            drift: 0,
            write_lag: 0,
            halted: 0,
            wake: std::boxed::Box::leak(std::boxed::Box::new(WakeFlag::new())),
        }
    }

    /// Distances, in ticks, of every armed compare.
    pub fn distances(&self) -> Vec<u32> {
        self.armed.iter().map(|(at, cmp)| cmp.wrapping_sub(*at)).collect()
    }
}

impl Counter for MockCounter {
    fn read_count(&mut self) -> u32 {
        let count = self.count;
        self.last_read = count;
        self.count = self.count.wrapping_add(self.drift);
        count
    }

    fn set_compare(&mut self, value: u32) {
        self.armed.push((self.last_read, value));
        self.compare = Some(value);
        self.count = self.count.wrapping_add(self.write_lag);
    }

    fn enable_compare_interrupt(&mut self) {
        self.irq_enabled = true;
        // A latched match interrupts as soon as it is unmasked.
        if self.flag.get() {
            let wake = self.wake;
            service_compare_match(&*self, wake);
        }
    }

    fn clear_compare_flag(&self) {
        self.flag.set(false);
        self.flag_clears.set(self.flag_clears.get() + 1);
    }

    fn wait_for_interrupt(&mut self) {
        self.wfi_calls += 1;
        if self.spurious > 0 {
            self.spurious -= 1;
            return;
        }
        if let (true, Some(compare)) = (self.irq_enabled, self.compare) {
            self.halted += u64::from(compare.wrapping_sub(self.count));
            self.count = compare;
            self.flag.set(true);
            let wake = self.wake;
            service_compare_match(&*self, wake);
        }
    }
}

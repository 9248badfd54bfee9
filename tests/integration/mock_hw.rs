//! Mock hardware adapter for integration tests.
//!
//! Records every register-level call in order so tests can assert on the
//! exact programming sequence.  PWM counter reads come from a script;
//! once the script runs out every read returns `idle_counter`.

use std::cell::RefCell;
use std::collections::VecDeque;

use printcore::app::events::CoreEvent;
use printcore::app::ports::{
    AdcPort, Axis, CompareMode, EventSink, GpioPort, InterruptPort, IrqState, PwmClock, PwmPort,
    StepperPort, StorageError, StoragePort, TimerCounterPort,
};
use printcore::board::TcOutput;

// ── Register call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegCall {
    StartEngine,
    PwmEnable(u8),
    PwmDisable(u8),
    PwmRead(u8),
    PwmClock(u8, PwmClock),
    PwmPeriod(u8, u16),
    PwmDuty(u8, u16),
    PwmAttach(u8),
    PwmRelease(u8),
    TcClock(u8),
    TcConfigure(u8),
    TcTop(u8, u32),
    TcCompare(u8, TcOutput, u32, CompareMode),
    TcTrigger(u8),
    TcStart(u8),
    TcAttach(u8, TcOutput),
    TcRelease(u8, TcOutput),
    Gpio(u8, bool),
    AdcStart,
    Enter,
    Exit,
    Babystep(Axis, bool),
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    calls: RefCell<Vec<RegCall>>,
    counter_script: RefCell<VecDeque<u16>>,
    pub idle_counter: u16,
    tc_tops: [u32; 9],
    pub adc_complete: bool,
    pub adc_value: u16,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            counter_script: RefCell::new(VecDeque::new()),
            idle_counter: 0,
            tc_tops: [0; 9],
            adc_complete: false,
            adc_value: 0,
        }
    }

    /// Queue values for the next PWM counter reads.
    pub fn script_counter(&mut self, values: &[u16]) {
        self.counter_script.borrow_mut().extend(values.iter().copied());
    }

    pub fn calls(&self) -> Vec<RegCall> {
        self.calls.borrow().clone()
    }

    pub fn clear(&mut self) {
        self.calls.borrow_mut().clear();
    }

    pub fn count(&self, pred: impl Fn(&RegCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: RegCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl PwmPort for MockHardware {
    fn pwm_start_engine(&mut self, _slow_hz: u32, _fast_hz: u32) {
        self.record(RegCall::StartEngine);
    }
    fn pwm_enable(&mut self, ch: u8) {
        self.record(RegCall::PwmEnable(ch));
    }
    fn pwm_disable(&mut self, ch: u8) {
        self.record(RegCall::PwmDisable(ch));
    }
    fn pwm_counter(&self, ch: u8) -> u16 {
        self.record(RegCall::PwmRead(ch));
        self.counter_script
            .borrow_mut()
            .pop_front()
            .unwrap_or(self.idle_counter)
    }
    fn pwm_set_clock(&mut self, ch: u8, clock: PwmClock) {
        self.record(RegCall::PwmClock(ch, clock));
    }
    fn pwm_set_period(&mut self, ch: u8, period: u16) {
        self.record(RegCall::PwmPeriod(ch, period));
    }
    fn pwm_set_duty(&mut self, ch: u8, duty: u16) {
        self.record(RegCall::PwmDuty(ch, duty));
    }
    fn pwm_attach_pin(&mut self, ch: u8) {
        self.record(RegCall::PwmAttach(ch));
    }
    fn pwm_release_pin(&mut self, ch: u8) {
        self.record(RegCall::PwmRelease(ch));
    }
}

impl TimerCounterPort for MockHardware {
    fn tc_enable_clock(&mut self, timer: u8) {
        self.record(RegCall::TcClock(timer));
    }
    fn tc_configure_waveform(&mut self, timer: u8) {
        self.record(RegCall::TcConfigure(timer));
    }
    fn tc_set_top(&mut self, timer: u8, top: u32) {
        self.tc_tops[timer as usize] = top;
        self.record(RegCall::TcTop(timer, top));
    }
    fn tc_top(&self, timer: u8) -> u32 {
        self.tc_tops[timer as usize]
    }
    fn tc_set_compare(&mut self, timer: u8, output: TcOutput, value: u32, mode: CompareMode) {
        self.record(RegCall::TcCompare(timer, output, value, mode));
    }
    fn tc_software_trigger(&mut self, timer: u8) {
        self.record(RegCall::TcTrigger(timer));
    }
    fn tc_start(&mut self, timer: u8) {
        self.record(RegCall::TcStart(timer));
    }
    fn tc_attach_pin(&mut self, timer: u8, output: TcOutput) {
        self.record(RegCall::TcAttach(timer, output));
    }
    fn tc_release_pin(&mut self, timer: u8, output: TcOutput) {
        self.record(RegCall::TcRelease(timer, output));
    }
}

impl GpioPort for MockHardware {
    fn write_pin(&mut self, pin: u8, high: bool) {
        self.record(RegCall::Gpio(pin, high));
    }
}

impl AdcPort for MockHardware {
    fn conversion_complete(&self) -> bool {
        self.adc_complete
    }
    fn read_result(&self, _adc_channel: u8) -> u16 {
        self.adc_value
    }
    fn start_conversion(&mut self) {
        self.record(RegCall::AdcStart);
    }
}

impl InterruptPort for MockHardware {
    fn enter_handler(&mut self) -> IrqState {
        self.record(RegCall::Enter);
        IrqState(0x80)
    }
    fn exit_handler(&mut self, state: IrqState) {
        assert_eq!(state, IrqState(0x80), "handler must restore the saved state");
        self.record(RegCall::Exit);
    }
}

impl StepperPort for MockHardware {
    fn babystep(&mut self, axis: Axis, forward: bool) {
        self.record(RegCall::Babystep(axis, forward));
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<CoreEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&CoreEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &CoreEvent) {
        self.events.push(*event);
    }
}

// ── MockEeprom ────────────────────────────────────────────────

pub struct MockEeprom {
    pub data: Vec<u8>,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockEeprom {
    /// Blank (erased) device of `size` bytes.
    pub fn blank(size: usize) -> Self {
        Self { data: vec![0xFF; size], fail_writes: false }
    }
}

impl StoragePort for MockEeprom {
    fn read(&self, addr: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        let start = addr as usize;
        let src = self
            .data
            .get(start..start + buf.len())
            .ok_or(StorageError::OutOfRange)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::NoAck);
        }
        let start = addr as usize;
        let dst = self
            .data
            .get_mut(start..start + data.len())
            .ok_or(StorageError::OutOfRange)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn capacity(&self) -> u16 {
        self.data.len() as u16
    }
}

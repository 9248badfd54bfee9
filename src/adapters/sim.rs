//! Behavioural simulation of the controller peripherals.
//!
//! [`SimHardware`] implements every port trait with enough fidelity for
//! the tick logic to be exercised on a host:
//!
//! - PWM counters keep running across disable/enable and only wrap at
//!   the period or at 65 536, so shrinking the period below a high
//!   counter reproduces the counter-reset erratum.  Every counter read
//!   advances an enabled counter by one count.
//! - Timer/Counter channels record top, compare values, output modes and
//!   pin routing.
//! - The latest GPIO writes are logged (oldest dropped past
//!   [`TRANSITION_LOG_LEN`]), and a write to a pin currently routed to a
//!   peripheral is counted as a conflict.
//! - The ADC returns settable raw values and is complete unless marked
//!   busy.

use core::cell::Cell;
use std::collections::VecDeque;

use crate::app::ports::{
    AdcPort, Axis, CompareMode, GpioPort, InterruptPort, IrqState, PwmClock, PwmPort,
    StepperPort, TimerCounterPort,
};
use crate::board::{BoardTable, Capability, TcOutput};
use crate::drivers::pwm::PWM_CHANNELS;
use crate::drivers::timer_counter::TC_CHANNELS;

const ADC_CHANNELS: usize = 16;
const GPIO_PINS: usize = 128;

/// GPIO writes kept between two [`SimHardware::take_transitions`] calls.
pub const TRANSITION_LOG_LEN: usize = 4096;

/// Snapshot of one simulated PWM channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPwmChannel {
    pub counter: u16,
    pub period: u16,
    pub duty: u16,
    pub clock: PwmClock,
    pub enabled: bool,
    pub attached: bool,
}

/// Snapshot of one simulated timer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimTimerChannel {
    pub clock_enabled: bool,
    pub top: u32,
    pub compare: [u32; 2],
    pub mode: [Option<CompareMode>; 2],
    pub attached: [bool; 2],
    pub running: bool,
    pub triggers: u32,
}

const PWM_IDLE: SimPwmChannel = SimPwmChannel {
    counter: 0,
    period: 0xFFFF,
    duty: 0,
    clock: PwmClock::Slow,
    enabled: false,
    attached: false,
};

const TC_IDLE: SimTimerChannel = SimTimerChannel {
    clock_enabled: false,
    top: 0,
    compare: [0; 2],
    mode: [None; 2],
    attached: [false; 2],
    running: false,
    triggers: 0,
};

pub struct SimHardware {
    pwm: [SimPwmChannel; PWM_CHANNELS],
    pwm_counters: [Cell<u16>; PWM_CHANNELS],
    pwm_stuck: [bool; PWM_CHANNELS],
    pwm_counter_reads: Cell<u32>,
    engine_started: bool,
    tc: [SimTimerChannel; TC_CHANNELS],
    /// GPIO number behind each PWM channel / timer output, from the board.
    pwm_pins: [Option<u8>; PWM_CHANNELS],
    tc_pins: [[Option<u8>; 2]; TC_CHANNELS],
    levels: [Option<bool>; GPIO_PINS],
    transitions: VecDeque<(u8, bool)>,
    gpio_conflicts: u32,
    adc: [u16; ADC_CHANNELS],
    adc_busy: bool,
    conversions: u32,
    handler_depth: u32,
    handler_entries: u64,
    babysteps: [i32; 3],
    register_writes: u32,
}

impl SimHardware {
    pub fn new(board: &BoardTable) -> Self {
        let mut pwm_pins = [None; PWM_CHANNELS];
        let mut tc_pins = [[None; 2]; TC_CHANNELS];
        for out in board.outputs {
            match out.capability {
                Capability::Pwm(ch) => {
                    if let Some(p) = pwm_pins.get_mut(ch as usize) {
                        *p = Some(out.pin);
                    }
                }
                Capability::Timer(tc) => {
                    if let Some(t) = tc_pins.get_mut(tc.timer as usize) {
                        t[output_slot(tc.output)] = Some(out.pin);
                    }
                }
                Capability::None => {}
            }
        }

        Self {
            pwm: [PWM_IDLE; PWM_CHANNELS],
            pwm_counters: [const { Cell::new(0) }; PWM_CHANNELS],
            pwm_stuck: [false; PWM_CHANNELS],
            pwm_counter_reads: Cell::new(0),
            engine_started: false,
            tc: [TC_IDLE; TC_CHANNELS],
            pwm_pins,
            tc_pins,
            levels: [None; GPIO_PINS],
            transitions: VecDeque::new(),
            gpio_conflicts: 0,
            adc: [0; ADC_CHANNELS],
            adc_busy: false,
            conversions: 0,
            handler_depth: 0,
            handler_entries: 0,
            babysteps: [0; 3],
            register_writes: 0,
        }
    }

    // ── Time ──────────────────────────────────────────────────

    /// Let every enabled PWM counter run for `counts` clock cycles.
    pub fn advance_pwm(&mut self, counts: u32) {
        for ch in 0..PWM_CHANNELS {
            if self.pwm[ch].enabled && !self.pwm_stuck[ch] {
                let period = self.pwm[ch].period as u32;
                let mut c = self.pwm_counters[ch].get() as u32;
                if c >= period {
                    // Past the period: runs to the 16-bit wrap first.
                    let to_wrap = 0x1_0000 - c;
                    if counts < to_wrap {
                        self.pwm_counters[ch].set((c + counts) as u16);
                        continue;
                    }
                    c = counts - to_wrap;
                } else {
                    c += counts;
                }
                self.pwm_counters[ch].set((c % period.max(1)) as u16);
            }
        }
    }

    fn step_counter(&self, ch: usize) {
        if !self.pwm[ch].enabled || self.pwm_stuck[ch] {
            return;
        }
        let next = self.pwm_counters[ch].get() as u32 + 1;
        let next = if next == self.pwm[ch].period as u32 || next > 0xFFFF { 0 } else { next };
        self.pwm_counters[ch].set(next as u16);
    }

    // ── Fault injection ───────────────────────────────────────

    pub fn set_pwm_counter(&mut self, ch: u8, value: u16) {
        if let Some(c) = self.pwm_counters.get(ch as usize) {
            c.set(value);
        }
    }

    /// Freeze a PWM counter so the settle loop can never confirm a wrap.
    pub fn stick_pwm_counter(&mut self, ch: u8, stuck: bool) {
        if let Some(s) = self.pwm_stuck.get_mut(ch as usize) {
            *s = stuck;
        }
    }

    pub fn set_adc(&mut self, adc_channel: u8, raw: u16) {
        if let Some(v) = self.adc.get_mut(adc_channel as usize) {
            *v = raw;
        }
    }

    pub fn set_adc_busy(&mut self, busy: bool) {
        self.adc_busy = busy;
    }

    // ── Inspection ────────────────────────────────────────────

    pub fn pwm_channel(&self, ch: u8) -> SimPwmChannel {
        let i = ch as usize;
        match self.pwm.get(i) {
            Some(p) => SimPwmChannel { counter: self.pwm_counters[i].get(), ..*p },
            None => PWM_IDLE,
        }
    }

    pub fn pwm_engine_started(&self) -> bool {
        self.engine_started
    }

    pub fn pwm_counter_reads(&self) -> u32 {
        self.pwm_counter_reads.get()
    }

    pub fn timer_channel(&self, timer: u8) -> SimTimerChannel {
        self.tc.get(timer as usize).copied().unwrap_or(TC_IDLE)
    }

    pub fn pin_level(&self, pin: u8) -> Option<bool> {
        self.levels.get(pin as usize).copied().flatten()
    }

    /// GPIO writes since the last call, in order, at most the last
    /// [`TRANSITION_LOG_LEN`].
    pub fn take_transitions(&mut self) -> Vec<(u8, bool)> {
        self.transitions.drain(..).collect()
    }

    /// GPIO writes to pins a peripheral was driving at the time.
    pub fn gpio_conflicts(&self) -> u32 {
        self.gpio_conflicts
    }

    pub fn conversions(&self) -> u32 {
        self.conversions
    }

    pub fn handler_depth(&self) -> u32 {
        self.handler_depth
    }

    pub fn handler_entries(&self) -> u64 {
        self.handler_entries
    }

    /// Net babysteps issued on `axis` (forward positive).
    pub fn babysteps(&self, axis: Axis) -> i32 {
        self.babysteps[axis as usize]
    }

    /// PWM and Timer/Counter register writes so far.
    pub fn register_writes(&self) -> u32 {
        self.register_writes
    }

    fn peripheral_owns(&self, pin: u8) -> bool {
        let pwm = self
            .pwm_pins
            .iter()
            .zip(&self.pwm)
            .any(|(p, ch)| *p == Some(pin) && ch.attached);
        let tc = self.tc_pins.iter().zip(&self.tc).any(|(pins, t)| {
            pins.iter().zip(t.attached).any(|(p, a)| *p == Some(pin) && a)
        });
        pwm || tc
    }
}

const fn output_slot(output: TcOutput) -> usize {
    match output {
        TcOutput::A => 0,
        TcOutput::B => 1,
    }
}

// ───────────────────────────────────────────────────────────────
// Port implementations
// ───────────────────────────────────────────────────────────────

impl PwmPort for SimHardware {
    fn pwm_start_engine(&mut self, _slow_hz: u32, _fast_hz: u32) {
        self.engine_started = true;
        self.register_writes += 1;
    }

    fn pwm_enable(&mut self, ch: u8) {
        // Enabling does not clear the counter.
        if let Some(p) = self.pwm.get_mut(ch as usize) {
            p.enabled = true;
        }
        self.register_writes += 1;
    }

    fn pwm_disable(&mut self, ch: u8) {
        if let Some(p) = self.pwm.get_mut(ch as usize) {
            p.enabled = false;
        }
        self.register_writes += 1;
    }

    fn pwm_counter(&self, ch: u8) -> u16 {
        let i = ch as usize;
        let Some(c) = self.pwm_counters.get(i) else {
            return 0;
        };
        self.pwm_counter_reads.set(self.pwm_counter_reads.get() + 1);
        let value = c.get();
        self.step_counter(i);
        value
    }

    fn pwm_set_clock(&mut self, ch: u8, clock: PwmClock) {
        if let Some(p) = self.pwm.get_mut(ch as usize) {
            p.clock = clock;
        }
        self.register_writes += 1;
    }

    fn pwm_set_period(&mut self, ch: u8, period: u16) {
        if let Some(p) = self.pwm.get_mut(ch as usize) {
            p.period = period;
        }
        self.register_writes += 1;
    }

    fn pwm_set_duty(&mut self, ch: u8, duty: u16) {
        if let Some(p) = self.pwm.get_mut(ch as usize) {
            p.duty = duty;
        }
        self.register_writes += 1;
    }

    fn pwm_attach_pin(&mut self, ch: u8) {
        if let Some(p) = self.pwm.get_mut(ch as usize) {
            p.attached = true;
        }
        self.register_writes += 1;
    }

    fn pwm_release_pin(&mut self, ch: u8) {
        if let Some(p) = self.pwm.get_mut(ch as usize) {
            p.attached = false;
        }
        self.register_writes += 1;
    }
}

impl TimerCounterPort for SimHardware {
    fn tc_enable_clock(&mut self, timer: u8) {
        if let Some(t) = self.tc.get_mut(timer as usize) {
            t.clock_enabled = true;
        }
        self.register_writes += 1;
    }

    fn tc_configure_waveform(&mut self, timer: u8) {
        if let Some(t) = self.tc.get_mut(timer as usize) {
            t.mode = [None; 2];
        }
        self.register_writes += 1;
    }

    fn tc_set_top(&mut self, timer: u8, top: u32) {
        if let Some(t) = self.tc.get_mut(timer as usize) {
            t.top = top;
        }
        self.register_writes += 1;
    }

    fn tc_top(&self, timer: u8) -> u32 {
        self.tc.get(timer as usize).map_or(0, |t| t.top)
    }

    fn tc_set_compare(&mut self, timer: u8, output: TcOutput, value: u32, mode: CompareMode) {
        if let Some(t) = self.tc.get_mut(timer as usize) {
            let s = output_slot(output);
            t.compare[s] = value;
            t.mode[s] = Some(mode);
        }
        self.register_writes += 1;
    }

    fn tc_software_trigger(&mut self, timer: u8) {
        if let Some(t) = self.tc.get_mut(timer as usize) {
            t.triggers += 1;
        }
        self.register_writes += 1;
    }

    fn tc_start(&mut self, timer: u8) {
        if let Some(t) = self.tc.get_mut(timer as usize) {
            t.running = true;
        }
        self.register_writes += 1;
    }

    fn tc_attach_pin(&mut self, timer: u8, output: TcOutput) {
        if let Some(t) = self.tc.get_mut(timer as usize) {
            t.attached[output_slot(output)] = true;
        }
        self.register_writes += 1;
    }

    fn tc_release_pin(&mut self, timer: u8, output: TcOutput) {
        if let Some(t) = self.tc.get_mut(timer as usize) {
            t.attached[output_slot(output)] = false;
        }
        self.register_writes += 1;
    }
}

impl GpioPort for SimHardware {
    fn write_pin(&mut self, pin: u8, high: bool) {
        if self.peripheral_owns(pin) {
            self.gpio_conflicts += 1;
        }
        if let Some(l) = self.levels.get_mut(pin as usize) {
            *l = Some(high);
        }
        if self.transitions.len() == TRANSITION_LOG_LEN {
            self.transitions.pop_front();
        }
        self.transitions.push_back((pin, high));
    }
}

impl AdcPort for SimHardware {
    fn conversion_complete(&self) -> bool {
        !self.adc_busy
    }

    fn read_result(&self, adc_channel: u8) -> u16 {
        self.adc.get(adc_channel as usize).copied().unwrap_or(0)
    }

    fn start_conversion(&mut self) {
        self.conversions += 1;
    }
}

impl InterruptPort for SimHardware {
    fn enter_handler(&mut self) -> IrqState {
        let saved = IrqState(self.handler_depth);
        self.handler_depth += 1;
        self.handler_entries += 1;
        saved
    }

    fn exit_handler(&mut self, state: IrqState) {
        self.handler_depth = state.0;
    }
}

impl StepperPort for SimHardware {
    fn babystep(&mut self, axis: Axis, forward: bool) {
        self.babysteps[axis as usize] += if forward { 1 } else { -1 };
    }
}

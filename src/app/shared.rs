//! State shared between the tick handler and foreground code.
//!
//! ```text
//!  foreground ── set_duty / set_frequency / add_babysteps ──▶ ┌─────────────┐
//!                                                             │ SharedState │
//!  foreground ◀── reading / analog_snapshot / take_slow_tick ─└─────────────┘
//!                                                                   ▲ │
//!                                                       TickService │ ▼
//! ```
//!
//! Every field is a word-sized atomic, so single values are never torn.
//! [`SharedState::analog_snapshot`] copies all readings inside a critical
//! section for callers that need channels from the same window.
//!
//! Designed to live in a `static`: [`SharedState::new`] is `const`.

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicU16, Ordering};

use crate::app::ports::Axis;
use crate::board::{MAX_ANALOG_INPUTS, MAX_OUTPUTS};

/// Requested duty and frequency of one logical output.
pub struct ChannelCell {
    /// 0..=255.
    duty: AtomicU8,
    /// Hz; 0 = software PWM only.
    frequency: AtomicU16,
}

impl ChannelCell {
    const fn new() -> Self {
        Self {
            duty: AtomicU8::new(0),
            frequency: AtomicU16::new(0),
        }
    }
}

pub struct SharedState {
    channels: [ChannelCell; MAX_OUTPUTS],
    readings: [AtomicU16; MAX_ANALOG_INPUTS],
    analog_ready: AtomicBool,
    slow_tick: AtomicBool,
    fan_kickstart: AtomicU8,
    babysteps: [AtomicI32; 3],
}

impl SharedState {
    pub const fn new() -> Self {
        Self {
            channels: [const { ChannelCell::new() }; MAX_OUTPUTS],
            readings: [const { AtomicU16::new(0) }; MAX_ANALOG_INPUTS],
            analog_ready: AtomicBool::new(false),
            slow_tick: AtomicBool::new(false),
            fan_kickstart: AtomicU8::new(0),
            babysteps: [const { AtomicI32::new(0) }; 3],
        }
    }

    // ── Foreground → handler ──────────────────────────────────

    /// Set an output's duty (0 = off, 255 = fully on).  Out-of-range
    /// channels are ignored.
    pub fn set_duty(&self, channel: usize, duty: u8) {
        if let Some(c) = self.channels.get(channel) {
            c.duty.store(duty, Ordering::Relaxed);
        }
    }

    /// Set an output's duty as a fraction, rounded to 1/255.  NaN is
    /// ignored and the previous duty stays in effect.
    pub fn set_duty_fraction(&self, channel: usize, fraction: f32) {
        if fraction.is_nan() {
            return;
        }
        let duty = (fraction.clamp(0.0, 1.0) * 255.0).round() as u8;
        self.set_duty(channel, duty);
    }

    /// Set the hardware PWM frequency; 0 forces software PWM.
    pub fn set_frequency(&self, channel: usize, hz: u16) {
        if let Some(c) = self.channels.get(channel) {
            c.frequency.store(hz, Ordering::Relaxed);
        }
    }

    /// Hold software fan outputs fully on for `slow_ticks` slow ticks.
    /// A shorter request never cuts a running kickstart short.
    pub fn request_fan_kickstart(&self, slow_ticks: u8) {
        self.fan_kickstart.fetch_max(slow_ticks, Ordering::AcqRel);
    }

    /// Queue signed micro-steps on one axis.
    pub fn add_babysteps(&self, axis: Axis, steps: i32) {
        self.babysteps[axis as usize].fetch_add(steps, Ordering::AcqRel);
    }

    // ── Handler → foreground ──────────────────────────────────

    pub fn duty(&self, channel: usize) -> u8 {
        self.channels
            .get(channel)
            .map_or(0, |c| c.duty.load(Ordering::Relaxed))
    }

    pub fn frequency(&self, channel: usize) -> u16 {
        self.channels
            .get(channel)
            .map_or(0, |c| c.frequency.load(Ordering::Relaxed))
    }

    /// Latest filtered reading of an analog input.
    pub fn reading(&self, input: usize) -> u16 {
        self.readings
            .get(input)
            .map_or(0, |r| r.load(Ordering::Relaxed))
    }

    /// All readings from the same publish window.
    pub fn analog_snapshot(&self) -> [u16; MAX_ANALOG_INPUTS] {
        critical_section::with(|_| {
            let mut out = [0u16; MAX_ANALOG_INPUTS];
            for (o, r) in out.iter_mut().zip(&self.readings) {
                *o = r.load(Ordering::Relaxed);
            }
            out
        })
    }

    /// Every input has a full filter ring behind its reading.
    pub fn analog_ready(&self) -> bool {
        self.analog_ready.load(Ordering::Acquire)
    }

    /// Consume the ~100 ms flag.  Returns `true` at most once per slow tick.
    pub fn take_slow_tick(&self) -> bool {
        self.slow_tick.swap(false, Ordering::AcqRel)
    }

    pub fn fan_kickstart(&self) -> u8 {
        self.fan_kickstart.load(Ordering::Acquire)
    }

    pub fn pending_babysteps(&self, axis: Axis) -> i32 {
        self.babysteps[axis as usize].load(Ordering::Acquire)
    }

    // ── Handler side ──────────────────────────────────────────

    pub(crate) fn publish_readings(&self, values: &[u16]) {
        critical_section::with(|_| {
            for (r, v) in self.readings.iter().zip(values) {
                r.store(*v, Ordering::Relaxed);
            }
        });
    }

    pub(crate) fn set_analog_ready(&self) {
        self.analog_ready.store(true, Ordering::Release);
    }

    pub(crate) fn raise_slow_tick(&self) {
        self.slow_tick.store(true, Ordering::Release);
    }

    /// Count the kickstart down by one slow tick.
    pub(crate) fn decay_fan_kickstart(&self) {
        let _ = self
            .fan_kickstart
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Take one step of pending babystep work off `axis`.  Returns the
    /// direction to step, or `None` when nothing is pending.
    pub(crate) fn take_babystep(&self, axis: Axis) -> Option<bool> {
        let cell = &self.babysteps[axis as usize];
        cell.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match n {
            0 => None,
            n if n > 0 => Some(n - 1),
            n => Some(n + 1),
        })
        .ok()
        .map(|prev| prev > 0)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

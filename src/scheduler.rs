//! Software PWM scheduler.
//!
//! Outputs that no peripheral could take this tick are pulsed from the
//! tick handler.  Heaters and fans run on two independent 8-bit counters
//! so their resolution (and therefore period) can differ.
//!
//! ```text
//!  counter  0 ──────────────── on ──────────────── 255 │ 0 ...
//!  pin      ▔▔▔▔▔▔▔▔▔▔▔▔▔▔▔▔▔▔▔▁▁▁▁▁▁▁▁▁▁▁▁▁▁▁▁▁▁▁▁▁▁▁▁ │ ▔▔▔
//!           └ latch on = duty & mask, high if on > 0
//! ```
//!
//! `on == mask` is the always-on sentinel: the low transition never
//! fires, so full duty has no one-tick dip per period.

use crate::app::ports::GpioPort;
use crate::board::{MAX_OUTPUTS, OutputDescriptor, PwmGroup};

// ═══════════════════════════════════════════════════════════════
//  Counters
// ═══════════════════════════════════════════════════════════════

/// 8-bit software PWM counter advancing by a power-of-two step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmCounter {
    value: u8,
    step: u8,
    mask: u8,
}

impl PwmCounter {
    /// `step` must be a power of two (checked by config validation).
    pub const fn new(step: u8) -> Self {
        Self {
            value: 0,
            step,
            mask: 255 & !(step - 1),
        }
    }

    pub const fn value(&self) -> u8 {
        self.value
    }

    /// Largest representable on-duration, and the always-on sentinel.
    pub const fn mask(&self) -> u8 {
        self.mask
    }

    /// Ticks per software PWM period.
    pub const fn period_ticks(&self) -> u16 {
        256 / self.step as u16
    }

    fn advance(&mut self) {
        self.value = self.value.wrapping_add(self.step);
    }
}

/// Per-output scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SoftPwmSlot {
    /// Masked duty latched at the start of the current period.
    pub on: u8,
    /// A peripheral generates this output this tick.
    pub delegated: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

pub struct DutyScheduler {
    slots: [SoftPwmSlot; MAX_OUTPUTS],
    heater: PwmCounter,
    fan: PwmCounter,
    slow_divider: u16,
    slow_count: u16,
}

impl DutyScheduler {
    pub fn new(heater_step: u8, fan_step: u8, slow_divider: u16) -> Self {
        Self {
            slots: [SoftPwmSlot::default(); MAX_OUTPUTS],
            heater: PwmCounter::new(heater_step),
            fan: PwmCounter::new(fan_step),
            slow_divider,
            slow_count: 0,
        }
    }

    pub fn counter(&self, group: PwmGroup) -> &PwmCounter {
        match group {
            PwmGroup::Heater => &self.heater,
            PwmGroup::Fan => &self.fan,
        }
    }

    pub fn slot(&self, channel: usize) -> Option<&SoftPwmSlot> {
        self.slots.get(channel)
    }

    pub fn set_delegated(&mut self, channel: usize, delegated: bool) {
        if let Some(s) = self.slots.get_mut(channel) {
            s.delegated = delegated;
        }
    }

    /// Drive every non-delegated output for the current counter values.
    ///
    /// `fan_kickstart` suppresses the low transition of fan-group
    /// outputs.
    pub fn drive(
        &mut self,
        gpio: &mut impl GpioPort,
        outputs: &[OutputDescriptor],
        duties: &[u8],
        fan_kickstart: bool,
    ) {
        for ((slot, out), &duty) in self.slots.iter_mut().zip(outputs).zip(duties) {
            if slot.delegated {
                continue;
            }
            let group = out.class.group();
            let counter = match group {
                PwmGroup::Heater => self.heater,
                PwmGroup::Fan => self.fan,
            };

            if counter.value == 0 {
                slot.on = duty & counter.mask;
                if slot.on > 0 {
                    gpio.write_pin(out.pin, true);
                }
            }

            if group == PwmGroup::Fan && fan_kickstart {
                continue;
            }
            if slot.on == counter.value && slot.on != counter.mask {
                gpio.write_pin(out.pin, false);
            }
        }
    }

    /// Step both counters.  Called once per tick, after [`drive`](Self::drive).
    pub fn advance(&mut self) {
        self.heater.advance();
        self.fan.advance();
    }

    /// Count one tick toward the slow-tick flag.  Returns `true` on the
    /// tick the divider rolls over.
    pub fn decimate(&mut self) -> bool {
        self.slow_count += 1;
        if self.slow_count >= self.slow_divider {
            self.slow_count = 0;
            true
        } else {
            false
        }
    }
}

//! Dedicated PWM engine backend (8 channels, 16-bit counters).
//!
//! ## Counter-reset erratum
//!
//! Enabling a channel is supposed to clear its counter; on this silicon
//! it does not, and the update-period register does not take effect
//! either.  Shrinking the period below the live counter value would then
//! leave the counter running up to 65535 before wrapping, which at the
//! slow clock is a multi-second stall of the output.
//!
//! [`settle_counter`] therefore walks the counter past the wrap before
//! the new period is written: disable, read, and if the counter is not
//! already below the new period (or about to wrap) set the period to
//! `counter + 2` on the fast clock, re-enable and poll until the counter
//! has wrapped.  Both loops are bounded; the caller gets a
//! [`SettleOutcome`] and configures the channel regardless.

use log::{debug, warn};

use crate::app::ports::{PwmClock, PwmPort};

/// Channels on the PWM engine.
pub const PWM_CHANNELS: usize = 8;

/// CLKB: 25 kHz × 255 steps, for Intel-spec 4-wire fans.
pub const PWM_FAST_CLOCK_HZ: u32 = 25_000 * 255;
/// CLKA: the fast clock / 256, for slow heater PWM.
pub const PWM_SLOW_CLOCK_HZ: u32 = PWM_FAST_CLOCK_HZ / 256;

/// Largest period the 16-bit counter can hold.
pub const COUNTER_MAX: u32 = 0xFFFF;
/// A counter above this is about to wrap on its own.
const WRAP_GUARD: u16 = (65_536 - 10) as u16;
/// Smallest bump past the live counter that reliably triggers a wrap
/// (`+1` does not).
const COUNTER_BUMP: u16 = 2;

/// `round(fraction × top)`, with the fraction clamped to `0.0..=1.0` so
/// the threshold never exceeds the period.
pub fn convert_range(fraction: f32, top: u32) -> u32 {
    (fraction.clamp(0.0, 1.0) * top as f32).round() as u32
}

/// Pick the clock for `freq_hz` and the resulting period.
///
/// The fast clock is used whenever its period still fits the counter,
/// which is any frequency from 98 Hz upwards.
pub const fn select_clock(freq_hz: u16) -> (PwmClock, u16) {
    let fast = PWM_FAST_CLOCK_HZ / freq_hz as u32;
    if fast <= COUNTER_MAX {
        (PwmClock::Fast, fast as u16)
    } else {
        (PwmClock::Slow, (PWM_SLOW_CLOCK_HZ / freq_hz as u32) as u16)
    }
}

// ───────────────────────────────────────────────────────────────
// Bindings
// ───────────────────────────────────────────────────────────────

/// Current programming of one PWM channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmBinding {
    /// 0 = unbound.
    pub frequency_hz: u16,
    pub period: u16,
    /// Duty threshold in counter ticks (`<= period`).
    pub duty: u16,
    pub clock: PwmClock,
    /// Pin currently routed to the PWM peripheral.
    pub initialized: bool,
}

impl PwmBinding {
    pub const UNBOUND: Self = Self {
        frequency_hz: 0,
        period: 0,
        duty: 0,
        clock: PwmClock::Slow,
        initialized: false,
    };
}

/// Result of the erratum workaround.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Counter confirmed below the new period (or wrapping) after the
    /// given number of bump cycles.
    Settled { bumps: u8 },
    /// Every attempt ran out; the channel was configured anyway.
    Exhausted,
}

/// What a [`PwmBackend::write`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmWrite {
    /// Same frequency as before: only the duty register changed.
    DutyOnly,
    /// Clock, period and duty were (re)programmed.
    Configured(SettleOutcome),
}

/// Run the counter past its wrap so a period of `period` can be written.
pub fn settle_counter(
    port: &mut impl PwmPort,
    ch: u8,
    period: u16,
    attempts: u8,
    polls: u16,
) -> SettleOutcome {
    // One check more than there are bumps, so a wrap seen by the last
    // poll loop still counts.
    for bumps in 0..=attempts {
        port.pwm_disable(ch);
        let old = port.pwm_counter(ch);
        if old < period || old > WRAP_GUARD {
            return SettleOutcome::Settled { bumps };
        }
        if bumps == attempts {
            break;
        }

        port.pwm_set_period(ch, old + COUNTER_BUMP);
        port.pwm_set_clock(ch, PwmClock::Fast);
        port.pwm_enable(ch);

        for _ in 0..polls {
            let now = port.pwm_counter(ch);
            // Wrapped, or ran on past the bumped period.
            if now < period || now > old {
                break;
            }
        }
    }
    SettleOutcome::Exhausted
}

// ───────────────────────────────────────────────────────────────
// Backend
// ───────────────────────────────────────────────────────────────

/// Per-channel state of the PWM engine plus the workaround limits.
pub struct PwmBackend {
    bindings: [PwmBinding; PWM_CHANNELS],
    engine_started: bool,
    settle_attempts: u8,
    settle_polls: u16,
}

impl PwmBackend {
    pub fn new(settle_attempts: u8, settle_polls: u16) -> Self {
        Self {
            bindings: [PwmBinding::UNBOUND; PWM_CHANNELS],
            engine_started: false,
            settle_attempts,
            settle_polls,
        }
    }

    pub fn binding(&self, ch: u8) -> Option<&PwmBinding> {
        self.bindings.get(ch as usize)
    }

    /// Drive `ch` at `fraction` duty and `freq_hz` (non-zero).
    ///
    /// Returns `None` for a channel number beyond the engine.
    pub fn write(
        &mut self,
        port: &mut impl PwmPort,
        ch: u8,
        fraction: f32,
        freq_hz: u16,
    ) -> Option<PwmWrite> {
        debug_assert!(freq_hz != 0);
        let binding = self.bindings.get_mut(ch as usize)?;

        if binding.frequency_hz == freq_hz {
            let duty = convert_range(fraction, binding.period as u32) as u16;
            port.pwm_set_duty(ch, duty);
            binding.duty = duty;
            return Some(PwmWrite::DutyOnly);
        }

        if !self.engine_started {
            port.pwm_start_engine(PWM_SLOW_CLOCK_HZ, PWM_FAST_CLOCK_HZ);
            self.engine_started = true;
        }

        let (clock, period) = select_clock(freq_hz);
        let duty = convert_range(fraction, period as u32) as u16;

        let outcome = settle_counter(port, ch, period, self.settle_attempts, self.settle_polls);
        if outcome == SettleOutcome::Exhausted {
            warn!("pwm{}: counter did not settle, configuring anyway", ch);
        }

        port.pwm_set_clock(ch, clock);
        port.pwm_set_duty(ch, duty);
        port.pwm_set_period(ch, period);
        port.pwm_enable(ch);
        // Pin last, so the output never sees a half-programmed channel.
        if !binding.initialized {
            port.pwm_attach_pin(ch);
        }

        debug!(
            "pwm{}: {} Hz, {:?} clock, period {}, duty {}",
            ch, freq_hz, clock, period, duty
        );

        *binding = PwmBinding {
            frequency_hz: freq_hz,
            period,
            duty,
            clock,
            initialized: true,
        };
        Some(PwmWrite::Configured(outcome))
    }

    /// Stop `ch` and hand its pin back to GPIO.  No-op when unbound.
    pub fn release(&mut self, port: &mut impl PwmPort, ch: u8) {
        let Some(binding) = self.bindings.get_mut(ch as usize) else {
            return;
        };
        if binding.initialized {
            port.pwm_disable(ch);
            port.pwm_release_pin(ch);
            debug!("pwm{}: released", ch);
        }
        *binding = PwmBinding::UNBOUND;
    }
}

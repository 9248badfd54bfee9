//! Hardware PWM allocator.
//!
//! Decides per output and per tick whether its PWM can be generated by a
//! peripheral, and keeps that peripheral programmed.  The answer is a
//! plain `bool`; `false` means the software scheduler drives the pin this
//! tick.
//!
//! ```text
//!   try_delegate(ch, duty, freq)
//!        │
//!        ├── duty NaN ─────────────────▶ true  (nothing written)
//!        ├── freq 0 ───── release hw ──▶ false
//!        ├── Capability::Pwm ──────────▶ PwmBackend::write  ─▶ true
//!        ├── Capability::Timer ────────▶ TimerCounterBackend::write ─▶ true
//!        └── Capability::None ─────────▶ false
//! ```

use crate::app::ports::{PwmPort, TimerCounterPort};
use crate::board::{BoardTable, Capability, MAX_OUTPUTS};
use crate::config::CoreConfig;
use crate::drivers::pwm::{PwmBackend, PwmWrite, SettleOutcome};
use crate::drivers::timer_counter::TimerCounterBackend;
use crate::error::Result;

/// Detailed result of one delegation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delegation {
    /// Software PWM must drive the pin.
    Software,
    /// A peripheral owns the pin.
    Hardware,
    /// A peripheral owns the pin, but the PWM counter workaround ran out
    /// of attempts while reprogramming it.
    HardwareUnsettled,
    /// Malformed duty: nothing was written.
    Ignored,
}

impl Delegation {
    pub const fn is_delegated(self) -> bool {
        !matches!(self, Self::Software)
    }
}

pub struct HardwareAllocator {
    board: &'static BoardTable,
    pwm: PwmBackend,
    tc: TimerCounterBackend,
    /// Output currently owns its peripheral.
    bound: [bool; MAX_OUTPUTS],
    settle_timeouts: u32,
}

impl HardwareAllocator {
    pub fn new(board: &'static BoardTable, config: &CoreConfig) -> Result<Self> {
        board.validate()?;
        Ok(Self {
            board,
            pwm: PwmBackend::new(config.settle_attempts, config.settle_polls),
            tc: TimerCounterBackend::new(),
            bound: [false; MAX_OUTPUTS],
            settle_timeouts: 0,
        })
    }

    /// `true` when hardware generates the output's PWM.
    pub fn try_delegate<P>(&mut self, port: &mut P, channel: usize, duty: f32, freq_hz: u16) -> bool
    where
        P: PwmPort + TimerCounterPort,
    {
        self.delegate(port, channel, duty, freq_hz).is_delegated()
    }

    pub fn delegate<P>(&mut self, port: &mut P, channel: usize, duty: f32, freq_hz: u16) -> Delegation
    where
        P: PwmPort + TimerCounterPort,
    {
        if duty.is_nan() {
            return Delegation::Ignored;
        }
        let Some(out) = self.board.outputs.get(channel) else {
            return Delegation::Software;
        };

        if freq_hz == 0 {
            if self.bound[channel] {
                match out.capability {
                    Capability::Pwm(ch) => self.pwm.release(port, ch),
                    Capability::Timer(tc) => self.tc.release(port, tc),
                    Capability::None => {}
                }
                self.bound[channel] = false;
            }
            return Delegation::Software;
        }

        let result = match out.capability {
            Capability::Pwm(ch) => match self.pwm.write(port, ch, duty, freq_hz) {
                Some(PwmWrite::Configured(SettleOutcome::Exhausted)) => {
                    self.settle_timeouts = self.settle_timeouts.wrapping_add(1);
                    Delegation::HardwareUnsettled
                }
                Some(_) => Delegation::Hardware,
                None => Delegation::Software,
            },
            Capability::Timer(tc) => match self.tc.write(port, tc, duty, freq_hz) {
                Some(()) => Delegation::Hardware,
                None => Delegation::Software,
            },
            Capability::None => Delegation::Software,
        };
        if result.is_delegated() {
            self.bound[channel] = true;
        }
        result
    }

    /// Times the counter workaround gave up since construction.
    pub fn settle_timeouts(&self) -> u32 {
        self.settle_timeouts
    }

    pub fn is_bound(&self, channel: usize) -> bool {
        self.bound.get(channel).copied().unwrap_or(false)
    }

    pub fn pwm(&self) -> &PwmBackend {
        &self.pwm
    }

    pub fn timer_counter(&self) -> &TimerCounterBackend {
        &self.tc
    }
}

//! Tick service: the periodic handler.
//!
//! [`TickService`] owns the allocator, the software PWM scheduler and
//! the ADC pipeline, and is the only writer of their state.  One call to
//! [`TickService::tick`] is one run of the ~3.9 kHz interrupt.
//!
//! ```text
//!  SharedState ──▶ ┌──────────────────────────────────────┐ ──▶ EventSink
//!                  │             TickService              │
//!  HardwarePort ◀──│ Allocator · DutyScheduler · Pipeline │
//!                  └──────────────────────────────────────┘
//! ```
//!
//! ## Tick order
//!
//! 1. Enter the handler (nested higher-priority interrupts allowed).
//! 2. Offer every output to the hardware allocator.
//! 3. Software PWM for the outputs it refused.
//! 4. Slow-tick decimation and fan kickstart countdown.
//! 5. ADC poll / accumulate / publish.
//! 6. Advance the software PWM counters.
//! 7. One babystep per axis.
//! 8. Restore the interrupt state.

use log::info;

use crate::allocator::{Delegation, HardwareAllocator};
use crate::board::{BoardTable, Capability, MAX_ANALOG_INPUTS, MAX_OUTPUTS, PwmGroup};
use crate::config::CoreConfig;
use crate::error::Result;
use crate::scheduler::DutyScheduler;
use crate::sensors::{AnalogPipeline, PollOutcome};

use super::events::{Backend, CoreEvent};
use super::ports::{Axis, EventSink, HardwarePort};
use super::shared::SharedState;

// ───────────────────────────────────────────────────────────────
// Tick report
// ───────────────────────────────────────────────────────────────

/// What one tick did.  Cheap to build; tests and the simulator use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Outputs generated by a peripheral this tick.
    pub delegated: u16,
    pub slow_tick: bool,
    pub analog_published: bool,
    pub settle_timeouts: u8,
}

// ───────────────────────────────────────────────────────────────
// TickService
// ───────────────────────────────────────────────────────────────

pub struct TickService<'a> {
    board: &'static BoardTable,
    shared: &'a SharedState,
    allocator: HardwareAllocator,
    scheduler: DutyScheduler,
    pipeline: AnalogPipeline,
    backends: [Backend; MAX_OUTPUTS],
    tick_count: u64,
}

impl<'a> TickService<'a> {
    /// Validate `config` and `board`, then seed every output's frequency
    /// from its class default.
    pub fn new(board: &'static BoardTable, config: &CoreConfig, shared: &'a SharedState) -> Result<Self> {
        config.validate()?;
        let allocator = HardwareAllocator::new(board, config)?;

        for (i, out) in board.outputs.iter().enumerate() {
            let hz = match (out.capability, out.class.group()) {
                (Capability::None, _) => 0,
                (_, PwmGroup::Heater) => config.heater_pwm_freq_hz,
                (_, PwmGroup::Fan) => config.fan_pwm_freq_hz,
            };
            shared.set_frequency(i, hz);
        }

        let pipeline = AnalogPipeline::new(board.analog_inputs, config);
        shared.publish_readings(&pipeline.readings());

        info!(
            "tick: board '{}', {} outputs, {} analog inputs, {} Hz, slow tick every {} ms",
            board.name,
            board.outputs.len(),
            board.analog_inputs.len(),
            config.tick_hz,
            config.slow_tick_ms(),
        );

        Ok(Self {
            board,
            shared,
            allocator,
            scheduler: DutyScheduler::new(
                config.heater_pwm_step,
                config.fan_pwm_step,
                config.slow_tick_divider,
            ),
            pipeline,
            backends: [Backend::Software; MAX_OUTPUTS],
            tick_count: 0,
        })
    }

    /// One run of the periodic handler.
    pub fn tick(&mut self, hw: &mut impl HardwarePort, sink: &mut impl EventSink) -> TickReport {
        let irq = hw.enter_handler();
        let mut report = TickReport::default();

        // Hardware first; the rest of the tick only sees what it refused.
        let mut duties = [0u8; MAX_OUTPUTS];
        for (i, out) in self.board.outputs.iter().enumerate() {
            let duty = self.shared.duty(i);
            duties[i] = duty;
            let freq = self.shared.frequency(i);

            let result = self.allocator.delegate(hw, i, duty as f32 / 255.0, freq);
            if result == Delegation::HardwareUnsettled {
                report.settle_timeouts += 1;
                sink.emit(&CoreEvent::SettleTimeout { channel: i });
            }

            let delegated = result.is_delegated();
            self.scheduler.set_delegated(i, delegated);
            if delegated {
                report.delegated += 1;
            }

            let backend = match (delegated, out.capability) {
                (true, Capability::Pwm(_)) => Backend::HardwarePwm,
                (true, Capability::Timer(_)) => Backend::HardwareTimer,
                _ => Backend::Software,
            };
            if self.backends[i] != backend {
                self.backends[i] = backend;
                sink.emit(&CoreEvent::BackendChanged { channel: i, backend });
            }
        }

        let kickstart = self.shared.fan_kickstart() > 0;
        self.scheduler
            .drive(hw, self.board.outputs, &duties[..self.board.outputs.len()], kickstart);

        if self.scheduler.decimate() {
            self.shared.raise_slow_tick();
            self.shared.decay_fan_kickstart();
            report.slow_tick = true;
            sink.emit(&CoreEvent::SlowTick);
        }

        if let PollOutcome::Published { became_ready } = self.pipeline.poll(hw) {
            self.shared.publish_readings(&self.pipeline.readings());
            report.analog_published = true;
            if became_ready {
                self.shared.set_analog_ready();
                sink.emit(&CoreEvent::AnalogReady);
            }
        }

        self.scheduler.advance();

        for axis in Axis::ALL {
            if let Some(forward) = self.shared.take_babystep(axis) {
                hw.babystep(axis, forward);
            }
        }

        self.tick_count += 1;
        hw.exit_handler(irq);
        report
    }

    // ── Diagnostics ───────────────────────────────────────────

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Times the PWM counter workaround gave up since construction.
    pub fn settle_timeouts(&self) -> u32 {
        self.allocator.settle_timeouts()
    }

    /// Backend that generated `channel` on the last tick.
    pub fn backend(&self, channel: usize) -> Option<Backend> {
        self.backends[..self.board.outputs.len()].get(channel).copied()
    }

    pub fn board(&self) -> &'static BoardTable {
        self.board
    }

    pub fn allocator(&self) -> &HardwareAllocator {
        &self.allocator
    }

    pub fn scheduler(&self) -> &DutyScheduler {
        &self.scheduler
    }

    pub fn pipeline(&self) -> &AnalogPipeline {
        &self.pipeline
    }

    /// Number of analog inputs the pipeline publishes.
    pub fn analog_inputs(&self) -> usize {
        self.pipeline.channels().len().min(MAX_ANALOG_INPUTS)
    }
}

//! Outbound core events.
//!
//! The [`TickService`](super::service::TickService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Emission happens at
//! most a few times per slow tick, so a logging sink is cheap enough to
//! sit on the interrupt path.

/// Where an output's PWM is generated this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Dedicated PWM engine channel.
    HardwarePwm,
    /// Timer/Counter compare output.
    HardwareTimer,
    /// Tick-driven software PWM on a GPIO.
    Software,
}

/// Structured events emitted by the tick service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreEvent {
    /// The ~100 ms decimation counter rolled over.
    SlowTick,

    /// Every analog channel has a full filter ring behind it.
    AnalogReady,

    /// The PWM counter workaround ran out of attempts on this output.
    SettleTimeout { channel: usize },

    /// An output moved between hardware and software PWM.
    BackendChanged { channel: usize, backend: Backend },
}

//! Log-based event sink.
//!
//! [`LogEventSink`] implements [`EventSink`] by writing every
//! [`CoreEvent`] through the `log` facade.  The backend is whatever the
//! binary installs (`env_logger` on the host, RTT or UART on target).

use log::info;

use crate::app::events::CoreEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`CoreEvent`].
///
/// Slow ticks arrive ten times a second and are only logged at `trace`.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &CoreEvent) {
        match event {
            CoreEvent::SlowTick => {
                log::trace!("TICK  | slow");
            }
            CoreEvent::AnalogReady => {
                info!("ADC   | filter rings full");
            }
            CoreEvent::SettleTimeout { channel } => {
                // The PWM driver already warned.
                log::debug!("PWM   | output {} settle timeout", channel);
            }
            CoreEvent::BackendChanged { channel, backend } => {
                info!("PWM   | output {} -> {:?}", channel, backend);
            }
        }
    }
}

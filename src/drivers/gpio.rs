//! Digital outputs for software PWM.
//!
//! [`OutputPinBank`] maps board pin numbers onto any set of
//! `embedded_hal` output pins, so a board port can hand its HAL's pin
//! types straight to the scheduler.

use embedded_hal::digital::OutputPin;
use heapless::Vec;
use log::warn;

use crate::app::ports::GpioPort;
use crate::board::MAX_OUTPUTS;

/// Pins addressed by board pin number.
pub struct OutputPinBank<P: OutputPin> {
    pins: Vec<(u8, P), MAX_OUTPUTS>,
}

impl<P: OutputPin> OutputPinBank<P> {
    pub fn new() -> Self {
        Self { pins: Vec::new() }
    }

    /// Register `pin` under board pin number `number`.  Returns the pin
    /// back when the bank is full.
    pub fn add(&mut self, number: u8, pin: P) -> Result<(), P> {
        self.pins.push((number, pin)).map_err(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

impl<P: OutputPin> Default for OutputPinBank<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: OutputPin> GpioPort for OutputPinBank<P> {
    fn write_pin(&mut self, pin: u8, high: bool) {
        let Some((_, p)) = self.pins.iter_mut().find(|(n, _)| *n == pin) else {
            return;
        };
        let result = if high { p.set_high() } else { p.set_low() };
        if result.is_err() {
            warn!("gpio{}: write failed", pin);
        }
    }
}

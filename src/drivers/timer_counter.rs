//! Timer/Counter PWM backend.
//!
//! Nine timer channels (three units of three), each counting MCK/8 up to
//! its RC top and driving two compare outputs.  Both outputs of a timer
//! share its frequency; each has its own compare value and pin.

use log::debug;

use crate::app::ports::{CompareMode, TimerCounterPort};
use crate::board::{TcChannel, TcOutput};
use crate::drivers::pwm::convert_range;

/// Timer channels in the block.
pub const TC_CHANNELS: usize = 9;

/// Timer clock: MCK (84 MHz) / 8.
pub const TC_CLOCK_HZ: u32 = 84_000_000 / 8;

/// Current programming of one timer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcBinding {
    /// 0 = unbound.
    pub frequency_hz: u16,
    pub top: u32,
    /// Compare value per output (A, B).
    pub threshold: [u32; 2],
    /// Pin routed to the timer, per output.
    pub connected: [bool; 2],
}

impl TcBinding {
    pub const UNBOUND: Self = Self {
        frequency_hz: 0,
        top: 0,
        threshold: [0; 2],
        connected: [false; 2],
    };
}

const fn slot(output: TcOutput) -> usize {
    match output {
        TcOutput::A => 0,
        TcOutput::B => 1,
    }
}

pub struct TimerCounterBackend {
    bindings: [TcBinding; TC_CHANNELS],
}

impl TimerCounterBackend {
    pub fn new() -> Self {
        Self {
            bindings: [TcBinding::UNBOUND; TC_CHANNELS],
        }
    }

    pub fn binding(&self, timer: u8) -> Option<&TcBinding> {
        self.bindings.get(timer as usize)
    }

    /// Drive one compare output at `fraction` duty and `freq_hz`
    /// (non-zero).  Returns `None` for a timer beyond the block.
    pub fn write(
        &mut self,
        port: &mut impl TimerCounterPort,
        tc: TcChannel,
        fraction: f32,
        freq_hz: u16,
    ) -> Option<()> {
        debug_assert!(freq_hz != 0);
        let binding = self.bindings.get_mut(tc.timer as usize)?;
        let timer = tc.timer;
        let init = binding.frequency_hz != freq_hz;

        if init {
            port.tc_enable_clock(timer);
            port.tc_configure_waveform(timer);
            port.tc_set_top(timer, TC_CLOCK_HZ / freq_hz as u32);
            // Active-low heaters glitch on if the output starts low.
            if fraction >= 0.5 {
                port.tc_software_trigger(timer);
            }
            binding.frequency_hz = freq_hz;
        }

        // The compare value tracks the top the hardware actually holds.
        let top = port.tc_top(timer);
        let threshold = convert_range(fraction, top);
        if threshold == 0 {
            // Compare 1 + clear-on-top holds the line low with no
            // one-tick pulse at the start of each period.
            port.tc_set_compare(timer, tc.output, 1, CompareMode::HoldLow);
        } else {
            port.tc_set_compare(timer, tc.output, threshold, CompareMode::SetOnTopClearOnMatch);
        }
        binding.top = top;
        binding.threshold[slot(tc.output)] = threshold;

        if !binding.connected[slot(tc.output)] {
            port.tc_attach_pin(timer, tc.output);
            binding.connected[slot(tc.output)] = true;
        }
        if init {
            port.tc_start(timer);
            debug!("tc{}: {} Hz, top {}", timer, freq_hz, top);
        }
        Some(())
    }

    /// Hold one output low and return its pin to GPIO.  The timer's
    /// frequency is forgotten so the next write reinitializes it.
    pub fn release(&mut self, port: &mut impl TimerCounterPort, tc: TcChannel) {
        let Some(binding) = self.bindings.get_mut(tc.timer as usize) else {
            return;
        };
        let s = slot(tc.output);
        if binding.connected[s] {
            port.tc_set_compare(tc.timer, tc.output, 1, CompareMode::HoldLow);
            port.tc_release_pin(tc.timer, tc.output);
            binding.connected[s] = false;
            binding.threshold[s] = 0;
            debug!("tc{}{:?}: released", tc.timer, tc.output);
        }
        binding.frequency_hz = 0;
    }
}

impl Default for TimerCounterBackend {
    fn default() -> Self {
        Self::new()
    }
}

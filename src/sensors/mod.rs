//! Analog acquisition pipeline.
//!
//! Owns one [`AnalogChannel`] per board analog input and steps them all
//! in lock-step: every completed conversion batch is accumulated, every
//! `2^bits + 2` batches close a window, and every ring wrap marks the
//! pipeline ready.
//!
//! ```text
//!  AdcPort ──▶ accumulate ──▶ window closed? ──▶ ring[pos] ──▶ sum / depth ──▶ SharedState
//!     ▲                                                                            │
//!     └───────────────────────────── start_conversion ◀────────────────────────────┘
//! ```

pub mod filter;

use heapless::Vec;
use log::info;

use crate::app::ports::AdcPort;
use crate::board::{AnalogDescriptor, MAX_ANALOG_INPUTS};
use crate::config::CoreConfig;
pub use filter::AnalogChannel;

/// What one [`AnalogPipeline::poll`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Converter still busy.
    Busy,
    /// Batch accumulated, window still open.
    Accumulated,
    /// Window closed and new readings published.
    Published {
        /// This window completed the first full ring.
        became_ready: bool,
    },
}

pub struct AnalogPipeline {
    channels: Vec<AnalogChannel, MAX_ANALOG_INPUTS>,
    bits: u8,
    window: u16,
    depth: usize,
    count: u16,
    pos: usize,
    ready: bool,
}

impl AnalogPipeline {
    /// Build from the board inputs.  Inputs beyond capacity are dropped
    /// (the board table check rejects such tables first).
    pub fn new(inputs: &[AnalogDescriptor], config: &CoreConfig) -> Self {
        let depth = config.median_depth as usize;
        let mut channels = Vec::new();
        for input in inputs.iter().take(MAX_ANALOG_INPUTS) {
            let shift = if input.mcu_sensor { 0 } else { config.adc_normalize_shift };
            let neutral = ((1u32 << (config.adc_resolution_bits - shift)) / 2) as u16;
            let _ = channels.push(AnalogChannel::new(input.adc_channel, shift, neutral, depth));
        }
        Self {
            channels,
            bits: config.oversample_bits,
            window: config.oversample_window(),
            depth,
            count: 0,
            pos: 0,
            ready: false,
        }
    }

    /// Consume one completed conversion batch, if any, and re-arm the
    /// converter.
    pub fn poll(&mut self, adc: &mut impl AdcPort) -> PollOutcome {
        if !adc.conversion_complete() {
            return PollOutcome::Busy;
        }

        self.count += 1;
        for ch in &mut self.channels {
            ch.accumulate(adc.read_result(ch.adc_channel()));
        }

        let outcome = if self.count >= self.window {
            for ch in &mut self.channels {
                ch.close_window(self.pos, self.bits);
            }
            self.count = 0;
            self.pos += 1;

            let mut became_ready = false;
            if self.pos >= self.depth {
                self.pos = 0;
                if !self.ready {
                    self.ready = true;
                    became_ready = true;
                    info!("adc: filter rings full, readings valid");
                }
            }
            PollOutcome::Published { became_ready }
        } else {
            PollOutcome::Accumulated
        };

        adc.start_conversion();
        outcome
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn channels(&self) -> &[AnalogChannel] {
        &self.channels
    }

    /// Current published value of every input, in board order.
    pub fn readings(&self) -> Vec<u16, MAX_ANALOG_INPUTS> {
        self.channels.iter().map(AnalogChannel::published).collect()
    }

    /// Ring slot the next window will overwrite.
    pub fn ring_position(&self) -> usize {
        self.pos
    }
}

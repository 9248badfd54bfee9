//! Per-channel oversampling and rolling-average filter.
//!
//! Conversions are accumulated over a window of `2^bits + 2` samples.
//! At the end of the window the minimum and maximum are dropped, the
//! rest is averaged with round-half-up, and the result replaces the
//! oldest entry of a fixed-depth ring.  The published reading is the
//! ring mean, maintained incrementally through a running sum.

use crate::config::MAX_MEDIAN_DEPTH;

/// Filter state of one analog input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalogChannel {
    adc_channel: u8,
    shift: u8,
    acc: i32,
    min: i32,
    max: i32,
    ring: [i32; MAX_MEDIAN_DEPTH],
    depth: usize,
    sum: i32,
    published: u16,
}

impl AnalogChannel {
    /// `neutral` pre-fills the ring so the first readings sit at
    /// mid-scale rather than zero.
    pub fn new(adc_channel: u8, shift: u8, neutral: u16, depth: usize) -> Self {
        let depth = depth.clamp(1, MAX_MEDIAN_DEPTH);
        let mut ring = [0; MAX_MEDIAN_DEPTH];
        ring[..depth].fill(neutral as i32);
        Self {
            adc_channel,
            shift,
            acc: 0,
            min: i32::MAX,
            max: 0,
            ring,
            depth,
            sum: neutral as i32 * depth as i32,
            published: neutral,
        }
    }

    pub fn adc_channel(&self) -> u8 {
        self.adc_channel
    }

    pub fn published(&self) -> u16 {
        self.published
    }

    pub fn sum(&self) -> i32 {
        self.sum
    }

    pub fn ring(&self) -> &[i32] {
        &self.ring[..self.depth]
    }

    /// Add one raw conversion to the current window.
    pub fn accumulate(&mut self, raw: u16) {
        let cur = (raw >> self.shift) as i32;
        self.acc += cur;
        self.min = self.min.min(cur);
        self.max = self.max.max(cur);
    }

    /// Close the window: store the oversampled value at ring slot `pos`
    /// and republish.  Returns the oversampled value.
    pub fn close_window(&mut self, pos: usize, bits: u8) -> i32 {
        let value = (self.acc + (1 << (bits - 1)) - (self.min + self.max)) >> bits;
        self.acc = 0;
        self.min = i32::MAX;
        self.max = 0;

        let slot = pos % self.depth;
        self.sum -= self.ring[slot];
        self.ring[slot] = value;
        self.sum += value;
        self.published = (self.sum / self.depth as i32) as u16;
        value
    }
}

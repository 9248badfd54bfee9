//! Core configuration parameters
//!
//! Timing, PWM resolution and ADC filter parameters for the tick
//! service.  Defaults reproduce the reference controller; a stored copy
//! can live in the external EEPROM (see [`store`] / [`load`]).

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, StorageError, StoragePort};

/// Largest supported ring depth for the rolling filter.
pub const MAX_MEDIAN_DEPTH: usize = 16;

/// Core configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    // --- Tick timing ---
    /// Periodic handler rate (Hz).  Informational; the tick timer is
    /// programmed by the board bring-up.
    pub tick_hz: u32,
    /// Ticks per slow-tick flag (~100 ms).
    pub slow_tick_divider: u16,

    // --- Software PWM ---
    /// Heater counter increment per tick (power of two).
    pub heater_pwm_step: u8,
    /// Fan counter increment per tick (power of two).
    pub fan_pwm_step: u8,

    // --- Hardware PWM ---
    /// Initial hardware PWM frequency for heater-class outputs (Hz, 0 = software only).
    pub heater_pwm_freq_hz: u16,
    /// Initial hardware PWM frequency for fan-class outputs (Hz, 0 = software only).
    pub fan_pwm_freq_hz: u16,
    /// Disable/bump/poll attempts of the counter-reset workaround.
    pub settle_attempts: u8,
    /// Counter reads per workaround attempt.
    pub settle_polls: u16,

    // --- ADC ---
    /// Converter resolution in bits.
    pub adc_resolution_bits: u8,
    /// Right shift applied to every non-MCU channel (12 → 10 bit).
    pub adc_normalize_shift: u8,
    /// log2 of the conversions kept per oversampled value.
    pub oversample_bits: u8,
    /// Ring depth of the rolling filter.
    pub median_depth: u8,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            // Tick timing
            tick_hz: 3906,
            slow_tick_divider: 390, // ~100 ms

            // Software PWM (8-bit resolution)
            heater_pwm_step: 1,
            fan_pwm_step: 1,

            // Hardware PWM
            heater_pwm_freq_hz: 10,
            fan_pwm_freq_hz: 250,
            settle_attempts: 5,
            settle_polls: 1000,

            // ADC
            adc_resolution_bits: 12,
            adc_normalize_shift: 2,
            oversample_bits: 2,
            median_depth: 10,
        }
    }
}

impl CoreConfig {
    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_hz == 0 {
            return Err(ConfigError::ValidationFailed("tick_hz must be > 0"));
        }
        if self.slow_tick_divider == 0 {
            return Err(ConfigError::ValidationFailed("slow_tick_divider must be > 0"));
        }
        if !valid_step(self.heater_pwm_step) {
            return Err(ConfigError::ValidationFailed(
                "heater_pwm_step must be a power of two <= 128",
            ));
        }
        if !valid_step(self.fan_pwm_step) {
            return Err(ConfigError::ValidationFailed(
                "fan_pwm_step must be a power of two <= 128",
            ));
        }
        if self.settle_attempts == 0 {
            return Err(ConfigError::ValidationFailed("settle_attempts must be >= 1"));
        }
        if !(8..=16).contains(&self.adc_resolution_bits) {
            return Err(ConfigError::ValidationFailed("adc_resolution_bits must be 8..=16"));
        }
        if self.adc_normalize_shift >= self.adc_resolution_bits {
            return Err(ConfigError::ValidationFailed(
                "adc_normalize_shift must be below the resolution",
            ));
        }
        if !(1..=6).contains(&self.oversample_bits) {
            return Err(ConfigError::ValidationFailed("oversample_bits must be 1..=6"));
        }
        if self.median_depth == 0 || self.median_depth as usize > MAX_MEDIAN_DEPTH {
            return Err(ConfigError::ValidationFailed("median_depth must be 1..=16"));
        }
        Ok(())
    }

    /// Conversions per oversampled value: the kept `2^bits` plus the
    /// discarded minimum and maximum.
    pub const fn oversample_window(&self) -> u16 {
        2 + (1 << self.oversample_bits)
    }

    /// Ticks between two slow-tick flags, in milliseconds.
    pub fn slow_tick_ms(&self) -> u32 {
        self.slow_tick_divider as u32 * 1000 / self.tick_hz
    }
}

const fn valid_step(step: u8) -> bool {
    step != 0 && step.is_power_of_two() && step <= 128
}

// ---------------------------------------------------------------------------
// EEPROM persistence
// ---------------------------------------------------------------------------

const BLOB_MAGIC: u8 = 0xC5;
const BLOB_MAX: usize = 64;

/// Encode and write the config at `addr`: magic, length, postcard body.
pub fn store(
    storage: &mut impl StoragePort,
    addr: u16,
    config: &CoreConfig,
) -> Result<(), ConfigError> {
    config.validate()?;

    let mut buf = [0u8; BLOB_MAX + 2];
    let len = {
        let body = postcard::to_slice(config, &mut buf[2..])
            .map_err(|_| ConfigError::ValidationFailed("config does not fit the EEPROM blob"))?;
        body.len()
    };
    buf[0] = BLOB_MAGIC;
    buf[1] = len as u8;

    let end = usize::from(addr) + len + 2;
    if end > usize::from(storage.capacity()) {
        return Err(ConfigError::Storage(StorageError::OutOfRange));
    }
    storage.write(addr, &buf[..len + 2])?;
    info!("config: stored {} bytes at 0x{:04x}", len + 2, addr);
    Ok(())
}

/// Read, decode and validate the config at `addr`.
pub fn load(storage: &impl StoragePort, addr: u16) -> Result<CoreConfig, ConfigError> {
    let mut header = [0u8; 2];
    storage.read(addr, &mut header)?;
    if header[0] != BLOB_MAGIC {
        return Err(ConfigError::NotFound);
    }
    let len = header[1] as usize;
    if len == 0 || len > BLOB_MAX {
        return Err(ConfigError::Corrupted);
    }

    let body_addr = addr
        .checked_add(2)
        .ok_or(ConfigError::Storage(StorageError::OutOfRange))?;
    let mut body = [0u8; BLOB_MAX];
    storage.read(body_addr, &mut body[..len])?;
    let config: CoreConfig = postcard::from_bytes(&body[..len]).map_err(|_| ConfigError::Corrupted)?;

    if let Err(e) = config.validate() {
        error!("config: stored blob rejected ({})", e);
        return Err(e);
    }
    Ok(config)
}

/// [`load`], falling back to defaults on any failure.
pub fn load_or_default(storage: &impl StoragePort, addr: u16) -> CoreConfig {
    match load(storage, addr) {
        Ok(cfg) => {
            info!("config: loaded from EEPROM");
            cfg
        }
        Err(e) => {
            info!("config: using defaults ({})", e);
            CoreConfig::default()
        }
    }
}

//! Config persistence through the EEPROM primitive interface.

use crate::mock_hw::MockEeprom;
use printcore::app::ports::{ConfigError, StorageError};
use printcore::config::{self, CoreConfig};
use printcore::Error;

const CONFIG_ADDR: u16 = 0x100;

#[test]
fn stored_config_is_loaded_back() {
    let mut eeprom = MockEeprom::blank(1024);
    let cfg = CoreConfig {
        oversample_bits: 3,
        median_depth: 16,
        fan_pwm_freq_hz: 25_000,
        ..CoreConfig::default()
    };
    config::store(&mut eeprom, CONFIG_ADDR, &cfg).expect("store");
    assert_eq!(config::load(&eeprom, CONFIG_ADDR), Ok(cfg));
}

#[test]
fn invalid_config_is_never_written() {
    let mut eeprom = MockEeprom::blank(1024);
    let cfg = CoreConfig { heater_pwm_step: 6, ..CoreConfig::default() };
    assert!(matches!(
        config::store(&mut eeprom, CONFIG_ADDR, &cfg),
        Err(ConfigError::ValidationFailed(_))
    ));
    assert!(eeprom.data.iter().all(|&b| b == 0xFF));
}

#[test]
fn bus_failure_maps_to_storage_error() {
    let mut eeprom = MockEeprom::blank(1024);
    eeprom.fail_writes = true;
    let err = config::store(&mut eeprom, CONFIG_ADDR, &CoreConfig::default())
        .expect_err("write must fail");
    assert_eq!(Error::from(err), Error::Storage(StorageError::NoAck));
}

#[test]
fn corrupted_blob_falls_back_to_defaults() {
    let mut eeprom = MockEeprom::blank(1024);
    config::store(&mut eeprom, CONFIG_ADDR, &CoreConfig::default()).expect("store");
    // Truncate the body mid-field.
    eeprom.data[CONFIG_ADDR as usize + 1] = 1;
    assert_eq!(config::load(&eeprom, CONFIG_ADDR), Err(ConfigError::Corrupted));
    assert_eq!(config::load_or_default(&eeprom, CONFIG_ADDR), CoreConfig::default());
}

//! Fuzz target: `config::load`
//!
//! Treats the input as raw EEPROM contents and asserts that loading
//! never panics and only ever yields a config that passes validation.
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use libfuzzer_sys::fuzz_target;
use printcore::app::ports::{StorageError, StoragePort};
use printcore::config;

struct Blob<'a>(&'a [u8]);

impl StoragePort for Blob<'_> {
    fn read(&self, addr: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        let start = addr as usize;
        let src = self
            .0
            .get(start..start + buf.len())
            .ok_or(StorageError::OutOfRange)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, _addr: u16, _data: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::IoError)
    }

    fn capacity(&self) -> u16 {
        self.0.len().min(u16::MAX as usize) as u16
    }
}

fuzz_target!(|data: &[u8]| {
    if let Ok(cfg) = config::load(&Blob(data), 0) {
        assert!(cfg.validate().is_ok(), "load returned an invalid config");
    }
    let fallback = config::load_or_default(&Blob(data), 0);
    assert!(fallback.validate().is_ok());
});

//! Fuzz target: `TickService::tick`
//!
//! Interprets the input as a stream of foreground operations (duty,
//! frequency, ADC values, kickstart, babysteps, tick bursts) against the
//! simulator, and asserts the handler never panics, never leaves a
//! nested interrupt state behind, and never drives a pin a peripheral
//! owns.
//!
//! cargo fuzz run fuzz_tick_service

#![no_main]

use libfuzzer_sys::fuzz_target;
use printcore::adapters::sim::SimHardware;
use printcore::app::ports::{Axis, NullSink};
use printcore::board::EXAMPLE_BOARD;
use printcore::config::CoreConfig;
use printcore::{SharedState, TickService};

fuzz_target!(|data: &[u8]| {
    let shared = SharedState::new();
    let Ok(mut svc) = TickService::new(&EXAMPLE_BOARD, &CoreConfig::default(), &shared) else {
        return;
    };
    let mut hw = SimHardware::new(&EXAMPLE_BOARD);

    for chunk in data.chunks_exact(4) {
        let [op, a, b, c] = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let channel = (a % 8) as usize;
        match op % 6 {
            0 => shared.set_duty(channel, b),
            1 => shared.set_frequency(channel, u16::from_le_bytes([b, c])),
            2 => hw.set_adc(a % 16, u16::from_le_bytes([b, c]) & 0x0FFF),
            3 => shared.request_fan_kickstart(b % 8),
            4 => shared.add_babysteps(Axis::ALL[(a % 3) as usize], i32::from(b as i8)),
            _ => {
                for _ in 0..u16::from_le_bytes([b, c]) % 1024 {
                    svc.tick(&mut hw, &mut NullSink);
                    hw.advance_pwm(u32::from(a) * 16);
                }
            }
        }
    }

    assert_eq!(hw.handler_depth(), 0);
    assert_eq!(hw.gpio_conflicts(), 0, "software PWM drove a peripheral pin");
    for input in 0..EXAMPLE_BOARD.analog_inputs.len() {
        assert!(shared.reading(input) <= 4095);
    }
});

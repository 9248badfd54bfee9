//! End-to-end tick scenarios against the behavioural simulator.

use crate::mock_hw::RecordingSink;
use printcore::adapters::sim::SimHardware;
use printcore::app::events::{Backend, CoreEvent};
use printcore::app::ports::NullSink;
use printcore::board::EXAMPLE_BOARD;
use printcore::config::CoreConfig;
use printcore::{SharedState, TickService};

const HOTEND0: usize = 0;
const BED: usize = 2;
const FAN0: usize = 3;
const CONTROLLER_FAN: usize = 5;
const CONTROLLER_FAN_PIN: u8 = 40;
const FAN0_PIN: u8 = 9;

fn service(shared: &SharedState) -> TickService<'_> {
    TickService::new(&EXAMPLE_BOARD, &CoreConfig::default(), shared).expect("service")
}

#[test]
fn software_output_follows_duty_over_a_period() {
    let shared = SharedState::new();
    let mut svc = service(&shared);
    let mut hw = SimHardware::new(&EXAMPLE_BOARD);
    shared.set_duty(CONTROLLER_FAN, 64);

    let mut high = 0;
    for _ in 0..256 {
        svc.tick(&mut hw, &mut NullSink);
        if hw.pin_level(CONTROLLER_FAN_PIN) == Some(true) {
            high += 1;
        }
    }
    assert_eq!(high, 64);
    assert_eq!(svc.backend(CONTROLLER_FAN), Some(Backend::Software));
}

#[test]
fn full_duty_software_output_never_goes_low() {
    let shared = SharedState::new();
    let mut svc = service(&shared);
    let mut hw = SimHardware::new(&EXAMPLE_BOARD);
    shared.set_duty(CONTROLLER_FAN, 255);

    for _ in 0..1024 {
        svc.tick(&mut hw, &mut NullSink);
    }
    let lows = hw
        .take_transitions()
        .into_iter()
        .filter(|&(pin, high)| pin == CONTROLLER_FAN_PIN && !high)
        .count();
    assert_eq!(lows, 0);
}

#[test]
fn frequency_drop_moves_output_to_software_without_pin_conflicts() {
    let shared = SharedState::new();
    let mut svc = service(&shared);
    let mut hw = SimHardware::new(&EXAMPLE_BOARD);
    let mut sink = RecordingSink::new();
    shared.set_duty(BED, 128);

    svc.tick(&mut hw, &mut sink);
    assert_eq!(svc.backend(BED), Some(Backend::HardwarePwm));

    shared.set_frequency(BED, 0);
    for _ in 0..300 {
        svc.tick(&mut hw, &mut sink);
    }
    assert_eq!(svc.backend(BED), Some(Backend::Software));
    assert!(!hw.pwm_channel(6).attached);
    assert_eq!(hw.gpio_conflicts(), 0);
    assert!(sink.events.contains(&CoreEvent::BackendChanged {
        channel: BED,
        backend: Backend::Software
    }));

    // Delegation is offered again on the very next tick.
    shared.set_frequency(BED, 10);
    svc.tick(&mut hw, &mut sink);
    assert_eq!(svc.backend(BED), Some(Backend::HardwarePwm));
    assert!(hw.pwm_channel(6).attached);
}

#[test]
fn fan_frequency_change_survives_high_counter() {
    let shared = SharedState::new();
    let mut svc = service(&shared);
    let mut hw = SimHardware::new(&EXAMPLE_BOARD);
    shared.set_duty(FAN0, 77);

    svc.tick(&mut hw, &mut NullSink);
    // Let the 250 Hz counter climb well above the next period.
    hw.set_pwm_counter(4, 20_000);

    shared.set_frequency(FAN0, 25_000);
    svc.tick(&mut hw, &mut NullSink);

    let ch = hw.pwm_channel(4);
    assert_eq!(ch.period, 255);
    assert_eq!(ch.duty, 77);
    assert!(ch.counter < 255, "counter {} left above the period", ch.counter);
    assert_eq!(svc.settle_timeouts(), 0);
}

#[test]
fn back_to_back_frequency_changes_each_settle() {
    let shared = SharedState::new();
    let mut svc = service(&shared);
    let mut hw = SimHardware::new(&EXAMPLE_BOARD);
    shared.set_duty(FAN0, 77);

    svc.tick(&mut hw, &mut NullSink);
    assert_eq!(hw.pwm_channel(4).period, 25_500);

    for (freq, period, duty) in [(25_000, 255, 77), (1_000, 6_375, 1_925)] {
        // Counter left far above the period about to be written.
        hw.set_pwm_counter(4, 20_000);
        shared.set_frequency(FAN0, freq);
        let report = svc.tick(&mut hw, &mut NullSink);

        let ch = hw.pwm_channel(4);
        assert_eq!(ch.period, period, "{freq} Hz");
        assert_eq!(ch.duty, duty, "{freq} Hz");
        assert!(ch.counter < period, "{freq} Hz: counter {} above period", ch.counter);
        assert_eq!(report.settle_timeouts, 0);
    }
    assert_eq!(svc.settle_timeouts(), 0);
    assert_eq!(svc.backend(FAN0), Some(Backend::HardwarePwm));
}

#[test]
fn timer_outputs_run_in_hardware() {
    let shared = SharedState::new();
    let mut svc = service(&shared);
    let mut hw = SimHardware::new(&EXAMPLE_BOARD);
    shared.set_duty_fraction(HOTEND0, 0.75);

    svc.tick(&mut hw, &mut NullSink);
    let tc = hw.timer_channel(0);
    assert_eq!(svc.backend(HOTEND0), Some(Backend::HardwareTimer));
    assert_eq!(tc.top, 1_050_000);
    assert_eq!(tc.triggers, 1);
    assert!(tc.running && tc.attached[1]);
}

#[test]
fn analog_readings_become_ready_after_a_full_ring() {
    let shared = SharedState::new();
    let cfg = CoreConfig::default();
    let mut svc = service(&shared);
    let mut hw = SimHardware::new(&EXAMPLE_BOARD);
    let mut sink = RecordingSink::new();
    hw.set_adc(7, 3000);
    hw.set_adc(6, 1000);
    hw.set_adc(5, 4095);
    hw.set_adc(15, 1750);

    let ticks = u32::from(cfg.oversample_window()) * u32::from(cfg.median_depth);
    for _ in 0..ticks - 1 {
        svc.tick(&mut hw, &mut sink);
    }
    assert!(!shared.analog_ready());

    svc.tick(&mut hw, &mut sink);
    assert!(shared.analog_ready());
    assert_eq!(sink.count(|e| *e == CoreEvent::AnalogReady), 1);
    assert_eq!(&shared.analog_snapshot()[..4], &[750, 250, 1023, 1750]);
    assert_eq!(hw.conversions(), ticks);
}

#[test]
fn busy_converter_publishes_nothing() {
    let shared = SharedState::new();
    let mut svc = service(&shared);
    let mut hw = SimHardware::new(&EXAMPLE_BOARD);
    hw.set_adc_busy(true);
    hw.set_adc(7, 3000);

    for _ in 0..200 {
        svc.tick(&mut hw, &mut NullSink);
    }
    assert_eq!(hw.conversions(), 0);
    // Still the neutral mid-scale seed.
    assert_eq!(shared.reading(0), 512);
    assert_eq!(shared.reading(3), 2048);
}

#[test]
fn fan_kickstart_holds_software_fan_on_until_it_expires() {
    let shared = SharedState::new();
    let mut svc = service(&shared);
    let mut hw = SimHardware::new(&EXAMPLE_BOARD);
    shared.set_frequency(FAN0, 0);
    shared.set_duty(FAN0, 26);
    shared.request_fan_kickstart(1);

    // One slow tick of kickstart.
    for _ in 0..390 {
        svc.tick(&mut hw, &mut NullSink);
    }
    let lows = hw
        .take_transitions()
        .into_iter()
        .filter(|&(pin, high)| pin == FAN0_PIN && !high)
        .count();
    assert_eq!(lows, 0);
    assert_eq!(shared.fan_kickstart(), 0);

    for _ in 0..256 {
        svc.tick(&mut hw, &mut NullSink);
    }
    assert!(hw.take_transitions().contains(&(FAN0_PIN, false)));
}

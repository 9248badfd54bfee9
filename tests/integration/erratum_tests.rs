//! Register sequences of the hardware allocator, including the PWM
//! counter-reset workaround, checked call by call.

use crate::mock_hw::{MockHardware, RecordingSink, RegCall};
use printcore::allocator::HardwareAllocator;
use printcore::app::events::CoreEvent;
use printcore::app::ports::{CompareMode, PwmClock};
use printcore::board::{EXAMPLE_BOARD, TcOutput};
use printcore::config::CoreConfig;
use printcore::{SharedState, TickService};

const HOTEND0: usize = 0;
const FAN0: usize = 3;
const FAN0_PWM: u8 = 4;

fn allocator() -> HardwareAllocator {
    HardwareAllocator::new(&EXAMPLE_BOARD, &CoreConfig::default()).expect("example board")
}

fn configure_tail(ch: u8, period: u16, duty: u16) -> Vec<RegCall> {
    vec![
        RegCall::PwmClock(ch, PwmClock::Fast),
        RegCall::PwmDuty(ch, duty),
        RegCall::PwmPeriod(ch, period),
        RegCall::PwmEnable(ch),
        RegCall::PwmAttach(ch),
    ]
}

#[test]
fn high_counter_is_bumped_past_the_wrap_before_reprogramming() {
    let mut hw = MockHardware::new();
    let mut a = allocator();
    // Check, two polls (second ran past the old value), re-check.
    hw.script_counter(&[40_000, 40_000, 40_001, 100]);

    assert!(a.try_delegate(&mut hw, FAN0, 0.5, 25_000));

    let mut expected = vec![
        RegCall::StartEngine,
        RegCall::PwmDisable(FAN0_PWM),
        RegCall::PwmRead(FAN0_PWM),
        RegCall::PwmPeriod(FAN0_PWM, 40_002),
        RegCall::PwmClock(FAN0_PWM, PwmClock::Fast),
        RegCall::PwmEnable(FAN0_PWM),
        RegCall::PwmRead(FAN0_PWM),
        RegCall::PwmRead(FAN0_PWM),
        RegCall::PwmDisable(FAN0_PWM),
        RegCall::PwmRead(FAN0_PWM),
    ];
    expected.extend(configure_tail(FAN0_PWM, 255, 128));
    assert_eq!(hw.calls(), expected);
    assert_eq!(a.settle_timeouts(), 0);
}

#[test]
fn counter_about_to_wrap_needs_no_bump() {
    let mut hw = MockHardware::new();
    let mut a = allocator();
    hw.script_counter(&[65_530]);

    assert!(a.try_delegate(&mut hw, FAN0, 0.5, 25_000));

    let mut expected = vec![
        RegCall::StartEngine,
        RegCall::PwmDisable(FAN0_PWM),
        RegCall::PwmRead(FAN0_PWM),
    ];
    expected.extend(configure_tail(FAN0_PWM, 255, 128));
    assert_eq!(hw.calls(), expected);
}

#[test]
fn stuck_counter_gives_up_after_bounded_reads_and_configures_anyway() {
    let mut hw = MockHardware::new();
    hw.idle_counter = 40_000;
    let mut a = allocator();

    assert!(a.try_delegate(&mut hw, FAN0, 0.5, 25_000));

    let reads = hw.count(|c| matches!(c, RegCall::PwmRead(_)));
    assert_eq!(reads, 6 + 5 * 1000);
    assert_eq!(a.settle_timeouts(), 1);

    let calls = hw.calls();
    assert_eq!(&calls[calls.len() - 5..], configure_tail(FAN0_PWM, 255, 128).as_slice());
}

#[test]
fn unchanged_frequency_rewrites_only_the_duty() {
    let mut hw = MockHardware::new();
    let mut a = allocator();
    assert!(a.try_delegate(&mut hw, FAN0, 0.5, 25_000));
    hw.clear();

    assert!(a.try_delegate(&mut hw, FAN0, 0.25, 25_000));
    assert_eq!(hw.calls(), vec![RegCall::PwmDuty(FAN0_PWM, 64)]);
}

#[test]
fn timer_zero_duty_is_held_low_without_trigger() {
    let mut hw = MockHardware::new();
    let mut a = allocator();

    assert!(a.try_delegate(&mut hw, HOTEND0, 0.0, 10));
    assert_eq!(
        hw.calls(),
        vec![
            RegCall::TcClock(0),
            RegCall::TcConfigure(0),
            RegCall::TcTop(0, 1_050_000),
            RegCall::TcCompare(0, TcOutput::B, 1, CompareMode::HoldLow),
            RegCall::TcAttach(0, TcOutput::B),
            RegCall::TcStart(0),
        ]
    );
}

#[test]
fn settle_timeouts_surface_as_events_once_per_reprogram() {
    let shared = SharedState::new();
    let mut svc = TickService::new(&EXAMPLE_BOARD, &CoreConfig::default(), &shared).expect("service");
    let mut hw = MockHardware::new();
    hw.idle_counter = 40_000;
    let mut sink = RecordingSink::new();

    let report = svc.tick(&mut hw, &mut sink);
    // bed (2 490), fan0 and fan1 (25 500) are all below a stuck 40 000.
    assert_eq!(report.settle_timeouts, 3);
    assert_eq!(
        sink.count(|e| matches!(e, CoreEvent::SettleTimeout { .. })),
        3
    );

    svc.tick(&mut hw, &mut sink);
    assert_eq!(svc.settle_timeouts(), 3);
    assert_eq!(svc.allocator().settle_timeouts(), 3);
    assert!(sink.events.contains(&CoreEvent::SettleTimeout { channel: FAN0 }));
}

#[test]
fn handler_is_bracketed_by_interrupt_save_and_restore() {
    let shared = SharedState::new();
    let mut svc = TickService::new(&EXAMPLE_BOARD, &CoreConfig::default(), &shared).expect("service");
    let mut hw = MockHardware::new();
    svc.tick(&mut hw, &mut RecordingSink::new());

    let calls = hw.calls();
    assert_eq!(calls.first(), Some(&RegCall::Enter));
    assert_eq!(calls.last(), Some(&RegCall::Exit));
    // Converter busy: not re-armed.
    assert!(!calls.contains(&RegCall::AdcStart));
}

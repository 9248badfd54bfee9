//! printcore host simulation runner.
//!
//! Runs the tick service against [`SimHardware`] for a number of
//! simulated seconds and prints the filtered readings and the backend
//! each output ended up on.
//!
//! ```text
//! printcore [CONFIG.json] [SECONDS]
//! ```
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  SimHardware (PWM · TC · ADC · GPIO · IRQ · stepper)        │
//! │  ─────────────────── Port Trait Boundary ────────────────  │
//! │  TickService  ◀── SharedState ◀── this loop (foreground)   │
//! │  LogEventSink ◀── CoreEvent                                │
//! └────────────────────────────────────────────────────────────┘
//! ```

use std::fs;

use anyhow::{Context, Result, anyhow};
use log::info;

use printcore::adapters::log_sink::LogEventSink;
use printcore::adapters::sim::SimHardware;
use printcore::app::ports::Axis;
use printcore::board::EXAMPLE_BOARD;
use printcore::config::CoreConfig;
use printcore::drivers::pwm::PWM_FAST_CLOCK_HZ;
use printcore::{SharedState, TickService};

static SHARED: SharedState = SharedState::new();

/// Raw 12-bit thermistor readings around room temperature plus a ramp.
struct SignalGen {
    seed: u32,
}

impl SignalGen {
    fn next_noise(&mut self) -> i32 {
        // Numerical Recipes LCG.
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        ((self.seed >> 24) as i32 % 17) - 8
    }

    fn sample(&mut self, base: i32, tick: u64) -> u16 {
        let ramp = (tick / 400) as i32;
        (base - ramp + self.next_noise()).clamp(0, 4095) as u16
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  printcore sim v{}                ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => {
            let text = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            let cfg: CoreConfig =
                serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?;
            info!("Config loaded from {}", path);
            cfg
        }
        None => CoreConfig::default(),
    };
    let seconds: u32 = match args.next() {
        Some(s) => s.parse().with_context(|| format!("bad duration '{s}'"))?,
        None => 5,
    };

    let mut service = TickService::new(&EXAMPLE_BOARD, &config, &SHARED)
        .map_err(|e| anyhow!("tick service: {e}"))?;
    let mut hw = SimHardware::new(&EXAMPLE_BOARD);
    let mut sink = LogEventSink::new();
    let mut signal = SignalGen { seed: 0x5EED };

    // Foreground demands: hotend at 75 %, bed at 40 %, part fan kicked
    // up to 30 %, controller fan on, a few Z babysteps.
    let hotend0 = EXAMPLE_BOARD.output_index("hotend0").unwrap_or(0);
    let bed = EXAMPLE_BOARD.output_index("bed").unwrap_or(2);
    let fan0 = EXAMPLE_BOARD.output_index("fan0").unwrap_or(3);
    let ctrl = EXAMPLE_BOARD.output_index("controller-fan").unwrap_or(5);
    SHARED.set_duty_fraction(hotend0, 0.75);
    SHARED.set_duty_fraction(bed, 0.4);
    SHARED.set_duty_fraction(fan0, 0.3);
    SHARED.set_duty(ctrl, 255);
    SHARED.request_fan_kickstart(5);
    SHARED.add_babysteps(Axis::Z, 16);

    let counts_per_tick = PWM_FAST_CLOCK_HZ / config.tick_hz;
    let total_ticks = u64::from(seconds) * u64::from(config.tick_hz);
    let mut slow_ticks = 0u32;

    for t in 0..total_ticks {
        hw.set_adc(7, signal.sample(2900, t));
        hw.set_adc(6, signal.sample(3100, t));
        hw.set_adc(5, signal.sample(3500, t));
        hw.set_adc(15, signal.sample(1750, 0));

        // Halfway through, move the fan to 25 kHz and the bed to software.
        if t == total_ticks / 2 {
            SHARED.set_frequency(fan0, 25_000);
            SHARED.set_frequency(bed, 0);
        }

        service.tick(&mut hw, &mut sink);
        hw.advance_pwm(counts_per_tick);

        if SHARED.take_slow_tick() {
            slow_ticks += 1;
        }
    }

    info!(
        "Ran {} ticks ({} slow), {} settle timeouts, {} GPIO conflicts",
        service.tick_count(),
        slow_ticks,
        service.settle_timeouts(),
        hw.gpio_conflicts(),
    );

    let readings = SHARED.analog_snapshot();
    for (input, value) in EXAMPLE_BOARD.analog_inputs.iter().zip(readings) {
        println!(
            "{:<10} {:>5}{}",
            input.name,
            value,
            if SHARED.analog_ready() { "" } else { " (filling)" }
        );
    }
    for (i, out) in EXAMPLE_BOARD.outputs.iter().enumerate() {
        println!(
            "{:<15} duty {:>3}  {:>5} Hz  {:?}",
            out.name,
            SHARED.duty(i),
            SHARED.frequency(i),
            service.backend(i)
        );
    }
    println!("babysteps Z: {}", hw.babysteps(Axis::Z));

    Ok(())
}

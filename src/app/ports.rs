//! Port traits: the register-level boundary between the tick logic and
//! the silicon.
//!
//! ```text
//!   SAM3X registers / SimHardware / mocks ──▶ Port traits ──▶ TickService
//! ```
//!
//! Every peripheral access the allocator, scheduler and ADC pipeline make
//! goes through one of these traits, so the erratum workaround, clock
//! selection and filter arithmetic are testable against fakes.  A board
//! port implements all of them on one struct; [`HardwarePort`] bundles
//! them for the service.
//!
//! ## Timing notes
//!
//! - Every method here is called from the periodic handler and must
//!   return without blocking.
//! - [`PwmPort::pwm_counter`] is polled in a bounded loop by the erratum
//!   workaround; it must be a plain register read.

use crate::board::TcOutput;

// ───────────────────────────────────────────────────────────────
// PWM engine
// ───────────────────────────────────────────────────────────────

/// PWM engine clock source for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmClock {
    /// CLKA, the slow divider clock.
    Slow,
    /// CLKB, the fast divider clock.
    Fast,
}

/// Dedicated PWM engine (8 channels, 16-bit counters).
pub trait PwmPort {
    /// One-time engine bring-up: program the CLKA/CLKB dividers for the
    /// given rates and disable channel synchronisation.
    fn pwm_start_engine(&mut self, slow_hz: u32, fast_hz: u32);

    fn pwm_enable(&mut self, ch: u8);
    fn pwm_disable(&mut self, ch: u8);

    /// Live counter value (`CCNT & 0xFFFF`).
    fn pwm_counter(&self, ch: u8) -> u16;

    fn pwm_set_clock(&mut self, ch: u8, clock: PwmClock);
    fn pwm_set_period(&mut self, ch: u8, period: u16);
    fn pwm_set_duty(&mut self, ch: u8, duty: u16);

    /// Hand the channel's pin to the PWM peripheral.
    fn pwm_attach_pin(&mut self, ch: u8);
    /// Give the channel's pin back to GPIO control.
    fn pwm_release_pin(&mut self, ch: u8);
}

// ───────────────────────────────────────────────────────────────
// Timer/Counter block
// ───────────────────────────────────────────────────────────────

/// What a Timer/Counter compare output does over one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    /// Set on RC (top), clear on compare match. Normal PWM.
    SetOnTopClearOnMatch,
    /// Clear on RC and on compare match. Output held low.
    HoldLow,
}

/// Timer/Counter block: 9 channels (3 units × 3), each with a top-count
/// register (RC) and two compare outputs (RA → TIOA, RB → TIOB).
pub trait TimerCounterPort {
    fn tc_enable_clock(&mut self, timer: u8);

    /// Waveform mode, count up to RC, MCK/8 clock, both outputs clear on
    /// compare and RC, software trigger sets both outputs.
    fn tc_configure_waveform(&mut self, timer: u8);

    fn tc_set_top(&mut self, timer: u8, top: u32);
    fn tc_top(&self, timer: u8) -> u32;

    /// Write a compare register and its output actions.
    fn tc_set_compare(&mut self, timer: u8, output: TcOutput, value: u32, mode: CompareMode);

    /// Software trigger: drives both outputs high immediately.
    fn tc_software_trigger(&mut self, timer: u8);

    fn tc_start(&mut self, timer: u8);

    fn tc_attach_pin(&mut self, timer: u8, output: TcOutput);
    fn tc_release_pin(&mut self, timer: u8, output: TcOutput);
}

// ───────────────────────────────────────────────────────────────
// GPIO / ADC / interrupts / stepper
// ───────────────────────────────────────────────────────────────

/// Digital outputs driven by the software PWM scheduler.
pub trait GpioPort {
    fn write_pin(&mut self, pin: u8, high: bool);
}

/// Converter in sequenced single-shot mode.
pub trait AdcPort {
    /// All enabled channels hold a fresh result (`ISR & enabled == enabled`).
    fn conversion_complete(&self) -> bool;
    /// Last converted value of a channel (`CDR[n]`).
    fn read_result(&self, adc_channel: u8) -> u16;
    /// Start the next batch (`CR = START`).
    fn start_conversion(&mut self);
}

/// Opaque interrupt state saved on handler entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IrqState(pub u32);

/// Interrupt masking around the periodic handler.
pub trait InterruptPort {
    /// Acknowledge the tick timer and let higher-priority (UART)
    /// interrupts preempt the rest of the handler.
    fn enter_handler(&mut self) -> IrqState;
    /// Restore the state saved by [`enter_handler`](Self::enter_handler).
    fn exit_handler(&mut self, state: IrqState);
}

/// Axis for babystep corrections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

/// Single-step output used for babystepping.
pub trait StepperPort {
    fn babystep(&mut self, axis: Axis, forward: bool);
}

/// Everything the periodic handler touches.
pub trait HardwarePort:
    PwmPort + TimerCounterPort + GpioPort + AdcPort + InterruptPort + StepperPort
{
}

impl<T> HardwarePort for T where
    T: PwmPort + TimerCounterPort + GpioPort + AdcPort + InterruptPort + StepperPort
{
}

// ───────────────────────────────────────────────────────────────
// Event sink port (tick diagnostics → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The service emits [`CoreEvent`](super::events::CoreEvent)s through
/// this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::CoreEvent);
}

/// Sink that drops every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &super::events::CoreEvent) {}
}

// ───────────────────────────────────────────────────────────────
// Storage port (external EEPROM byte primitives)
// ───────────────────────────────────────────────────────────────

/// Byte-addressed EEPROM.  The bus framing (I2C or SPI) lives in the
/// board port; the core only reads and writes blocks.
pub trait StoragePort {
    /// Read `buf.len()` bytes starting at `addr`.
    fn read(&self, addr: u16, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` starting at `addr`.  Implementations wait for the
    /// page write to complete before returning.
    fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), StorageError>;

    /// Device capacity in bytes.
    fn capacity(&self) -> u16;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from config validation and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config blob at the given address (blank EEPROM).
    NotFound,
    /// Stored blob failed its length or decode check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// The EEPROM itself failed.
    Storage(StorageError),
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Access beyond the device capacity.
    OutOfRange,
    /// Device did not acknowledge.
    NoAck,
    /// Generic bus error.
    IoError,
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "address out of range"),
            Self::NoAck => write!(f, "device did not acknowledge"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

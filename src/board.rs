//! Board resource table: which logical output lands on which pin and
//! which peripheral (if any) can generate its PWM in hardware.
//!
//! Single source of truth for the service.  Board ports supply their own
//! [`BoardTable`]; [`EXAMPLE_BOARD`] describes an Arduino-Due class
//! controller and is what the simulator and tests use.
//!
//! The table is validated once by [`BoardTable::validate`]: a physical
//! PWM channel or Timer/Counter sub-output may be claimed by at most one
//! logical output.

use crate::drivers::pwm::PWM_CHANNELS;
use crate::drivers::timer_counter::TC_CHANNELS;
use crate::error::BoardError;

/// Upper bound on logical outputs (heaters + fans).
pub const MAX_OUTPUTS: usize = 16;
/// Upper bound on analog inputs.
pub const MAX_ANALOG_INPUTS: usize = 8;

// ---------------------------------------------------------------------------
// Output classes
// ---------------------------------------------------------------------------

/// What a logical output drives.  Decides which software PWM counter
/// and which configured frequency the output uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelClass {
    Hotend,
    Bed,
    Chamber,
    Cooler,
    Fan,
    ControllerFan,
}

/// Software PWM counter group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmGroup {
    Heater,
    Fan,
}

impl ChannelClass {
    pub const fn group(self) -> PwmGroup {
        match self {
            Self::Hotend | Self::Bed | Self::Chamber | Self::Cooler => PwmGroup::Heater,
            Self::Fan | Self::ControllerFan => PwmGroup::Fan,
        }
    }
}

// ---------------------------------------------------------------------------
// Hardware capability
// ---------------------------------------------------------------------------

/// Compare output of a Timer/Counter channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcOutput {
    /// TIOA, compare register RA.
    A,
    /// TIOB, compare register RB.
    B,
}

/// One Timer/Counter compare output: timer channel 0–8 plus A/B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcChannel {
    pub timer: u8,
    pub output: TcOutput,
}

/// Peripheral wired to an output's pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// A channel of the dedicated PWM engine.
    Pwm(u8),
    /// A Timer/Counter compare output.
    Timer(TcChannel),
    /// Plain GPIO, software PWM only.
    None,
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct OutputDescriptor {
    /// Human-readable name used in logs.
    pub name: &'static str,
    pub class: ChannelClass,
    /// GPIO number used for software PWM.
    pub pin: u8,
    pub capability: Capability,
}

#[derive(Debug, Clone, Copy)]
pub struct AnalogDescriptor {
    pub name: &'static str,
    /// Converter channel number.
    pub adc_channel: u8,
    /// The on-die temperature sensor keeps full converter resolution.
    pub mcu_sensor: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct BoardTable {
    pub name: &'static str,
    pub outputs: &'static [OutputDescriptor],
    pub analog_inputs: &'static [AnalogDescriptor],
}

impl BoardTable {
    /// Check capacity and single-binding of every physical resource.
    pub fn validate(&self) -> Result<(), BoardError> {
        if self.outputs.len() > MAX_OUTPUTS {
            return Err(BoardError::TooManyOutputs);
        }
        if self.analog_inputs.len() > MAX_ANALOG_INPUTS {
            return Err(BoardError::TooManyInputs);
        }

        let mut pwm_used = [false; PWM_CHANNELS];
        // Two bits per timer channel: A and B.
        let mut tc_used = [0u8; TC_CHANNELS];

        for out in self.outputs {
            match out.capability {
                Capability::Pwm(ch) => {
                    let slot = pwm_used
                        .get_mut(ch as usize)
                        .ok_or(BoardError::PwmChannelOutOfRange(ch))?;
                    if *slot {
                        return Err(BoardError::PwmChannelShared(ch));
                    }
                    *slot = true;
                }
                Capability::Timer(tc) => {
                    let slot = tc_used
                        .get_mut(tc.timer as usize)
                        .ok_or(BoardError::TimerChannelOutOfRange(tc.timer))?;
                    let bit = match tc.output {
                        TcOutput::A => 0b01,
                        TcOutput::B => 0b10,
                    };
                    if *slot & bit != 0 {
                        return Err(BoardError::TimerOutputShared(tc.timer));
                    }
                    *slot |= bit;
                }
                Capability::None => {}
            }
        }
        Ok(())
    }

    /// Index of the first output with the given name.
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| o.name == name)
    }
}

// ---------------------------------------------------------------------------
// Example board (Due-class, 2 hotends + bed + 2 fans + controller fan)
// ---------------------------------------------------------------------------

pub static EXAMPLE_BOARD: BoardTable = BoardTable {
    name: "due-example",
    outputs: &[
        // D13 = PB27 = TIOB0
        OutputDescriptor {
            name: "hotend0",
            class: ChannelClass::Hotend,
            pin: 13,
            capability: Capability::Timer(TcChannel { timer: 0, output: TcOutput::B }),
        },
        // D12 = PD8 = TIOB8
        OutputDescriptor {
            name: "hotend1",
            class: ChannelClass::Hotend,
            pin: 12,
            capability: Capability::Timer(TcChannel { timer: 8, output: TcOutput::B }),
        },
        // D7 = PC23 = PWML6
        OutputDescriptor {
            name: "bed",
            class: ChannelClass::Bed,
            pin: 7,
            capability: Capability::Pwm(6),
        },
        // D9 = PC21 = PWML4
        OutputDescriptor {
            name: "fan0",
            class: ChannelClass::Fan,
            pin: 9,
            capability: Capability::Pwm(4),
        },
        // D8 = PC22 = PWML5
        OutputDescriptor {
            name: "fan1",
            class: ChannelClass::Fan,
            pin: 8,
            capability: Capability::Pwm(5),
        },
        OutputDescriptor {
            name: "controller-fan",
            class: ChannelClass::ControllerFan,
            pin: 40,
            capability: Capability::None,
        },
    ],
    analog_inputs: &[
        AnalogDescriptor { name: "temp0", adc_channel: 7, mcu_sensor: false },
        AnalogDescriptor { name: "temp1", adc_channel: 6, mcu_sensor: false },
        AnalogDescriptor { name: "temp-bed", adc_channel: 5, mcu_sensor: false },
        AnalogDescriptor { name: "mcu", adc_channel: 15, mcu_sensor: true },
    ],
};

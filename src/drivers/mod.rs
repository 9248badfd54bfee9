//! Peripheral backends: the PWM engine, the Timer/Counter block and
//! GPIO outputs for software PWM.

pub mod gpio;
pub mod pwm;
pub mod timer_counter;

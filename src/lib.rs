//! printcore: tick-driven PWM and ADC core for 3D-printer controller HALs.
//!
//! Exposes the pure-logic modules for board ports and integration
//! testing.  Everything touches hardware through the port traits in
//! [`app::ports`]; the behavioural simulator lives behind the `sim`
//! feature.

#![deny(unused_must_use)]

pub mod adapters;
pub mod allocator;
pub mod app;
pub mod board;
pub mod config;
pub mod drivers;
pub mod error;
pub mod scheduler;
pub mod sensors;

pub use app::service::{TickReport, TickService};
pub use app::shared::SharedState;
pub use error::{Error, Result};

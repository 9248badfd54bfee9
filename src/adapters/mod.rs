//! Adapters on the outer side of the port traits.

pub mod log_sink;

#[cfg(feature = "sim")]
pub mod sim;

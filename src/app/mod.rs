//! Tick core: the periodic handler and its boundary.
//!
//! [`service::TickService`] owns every allocator, scheduler and filter
//! state and is the only writer of them.  Foreground code talks to it
//! through [`shared::SharedState`]; all hardware access goes through the
//! **port traits** in [`ports`].

pub mod events;
pub mod ports;
pub mod service;
pub mod shared;

//! Shared helpers for the ticklog integration tests.

pub mod helpers;

pub use helpers::recording_sim::{RecordingSim, TickRecord};
pub use helpers::session::{
    active_driver, drive, passive_driver, replay_driver, timestamp_tick,
};

pub mod recording_sim;
pub mod session;

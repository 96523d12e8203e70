//! Chain timing: the slot-duration estimator fed by node performance
//! telemetry, and the chain-adjusted wall clock.

pub mod chain_clock;
pub mod slot_duration;

pub use chain_clock::ChainClock;
pub use slot_duration::SlotDurationEstimator;

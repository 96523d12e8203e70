//! Reactive pipeline core: generation-stamped stage slots, named input edges,
//! and the orchestrator that maps dependency changes to stage runs.

pub mod inputs;
pub mod orchestrator;
pub mod slot;

pub use inputs::{ChainConnection, PipelineInputs};
pub use orchestrator::FarmPipeline;
pub use slot::{StageOutput, StageSlot};

pub mod catalog;
pub mod clock;
pub mod hydrate;
pub mod parser;
pub mod pipeline;
pub mod rpc;
pub mod runtime;

pub use catalog::models::{FarmCatalogResponse, FarmDescriptor};
pub use catalog::source::DescriptorSource;
pub use clock::chain_clock::ChainClock;
pub use clock::slot_duration::SlotDurationEstimator;
pub use hydrate::context::{
    AprBreakdown, AprIndex, EmptyResolver, HydrationContext, LiquidityDescriptor, LiquidityIndex,
    LpTokenMeta, LpTokenResolver, PriceIndex, TokenMeta, TokenResolver,
};
pub use hydrate::hydrator::Hydrator;
pub use hydrate::view::{HydratedFarmView, HydratedReward};
pub use parser::layout::{derive_ledger_address, ParseFailure};
pub use parser::parse::{ChainStateParser, ParsedFarmState, RewardSchedule};
pub use pipeline::{ChainConnection, FarmPipeline, PipelineInputs, StageOutput, StageSlot};
pub use rpc::circuit_breaker::{CircuitBreakerSnapshot, CircuitState, RpcCircuitBreaker};
pub use rpc::{AccountFetcher, RpcClientOptions, RpcError, SampleSource, SolanaRpcClient};
pub use runtime::config::{PipelineConfig, PipelineConfigBuilder, PipelineConfigParams};
pub use runtime::runner::Runner;
pub use runtime::telemetry::{init_tracing, Stage, Telemetry, TelemetrySnapshot};

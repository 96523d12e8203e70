//! Hydration: enriches parsed on-chain farm state with market context into
//! display-ready views, with bounded per-item concurrency.

pub mod context;
pub mod hydrator;
pub mod pool;
pub mod view;

pub use context::{
    AprBreakdown, AprIndex, HydrationContext, LiquidityDescriptor, LiquidityIndex, LpTokenMeta,
    LpTokenResolver, PriceIndex, TokenMeta, TokenResolver,
};
pub use hydrator::Hydrator;
pub use pool::map_bounded;
pub use view::{HydratedFarmView, HydratedReward};

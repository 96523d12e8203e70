use crate::hydrate::context::HydrationContext;
use crate::hydrate::pool::map_bounded;
use crate::hydrate::view::{hydrate_farm, HydratedFarmView};
use crate::parser::parse::ParsedFarmState;
use crate::runtime::telemetry::Telemetry;
use std::sync::Arc;

/// Fans parsed farm states out to a bounded worker pool and assembles the
/// hydrated views in input order. Failed items are dropped, never fatal.
pub struct Hydrator {
    concurrency: usize,
    telemetry: Arc<Telemetry>,
}

impl Hydrator {
    pub fn new(concurrency: usize, telemetry: Arc<Telemetry>) -> Self {
        Self {
            concurrency: concurrency.max(1),
            telemetry,
        }
    }

    pub async fn hydrate(
        &self,
        parsed: Vec<ParsedFarmState>,
        context: Arc<HydrationContext>,
    ) -> Vec<HydratedFarmView> {
        let input_len = parsed.len();
        self.telemetry.record_hydrate_run();

        let telemetry = Arc::clone(&self.telemetry);
        let views = map_bounded(parsed, self.concurrency, move |state| {
            let context = Arc::clone(&context);
            let telemetry = Arc::clone(&telemetry);
            Box::pin(async move {
                match hydrate_farm(&state, &context) {
                    Some(view) => Some(view),
                    None => {
                        telemetry.record_hydrate_item_drop();
                        tracing::warn!(
                            farm = %state.id,
                            lp_mint = %state.lp_mint,
                            "dropping farm from hydrated output: no usable LP metadata"
                        );
                        None
                    }
                }
            })
        })
        .await;

        tracing::debug!(
            input = input_len,
            hydrated = views.len(),
            "hydrate run completed"
        );

        views
    }
}

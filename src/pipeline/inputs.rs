use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tokio::sync::watch;
use tracing::debug;

use crate::hydrate::context::{
    AprIndex, EmptyResolver, LiquidityIndex, LpTokenResolver, PriceIndex, TokenResolver,
};
use crate::rpc::client::{AccountFetcher, SampleSource};

/// Everything the pipeline needs from an RPC connection. A single handle
/// serves both account fetching and performance sampling so stage runs see
/// the same endpoint.
pub trait ChainConnection: AccountFetcher + SampleSource {
    fn as_account_fetcher(&self) -> &dyn AccountFetcher;
    fn as_sample_source(&self) -> &dyn SampleSource;
}

impl<T: AccountFetcher + SampleSource> ChainConnection for T {
    fn as_account_fetcher(&self) -> &dyn AccountFetcher {
        self
    }

    fn as_sample_source(&self) -> &dyn SampleSource {
        self
    }
}

pub(crate) struct InputChannels {
    refresh: watch::Sender<u64>,
    connection: watch::Sender<Option<Arc<dyn ChainConnection>>>,
    identity: watch::Sender<Option<Pubkey>>,
    prices: watch::Sender<PriceIndex>,
    liquidity: watch::Sender<LiquidityIndex>,
    aprs: watch::Sender<AprIndex>,
    tokens: watch::Sender<Arc<dyn TokenResolver>>,
    lp_tokens: watch::Sender<Arc<dyn LpTokenResolver>>,
    time_offset_ms: watch::Sender<i64>,
}

/// Receiver side of every input edge, cloned per pipeline run so the
/// reactive loop can be restarted without tearing down the handles.
#[derive(Clone)]
pub(crate) struct InputReceivers {
    pub refresh: watch::Receiver<u64>,
    pub connection: watch::Receiver<Option<Arc<dyn ChainConnection>>>,
    pub identity: watch::Receiver<Option<Pubkey>>,
    pub prices: watch::Receiver<PriceIndex>,
    pub liquidity: watch::Receiver<LiquidityIndex>,
    pub aprs: watch::Receiver<AprIndex>,
    pub tokens: watch::Receiver<Arc<dyn TokenResolver>>,
    pub lp_tokens: watch::Receiver<Arc<dyn LpTokenResolver>>,
    pub time_offset_ms: watch::Receiver<i64>,
}

/// Cloneable handle for feeding the pipeline's named inputs. Each setter
/// replaces the previous value; the reactive loop picks up the edge and
/// schedules the dependent stage.
#[derive(Clone)]
pub struct PipelineInputs {
    inner: Arc<InputChannels>,
}

impl PipelineInputs {
    pub(crate) fn channels() -> (Self, InputReceivers) {
        let empty: Arc<EmptyResolver> = Arc::new(EmptyResolver);

        let (refresh, refresh_rx) = watch::channel(0u64);
        let (connection, connection_rx) =
            watch::channel::<Option<Arc<dyn ChainConnection>>>(None);
        let (identity, identity_rx) = watch::channel(None);
        let (prices, prices_rx) = watch::channel(PriceIndex::default());
        let (liquidity, liquidity_rx) = watch::channel(LiquidityIndex::default());
        let (aprs, aprs_rx) = watch::channel(AprIndex::default());
        let (tokens, tokens_rx) =
            watch::channel::<Arc<dyn TokenResolver>>(empty.clone());
        let (lp_tokens, lp_tokens_rx) = watch::channel::<Arc<dyn LpTokenResolver>>(empty);
        let (time_offset_ms, time_offset_rx) = watch::channel(0i64);

        let inputs = Self {
            inner: Arc::new(InputChannels {
                refresh,
                connection,
                identity,
                prices,
                liquidity,
                aprs,
                tokens,
                lp_tokens,
                time_offset_ms,
            }),
        };
        let receivers = InputReceivers {
            refresh: refresh_rx,
            connection: connection_rx,
            identity: identity_rx,
            prices: prices_rx,
            liquidity: liquidity_rx,
            aprs: aprs_rx,
            tokens: tokens_rx,
            lp_tokens: lp_tokens_rx,
            time_offset_ms: time_offset_rx,
        };
        (inputs, receivers)
    }

    /// Requests a catalog refresh. Coalesces naturally: the loop sees at
    /// most one pending edge per input.
    pub fn request_refresh(&self) {
        self.inner.refresh.send_modify(|count| *count += 1);
    }

    pub fn set_connection(&self, connection: Option<Arc<dyn ChainConnection>>) {
        debug!(connected = connection.is_some(), "pipeline connection input changed");
        self.inner.connection.send_replace(connection);
    }

    pub fn set_identity(&self, identity: Option<Pubkey>) {
        debug!(identity = ?identity, "pipeline identity input changed");
        self.inner.identity.send_replace(identity);
    }

    pub fn set_prices(&self, prices: PriceIndex) {
        debug!(entries = prices.len(), "pipeline price index changed");
        self.inner.prices.send_replace(prices);
    }

    pub fn set_liquidity(&self, liquidity: LiquidityIndex) {
        debug!(entries = liquidity.len(), "pipeline liquidity index changed");
        self.inner.liquidity.send_replace(liquidity);
    }

    pub fn set_aprs(&self, aprs: AprIndex) {
        debug!(entries = aprs.len(), "pipeline APR index changed");
        self.inner.aprs.send_replace(aprs);
    }

    pub fn set_token_resolver(&self, tokens: Arc<dyn TokenResolver>) {
        debug!("pipeline token resolver changed");
        self.inner.tokens.send_replace(tokens);
    }

    pub fn set_lp_token_resolver(&self, lp_tokens: Arc<dyn LpTokenResolver>) {
        debug!("pipeline LP token resolver changed");
        self.inner.lp_tokens.send_replace(lp_tokens);
    }

    pub fn set_time_offset_ms(&self, offset_ms: i64) {
        debug!(offset_ms, "pipeline clock offset changed");
        self.inner.time_offset_ms.send_replace(offset_ms);
    }

    // Snapshot accessors used by stage runs; each reads the value current
    // at the moment the run starts.

    pub(crate) fn connection(&self) -> Option<Arc<dyn ChainConnection>> {
        self.inner.connection.borrow().clone()
    }

    pub(crate) fn identity(&self) -> Option<Pubkey> {
        *self.inner.identity.borrow()
    }

    pub(crate) fn prices(&self) -> PriceIndex {
        self.inner.prices.borrow().clone()
    }

    pub(crate) fn liquidity(&self) -> LiquidityIndex {
        self.inner.liquidity.borrow().clone()
    }

    pub(crate) fn aprs(&self) -> AprIndex {
        self.inner.aprs.borrow().clone()
    }

    pub(crate) fn token_resolver(&self) -> Arc<dyn TokenResolver> {
        self.inner.tokens.borrow().clone()
    }

    pub(crate) fn lp_token_resolver(&self) -> Arc<dyn LpTokenResolver> {
        self.inner.lp_tokens.borrow().clone()
    }

    pub(crate) fn time_offset_ms(&self) -> i64 {
        *self.inner.time_offset_ms.borrow()
    }
}

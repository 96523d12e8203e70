use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::support::{
    helpers::{
        catalog_body, catalog_entry, farm_account_bytes, fast_rpc_options, init_tracing,
        ledger_account_bytes, liquidity_index, price_index, wait_for_descriptor_count,
        wait_for_hydrated_count, wait_for_stage_commits, StaticResolver,
    },
    mock_catalog::{MockCatalog, MockCatalogServer},
    mock_cluster::{MockCluster, MockClusterServer},
};
use anyhow::{bail, Result};
use farmhand::{
    derive_ledger_address, ChainConnection, FarmPipeline, HydratedFarmView, PipelineConfig,
    SolanaRpcClient, Stage,
};
use solana_sdk::pubkey::Pubkey;
use tokio::time::sleep;

fn test_config(catalog_url: &str) -> Result<PipelineConfig> {
    PipelineConfig::builder()
        .catalog_url(catalog_url)
        .hydrate_concurrency(4)
        .slot_duration_fallback(0.5)
        .catalog_timeout(Duration::from_secs(2))
        .metrics_interval(Duration::from_millis(200))
        .rpc_options(fast_rpc_options())
        .build()
}

async fn wait_for_view<F>(
    pipeline: &FarmPipeline,
    timeout: Duration,
    what: &str,
    predicate: F,
) -> Result<HydratedFarmView>
where
    F: Fn(&HydratedFarmView) -> bool,
{
    let start = Instant::now();
    loop {
        if let Some(view) = pipeline.hydrated_views().iter().find(|view| predicate(view)) {
            return Ok(view.clone());
        }
        if start.elapsed() > timeout {
            bail!("no hydrated view matched '{what}' within {:?}", timeout);
        }
        sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hydrates_catalog_farms_end_to_end() -> Result<()> {
    init_tracing();

    let farm_a = Pubkey::new_unique();
    let farm_b = Pubkey::new_unique();
    let lp_a = Pubkey::new_unique();
    let lp_b = Pubkey::new_unique();
    let pool_a = Pubkey::new_unique();
    let pool_b = Pubkey::new_unique();
    let program = Pubkey::new_unique();
    let reward = Pubkey::new_unique();

    // Farm A exists on chain; farm B is catalogued but has no account.
    let cluster = MockCluster::new(900);
    cluster.set_account(
        &farm_a,
        &farm_account_bytes(5_000_000, &[(reward, 10, 100, 0)]),
    );
    let cluster_server = MockClusterServer::start(cluster.clone()).await?;

    let catalog = MockCatalog::new(catalog_body(
        vec![catalog_entry(&farm_a, &lp_a, &pool_a, &program, &reward, false)],
        vec![catalog_entry(&farm_b, &lp_b, &pool_b, &program, &reward, true)],
    ));
    let catalog_server = MockCatalogServer::start(catalog.clone()).await?;

    let mut pipeline = FarmPipeline::new(test_config(catalog_server.url())?)?;
    let inputs = pipeline.inputs();
    assert!(pipeline.is_loading(), "pipeline must start in loading state");

    pipeline.start().await?;
    wait_for_descriptor_count(&pipeline, 2, Duration::from_secs(5)).await?;
    assert!(
        pipeline.have_upcoming_farms(),
        "the unofficial farm is flagged upcoming"
    );
    assert_eq!(pipeline.descriptors()[0].id, farm_a, "official farms come first");

    inputs.set_liquidity(liquidity_index(&[(pool_a, lp_a, 6, "A-LP")]));
    inputs.set_prices(price_index(&[(lp_a, 2.0), (reward, 4.0)]));
    inputs.set_token_resolver(Arc::new(
        StaticResolver::default().with_token(reward, "RWD", 6),
    ));

    let client = Arc::new(SolanaRpcClient::with_options(
        cluster_server.url(),
        fast_rpc_options(),
    )?);
    inputs.set_connection(Some(client as Arc<dyn ChainConnection>));

    wait_for_hydrated_count(&pipeline, 1, Duration::from_secs(5)).await?;

    let views = pipeline.hydrated_views();
    let view = &views[0];
    assert_eq!(view.id, farm_a);
    assert_eq!(view.name.as_deref(), Some("A-LP"));
    assert_eq!(view.staked_lp, Some(5.0));
    assert_eq!(view.tvl_usd, Some(10.0));
    assert!(view.user_staked_lp.is_none(), "no identity connected yet");

    let reward_view = &view.rewards[0];
    assert_eq!(reward_view.symbol.as_deref(), Some("RWD"));
    assert!(reward_view.is_emitting);
    assert!(!reward_view.has_ended);
    assert!(reward_view.weekly_emission.is_some());

    assert!(!pipeline.is_loading());
    let telemetry = pipeline.telemetry();
    assert!(
        telemetry.parse_item_drops() >= 1,
        "the farm without a chain account must be dropped at parse"
    );

    pipeline.stop().await?;
    cluster_server.shutdown().await;
    catalog_server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn merges_identity_ledger_into_views() -> Result<()> {
    init_tracing();

    let farm = Pubkey::new_unique();
    let lp_mint = Pubkey::new_unique();
    let pool = Pubkey::new_unique();
    let program = Pubkey::new_unique();
    let reward = Pubkey::new_unique();
    let identity = Pubkey::new_unique();

    let cluster = MockCluster::new(500);
    cluster.set_account(&farm, &farm_account_bytes(8_000_000, &[(reward, 5, 1, 0)]));
    let ledger = derive_ledger_address(&farm, &identity, &program);
    cluster.set_account(&ledger, &ledger_account_bytes(2_500_000));
    let cluster_server = MockClusterServer::start(cluster.clone()).await?;

    let catalog = MockCatalog::new(catalog_body(
        vec![catalog_entry(&farm, &lp_mint, &pool, &program, &reward, false)],
        Vec::new(),
    ));
    let catalog_server = MockCatalogServer::start(catalog.clone()).await?;

    let mut pipeline = FarmPipeline::new(test_config(catalog_server.url())?)?;
    let inputs = pipeline.inputs();
    pipeline.start().await?;

    inputs.set_liquidity(liquidity_index(&[(pool, lp_mint, 6, "FARM-LP")]));
    let client = Arc::new(SolanaRpcClient::with_options(
        cluster_server.url(),
        fast_rpc_options(),
    )?);
    inputs.set_connection(Some(client as Arc<dyn ChainConnection>));

    wait_for_hydrated_count(&pipeline, 1, Duration::from_secs(5)).await?;
    assert!(pipeline.hydrated_views()[0].user_staked_lp.is_none());

    // Connecting an identity re-parses with the ledger PDA batch.
    inputs.set_identity(Some(identity));
    let view = wait_for_view(
        &pipeline,
        Duration::from_secs(5),
        "user stake resolved",
        |view| view.user_staked_lp == Some(2.5),
    )
    .await?;
    assert_eq!(view.id, farm);
    assert_eq!(view.staked_lp, Some(8.0));

    pipeline.stop().await?;
    cluster_server.shutdown().await;
    catalog_server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn price_change_rehydrates_without_refetching_chain_state() -> Result<()> {
    init_tracing();

    let farm = Pubkey::new_unique();
    let lp_mint = Pubkey::new_unique();
    let pool = Pubkey::new_unique();
    let program = Pubkey::new_unique();
    let reward = Pubkey::new_unique();

    let cluster = MockCluster::new(700);
    cluster.set_account(&farm, &farm_account_bytes(1_000_000, &[(reward, 2, 1, 0)]));
    let cluster_server = MockClusterServer::start(cluster.clone()).await?;

    let catalog = MockCatalog::new(catalog_body(
        vec![catalog_entry(&farm, &lp_mint, &pool, &program, &reward, false)],
        Vec::new(),
    ));
    let catalog_server = MockCatalogServer::start(catalog.clone()).await?;

    let mut pipeline = FarmPipeline::new(test_config(catalog_server.url())?)?;
    let inputs = pipeline.inputs();
    pipeline.start().await?;

    inputs.set_liquidity(liquidity_index(&[(pool, lp_mint, 6, "FARM-LP")]));
    inputs.set_prices(price_index(&[(lp_mint, 2.0)]));
    let client = Arc::new(SolanaRpcClient::with_options(
        cluster_server.url(),
        fast_rpc_options(),
    )?);
    inputs.set_connection(Some(client as Arc<dyn ChainConnection>));

    let view = wait_for_view(
        &pipeline,
        Duration::from_secs(5),
        "initial valuation",
        |view| view.tvl_usd == Some(2.0),
    )
    .await?;
    assert_eq!(view.staked_lp, Some(1.0));

    let accounts_before = cluster.account_requests();
    let parse_commits_before = pipeline.telemetry().stage_commits(Stage::ParsedStates);

    inputs.set_prices(price_index(&[(lp_mint, 3.0)]));
    wait_for_view(
        &pipeline,
        Duration::from_secs(5),
        "revalued after price update",
        |view| view.tvl_usd == Some(3.0),
    )
    .await?;

    assert_eq!(
        cluster.account_requests(),
        accounts_before,
        "a price edge must not refetch accounts"
    );
    assert_eq!(
        pipeline.telemetry().stage_commits(Stage::ParsedStates),
        parse_commits_before
    );

    pipeline.stop().await?;
    cluster_server.shutdown().await;
    catalog_server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn empty_catalog_commits_an_empty_hydrated_set() -> Result<()> {
    init_tracing();

    let catalog = MockCatalog::new(catalog_body(Vec::new(), Vec::new()));
    let catalog_server = MockCatalogServer::start(catalog.clone()).await?;

    let mut pipeline = FarmPipeline::new(test_config(catalog_server.url())?)?;
    let inputs = pipeline.inputs();
    pipeline.start().await?;
    wait_for_stage_commits(
        &pipeline.telemetry(),
        Stage::Descriptors,
        1,
        Duration::from_secs(5),
    )
    .await?;
    assert!(!pipeline.have_upcoming_farms());

    // A market-context edge forces a hydrate run over the empty parse slot;
    // the run still commits so consumers see "no farms" rather than "pending".
    inputs.set_prices(price_index(&[]));
    wait_for_stage_commits(
        &pipeline.telemetry(),
        Stage::HydratedViews,
        1,
        Duration::from_secs(5),
    )
    .await?;
    assert!(pipeline.hydrated_views().is_empty());
    assert!(pipeline.is_loading(), "empty output still reads as loading");

    pipeline.stop().await?;
    catalog_server.shutdown().await;
    Ok(())
}

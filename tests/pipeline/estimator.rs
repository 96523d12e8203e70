use std::time::Duration;

use crate::support::{
    helpers::{fast_rpc_options, init_tracing},
    mock_cluster::{MockCluster, MockClusterServer},
};
use anyhow::Result;
use farmhand::{SlotDurationEstimator, SolanaRpcClient};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn computes_slot_duration_from_performance_samples() -> Result<()> {
    init_tracing();

    let cluster = MockCluster::new(100);
    cluster.set_samples(vec![
        (100, 60, 1_000, 60),
        (99, 60, 900, 60),
        (98, 60, 800, 60),
    ]);
    let server = MockClusterServer::start(cluster.clone()).await?;
    let client = SolanaRpcClient::with_options(server.url(), fast_rpc_options())?;

    let estimator = SlotDurationEstimator::new(9.9, Duration::from_secs(60));
    let estimate = estimator.estimate(Some(&client)).await;
    assert!((estimate - 1.0).abs() < 1e-9, "got {estimate}");
    assert_eq!(cluster.sample_requests(), 1);

    // A fresh cache entry answers without touching the cluster.
    let again = estimator.estimate(Some(&client)).await;
    assert!((again - 1.0).abs() < 1e-9);
    assert_eq!(cluster.sample_requests(), 1);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn falls_back_on_failure_without_caching_it() -> Result<()> {
    init_tracing();

    let cluster = MockCluster::new(50);
    cluster.set_failing(true);
    let server = MockClusterServer::start(cluster.clone()).await?;
    let client = SolanaRpcClient::with_options(server.url(), fast_rpc_options())?;

    let estimator = SlotDurationEstimator::new(9.9, Duration::from_secs(60));
    let estimate = estimator.estimate(Some(&client)).await;
    assert_eq!(estimate, 9.9);

    // Recovery is picked up on the next run because the failure was never
    // written to the cache.
    cluster.set_failing(false);
    cluster.set_samples(vec![(50, 120, 10, 60)]);
    let recovered = estimator.estimate(Some(&client)).await;
    assert!((recovered - 2.0).abs() < 1e-9, "got {recovered}");

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_connection_means_fallback_without_network() {
    init_tracing();

    let estimator = SlotDurationEstimator::new(0.5, Duration::from_secs(60));
    assert_eq!(estimator.estimate(None).await, 0.5);
}

//! Bounded-concurrency, order-preserving map.
//!
//! Workers consume the input sequence through a shared cursor, each producing
//! an `{ok | skip}` outcome tagged with its original index; a final collection
//! step restores input order and drops the skips. Output length never exceeds
//! input length.

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn map_bounded<T, U, F>(source: Vec<T>, concurrency: usize, item_fn: F) -> Vec<U>
where
    T: Clone + Send + Sync + 'static,
    U: Send + 'static,
    F: Fn(T) -> BoxFuture<'static, Option<U>> + Send + Sync + 'static,
{
    let total = source.len();
    if total == 0 {
        return Vec::new();
    }

    let workers = concurrency.max(1).min(total);
    let source = Arc::new(source);
    let item_fn = Arc::new(item_fn);
    let cursor = Arc::new(AtomicUsize::new(0));
    let (result_tx, mut result_rx) = mpsc::channel::<(usize, Option<U>)>(total);

    for _ in 0..workers {
        let source = Arc::clone(&source);
        let item_fn = Arc::clone(&item_fn);
        let cursor = Arc::clone(&cursor);
        let result_tx = result_tx.clone();

        tokio::spawn(async move {
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= source.len() {
                    break;
                }
                let outcome = item_fn(source[index].clone()).await;
                if result_tx.send((index, outcome)).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(result_tx);

    let mut ordered: Vec<Option<U>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some((index, outcome)) = result_rx.recv().await {
        ordered[index] = outcome;
    }

    ordered.into_iter().flatten().collect()
}

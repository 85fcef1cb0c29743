use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Mutex;

type FlightFuture<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Coalesces concurrent operations that share a key.
///
/// The first caller for a key starts the operation; every caller arriving
/// while it is in flight awaits the same future and receives a clone of its
/// result. Completed flights are forgotten, so a later caller starts a fresh
/// attempt; failures are never cached.
pub struct FlightTable<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    inflight: Mutex<HashMap<String, FlightFuture<T, E>>>,
}

impl<T, E> FlightTable<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run<F>(&self, key: &str, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let flight = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(key) {
                Some(existing) => existing.clone(),
                None => {
                    let flight = operation.boxed().shared();
                    inflight.insert(key.to_string(), flight.clone());
                    flight
                }
            }
        };

        let result = flight.clone().await;

        // Whoever observes completion first retires the entry; the pointer
        // comparison keeps a newer flight under the same key alive.
        let mut inflight = self.inflight.lock().await;
        if let Some(current) = inflight.get(key) {
            if current.ptr_eq(&flight) {
                inflight.remove(key);
            }
        }

        result
    }
}

impl<T, E> Default for FlightTable<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counting_op(
        counter: Arc<AtomicUsize>,
        outcome: Result<usize, String>,
    ) -> impl Future<Output = Result<usize, String>> + Send + 'static {
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            outcome
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let table = Arc::new(FlightTable::<usize, String>::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let calls = (0..5).map(|_| {
            let table = table.clone();
            let counter = counter.clone();
            async move { table.run("key", counting_op(counter, Ok(7))).await }
        });

        let results = join_all(calls).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(results.into_iter().all(|r| r == Ok(7)));
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let table = Arc::new(FlightTable::<usize, String>::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let first = table.run("a", counting_op(counter.clone(), Ok(1)));
        let second = table.run("b", counting_op(counter.clone(), Ok(2)));
        let (first, second) = tokio::join!(first, second);

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(2));
    }

    #[tokio::test]
    async fn test_completed_flight_is_forgotten() {
        let table = FlightTable::<usize, String>::new();
        let counter = Arc::new(AtomicUsize::new(0));

        table
            .run("key", counting_op(counter.clone(), Ok(1)))
            .await
            .unwrap();
        table
            .run("key", counting_op(counter.clone(), Ok(1)))
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_shared_but_not_cached() {
        let table = Arc::new(FlightTable::<usize, String>::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let calls = (0..3).map(|_| {
            let table = table.clone();
            let counter = counter.clone();
            async move {
                table
                    .run("key", counting_op(counter, Err("boom".to_string())))
                    .await
            }
        });

        let results = join_all(calls).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(results.into_iter().all(|r| r == Err("boom".to_string())));

        // a later caller retries from scratch
        let retry = table
            .run("key", counting_op(counter.clone(), Ok(9)))
            .await;
        assert_eq!(retry, Ok(9));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::LedgerError;

type SharedRun<T> = Shared<BoxFuture<'static, Result<T, LedgerError>>>;

struct InFlight<K, T> {
    key: K,
    generation: u64,
    run: SharedRun<T>,
}

enum Step<T> {
    Join(SharedRun<T>),
    WaitThenRetry { generation: u64, run: SharedRun<T> },
}

/// Clears the user's entry when the spawned run ends, whether it returns or unwinds.
struct FinishGuard<K, T> {
    flight: Arc<SingleFlight<K, T>>,
    user_id: String,
    generation: u64,
}

impl<K, T> Drop for FinishGuard<K, T> {
    fn drop(&mut self) {
        self.flight.finish(&self.user_id, self.generation);
    }
}

/// At most one run per user at a time. Callers presenting the same key as the running job
/// share its result; callers with a different key wait for it to finish and then start their
/// own. Runs are spawned, so they complete even if every caller is dropped.
pub struct SingleFlight<K, T> {
    in_flight: Mutex<HashMap<String, InFlight<K, T>>>,
    next_generation: AtomicU64,
}

impl<K, T> SingleFlight<K, T>
where
    K: Clone + PartialEq + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    pub async fn run<F, Fut>(
        self: &Arc<Self>,
        user_id: &str,
        key: K,
        work: F,
    ) -> Result<T, LedgerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>> + Send + 'static,
    {
        loop {
            let step = {
                let mut in_flight = self.lock();

                match in_flight.get(user_id) {
                    Some(entry) if entry.key == key => Step::Join(entry.run.clone()),
                    Some(entry) => Step::WaitThenRetry {
                        generation: entry.generation,
                        run: entry.run.clone(),
                    },
                    None => {
                        let (generation, run) = self.launch(user_id, work());
                        in_flight.insert(
                            String::from(user_id),
                            InFlight {
                                key: key.clone(),
                                generation,
                                run: run.clone(),
                            },
                        );
                        Step::Join(run)
                    }
                }
            };

            match step {
                Step::Join(run) => return run.await,
                Step::WaitThenRetry { generation, run } => {
                    log::debug!(
                        "Sync for user {} is waiting on an in-flight run with different parameters",
                        user_id
                    );
                    let _ = run.await;

                    // The awaited run is over; its entry must not be waited on again
                    self.finish(user_id, generation);
                }
            }
        }
    }

    #[cfg(test)]
    pub fn is_running(&self, user_id: &str) -> bool {
        self.lock().contains_key(user_id)
    }

    fn launch<Fut>(self: &Arc<Self>, user_id: &str, work: Fut) -> (u64, SharedRun<T>)
    where
        Fut: Future<Output = Result<T, LedgerError>> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let task_flight = Arc::clone(self);
        let task_user_id = String::from(user_id);

        // The guard is built on first poll. `launch` runs under the map lock, so a guard
        // dropped inside `spawn` would try to take that lock again.
        let handle = tokio::spawn(async move {
            let _guard = FinishGuard {
                flight: task_flight,
                user_id: task_user_id,
                generation,
            };
            work.await
        });

        let this = Arc::clone(self);
        let owned_user_id = String::from(user_id);

        let run = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    log::error!("Sync task for user {owned_user_id} ended abnormally: {e}");
                    this.finish(&owned_user_id, generation);
                    Err(LedgerError::Store(format!("Sync task ended abnormally: {e}")))
                }
            }
        }
        .boxed()
        .shared();

        (generation, run)
    }
}

impl<K, T> SingleFlight<K, T> {
    fn finish(&self, user_id: &str, generation: u64) {
        let mut in_flight = self.lock();

        if in_flight
            .get(user_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            in_flight.remove(user_id);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, InFlight<K, T>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Clone + PartialEq + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_same_key_joins_in_flight_run() {
        let flight: Arc<SingleFlight<Option<String>, usize>> = Arc::new(SingleFlight::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let work = || {
            let runs = Arc::clone(&runs);
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(runs.fetch_add(1, Ordering::SeqCst) + 1)
            }
        };

        let (a, b) = tokio::join!(
            flight.run("u1", None, work),
            flight.run("u1", None, work)
        );

        assert_eq!(a, Ok(1));
        assert_eq!(b, Ok(1));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!flight.is_running("u1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_key_runs_after_in_flight_run() {
        let flight: Arc<SingleFlight<Option<String>, Vec<String>>> =
            Arc::new(SingleFlight::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let work_for = |label: &'static str| {
            let log = Arc::clone(&log);
            move || {
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push(format!("start {label}"));
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    log.lock().unwrap().push(format!("end {label}"));
                    Ok(log.lock().unwrap().clone())
                }
            }
        };

        let (a, b) = tokio::join!(
            flight.run("u1", None, work_for("default")),
            flight.run("u1", Some(String::from("b2")), work_for("b2"))
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start default", "end default", "start b2", "end b2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_users_run_concurrently() {
        let flight: Arc<SingleFlight<(), ()>> = Arc::new(SingleFlight::new());
        let start = tokio::time::Instant::now();

        let work = || async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        };

        let (a, b) = tokio::join!(flight.run("u1", (), work), flight.run("u2", (), work));

        assert!(a.is_ok() && b.is_ok());
        assert!(start.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_when_caller_is_dropped() {
        let flight: Arc<SingleFlight<(), ()>> = Arc::new(SingleFlight::new());
        let done = Arc::new(AtomicUsize::new(0));

        let work = || {
            let done = Arc::clone(&done);
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        };

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), flight.run("u1", (), work)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(!flight.is_running("u1"));
    }

    async fn exploding_work() -> Result<(), LedgerError> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        panic!("mirror write exploded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_run_releases_user() {
        let flight: Arc<SingleFlight<Option<String>, ()>> = Arc::new(SingleFlight::new());

        let result = flight.run("u1", None, exploding_work).await;
        assert!(matches!(result, Err(LedgerError::Store(_))));
        assert!(!flight.is_running("u1"));

        let retried = flight.run("u1", None, || async { Ok(()) }).await;
        assert_eq!(retried, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_proceeds_after_panicking_run() {
        let flight: Arc<SingleFlight<Option<String>, ()>> = Arc::new(SingleFlight::new());
        let overridden_runs = Arc::new(AtomicUsize::new(0));

        let overridden_work = || {
            let overridden_runs = Arc::clone(&overridden_runs);
            async move {
                overridden_runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        };

        let (panicked, overridden) = tokio::time::timeout(Duration::from_secs(3), async {
            tokio::join!(
                flight.run("u1", None, exploding_work),
                flight.run("u1", Some(String::from("b2")), overridden_work)
            )
        })
        .await
        .expect("waiting caller never resumed");

        assert!(panicked.is_err());
        assert_eq!(overridden, Ok(()));
        assert_eq!(overridden_runs.load(Ordering::SeqCst), 1);
        assert!(!flight.is_running("u1"));
    }
}

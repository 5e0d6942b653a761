use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use futures::future;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::jobs::Job;

const MIN_JITTER: Duration = Duration::from_secs(1);

// A DST gap at midnight is never longer than a few hours
const MAX_GAP_MINUTES: i64 = 180;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The first instant of the local calendar day following the one `after` falls in.
    fn next_local_midnight(&self, after: DateTime<Utc>) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn next_local_midnight(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        next_midnight_in(&chrono::Local, after)
    }
}

pub fn next_midnight_in<Tz: TimeZone>(tz: &Tz, after: DateTime<Utc>) -> DateTime<Utc> {
    let today = after.with_timezone(tz).date_naive();
    let tomorrow = today.succ_opt().unwrap_or(today);

    first_instant_of_day(tomorrow, |local| {
        tz.from_local_datetime(local)
            .map(|dt| dt.with_timezone(&Utc))
    })
    .unwrap_or_else(|| after + chrono::Duration::days(1))
}

/// Resolves local midnight of `date`. An ambiguous midnight resolves to its earliest instant and
/// a skipped one to the first local minute that exists.
fn first_instant_of_day<F>(date: NaiveDate, resolve: F) -> Option<DateTime<Utc>>
where
    F: Fn(&NaiveDateTime) -> LocalResult<DateTime<Utc>>,
{
    let midnight = date.and_hms_opt(0, 0, 0)?;

    (0..=MAX_GAP_MINUTES).find_map(|minutes| {
        let candidate = midnight + chrono::Duration::minutes(minutes);

        match resolve(&candidate) {
            LocalResult::Single(instant) => Some(instant),
            LocalResult::Ambiguous(earliest, latest) => Some(earliest.min(latest)),
            LocalResult::None => None,
        }
    })
}

/// Runs every registered job once per local day at midnight until cancelled.
pub struct JobRunner {
    jobs: Vec<Box<dyn Job>>,
    clock: Arc<dyn Clock>,
    max_jitter: Duration,
    cancellation_token: CancellationToken,
}

impl JobRunner {
    pub fn new(
        clock: Arc<dyn Clock>,
        max_jitter: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            jobs: Vec::new(),
            clock,
            max_jitter,
            cancellation_token,
        }
    }

    pub fn register(&mut self, job: Box<dyn Job>) {
        log::info!("Registered job \"{}\" to run at local midnight", job.name());
        self.jobs.push(job);
    }

    pub async fn start(&mut self) {
        loop {
            let now = self.clock.now();
            let next_run = self.clock.next_local_midnight(now);
            let wait = (next_run - now).to_std().unwrap_or(Duration::ZERO);

            log::info!(
                "Next job run scheduled for {} ({} seconds from now)",
                next_run.to_rfc3339(),
                wait.as_secs()
            );

            if !self.sleep_unless_cancelled(wait).await {
                break;
            }

            self.run_jobs().await;

            // Keeps the next computation clear of the midnight that just fired
            let jitter = self.jitter();
            if !self.sleep_unless_cancelled(jitter).await {
                break;
            }
        }

        log::info!("Job runner stopped");
    }

    async fn run_jobs(&mut self) {
        let mut job_names = Vec::with_capacity(self.jobs.len());
        let mut job_futures = Vec::with_capacity(self.jobs.len());

        for job in &mut self.jobs {
            if !job.is_ready() {
                log::warn!("Skipping job \"{}\" because it is not ready", job.name());
                continue;
            }

            let name = job.name();
            log::info!("Executing job \"{}\"", name);
            job_names.push(name);
            job_futures.push(job.execute());
        }

        let job_results = future::join_all(job_futures).await;

        for (i, result) in job_results.into_iter().enumerate() {
            if let Err(e) = result {
                log::error!("Job \"{}\" failed: {}", job_names[i], e);
            } else {
                log::info!("Job \"{}\" finished successfully", job_names[i]);
            }
        }
    }

    fn jitter(&self) -> Duration {
        if self.max_jitter <= MIN_JITTER {
            return MIN_JITTER;
        }

        let millis = rand::thread_rng()
            .gen_range(MIN_JITTER.as_millis() as u64..=self.max_jitter.as_millis() as u64);
        Duration::from_millis(millis)
    }

    /// Returns `false` if cancellation arrived before `duration` elapsed.
    async fn sleep_unless_cancelled(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancellation_token.cancelled() => false,
            _ = time::sleep(duration) => !self.cancellation_token.is_cancelled(),
        }
    }
}

//! Job registry and the scheduler loop.

use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use taskhive_core::error::Result;

use crate::cron;

/// When/how a job fires.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Every N seconds, first firing one interval after registration.
    Interval { every_secs: u64 },
    /// On a cron schedule (lightweight 5-field expression).
    Cron { expression: String },
}

/// Work executed when a job fires.
pub type JobHandler = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct RegisteredJob {
    name: String,
    schedule: Schedule,
    next_run: Option<DateTime<Utc>>,
    last_run: Option<DateTime<Utc>>,
    run_count: u64,
    /// Guard: a firing is skipped while the previous one is still in flight.
    running: Arc<AtomicBool>,
    handler: JobHandler,
}

impl RegisteredJob {
    fn due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.next_run, Some(next) if now >= next)
    }

    fn reschedule(&mut self, now: DateTime<Utc>) {
        self.next_run = match &self.schedule {
            Schedule::Interval { every_secs } => {
                Some(now + Duration::seconds(*every_secs as i64))
            }
            Schedule::Cron { expression } => cron::next_run_from_cron(expression, now),
        };
    }
}

/// Named-job scheduler. Jobs are registered once at startup by the
/// composition root; the loop in [`spawn_scheduler`] fires them as they
/// come due. Failures are isolated per job and per firing.
pub struct Scheduler {
    jobs: Vec<RegisteredJob>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    /// Register a job firing every `every_secs` seconds.
    pub fn register_interval(&mut self, name: &str, every_secs: u64, handler: JobHandler) {
        let next = Utc::now() + Duration::seconds(every_secs as i64);
        self.jobs.push(RegisteredJob {
            name: name.to_string(),
            schedule: Schedule::Interval { every_secs },
            next_run: Some(next),
            last_run: None,
            run_count: 0,
            running: Arc::new(AtomicBool::new(false)),
            handler,
        });
        tracing::info!("📅 Job registered: '{name}' (every {every_secs}s)");
    }

    /// Register a job on a cron schedule.
    pub fn register_cron(&mut self, name: &str, expression: &str, handler: JobHandler) {
        let next = cron::next_run_from_cron(expression, Utc::now());
        if next.is_none() {
            tracing::warn!("⚠️ Job '{name}' has an invalid cron expression: '{expression}'");
        }
        self.jobs.push(RegisteredJob {
            name: name.to_string(),
            schedule: Schedule::Cron {
                expression: expression.to_string(),
            },
            next_run: next,
            last_run: None,
            run_count: 0,
            running: Arc::new(AtomicBool::new(false)),
            handler,
        });
        tracing::info!("📅 Job registered: '{name}' (cron '{expression}')");
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Names and next-run times, for introspection.
    pub fn job_table(&self) -> Vec<(String, Option<DateTime<Utc>>, u64)> {
        self.jobs
            .iter()
            .map(|j| (j.name.clone(), j.next_run, j.run_count))
            .collect()
    }

    /// Fire every due job. Each firing runs on its own spawned task so a
    /// slow job never stalls the loop or its peers. Returns the names of
    /// jobs triggered this tick.
    pub fn tick(&mut self) -> Vec<String> {
        let now = Utc::now();
        let mut triggered = Vec::new();

        for job in self.jobs.iter_mut() {
            if !job.due(now) {
                continue;
            }

            job.reschedule(now);

            if job.running.load(Ordering::SeqCst) {
                tracing::warn!(
                    "⏭️ Job '{}' still running from a previous firing, skipping",
                    job.name
                );
                continue;
            }

            tracing::info!("🔔 Job triggered: '{}'", job.name);
            job.last_run = Some(now);
            job.run_count += 1;
            job.running.store(true, Ordering::SeqCst);
            triggered.push(job.name.clone());

            let name = job.name.clone();
            let running = job.running.clone();
            let fut = (job.handler)();
            tokio::spawn(async move {
                if let Err(e) = fut.await {
                    tracing::error!("❌ Job '{name}' failed: {e}");
                }
                running.store(false, Ordering::SeqCst);
            });
        }

        triggered
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the scheduler loop as a background tokio task.
pub async fn spawn_scheduler(scheduler: Arc<Mutex<Scheduler>>, check_interval_secs: u64) {
    tracing::info!("⏰ Scheduler started (check every {}s)", check_interval_secs);

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(check_interval_secs));

    loop {
        interval.tick().await;
        let triggered = {
            let mut sched = scheduler.lock().await;
            sched.tick()
        };
        for name in &triggered {
            tracing::debug!("📣 Fired job '{name}'");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    fn counting_handler(counter: Arc<AtomicUsize>) -> JobHandler {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        })
    }

    fn force_due(scheduler: &mut Scheduler, name: &str) {
        for job in scheduler.jobs.iter_mut() {
            if job.name == name {
                job.next_run = Some(Utc::now() - Duration::seconds(1));
            }
        }
    }

    #[tokio::test]
    async fn test_interval_job_fires_and_reschedules() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.register_interval("tick-job", 3600, counting_handler(counter.clone()));

        // Not due yet
        assert!(scheduler.tick().is_empty());

        force_due(&mut scheduler, "tick-job");
        let triggered = scheduler.tick();
        assert_eq!(triggered, vec!["tick-job".to_string()]);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Rescheduled into the future, so an immediate tick is a no-op
        assert!(scheduler.tick().is_empty());
    }

    #[tokio::test]
    async fn test_overlap_guard_skips_while_running() {
        let mut scheduler = Scheduler::new();
        let handler: JobHandler = Arc::new(|| {
            async {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                Ok(())
            }
            .boxed()
        });
        scheduler.register_interval("slow-job", 3600, handler);

        force_due(&mut scheduler, "slow-job");
        assert_eq!(scheduler.tick().len(), 1);

        // Previous firing still in flight — a due tick must skip it
        force_due(&mut scheduler, "slow-job");
        assert!(scheduler.tick().is_empty());
    }

    #[tokio::test]
    async fn test_failing_job_does_not_poison_future_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        let c = counter.clone();
        let handler: JobHandler = Arc::new(move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(taskhive_core::TaskHiveError::Scheduler("boom".into()))
            }
            .boxed()
        });
        scheduler.register_interval("flaky-job", 3600, handler);

        for _ in 0..3 {
            force_due(&mut scheduler, "flaky-job");
            scheduler.tick();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cron_job_registration() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.register_cron("weekly", "0 8 * * 1", counting_handler(counter));
        assert_eq!(scheduler.job_count(), 1);
        let table = scheduler.job_table();
        assert!(table[0].1.is_some(), "cron next_run computed");
    }
}

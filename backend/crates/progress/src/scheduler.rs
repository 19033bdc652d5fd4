//! Recurring recompute and cleanup jobs owned by one [`Scheduler`] instance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use pulse_common::error::{PulseError, PulseResult};
use pulse_config::ProgressSettings;
use pulse_db::activity::repositories::ActivitySource;
use pulse_db::progress::repositories::ProgressRepository;

use crate::service::ProgressService;

pub const DAILY_JOB: &str = "daily-progress";
pub const HOURLY_JOB: &str = "hourly-progress";
pub const CLEANUP_JOB: &str = "weekly-cleanup";

/// When a job fires. All hours are UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Daily { hour: u32 },
    /// Top of every hour from `start_hour` through `end_hour`, inclusive.
    Hourly { start_hour: u32, end_hour: u32 },
    Weekly { weekday: Weekday, hour: u32 },
}

fn at_hour(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(hour))))
}

impl Cadence {
    /// The first firing instant strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        match *self {
            Cadence::Daily { hour } => {
                let candidate = at_hour(today, hour);
                if candidate > now {
                    candidate
                } else {
                    candidate + Duration::days(1)
                }
            }
            Cadence::Hourly {
                start_hour,
                end_hour,
            } => {
                let next = at_hour(today, now.hour()) + Duration::hours(1);
                if next.hour() < start_hour {
                    at_hour(next.date_naive(), start_hour)
                } else if next.hour() > end_hour {
                    at_hour(next.date_naive() + Duration::days(1), start_hour)
                } else {
                    next
                }
            }
            Cadence::Weekly { weekday, hour } => {
                let ahead = (7 + weekday.num_days_from_monday() as i64
                    - now.weekday().num_days_from_monday() as i64)
                    % 7;
                let candidate = at_hour(today + Duration::days(ahead), hour);
                if candidate > now {
                    candidate
                } else {
                    candidate + Duration::weeks(1)
                }
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Cadence::Daily { hour } => format!("daily at {hour:02}:00 UTC"),
            Cadence::Hourly {
                start_hour,
                end_hour,
            } => format!("hourly {start_hour:02}:00-{end_hour:02}:00 UTC"),
            Cadence::Weekly { weekday, hour } => format!("weekly on {weekday} at {hour:02}:00 UTC"),
        }
    }
}

/// A unit of scheduled work. Returns a short summary for the log line.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self) -> PulseResult<String>;
}

pub struct RecomputeAllTeams<A: ActivitySource, R: ProgressRepository> {
    service: Arc<ProgressService<A, R>>,
}

impl<A: ActivitySource, R: ProgressRepository> RecomputeAllTeams<A, R> {
    pub fn new(service: Arc<ProgressService<A, R>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<A: ActivitySource, R: ProgressRepository> JobHandler for RecomputeAllTeams<A, R> {
    async fn run(&self) -> PulseResult<String> {
        let outcome = self.service.process_all_teams().await?;
        Ok(format!("processed {}/{} teams", outcome.processed, outcome.total))
    }
}

pub struct CleanupResolvedInsights<A: ActivitySource, R: ProgressRepository> {
    service: Arc<ProgressService<A, R>>,
    retention_days: i64,
}

impl<A: ActivitySource, R: ProgressRepository> CleanupResolvedInsights<A, R> {
    pub fn new(service: Arc<ProgressService<A, R>>, retention_days: i64) -> Self {
        Self {
            service,
            retention_days,
        }
    }
}

#[async_trait]
impl<A: ActivitySource, R: ProgressRepository> JobHandler for CleanupResolvedInsights<A, R> {
    async fn run(&self) -> PulseResult<String> {
        let removed = self
            .service
            .cleanup_resolved_insights(self.retention_days)
            .await?;
        Ok(format!("removed {removed} resolved insights"))
    }
}

#[derive(Clone)]
pub struct JobDescriptor {
    pub name: String,
    pub cadence: Cadence,
    pub handler: Arc<dyn JobHandler>,
}

impl JobDescriptor {
    pub fn new(name: impl Into<String>, cadence: Cadence, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            name: name.into(),
            cadence,
            handler,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub cadence: String,
    pub running: bool,
}

struct RunningJob {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the job list and the timer task of every started job.
///
/// Stopping a job only cancels future firings; a run already in progress
/// finishes on its own.
pub struct Scheduler {
    jobs: Vec<JobDescriptor>,
    running: Mutex<HashMap<String, RunningJob>>,
}

impl Scheduler {
    pub fn new(jobs: Vec<JobDescriptor>) -> Self {
        Self {
            jobs,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Daily and business-hours recompute plus the weekly insight cleanup.
    pub fn standard_jobs<A, R>(
        service: Arc<ProgressService<A, R>>,
        settings: &ProgressSettings,
    ) -> Vec<JobDescriptor>
    where
        A: ActivitySource + 'static,
        R: ProgressRepository + 'static,
    {
        let recompute: Arc<dyn JobHandler> = Arc::new(RecomputeAllTeams::new(service.clone()));
        vec![
            JobDescriptor::new(
                DAILY_JOB,
                Cadence::Daily {
                    hour: settings.daily_hour,
                },
                recompute.clone(),
            ),
            JobDescriptor::new(
                HOURLY_JOB,
                Cadence::Hourly {
                    start_hour: settings.business_start_hour,
                    end_hour: settings.business_end_hour,
                },
                recompute,
            ),
            JobDescriptor::new(
                CLEANUP_JOB,
                Cadence::Weekly {
                    weekday: settings.cleanup_weekday,
                    hour: settings.cleanup_hour,
                },
                Arc::new(CleanupResolvedInsights::new(
                    service,
                    settings.insight_retention_days,
                )),
            ),
        ]
    }

    fn running(&self) -> MutexGuard<'_, HashMap<String, RunningJob>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn job(&self, name: &str) -> PulseResult<&JobDescriptor> {
        self.jobs
            .iter()
            .find(|j| j.name == name)
            .ok_or_else(|| PulseError::NotFound(format!("job {name}")))
    }

    pub fn start_all(&self) {
        for job in &self.jobs {
            self.spawn(job);
        }
    }

    /// Start one job. Starting a job that is already running is a no-op.
    pub fn start(&self, name: &str) -> PulseResult<()> {
        let job = self.job(name)?;
        self.spawn(job);
        Ok(())
    }

    fn spawn(&self, job: &JobDescriptor) {
        let mut running = self.running();
        if running.contains_key(&job.name) {
            tracing::debug!(job = %job.name, "job already running");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(job.clone(), stop_rx));
        running.insert(job.name.clone(), RunningJob { stop_tx, handle });
        tracing::info!(job = %job.name, cadence = %job.cadence.describe(), "job started");
    }

    /// Returns whether the job was running.
    pub fn stop(&self, name: &str) -> bool {
        match self.running().remove(name) {
            Some(job) => {
                let _ = job.stop_tx.send(true);
                tracing::info!(job = name, "job stopped");
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        let names: Vec<String> = self.running().keys().cloned().collect();
        for name in names {
            self.stop(&name);
        }
    }

    /// Stop every job and wait for in-flight runs to finish.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, RunningJob)> = self.running().drain().collect();
        for (name, job) in drained {
            let _ = job.stop_tx.send(true);
            if let Err(e) = job.handle.await {
                tracing::warn!(job = %name, error = %e, "job task ended abnormally");
            }
            tracing::info!(job = %name, "job stopped");
        }
    }

    pub fn status(&self) -> Vec<JobStatus> {
        let running = self.running();
        self.jobs
            .iter()
            .map(|j| JobStatus {
                name: j.name.clone(),
                cadence: j.cadence.describe(),
                running: running.contains_key(&j.name),
            })
            .collect()
    }

    /// Run a job's handler immediately, outside its cadence.
    pub async fn run_now(&self, name: &str) -> PulseResult<String> {
        let job = self.job(name)?.clone();
        execute(&job).await
    }
}

async fn execute(job: &JobDescriptor) -> PulseResult<String> {
    let started = Instant::now();
    tracing::info!(job = %job.name, "job run started");
    match job.handler.run().await {
        Ok(summary) => {
            tracing::info!(
                job = %job.name,
                %summary,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "job run finished"
            );
            Ok(summary)
        }
        Err(e) => {
            tracing::error!(job = %job.name, error = %e, "job run failed");
            Err(e)
        }
    }
}

async fn run_loop(job: JobDescriptor, mut stop_rx: watch::Receiver<bool>) {
    let mut last_fire = Utc::now();
    loop {
        let from = Utc::now().max(last_fire);
        let next = job.cadence.next_after(from);
        let wait = (next - from).to_std().unwrap_or_default();

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = stop_rx.changed() => break,
        }

        last_fire = next;
        // A failed run is logged and the job keeps its schedule.
        let _ = execute(&job).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeActivity, MemoryProgressRepo};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    struct CountingJob {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl JobHandler for CountingJob {
        async fn run(&self) -> PulseResult<String> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PulseError::Internal("boom".into()));
            }
            Ok("ok".into())
        }
    }

    fn counting(fail: bool) -> Arc<CountingJob> {
        Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            fail,
        })
    }

    // ── cadence ─────────────────────────────────────────────────

    #[test]
    fn daily_fires_later_today_or_tomorrow() {
        let cadence = Cadence::Daily { hour: 2 };
        // 2024-03-06 is a Wednesday
        assert_eq!(cadence.next_after(utc(2024, 3, 6, 1, 30)), utc(2024, 3, 6, 2, 0));
        assert_eq!(cadence.next_after(utc(2024, 3, 6, 2, 0)), utc(2024, 3, 7, 2, 0));
        assert_eq!(cadence.next_after(utc(2024, 3, 6, 23, 0)), utc(2024, 3, 7, 2, 0));
    }

    #[test]
    fn hourly_stays_inside_business_window() {
        let cadence = Cadence::Hourly {
            start_hour: 8,
            end_hour: 20,
        };
        assert_eq!(cadence.next_after(utc(2024, 3, 6, 3, 10)), utc(2024, 3, 6, 8, 0));
        assert_eq!(cadence.next_after(utc(2024, 3, 6, 8, 0)), utc(2024, 3, 6, 9, 0));
        assert_eq!(cadence.next_after(utc(2024, 3, 6, 19, 59)), utc(2024, 3, 6, 20, 0));
        assert_eq!(cadence.next_after(utc(2024, 3, 6, 20, 0)), utc(2024, 3, 7, 8, 0));
        assert_eq!(cadence.next_after(utc(2024, 3, 6, 23, 30)), utc(2024, 3, 7, 8, 0));
    }

    #[test]
    fn weekly_fires_on_the_configured_day() {
        let cadence = Cadence::Weekly {
            weekday: Weekday::Sun,
            hour: 0,
        };
        assert_eq!(cadence.next_after(utc(2024, 3, 6, 12, 0)), utc(2024, 3, 10, 0, 0));
        assert_eq!(cadence.next_after(utc(2024, 3, 10, 0, 0)), utc(2024, 3, 17, 0, 0));
        assert_eq!(cadence.next_after(utc(2024, 3, 9, 23, 59)), utc(2024, 3, 10, 0, 0));
    }

    #[test]
    fn describe_is_readable() {
        assert_eq!(Cadence::Daily { hour: 2 }.describe(), "daily at 02:00 UTC");
        assert_eq!(
            Cadence::Weekly {
                weekday: Weekday::Sun,
                hour: 0
            }
            .describe(),
            "weekly on Sun at 00:00 UTC"
        );
    }

    // ── lifecycle ───────────────────────────────────────────────

    #[tokio::test]
    async fn standard_jobs_cover_recompute_and_cleanup() {
        let service = Arc::new(ProgressService::new(
            FakeActivity::default(),
            MemoryProgressRepo::default(),
            Weekday::Sun,
        ));
        let scheduler = Scheduler::new(Scheduler::standard_jobs(
            service,
            &ProgressSettings::default(),
        ));

        let names: Vec<String> = scheduler.status().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec![DAILY_JOB, HOURLY_JOB, CLEANUP_JOB]);

        let summary = scheduler.run_now(CLEANUP_JOB).await.unwrap();
        assert_eq!(summary, "removed 0 resolved insights");
        let summary = scheduler.run_now(DAILY_JOB).await.unwrap();
        assert_eq!(summary, "processed 0/0 teams");
    }

    #[tokio::test]
    async fn start_and_stop_toggle_status() {
        let job = counting(false);
        let scheduler = Scheduler::new(vec![
            JobDescriptor::new("a", Cadence::Daily { hour: 2 }, job.clone()),
            JobDescriptor::new("b", Cadence::Daily { hour: 3 }, job),
        ]);

        scheduler.start("a").unwrap();
        scheduler.start("a").unwrap();
        let status = scheduler.status();
        assert!(status[0].running);
        assert!(!status[1].running);

        assert!(scheduler.stop("a"));
        assert!(!scheduler.stop("a"));
        assert!(scheduler.status().iter().all(|s| !s.running));
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let scheduler = Scheduler::new(Vec::new());
        assert!(matches!(scheduler.start("nope"), Err(PulseError::NotFound(_))));
        assert!(matches!(
            scheduler.run_now("nope").await,
            Err(PulseError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn running_job_fires_and_survives_failures() {
        let job = counting(true);
        let scheduler = Scheduler::new(vec![JobDescriptor::new(
            "every-hour",
            Cadence::Hourly {
                start_hour: 0,
                end_hour: 23,
            },
            job.clone(),
        )]);

        scheduler.start_all();
        tokio::time::sleep(std::time::Duration::from_secs(3 * 3600 + 60)).await;

        assert!(job.runs.load(Ordering::SeqCst) >= 2);
        scheduler.shutdown().await;
        assert!(scheduler.status().iter().all(|s| !s.running));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_job_no_longer_fires() {
        let job = counting(false);
        let scheduler = Scheduler::new(vec![JobDescriptor::new(
            "every-hour",
            Cadence::Hourly {
                start_hour: 0,
                end_hour: 23,
            },
            job.clone(),
        )]);

        scheduler.start_all();
        scheduler.stop_all();
        tokio::time::sleep(std::time::Duration::from_secs(3 * 3600)).await;

        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
    }
}

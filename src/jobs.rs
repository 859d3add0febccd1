//! Registry of asynchronous batch crawl jobs.
//!
//! Every job moves `pending -> running -> completed | failed`. All job state
//! lives behind one mutex and is only reached through the registry methods.
//! Only the most recent finished jobs are kept.

use crate::config::CrawlOptions;
use crate::crawlers::batch::{UrlOutcome, crawl_batch};
use crate::renderer::RendererFactory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Point-in-time view of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub task_id: Uuid,
    pub status: JobStatus,
    pub url_count: usize,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<BTreeMap<String, UrlOutcome>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Finished jobs kept for status queries before the oldest are dropped
pub const DEFAULT_FINISHED_JOB_RETENTION: usize = 100;

struct Job {
    snapshot: JobSnapshot,
    abort: Option<AbortHandle>,
}

impl Job {
    fn pending(task_id: Uuid, url_count: usize) -> Self {
        Self {
            snapshot: JobSnapshot {
                task_id,
                status: JobStatus::Pending,
                url_count,
                created_at: Utc::now(),
                finished_at: None,
                result: None,
                error: None,
            },
            abort: None,
        }
    }

    fn finish(&mut self, status: JobStatus) {
        self.snapshot.status = status;
        self.snapshot.finished_at = Some(Utc::now());
        self.abort = None;
    }

    fn fail(&mut self, error: impl Into<String>) {
        self.snapshot.error = Some(error.into());
        self.finish(JobStatus::Failed);
    }
}

type JobMap = Arc<Mutex<HashMap<Uuid, Job>>>;

pub struct JobRegistry {
    factory: Arc<dyn RendererFactory>,
    max_concurrency: usize,
    retention: usize,
    jobs: JobMap,
}

impl JobRegistry {
    pub fn new(factory: Arc<dyn RendererFactory>, max_concurrency: usize) -> Self {
        Self {
            factory,
            max_concurrency,
            retention: DEFAULT_FINISHED_JOB_RETENTION,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Keeps at most `retention` finished jobs; older ones are dropped when
    /// new jobs are submitted
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    /// Queues a batch crawl of `urls` and returns its task id at once
    pub async fn submit(&self, urls: Vec<String>, options: CrawlOptions) -> Uuid {
        self.submit_with_factory(Arc::clone(&self.factory), urls, options)
            .await
    }

    /// Like [`JobRegistry::submit`], opening sessions from `factory`
    pub async fn submit_with_factory(
        &self,
        factory: Arc<dyn RendererFactory>,
        urls: Vec<String>,
        options: CrawlOptions,
    ) -> Uuid {
        let task_id = Uuid::new_v4();

        // Holding the lock until the abort handle is stored keeps the task
        // from observing a job without it
        let mut jobs = self.jobs.lock().await;
        prune_finished(&mut jobs, self.retention);
        jobs.insert(task_id, Job::pending(task_id, urls.len()));

        let worker = tokio::spawn(run_job(
            Arc::clone(&self.jobs),
            task_id,
            factory,
            urls,
            options,
            self.max_concurrency,
        ));
        if let Some(job) = jobs.get_mut(&task_id) {
            job.abort = Some(worker.abort_handle());
        }
        tokio::spawn(supervise(Arc::clone(&self.jobs), task_id, worker));

        ::log::debug!("Job {} submitted", task_id);
        task_id
    }

    pub async fn get(&self, task_id: &Uuid) -> Option<JobSnapshot> {
        let jobs = self.jobs.lock().await;
        jobs.get(task_id).map(|job| job.snapshot.clone())
    }

    /// Number of jobs not yet finished
    pub async fn active_count(&self) -> usize {
        let jobs = self.jobs.lock().await;
        jobs.values()
            .filter(|job| !job.snapshot.status.is_finished())
            .count()
    }

    /// Aborts every unfinished job and marks it failed
    pub async fn shutdown(&self) {
        let mut jobs = self.jobs.lock().await;
        let mut aborted = 0;
        for job in jobs.values_mut() {
            if job.snapshot.status.is_finished() {
                continue;
            }
            if let Some(abort) = job.abort.take() {
                abort.abort();
            }
            job.fail("job registry shut down");
            aborted += 1;
        }
        ::log::info!("Job registry shut down, {} jobs aborted", aborted);
    }
}

async fn run_job(
    registry: JobMap,
    task_id: Uuid,
    factory: Arc<dyn RendererFactory>,
    urls: Vec<String>,
    options: CrawlOptions,
    max_concurrency: usize,
) {
    if !mark_running(&registry, task_id).await {
        return;
    }
    ::log::info!("Job {} running ({} URLs)", task_id, urls.len());

    let outcomes = crawl_batch(factory, &urls, options, max_concurrency).await;

    let mut jobs = registry.lock().await;
    if let Some(job) = jobs.get_mut(&task_id) {
        if job.snapshot.status == JobStatus::Running {
            job.snapshot.result = Some(outcomes);
            job.finish(JobStatus::Completed);
            ::log::info!("Job {} completed", task_id);
        }
    }
}

/// Waits for a job's worker and fails the job if the worker died without
/// finishing it
async fn supervise(registry: JobMap, task_id: Uuid, worker: JoinHandle<()>) {
    let Err(e) = worker.await else {
        return;
    };

    let mut jobs = registry.lock().await;
    let Some(job) = jobs.get_mut(&task_id) else {
        return;
    };
    if job.snapshot.status.is_finished() {
        return;
    }

    let message = if e.is_panic() {
        "batch job panicked"
    } else {
        "batch job was cancelled"
    };
    ::log::error!("Job {} failed: {} ({})", task_id, message, e);
    job.fail(message);
}

/// Drops the oldest finished jobs until at most `keep` remain
fn prune_finished(jobs: &mut HashMap<Uuid, Job>, keep: usize) {
    let mut finished = jobs
        .values()
        .filter_map(|job| {
            job.snapshot
                .finished_at
                .map(|at| (at, job.snapshot.task_id))
        })
        .collect::<Vec<_>>();
    if finished.len() <= keep {
        return;
    }

    finished.sort();
    let excess = finished.len() - keep;
    for (_, task_id) in finished.into_iter().take(excess) {
        jobs.remove(&task_id);
    }
    ::log::debug!("Dropped {} finished jobs", excess);
}

/// Moves a pending job to running; false if it is gone or already finished
async fn mark_running(registry: &Mutex<HashMap<Uuid, Job>>, task_id: Uuid) -> bool {
    let mut jobs = registry.lock().await;
    match jobs.get_mut(&task_id) {
        Some(job) if job.snapshot.status == JobStatus::Pending => {
            job.snapshot.status = JobStatus::Running;
            true
        }
        _ => false,
    }
}

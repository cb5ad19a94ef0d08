/// Job orchestration for the generation pipeline
///
/// Owns the job table and the full submission protocol: credit check,
/// cache check, per-video lease, job creation, and the background pipeline
/// (acquire -> prompt -> generate -> cache -> deduct). Each job record is
/// mutated only by its own bound task; polling callers get snapshots.
use crate::cache::ResultCache;
use crate::chapters::{self, ChapterInfo};
use crate::error::{PipelineError, PipelineResult};
use crate::generator::ChapterGenerator;
use crate::ledger::CreditLedger;
use crate::prompt;
use crate::storage::KeyValueStore;
use crate::transcript::{self, TranscriptAcquirer};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

const LEASE_KEY_PREFIX: &str = "jobs:lease:";

/// Lifecycle states of a generation job
///
/// `pending -> processing -> {completed, failed}`; terminal states are
/// entered exactly once and never left.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A generation job record
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub video_id: String,
    pub account_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub chapters: Option<Vec<ChapterInfo>>,
    pub formatted_text: Option<String>,
    pub error: Option<String>,
    /// Accounts that attached to this job via the per-video lease
    #[serde(skip)]
    pub watchers: Vec<String>,
    /// Use the two-pass refinement mode (synchronous legacy route)
    #[serde(skip)]
    refine: bool,
}

impl Job {
    fn visible_to(&self, account_id: &str) -> bool {
        self.account_id == account_id || self.watchers.iter().any(|w| w == account_id)
    }
}

struct JobRecord {
    job: Job,
    status_tx: watch::Sender<JobStatus>,
}

/// Result of a submission
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Served from the result cache; no job created, no credit charged
    Cached {
        video_id: String,
        chapters: Vec<ChapterInfo>,
        formatted_text: String,
    },
    /// A job is running (newly created or attached to)
    Accepted { job_id: String, status: JobStatus },
}

/// Result of the bounded-wait synchronous route
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Cached {
        video_id: String,
        chapters: Vec<ChapterInfo>,
        formatted_text: String,
    },
    /// The pipeline reached a terminal state within the wait window
    Finished(Job),
    /// Still running; poll with the job id
    StillProcessing { job_id: String, status: JobStatus },
}

/// Orchestrator tuning knobs
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Wall-clock budget handed to the Transcript Acquirer
    pub transcript_budget: Duration,
    /// How long the synchronous route waits before falling back to polling
    pub sync_wait: Duration,
    /// Terminal jobs older than this are evicted by the sweep
    pub job_retention: Duration,
    /// Credits charged per successful generation
    pub generation_cost: i64,
    /// Input ceiling for prompt construction, in estimated tokens
    pub max_input_tokens: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            transcript_budget: Duration::from_secs(30),
            sync_wait: Duration::from_secs(25),
            job_retention: Duration::from_secs(3600),
            generation_cost: 1,
            max_input_tokens: 48_000,
        }
    }
}

/// Cheaply cloneable: all cross-task state lives behind `Arc`s, so each
/// spawned pipeline carries its own handle.
#[derive(Clone)]
pub struct JobOrchestrator {
    jobs: Arc<RwLock<HashMap<String, JobRecord>>>,
    acquirer: Arc<TranscriptAcquirer>,
    generator: Arc<ChapterGenerator>,
    cache: ResultCache,
    ledger: CreditLedger,
    store: Arc<dyn KeyValueStore>,
    settings: OrchestratorSettings,
}

impl JobOrchestrator {
    pub fn new(
        acquirer: Arc<TranscriptAcquirer>,
        generator: Arc<ChapterGenerator>,
        cache: ResultCache,
        ledger: CreditLedger,
        store: Arc<dyn KeyValueStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            acquirer,
            generator,
            cache,
            ledger,
            store,
            settings,
        }
    }

    pub fn ledger(&self) -> &CreditLedger {
        &self.ledger
    }

    fn lease_key(video_id: &str) -> String {
        format!("{}{}", LEASE_KEY_PREFIX, video_id)
    }

    /// Submit a generation request (job-based route)
    pub async fn submit(
        &self,
        account_id: &str,
        video_id: &str,
        force_refresh: bool,
    ) -> PipelineResult<SubmitOutcome> {
        self.submit_inner(account_id, video_id, force_refresh, false)
            .await
    }

    /// Submit and wait up to the configured window for a terminal state
    ///
    /// The wait is cancelled on timeout; the underlying job keeps running
    /// and a later poll observes its terminal state. No second job is
    /// created and no double charge can occur because the job is shared.
    pub async fn submit_and_wait(
        &self,
        account_id: &str,
        video_id: &str,
        force_refresh: bool,
    ) -> PipelineResult<SyncOutcome> {
        let outcome = self
            .submit_inner(account_id, video_id, force_refresh, true)
            .await?;

        let (job_id, status) = match outcome {
            SubmitOutcome::Cached {
                video_id,
                chapters,
                formatted_text,
            } => {
                return Ok(SyncOutcome::Cached {
                    video_id,
                    chapters,
                    formatted_text,
                })
            }
            SubmitOutcome::Accepted { job_id, status } => (job_id, status),
        };

        match self.wait_for_terminal(&job_id, self.settings.sync_wait).await? {
            Some(job) => Ok(SyncOutcome::Finished(job)),
            None => Ok(SyncOutcome::StillProcessing { job_id, status }),
        }
    }

    async fn submit_inner(
        &self,
        account_id: &str,
        video_id: &str,
        force_refresh: bool,
        refine: bool,
    ) -> PipelineResult<SubmitOutcome> {
        // Credit check first; a broke account gets declined before any
        // cache or job work happens.
        if !self
            .ledger
            .has_sufficient(account_id, self.settings.generation_cost)
            .await?
        {
            return Err(PipelineError::InsufficientCredits);
        }

        if !force_refresh {
            if let Some(entry) = self.cache.get(video_id).await? {
                let chapters = chapters::parse_chapters(&entry.chapters_raw_text);
                return Ok(SubmitOutcome::Cached {
                    video_id: entry.video_id,
                    chapters,
                    formatted_text: entry.chapters_raw_text,
                });
            }
        }

        let job_id = Uuid::new_v4().to_string();
        if let Some(existing) = self.claim_lease(video_id, &job_id).await? {
            return self.attach_to_job(account_id, &existing).await;
        }

        let job = Job {
            id: job_id.clone(),
            video_id: video_id.to_string(),
            account_id: account_id.to_string(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            finished_at: None,
            chapters: None,
            formatted_text: None,
            error: None,
            watchers: Vec::new(),
            refine,
        };

        let (status_tx, _) = watch::channel(JobStatus::Pending);
        self.jobs.write().await.insert(
            job_id.clone(),
            JobRecord {
                job,
                status_tx,
            },
        );

        info!("🎬 Created job {} for video {}", job_id, video_id);

        let this = self.clone();
        let spawned_id = job_id.clone();
        let spawned_video = video_id.to_string();
        tokio::spawn(async move {
            // Anything that escapes the pipeline's own error handling is
            // contained here; the process never goes down with a job.
            let outcome = AssertUnwindSafe(this.execute_pipeline(spawned_id.clone()))
                .catch_unwind()
                .await;
            if outcome.is_err() {
                warn!("Pipeline task for job {} panicked", spawned_id);
                this.finish_failed(&spawned_id, "internal error: pipeline aborted")
                    .await;
                this.release_lease(&spawned_video, &spawned_id).await;
            }
        });

        Ok(SubmitOutcome::Accepted {
            job_id,
            status: JobStatus::Pending,
        })
    }

    /// Acquire the per-video lease, or report the in-flight job id
    ///
    /// Returns `Ok(None)` when this submission now holds the lease. A lease
    /// pointing at a terminal or missing job record is stale (the release
    /// races the completion notification, or the record was evicted) and is
    /// taken over.
    async fn claim_lease(&self, video_id: &str, job_id: &str) -> PipelineResult<Option<String>> {
        let key = Self::lease_key(video_id);
        let claimed = self
            .store
            .set_if_absent(&key, job_id)
            .await
            .map_err(|e| PipelineError::Internal(format!("lease store: {}", e)))?;
        if claimed {
            return Ok(None);
        }

        let holder = self
            .store
            .get(&key)
            .await
            .map_err(|e| PipelineError::Internal(format!("lease store: {}", e)))?;

        if let Some(existing) = holder {
            let jobs = self.jobs.read().await;
            if let Some(record) = jobs.get(&existing) {
                if !record.job.status.is_terminal() {
                    return Ok(Some(existing));
                }
            }
        }

        debug!("Taking over stale lease for video {}", video_id);
        self.store
            .set(&key, job_id)
            .await
            .map_err(|e| PipelineError::Internal(format!("lease store: {}", e)))?;
        Ok(None)
    }

    async fn release_lease(&self, video_id: &str, job_id: &str) {
        let key = Self::lease_key(video_id);
        match self.store.get(&key).await {
            Ok(Some(holder)) if holder == job_id => {
                let _ = self.store.delete(&key).await;
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to release lease for {}: {}", video_id, e),
        }
    }

    /// Record the submitter as a watcher of an in-flight job
    async fn attach_to_job(
        &self,
        account_id: &str,
        job_id: &str,
    ) -> PipelineResult<SubmitOutcome> {
        let mut jobs = self.jobs.write().await;
        let record = jobs
            .get_mut(job_id)
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;

        if !record.job.visible_to(account_id) {
            record.job.watchers.push(account_id.to_string());
        }
        info!(
            "🔗 Attached account {} to in-flight job {} for video {}",
            account_id, job_id, record.job.video_id
        );
        Ok(SubmitOutcome::Accepted {
            job_id: job_id.to_string(),
            status: record.job.status,
        })
    }

    /// The background pipeline bound to one job
    async fn execute_pipeline(&self, job_id: String) {
        let (account_id, video_id, refine) = match self.jobs.read().await.get(&job_id) {
            Some(record) => (
                record.job.account_id.clone(),
                record.job.video_id.clone(),
                record.job.refine,
            ),
            None => return,
        };

        self.set_status(&job_id, JobStatus::Processing).await;

        if let Err(e) = self.run_stages(&job_id, &account_id, &video_id, refine).await {
            self.finish_failed(&job_id, &e.to_string()).await;
        }
        self.release_lease(&video_id, &job_id).await;
    }

    async fn run_stages(
        &self,
        job_id: &str,
        account_id: &str,
        video_id: &str,
        refine: bool,
    ) -> PipelineResult<()> {
        let entries = self
            .acquirer
            .acquire(video_id, self.settings.transcript_budget)
            .await?;

        let duration_minutes = transcript::video_duration_seconds(&entries) / 60.0;
        let input = prompt::build_generation_input(
            &entries,
            duration_minutes,
            self.settings.max_input_tokens,
        );

        let chapters_text = if refine {
            self.generator
                .generate_refined(&input.system_prompt, &input.transcript_text)
                .await?
        } else {
            self.generator
                .generate(&input.system_prompt, &input.transcript_text)
                .await?
        };

        // The result exists from here on: cache and ledger problems degrade
        // to warnings, the job still completes.
        if let Err(e) = self
            .cache
            .put(video_id, &chapters_text, &input.transcript_text)
            .await
        {
            warn!("Cache write failed for video {}: {}", video_id, e);
        }

        let description = format!("chapter generation for video {}", video_id);
        match self
            .ledger
            .deduct(account_id, self.settings.generation_cost, &description)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(
                "Balance of {} dropped below cost before deduction; chapters delivered uncharged",
                account_id
            ),
            Err(e) => warn!(
                "Ledger unavailable during deduction for {}: {}; chapters delivered uncharged",
                account_id, e
            ),
        }

        let parsed = chapters::parse_chapters(&chapters_text);
        self.finish_completed(job_id, parsed, chapters_text).await;
        Ok(())
    }

    async fn set_status(&self, job_id: &str, status: JobStatus) {
        let mut jobs = self.jobs.write().await;
        if let Some(record) = jobs.get_mut(job_id) {
            if record.job.status.is_terminal() {
                return;
            }
            record.job.status = status;
            let _ = record.status_tx.send_replace(status);
        }
    }

    async fn finish_completed(
        &self,
        job_id: &str,
        parsed: Vec<ChapterInfo>,
        formatted_text: String,
    ) {
        let mut jobs = self.jobs.write().await;
        if let Some(record) = jobs.get_mut(job_id) {
            if record.job.status.is_terminal() {
                return;
            }
            record.job.status = JobStatus::Completed;
            record.job.finished_at = Some(Utc::now());
            record.job.chapters = Some(parsed);
            record.job.formatted_text = Some(formatted_text);
            let _ = record.status_tx.send_replace(JobStatus::Completed);
            info!("🏁 Job {} completed", job_id);
        }
    }

    async fn finish_failed(&self, job_id: &str, error: &str) {
        let mut jobs = self.jobs.write().await;
        if let Some(record) = jobs.get_mut(job_id) {
            if record.job.status.is_terminal() {
                return;
            }
            record.job.status = JobStatus::Failed;
            record.job.finished_at = Some(Utc::now());
            record.job.error = Some(error.to_string());
            let _ = record.status_tx.send_replace(JobStatus::Failed);
            warn!("❌ Job {} failed: {}", job_id, error);
        }
    }

    /// Snapshot of a job, visible only to its creator and attached accounts
    pub async fn status(&self, job_id: &str, account_id: &str) -> PipelineResult<Job> {
        let jobs = self.jobs.read().await;
        let record = jobs
            .get(job_id)
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;
        if !record.job.visible_to(account_id) {
            return Err(PipelineError::Forbidden);
        }
        Ok(record.job.clone())
    }

    /// Cancellable timed wait for a terminal state
    ///
    /// Returns `None` on timeout; the underlying task is unaffected.
    pub async fn wait_for_terminal(
        &self,
        job_id: &str,
        wait: Duration,
    ) -> PipelineResult<Option<Job>> {
        let mut rx = {
            let jobs = self.jobs.read().await;
            let record = jobs
                .get(job_id)
                .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;
            record.status_tx.subscribe()
        };

        let waited = tokio::time::timeout(wait, rx.wait_for(|s| s.is_terminal()))
            .await
            .map(|r| r.map(|_| ()));
        match waited {
            Ok(Ok(())) => {
                let jobs = self.jobs.read().await;
                Ok(jobs.get(job_id).map(|r| r.job.clone()))
            }
            // Sender gone: the record was evicted mid-wait
            Ok(Err(_)) => Ok(None),
            Err(_) => Ok(None),
        }
    }

    /// Drop terminal job records older than the retention window
    pub async fn evict_expired(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.settings.job_retention)
                .unwrap_or_else(|_| chrono::Duration::hours(1));
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, record| {
            !(record.job.status.is_terminal()
                && record.job.finished_at.map_or(false, |t| t < cutoff))
        });
        before - jobs.len()
    }

    /// Periodic eviction sweep; keeps job metadata bounded
    pub fn spawn_eviction_sweep(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = this.evict_expired().await;
                if removed > 0 {
                    info!("🧹 Evicted {} expired job record(s)", removed);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
    }
}

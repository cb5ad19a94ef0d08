//! API request handlers
//!
//! Bridge between the HTTP surface and the orchestrator: identity
//! resolution, taxonomy-to-status mapping, and payload shaping.

use axum::http::{HeaderMap, StatusCode};
use tracing::debug;

use super::models::{
    BalancePayload, CachedChaptersPayload, JobAcceptedPayload, JobStatusPayload,
};
use super::server::AppState;
use crate::auth;
use crate::error::{PipelineError, PipelineResult};
use crate::jobs::{SubmitOutcome, SyncOutcome};

/// Map a pipeline failure to its HTTP status category
pub fn error_status(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::Unauthorized => StatusCode::UNAUTHORIZED,
        PipelineError::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
        PipelineError::Forbidden => StatusCode::FORBIDDEN,
        PipelineError::JobNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::AcquisitionExhausted(_)
        | PipelineError::GenerationExhausted(_)
        | PipelineError::LedgerUnavailable(_)
        | PipelineError::CacheUnavailable(_)
        | PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Resolve the caller's account id from the Authorization header
///
/// First contact with an account also grants its signup bonus, keeping the
/// identity collaborator free of ledger knowledge.
pub async fn resolve_account(state: &AppState, headers: &HeaderMap) -> PipelineResult<String> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(auth::bearer_token)
        .ok_or(PipelineError::Unauthorized)?;

    let account_id = state
        .resolver
        .resolve(token)
        .await
        .ok_or(PipelineError::Unauthorized)?;

    state.orchestrator.ledger().initialize(&account_id).await?;
    debug!("Resolved request to account {}", account_id);
    Ok(account_id)
}

/// Outcome of a generation submission, ready for serialization
pub enum GenerateReply {
    Cached(CachedChaptersPayload),
    Accepted(JobAcceptedPayload),
    Finished(JobStatusPayload),
}

/// Job-based submission: returns a job id or a cached result
pub async fn submit_generation(
    state: &AppState,
    account_id: &str,
    video_id: &str,
    force_refresh: bool,
) -> PipelineResult<GenerateReply> {
    let outcome = state
        .orchestrator
        .submit(account_id, video_id, force_refresh)
        .await?;

    Ok(match outcome {
        SubmitOutcome::Cached {
            video_id,
            chapters,
            formatted_text,
        } => GenerateReply::Cached(CachedChaptersPayload {
            video_id,
            chapters,
            formatted_text,
            from_cache: true,
        }),
        SubmitOutcome::Accepted { job_id, status } => {
            GenerateReply::Accepted(JobAcceptedPayload { job_id, status })
        }
    })
}

/// Synchronous-compatibility submission with a bounded wait
pub async fn submit_generation_sync(
    state: &AppState,
    account_id: &str,
    video_id: &str,
    force_refresh: bool,
) -> PipelineResult<GenerateReply> {
    let outcome = state
        .orchestrator
        .submit_and_wait(account_id, video_id, force_refresh)
        .await?;

    Ok(match outcome {
        SyncOutcome::Cached {
            video_id,
            chapters,
            formatted_text,
        } => GenerateReply::Cached(CachedChaptersPayload {
            video_id,
            chapters,
            formatted_text,
            from_cache: true,
        }),
        SyncOutcome::Finished(job) => GenerateReply::Finished(job.into()),
        SyncOutcome::StillProcessing { job_id, status } => {
            GenerateReply::Accepted(JobAcceptedPayload { job_id, status })
        }
    })
}

/// Poll a job's state; visible only to its creator and attached accounts
pub async fn job_status(
    state: &AppState,
    account_id: &str,
    job_id: &str,
) -> PipelineResult<JobStatusPayload> {
    let job = state.orchestrator.status(job_id, account_id).await?;
    Ok(job.into())
}

/// Read-only ledger view for the caller
pub async fn credit_balance(state: &AppState, account_id: &str) -> PipelineResult<BalancePayload> {
    let ledger = state.orchestrator.ledger();
    let balance = ledger.balance(account_id).await?;
    let transactions = ledger.transactions(account_id, 20).await?;
    Ok(BalancePayload {
        account_id: account_id.to_string(),
        balance,
        transactions,
    })
}

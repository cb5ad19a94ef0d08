//! API data models

use crate::chapters::ChapterInfo;
use crate::jobs::{Job, JobStatus};
use serde::{Deserialize, Serialize};

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Body of a generation request
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub video_id: String,
    #[serde(default)]
    pub force_refresh: bool,
}

/// Chapters served straight from the result cache
#[derive(Debug, Serialize)]
pub struct CachedChaptersPayload {
    #[serde(rename = "videoId")]
    pub video_id: String,
    pub chapters: Vec<ChapterInfo>,
    pub formatted_text: String,
    #[serde(rename = "fromCache")]
    pub from_cache: bool,
}

/// A job was accepted for background processing
#[derive(Debug, Serialize)]
pub struct JobAcceptedPayload {
    pub job_id: String,
    pub status: JobStatus,
}

/// Job snapshot for polling responses
#[derive(Debug, Serialize)]
pub struct JobStatusPayload {
    pub job_id: String,
    pub status: JobStatus,
    pub video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapters: Option<Vec<ChapterInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for JobStatusPayload {
    fn from(job: Job) -> Self {
        // Result fields only accompany terminal states
        Self {
            job_id: job.id,
            status: job.status,
            video_id: job.video_id,
            chapters: job.chapters,
            formatted_text: job.formatted_text,
            error: job.error,
        }
    }
}

/// Balance and recent transactions for an account
#[derive(Debug, Serialize)]
pub struct BalancePayload {
    pub account_id: String,
    pub balance: i64,
    pub transactions: Vec<crate::ledger::TransactionRecord>,
}

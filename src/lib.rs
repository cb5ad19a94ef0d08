/// Chapterizer - video chapter generation service
///
/// Accepts a video identifier, acquires its spoken-content transcript under
/// a wall-clock budget, drives a multi-model generation step to produce a
/// chapter outline, caches the result per video, and charges the requesting
/// account one credit per successful generation.

pub mod api;
pub mod auth;
pub mod cache;
pub mod chapters;
pub mod config;
pub mod error;
pub mod generator;
pub mod jobs;
pub mod ledger;
pub mod llm;
pub mod prompt;
pub mod storage;
pub mod transcript;

// Re-export main types for easy access
pub use crate::cache::{CacheEntry, ResultCache};
pub use crate::chapters::ChapterInfo;
pub use crate::config::Config;
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::generator::ChapterGenerator;
pub use crate::jobs::{Job, JobOrchestrator, JobStatus, OrchestratorSettings, SubmitOutcome};
pub use crate::ledger::{CreditLedger, TransactionKind, TransactionRecord};
pub use crate::llm::{GenerationConfig, GenerationProvider, TextGenerator};
pub use crate::storage::{KeyValueStore, MemoryStore};
pub use crate::transcript::{TranscriptAcquirer, TranscriptEntry};

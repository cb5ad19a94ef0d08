/// Idempotent result cache keyed by video id
///
/// First successful generation for a video is reused by every later
/// request. Writes replace any prior entry unconditionally; there is no
/// invalidation API. Reads never trigger generation or ledger effects.
use crate::error::{PipelineError, PipelineResult};
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

const CACHE_KEY_PREFIX: &str = "chapters:cache:";

/// Stored result for one video id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub video_id: String,
    pub chapters_raw_text: String,
    pub transcript_raw_text: String,
}

#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn KeyValueStore>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(video_id: &str) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, video_id)
    }

    pub async fn get(&self, video_id: &str) -> PipelineResult<Option<CacheEntry>> {
        let raw = self
            .store
            .get(&Self::key(video_id))
            .await
            .map_err(PipelineError::CacheUnavailable)?;

        match raw {
            Some(json) => match serde_json::from_str::<CacheEntry>(&json) {
                Ok(entry) => {
                    info!("📚 Cache hit for video {}", video_id);
                    Ok(Some(entry))
                }
                Err(e) => {
                    // A corrupt entry behaves like a miss; the next success
                    // overwrites it.
                    debug!("Discarding unreadable cache entry for {}: {}", video_id, e);
                    Ok(None)
                }
            },
            None => {
                debug!("Cache miss for video {}", video_id);
                Ok(None)
            }
        }
    }

    /// Store a result, replacing any prior entry (last writer wins)
    pub async fn put(
        &self,
        video_id: &str,
        chapters_raw_text: &str,
        transcript_raw_text: &str,
    ) -> PipelineResult<()> {
        let entry = CacheEntry {
            video_id: video_id.to_string(),
            chapters_raw_text: chapters_raw_text.to_string(),
            transcript_raw_text: transcript_raw_text.to_string(),
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| PipelineError::Internal(format!("cache serialization: {}", e)))?;

        self.store
            .set(&Self::key(video_id), &json)
            .await
            .map_err(PipelineError::CacheUnavailable)?;

        info!("💾 Cached chapters for video {}", video_id);
        Ok(())
    }
}

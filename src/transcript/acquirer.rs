/// Budgeted transcript acquisition driver
///
/// Runs an ordered chain of caption-source strategies against a shared,
/// strictly decreasing wall-clock budget. Cheap structured lookups come
/// first, the watch-page scrape comes last. First success wins; when the
/// chain is exhausted the failure carries every strategy's error.
use super::captions::CaptionBackend;
use super::{scrape, TranscriptEntry};
use crate::error::{PipelineError, PipelineResult};
use anyhow::{anyhow, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Minimum viable budget for lightweight list/fetch strategies
const LIGHT_MIN_BUDGET: Duration = Duration::from_secs(2);
/// Minimum viable budget for translation and scrape fallbacks
const HEAVY_MIN_BUDGET: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrategyKind {
    /// List tracks, take the first preferred-language match
    PreferredTrack,
    /// First track of any language, machine-translated when foreign
    AnyTrackTranslated,
    /// Direct best-available fetch, no enumeration
    DirectFetch,
    /// Direct best-available fetch bypassing the configured proxy
    DirectFetchNoProxy,
    /// Raw watch-page scrape
    WatchPageScrape,
}

struct StrategyDescriptor {
    kind: StrategyKind,
    name: &'static str,
    min_budget: Duration,
}

/// Fixed cost/reliability ordering of the fallback chain
const STRATEGY_CHAIN: &[StrategyDescriptor] = &[
    StrategyDescriptor {
        kind: StrategyKind::PreferredTrack,
        name: "preferred-language track",
        min_budget: LIGHT_MIN_BUDGET,
    },
    StrategyDescriptor {
        kind: StrategyKind::AnyTrackTranslated,
        name: "any-language track with translation",
        min_budget: HEAVY_MIN_BUDGET,
    },
    StrategyDescriptor {
        kind: StrategyKind::DirectFetch,
        name: "direct best-available fetch",
        min_budget: LIGHT_MIN_BUDGET,
    },
    StrategyDescriptor {
        kind: StrategyKind::DirectFetchNoProxy,
        name: "direct fetch without proxy",
        min_budget: LIGHT_MIN_BUDGET,
    },
    StrategyDescriptor {
        kind: StrategyKind::WatchPageScrape,
        name: "watch-page scrape",
        min_budget: HEAVY_MIN_BUDGET,
    },
];

/// Configuration for transcript acquisition
#[derive(Debug, Clone)]
pub struct AcquirerConfig {
    /// Language codes scanned in order when picking a caption track
    pub preferred_languages: Vec<String>,
    /// Target language for machine translation of foreign tracks
    pub translation_language: String,
}

impl Default for AcquirerConfig {
    fn default() -> Self {
        Self {
            preferred_languages: vec!["en".to_string()],
            translation_language: "en".to_string(),
        }
    }
}

/// Transcript acquirer over a caption backend plus the scrape fallback
pub struct TranscriptAcquirer {
    backend: Arc<dyn CaptionBackend>,
    scrape_client: Client,
    config: AcquirerConfig,
}

impl TranscriptAcquirer {
    pub fn new(
        backend: Arc<dyn CaptionBackend>,
        scrape_client: Client,
        config: AcquirerConfig,
    ) -> Self {
        Self {
            backend,
            scrape_client,
            config,
        }
    }

    /// Acquire a transcript within `budget` wall-clock time
    ///
    /// Strategies run sequentially; a strategy whose minimum viable budget
    /// exceeds the remaining time is skipped without being attempted. Each
    /// attempted call is capped at the remaining budget, so total time never
    /// exceeds the budget by more than one in-flight call.
    pub async fn acquire(
        &self,
        video_id: &str,
        budget: Duration,
    ) -> PipelineResult<Vec<TranscriptEntry>> {
        let started = Instant::now();
        let mut failures: Vec<String> = Vec::new();

        info!(
            "🎬 Acquiring transcript for {} (budget {:.0}s)",
            video_id,
            budget.as_secs_f64()
        );

        for descriptor in STRATEGY_CHAIN {
            let remaining = budget.saturating_sub(started.elapsed());
            if remaining < descriptor.min_budget {
                debug!(
                    "Skipping strategy '{}': {:.1}s remaining, needs {:.1}s",
                    descriptor.name,
                    remaining.as_secs_f64(),
                    descriptor.min_budget.as_secs_f64()
                );
                failures.push(format!(
                    "{}: skipped ({:.1}s remaining)",
                    descriptor.name,
                    remaining.as_secs_f64()
                ));
                continue;
            }

            debug!(
                "Trying strategy '{}' with {:.1}s remaining",
                descriptor.name,
                remaining.as_secs_f64()
            );
            match timeout(remaining, self.run_strategy(descriptor.kind, video_id)).await {
                Ok(Ok(entries)) if !entries.is_empty() => {
                    info!(
                        "✅ Strategy '{}' produced {} segments in {:.1}s",
                        descriptor.name,
                        entries.len(),
                        started.elapsed().as_secs_f64()
                    );
                    return Ok(entries);
                }
                Ok(Ok(_)) => {
                    warn!("Strategy '{}' returned no segments", descriptor.name);
                    failures.push(format!("{}: returned no segments", descriptor.name));
                }
                Ok(Err(e)) => {
                    warn!("Strategy '{}' failed: {}", descriptor.name, e);
                    failures.push(format!("{}: {}", descriptor.name, e));
                }
                Err(_) => {
                    warn!("Strategy '{}' timed out", descriptor.name);
                    failures.push(format!("{}: timed out", descriptor.name));
                }
            }
        }

        Err(PipelineError::AcquisitionExhausted(failures.join("; ")))
    }

    async fn run_strategy(
        &self,
        kind: StrategyKind,
        video_id: &str,
    ) -> Result<Vec<TranscriptEntry>> {
        match kind {
            StrategyKind::PreferredTrack => self.preferred_track(video_id).await,
            StrategyKind::AnyTrackTranslated => self.any_track_translated(video_id).await,
            StrategyKind::DirectFetch => {
                self.backend
                    .fetch_best(video_id, &self.config.preferred_languages, true)
                    .await
            }
            StrategyKind::DirectFetchNoProxy => {
                self.backend
                    .fetch_best(video_id, &self.config.preferred_languages, false)
                    .await
            }
            StrategyKind::WatchPageScrape => {
                scrape::scrape_transcript(
                    &self.scrape_client,
                    video_id,
                    &self.config.preferred_languages,
                )
                .await
            }
        }
    }

    /// Scan preferred language codes in order, fetch the first match
    async fn preferred_track(&self, video_id: &str) -> Result<Vec<TranscriptEntry>> {
        let tracks = self.backend.list_tracks(video_id).await?;
        for lang in &self.config.preferred_languages {
            if let Some(track) = tracks.iter().find(|t| t.language_code == *lang) {
                debug!("Found preferred track '{}'", track.language_code);
                return self.backend.fetch_track(track).await;
            }
        }
        Err(anyhow!(
            "no track matched preferred languages {:?}",
            self.config.preferred_languages
        ))
    }

    /// Take the first track of any language; translate it when foreign
    ///
    /// Translation failure falls back to the untranslated track.
    async fn any_track_translated(&self, video_id: &str) -> Result<Vec<TranscriptEntry>> {
        let tracks = self.backend.list_tracks(video_id).await?;
        let track = tracks
            .first()
            .ok_or_else(|| anyhow!("no caption tracks available"))?;

        if self
            .config
            .preferred_languages
            .iter()
            .any(|l| *l == track.language_code)
        {
            return self.backend.fetch_track(track).await;
        }

        match self
            .backend
            .fetch_translated(track, &self.config.translation_language)
            .await
        {
            Ok(entries) => {
                debug!(
                    "Translated '{}' track to '{}'",
                    track.language_code, self.config.translation_language
                );
                Ok(entries)
            }
            Err(e) => {
                warn!(
                    "Translation of '{}' failed ({}), using untranslated track",
                    track.language_code, e
                );
                self.backend.fetch_track(track).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::captions::CaptionTrack;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entry() -> TranscriptEntry {
        TranscriptEntry::new("hello", 0.0, 2.0)
    }

    fn track(lang: &str, translatable: bool) -> CaptionTrack {
        CaptionTrack {
            language_code: lang.to_string(),
            language_name: lang.to_uppercase(),
            is_generated: false,
            is_translatable: translatable,
            base_url: format!("https://example.test/tt?lang={}", lang),
        }
    }

    struct ScriptedBackend {
        tracks: Vec<CaptionTrack>,
        fail_translation: bool,
        list_calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(tracks: Vec<CaptionTrack>) -> Self {
            Self {
                tracks,
                fail_translation: false,
                list_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CaptionBackend for ScriptedBackend {
        async fn list_tracks(&self, _video_id: &str) -> Result<Vec<CaptionTrack>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.tracks.is_empty() {
                return Err(anyhow!("no tracks"));
            }
            Ok(self.tracks.clone())
        }

        async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<TranscriptEntry>> {
            Ok(vec![TranscriptEntry::new(
                format!("untranslated {}", track.language_code),
                0.0,
                2.0,
            )])
        }

        async fn fetch_translated(
            &self,
            track: &CaptionTrack,
            target: &str,
        ) -> Result<Vec<TranscriptEntry>> {
            if self.fail_translation {
                return Err(anyhow!("translation backend down"));
            }
            Ok(vec![TranscriptEntry::new(
                format!("{} translated to {}", track.language_code, target),
                0.0,
                2.0,
            )])
        }

        async fn fetch_best(
            &self,
            _video_id: &str,
            _preferred: &[String],
            _use_proxy: bool,
        ) -> Result<Vec<TranscriptEntry>> {
            Err(anyhow!("direct fetch unavailable"))
        }
    }

    fn acquirer(backend: ScriptedBackend) -> TranscriptAcquirer {
        TranscriptAcquirer::new(
            Arc::new(backend),
            scrape::scrape_client(5),
            AcquirerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_preferred_track_wins_first() {
        let backend = ScriptedBackend::new(vec![track("de", true), track("en", false)]);
        let acquirer = acquirer(backend);

        let entries = acquirer
            .acquire("vid1", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(entries[0].text, "untranslated en");
    }

    #[tokio::test]
    async fn test_foreign_track_is_translated() {
        let backend = ScriptedBackend::new(vec![track("de", true)]);
        let acquirer = acquirer(backend);

        let entries = acquirer
            .acquire("vid1", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(entries[0].text, "de translated to en");
    }

    #[tokio::test]
    async fn test_translation_failure_falls_back_to_untranslated() {
        let mut backend = ScriptedBackend::new(vec![track("de", true)]);
        backend.fail_translation = true;
        let acquirer = acquirer(backend);

        let entries = acquirer
            .acquire("vid1", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(entries[0].text, "untranslated de");
    }

    #[tokio::test]
    async fn test_tiny_budget_skips_every_strategy() {
        let backend = ScriptedBackend::new(vec![track("en", false)]);
        let acquirer = acquirer(backend);

        let started = std::time::Instant::now();
        let err = acquirer
            .acquire("vid1", Duration::from_secs(1))
            .await
            .unwrap_err();
        // Nothing viable under a 1s budget, so the chain fails without
        // attempting a single network call.
        assert!(started.elapsed() < Duration::from_secs(1));
        match err {
            PipelineError::AcquisitionExhausted(msg) => {
                assert!(msg.contains("skipped"));
                assert!(msg.contains("preferred-language track"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_exhausted_chain_aggregates_failures() {
        let backend = ScriptedBackend::new(Vec::new());
        let acquirer = acquirer(backend);

        // A 4s budget attempts the lightweight strategies and skips the
        // 5s-minimum translation and scrape fallbacks, keeping the test
        // off the network.
        let err = acquirer
            .acquire("vid1", Duration::from_secs(4))
            .await
            .unwrap_err();
        match err {
            PipelineError::AcquisitionExhausted(msg) => {
                assert!(msg.contains("no tracks"));
                assert!(msg.contains("direct fetch unavailable"));
                assert!(msg.contains("watch-page scrape: skipped"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

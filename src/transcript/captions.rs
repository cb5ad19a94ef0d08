/// Structured caption backend client
///
/// Talks to the video platform's caption endpoints: enumerates available
/// tracks from the watch page's embedded player configuration and fetches
/// track content in the JSON timed-text format.
use super::TranscriptEntry;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One available caption track for a video
#[derive(Debug, Clone)]
pub struct CaptionTrack {
    /// BCP-47 style language code, e.g. "en" or "pt-BR"
    pub language_code: String,
    /// Human readable language name
    pub language_name: String,
    /// True for auto-generated (ASR) tracks
    pub is_generated: bool,
    /// True when the platform can machine-translate this track
    pub is_translatable: bool,
    /// Fetch URL for the track content
    pub base_url: String,
}

/// Caption/transcript backend boundary
///
/// The Acquirer drives this; tests substitute mocks. `use_proxy: false` on
/// `fetch_best` forces the egress path with no proxy configured.
#[async_trait]
pub trait CaptionBackend: Send + Sync {
    /// List all caption tracks available for the video
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>>;

    /// Fetch a track's transcript entries
    async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<TranscriptEntry>>;

    /// Fetch a track machine-translated to `target_language`
    async fn fetch_translated(
        &self,
        track: &CaptionTrack,
        target_language: &str,
    ) -> Result<Vec<TranscriptEntry>>;

    /// Single-call fetch that resolves language preference internally
    async fn fetch_best(
        &self,
        video_id: &str,
        preferred_languages: &[String],
        use_proxy: bool,
    ) -> Result<Vec<TranscriptEntry>>;
}

/// reqwest-backed caption client
///
/// Holds two clients: one routed through the configured proxy (when set)
/// and one that always goes direct.
#[derive(Debug, Clone)]
pub struct TimedTextClient {
    client: Client,
    direct_client: Client,
}

impl TimedTextClient {
    pub fn new(timeout_seconds: u64, proxy_url: Option<&str>) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_seconds);

        let mut builder = Client::builder().timeout(timeout).user_agent(USER_AGENT);
        if let Some(proxy) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        let client = builder.build()?;

        let direct_client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            direct_client,
        })
    }

    fn pick_client(&self, use_proxy: bool) -> &Client {
        if use_proxy {
            &self.client
        } else {
            &self.direct_client
        }
    }

    async fn list_tracks_with(&self, client: &Client, video_id: &str) -> Result<Vec<CaptionTrack>> {
        let url = format!("{}{}", WATCH_URL, urlencoding::encode(video_id));
        debug!("Listing caption tracks for {}", video_id);

        let html = client.get(&url).send().await?.error_for_status()?.text().await?;
        let captions_json = extract_captions_json(&html)
            .ok_or_else(|| anyhow!("no caption data in watch page for {}", video_id))?;

        let parsed: CaptionsRenderer = serde_json::from_str(captions_json)?;
        let tracks = parsed
            .player_captions_tracklist_renderer
            .map(|r| r.caption_tracks)
            .unwrap_or_default();

        if tracks.is_empty() {
            return Err(anyhow!("no caption tracks available for {}", video_id));
        }

        Ok(tracks
            .into_iter()
            .map(|t| CaptionTrack {
                language_code: t.language_code,
                language_name: t.name.map(|n| n.simple_text).unwrap_or_default(),
                is_generated: t.kind.as_deref() == Some("asr"),
                is_translatable: t.is_translatable.unwrap_or(false),
                base_url: t.base_url,
            })
            .collect())
    }

    async fn fetch_timed_text(&self, client: &Client, url: &str) -> Result<Vec<TranscriptEntry>> {
        let body = client.get(url).send().await?.error_for_status()?.text().await?;
        let entries = parse_json3(&body)?;
        if entries.is_empty() {
            return Err(anyhow!("caption track contained no usable segments"));
        }
        Ok(entries)
    }
}

#[async_trait]
impl CaptionBackend for TimedTextClient {
    async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>> {
        self.list_tracks_with(&self.client, video_id).await
    }

    async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<TranscriptEntry>> {
        let url = format!("{}&fmt=json3", track.base_url);
        self.fetch_timed_text(&self.client, &url).await
    }

    async fn fetch_translated(
        &self,
        track: &CaptionTrack,
        target_language: &str,
    ) -> Result<Vec<TranscriptEntry>> {
        if !track.is_translatable {
            return Err(anyhow!(
                "track {} is not translatable",
                track.language_code
            ));
        }
        let url = format!(
            "{}&fmt=json3&tlang={}",
            track.base_url,
            urlencoding::encode(target_language)
        );
        self.fetch_timed_text(&self.client, &url).await
    }

    async fn fetch_best(
        &self,
        video_id: &str,
        preferred_languages: &[String],
        use_proxy: bool,
    ) -> Result<Vec<TranscriptEntry>> {
        let client = self.pick_client(use_proxy);
        let tracks = self.list_tracks_with(client, video_id).await?;

        let track = preferred_languages
            .iter()
            .find_map(|lang| tracks.iter().find(|t| t.language_code == *lang))
            .unwrap_or(&tracks[0]);

        debug!(
            "Best-available fetch for {} picked track {} (proxy: {})",
            video_id, track.language_code, use_proxy
        );
        let url = format!("{}&fmt=json3", track.base_url);
        self.fetch_timed_text(client, &url).await
    }
}

/// Extract the player caption configuration JSON from watch-page HTML
///
/// The blob sits between the `"captions":` and `,"videoDetails"` markers in
/// the embedded player response.
pub fn extract_captions_json(html: &str) -> Option<&str> {
    let start = html.find("\"captions\":")? + "\"captions\":".len();
    let rest = &html[start..];
    let end = rest.find(",\"videoDetails\"")?;
    Some(rest[..end].trim())
}

#[derive(Debug, Deserialize)]
struct CaptionsRenderer {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct TracklistRenderer {
    #[serde(rename = "captionTracks", default)]
    caption_tracks: Vec<RawCaptionTrack>,
}

#[derive(Debug, Deserialize)]
struct RawCaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    name: Option<TrackName>,
    #[serde(rename = "languageCode")]
    language_code: String,
    kind: Option<String>,
    #[serde(rename = "isTranslatable")]
    is_translatable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TrackName {
    #[serde(rename = "simpleText")]
    simple_text: String,
}

#[derive(Debug, Deserialize)]
struct TimedTextBody {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Debug, Deserialize)]
struct TimedTextEvent {
    #[serde(rename = "tStartMs")]
    start_ms: Option<i64>,
    #[serde(rename = "dDurationMs")]
    duration_ms: Option<i64>,
    segs: Option<Vec<TimedTextSegment>>,
}

#[derive(Debug, Deserialize)]
struct TimedTextSegment {
    utf8: Option<String>,
}

/// Parse the JSON timed-text format into transcript entries
pub fn parse_json3(body: &str) -> Result<Vec<TranscriptEntry>> {
    let parsed: TimedTextBody = serde_json::from_str(body)?;
    let mut entries = Vec::new();

    for event in parsed.events {
        let segs = match event.segs {
            Some(segs) => segs,
            None => continue,
        };
        let text: String = segs.into_iter().filter_map(|s| s.utf8).collect();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let (start_ms, duration_ms) = match (event.start_ms, event.duration_ms) {
            (Some(s), Some(d)) => (s, d),
            _ => {
                warn!("Skipping caption event without timing fields");
                continue;
            }
        };
        entries.push(TranscriptEntry::new(
            text,
            start_ms as f64 / 1000.0,
            duration_ms as f64 / 1000.0,
        ));
    }

    entries.sort_by(|a, b| {
        a.start_seconds
            .partial_cmp(&b.start_seconds)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_captions_json() {
        let html = r#"prefix "captions":{"playerCaptionsTracklistRenderer":{}},"videoDetails":{"videoId":"x"} suffix"#;
        let json = extract_captions_json(html).unwrap();
        assert_eq!(json, r#"{"playerCaptionsTracklistRenderer":{}}"#);
    }

    #[test]
    fn test_extract_captions_json_missing_markers() {
        assert!(extract_captions_json("<html>no captions here</html>").is_none());
    }

    #[test]
    fn test_parse_json3_reconstructs_entries() {
        let body = r#"{"events":[
            {"tStartMs":0,"dDurationMs":3000,"segs":[{"utf8":"intro"}]},
            {"tStartMs":3000,"dDurationMs":2500,"segs":[{"utf8":"first "},{"utf8":"point"}]},
            {"tStartMs":6000,"dDurationMs":1000,"segs":[{"utf8":"\n"}]},
            {"tStartMs":7000,"dDurationMs":1000}
        ]}"#;
        let entries = parse_json3(body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "intro");
        assert_eq!(entries[0].start_seconds, 0.0);
        assert_eq!(entries[0].duration_seconds, 3.0);
        assert_eq!(entries[1].text, "first point");
    }

    #[test]
    fn test_parse_json3_orders_by_start() {
        let body = r#"{"events":[
            {"tStartMs":5000,"dDurationMs":1000,"segs":[{"utf8":"later"}]},
            {"tStartMs":1000,"dDurationMs":1000,"segs":[{"utf8":"earlier"}]}
        ]}"#;
        let entries = parse_json3(body).unwrap();
        assert_eq!(entries[0].text, "earlier");
        assert_eq!(entries[1].text, "later");
    }
}

/// Last-resort watch-page scraper
///
/// Fetches the raw video page over basic networking (no proxy, own client),
/// digs the embedded player configuration out of the HTML and rebuilds
/// transcript entries from the timed-text payload. Deliberately
/// self-contained so it keeps working when the structured client path is
/// blocked.
use super::TranscriptEntry;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const WATCH_URL: &str = "https://www.youtube.com/watch";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const CAPTIONS_START: &str = "\"captions\":";
const CAPTIONS_END: &str = ",\"videoDetails\"";

/// Build the plain client used by the scrape fallback
pub fn scrape_client(timeout_seconds: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(USER_AGENT)
        .no_proxy()
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Scrape transcript entries straight off the watch page
pub async fn scrape_transcript(
    client: &Client,
    video_id: &str,
    preferred_languages: &[String],
) -> Result<Vec<TranscriptEntry>> {
    let url = Url::parse_with_params(WATCH_URL, [("v", video_id)])
        .context("building watch page URL")?;
    info!("🌐 Scraping watch page for {}", video_id);

    let html = client
        .get(url)
        .send()
        .await
        .context("watch page request failed")?
        .error_for_status()?
        .text()
        .await?;

    let track_url = pick_track_url(&html, preferred_languages)
        .ok_or_else(|| anyhow!("no caption track URLs in watch page for {}", video_id))?;

    let caption_url = format!("{}&fmt=json3", track_url);
    debug!("Fetching scraped caption track");
    let body = client
        .get(&caption_url)
        .send()
        .await
        .context("caption track request failed")?
        .error_for_status()?
        .text()
        .await?;

    let entries = entries_from_timed_text(&body)?;
    if entries.is_empty() {
        return Err(anyhow!("scraped caption track contained no segments"));
    }
    info!("✅ Scraped {} transcript segments", entries.len());
    Ok(entries)
}

/// Locate the captions blob between its start/end markers and pick a track
fn pick_track_url(html: &str, preferred_languages: &[String]) -> Option<String> {
    let start = html.find(CAPTIONS_START)? + CAPTIONS_START.len();
    let rest = &html[start..];
    let end = rest.find(CAPTIONS_END)?;
    let blob: Value = serde_json::from_str(rest[..end].trim()).ok()?;

    let tracks = blob
        .get("playerCaptionsTracklistRenderer")?
        .get("captionTracks")?
        .as_array()?;

    let track_for = |lang: &str| {
        tracks.iter().find(|t| {
            t.get("languageCode").and_then(Value::as_str) == Some(lang)
        })
    };

    let track = preferred_languages
        .iter()
        .find_map(|lang| track_for(lang))
        .or_else(|| tracks.first())?;

    track
        .get("baseUrl")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

/// Rebuild entries from the per-segment timing fields of the payload
fn entries_from_timed_text(body: &str) -> Result<Vec<TranscriptEntry>> {
    let parsed: Value = serde_json::from_str(body).context("caption payload is not JSON")?;
    let events = parsed
        .get("events")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("caption payload has no events"))?;

    let mut entries = Vec::new();
    for event in events {
        let segs = match event.get("segs").and_then(Value::as_array) {
            Some(segs) => segs,
            None => continue,
        };
        let text: String = segs
            .iter()
            .filter_map(|s| s.get("utf8").and_then(Value::as_str))
            .collect();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        let start_ms = event.get("tStartMs").and_then(Value::as_i64);
        let duration_ms = event.get("dDurationMs").and_then(Value::as_i64);
        if let (Some(start_ms), Some(duration_ms)) = (start_ms, duration_ms) {
            entries.push(TranscriptEntry::new(
                text,
                start_ms as f64 / 1000.0,
                duration_ms as f64 / 1000.0,
            ));
        }
    }

    entries.sort_by(|a, b| {
        a.start_seconds
            .partial_cmp(&b.start_seconds)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(entries)
}

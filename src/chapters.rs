/// Chapter list parsing
///
/// Turns the model's raw `TIMESTAMP - Title` lines into structured chapters
/// for API responses. Lines that don't carry a leading timestamp are
/// dropped rather than failing the whole result.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A single chapter in the generated outline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChapterInfo {
    /// Timestamp exactly as emitted, e.g. "04:35" or "01:02:10"
    pub timestamp: String,
    /// Chapter title
    pub title: String,
}

fn chapter_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*((?:\d{1,2}:)?\d{1,2}:\d{2})\s*[-–—]?\s*(.+?)\s*$").unwrap()
    })
}

/// Parse generated chapters text into structured entries
pub fn parse_chapters(text: &str) -> Vec<ChapterInfo> {
    text.lines()
        .filter_map(|line| {
            let caps = chapter_line_re().captures(line)?;
            let title = caps[2].trim();
            if title.is_empty() {
                return None;
            }
            Some(ChapterInfo {
                timestamp: caps[1].to_string(),
                title: title.to_string(),
            })
        })
        .collect()
}

/// Normalized display text: one `TIMESTAMP - Title` line per chapter
pub fn format_chapters(chapters: &[ChapterInfo]) -> String {
    chapters
        .iter()
        .map(|c| format!("{} - {}", c.timestamp, c.title))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_lines() {
        let chapters = parse_chapters("00:00 - Intro\n04:35 - Main topic\n12:10 - Summary");
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].timestamp, "00:00");
        assert_eq!(chapters[0].title, "Intro");
        assert_eq!(chapters[2].title, "Summary");
    }

    #[test]
    fn test_parse_hour_timestamps() {
        let chapters = parse_chapters("00:00:00 - Start\n01:02:10 - Deep dive");
        assert_eq!(chapters[1].timestamp, "01:02:10");
    }

    #[test]
    fn test_parse_tolerates_missing_dash_and_noise() {
        let chapters = parse_chapters("00:00 Intro\nHere are your chapters:\n02:00 - Next");
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "Intro");
        assert_eq!(chapters[1].title, "Next");
    }

    #[test]
    fn test_format_round_trip() {
        let chapters = vec![
            ChapterInfo {
                timestamp: "00:00".to_string(),
                title: "Intro".to_string(),
            },
            ChapterInfo {
                timestamp: "03:20".to_string(),
                title: "Middle".to_string(),
            },
        ];
        assert_eq!(format_chapters(&chapters), "00:00 - Intro\n03:20 - Middle");
    }
}

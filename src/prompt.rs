/// Prompt construction for chapter generation
///
/// Pure, deterministic step between transcript and model: renders timed
/// lines, picks the chapter-count band from the video duration, and bounds
/// the combined input with a lossy truncation when it would blow the
/// model's ceiling.
use crate::transcript::TranscriptEntry;

/// Rough token estimate used for input bounding
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Render a timestamp as MM:SS, or HH:MM:SS when the video runs past an hour
pub fn format_timestamp(seconds: f64, include_hours: bool) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if include_hours {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", total / 60, secs)
    }
}

/// Chapter-count band for the instruction template
pub fn chapter_count_band(duration_minutes: f64) -> &'static str {
    if duration_minutes < 10.0 {
        "3-5"
    } else if duration_minutes < 20.0 {
        "5-7"
    } else if duration_minutes < 40.0 {
        "8-10"
    } else if duration_minutes < 60.0 {
        "10-12"
    } else {
        "12-15"
    }
}

/// System instruction and transcript content for one generation call
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub system_prompt: String,
    pub transcript_text: String,
}

/// Render entries as `MM:SS - text` lines, one per entry
pub fn render_transcript(entries: &[TranscriptEntry], duration_minutes: f64) -> String {
    let include_hours = duration_minutes > 60.0;
    entries
        .iter()
        .map(|e| {
            format!(
                "{} - {}",
                format_timestamp(e.start_seconds, include_hours),
                e.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the fixed instruction template for a video of the given duration
pub fn build_system_prompt(duration_minutes: f64) -> String {
    let band = chapter_count_band(duration_minutes);
    format!(
        "You are an expert at creating video chapter outlines from transcripts.\n\
         The video is {:.1} minutes long. Produce {} chapters.\n\
         \n\
         Rules:\n\
         1. The first chapter must start at 00:00.\n\
         2. Every chapter timestamp must be copied verbatim from the transcript. Never invent or round timestamps.\n\
         3. Timestamps must be strictly ascending.\n\
         4. Space chapters naturally across the video; do not cluster them.\n\
         5. Output one chapter per line in the format: TIMESTAMP - Title\n\
         6. Output nothing but the chapter lines.",
        duration_minutes, band
    )
}

/// Build the generation input, truncating the transcript to fit the ceiling
///
/// Truncation drops the transcript tail; it never summarizes. The cut lands
/// on a character boundary.
pub fn build_generation_input(
    entries: &[TranscriptEntry],
    duration_minutes: f64,
    max_input_tokens: usize,
) -> GenerationInput {
    let system_prompt = build_system_prompt(duration_minutes);
    let mut transcript_text = render_transcript(entries, duration_minutes);

    let system_tokens = estimate_tokens(&system_prompt);
    let budget_tokens = max_input_tokens.saturating_sub(system_tokens);
    if estimate_tokens(&transcript_text) > budget_tokens {
        let mut cut = budget_tokens * 4;
        while cut > 0 && !transcript_text.is_char_boundary(cut) {
            cut -= 1;
        }
        transcript_text.truncate(cut);
        tracing::warn!(
            "✂️ Transcript truncated to ~{} tokens to fit model input ceiling",
            budget_tokens
        );
    }

    GenerationInput {
        system_prompt,
        transcript_text,
    }
}

/// Chapter generation over an ordered list of model variants
///
/// Each variant gets one bounded-time call; transport errors and outputs
/// that fail the syntactic checks move the chain to the next variant. The
/// first valid output wins. Validation is format-only; whether the chapter
/// boundaries make sense is a model-quality concern, not ours.
use crate::error::{PipelineError, PipelineResult};
use crate::llm::TextGenerator;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ChapterGenerator {
    backend: Arc<dyn TextGenerator>,
    model_variants: Vec<String>,
}

impl ChapterGenerator {
    pub fn new(backend: Arc<dyn TextGenerator>, model_variants: Vec<String>) -> Self {
        Self {
            backend,
            model_variants,
        }
    }

    /// Generate chapters text, falling through model variants
    pub async fn generate(
        &self,
        system_prompt: &str,
        transcript_text: &str,
    ) -> PipelineResult<String> {
        let mut failures: Vec<String> = Vec::new();

        for variant in &self.model_variants {
            debug!("Generating chapters with model variant '{}'", variant);
            match self
                .backend
                .generate(variant, system_prompt, transcript_text)
                .await
            {
                Ok(response) => {
                    let output = response.content.trim().to_string();
                    match validate_chapters_text(&output) {
                        Ok(()) => {
                            info!(
                                "✅ Model '{}' produced valid chapters ({} tokens)",
                                variant,
                                response
                                    .tokens_used
                                    .map(|t| t.to_string())
                                    .unwrap_or_else(|| "?".to_string())
                            );
                            return Ok(output);
                        }
                        Err(why) => {
                            warn!("Model '{}' output rejected: {}", variant, why);
                            failures.push(format!("{}: {}", variant, why));
                        }
                    }
                }
                Err(e) => {
                    warn!("Model '{}' call failed: {}", variant, e);
                    failures.push(format!("{}: {}", variant, e));
                }
            }
        }

        Err(PipelineError::GenerationExhausted(failures.join("; ")))
    }

    /// Two-pass refinement: draft, then cross-check against the transcript
    ///
    /// Doubles external-call latency; only the synchronous legacy route uses
    /// it. A refinement pass that fails entirely falls back to the draft.
    pub async fn generate_refined(
        &self,
        system_prompt: &str,
        transcript_text: &str,
    ) -> PipelineResult<String> {
        let draft = self.generate(system_prompt, transcript_text).await?;

        let review_prompt =
            "Cross-check the draft chapter list against the transcript and correct it so it \
             follows the required format rules: first chapter at 00:00, timestamps copied \
             verbatim from the transcript, strictly ascending, one 'TIMESTAMP - Title' line \
             per chapter, nothing else in the output.";
        let review_content = format!("Draft chapters:\n{}\n\nTranscript:\n{}", draft, transcript_text);

        match self.generate(review_prompt, &review_content).await {
            Ok(refined) => Ok(refined),
            Err(e) => {
                warn!("Refinement pass failed ({}), keeping draft", e);
                Ok(draft)
            }
        }
    }
}

/// Syntactic checks on generated chapter text
///
/// Output must be non-empty, span at least two lines, and open with a
/// `00:00` timestamp token.
pub fn validate_chapters_text(text: &str) -> Result<(), String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("output is empty".to_string());
    }

    let lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() < 2 {
        return Err(format!("output has {} line(s), need at least 2", lines.len()));
    }

    if !lines[0].trim_start().starts_with("00:00") {
        return Err("first line does not start at 00:00".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationProvider, GenerationResponse};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedGenerator {
        outputs: HashMap<String, Result<String, String>>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(outputs: Vec<(&str, Result<String, String>)>) -> Self {
            Self {
                outputs: outputs
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            model: &str,
            _system: &str,
            _content: &str,
        ) -> Result<GenerationResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outputs.get(model) {
                Some(Ok(content)) => Ok(GenerationResponse {
                    content: content.clone(),
                    tokens_used: Some(10),
                }),
                Some(Err(msg)) => Err(anyhow!("{}", msg.clone())),
                None => Err(anyhow!("unknown model {}", model)),
            }
        }

        fn provider_type(&self) -> GenerationProvider {
            GenerationProvider::Gemini
        }
    }

    const VALID: &str = "00:00 - Intro\n02:15 - Main point\n08:40 - Wrap up";

    #[test]
    fn test_validation_rules() {
        assert!(validate_chapters_text(VALID).is_ok());
        assert!(validate_chapters_text("").is_err());
        assert!(validate_chapters_text("00:00 - Only line").is_err());
        assert!(validate_chapters_text("01:00 - Starts late\n02:00 - More").is_err());
        // Leading whitespace before the timestamp is tolerated
        assert!(validate_chapters_text("  00:00 - Intro\n01:00 - Next").is_ok());
    }

    #[tokio::test]
    async fn test_first_valid_variant_wins() {
        let backend = ScriptedGenerator::new(vec![("primary", Ok(VALID.to_string()))]);
        let generator = ChapterGenerator::new(
            Arc::new(backend),
            vec!["primary".to_string(), "fallback".to_string()],
        );

        let out = generator.generate("sys", "transcript").await.unwrap();
        assert_eq!(out, VALID);
    }

    #[tokio::test]
    async fn test_single_line_primary_falls_through_to_fallback() {
        let backend = ScriptedGenerator::new(vec![
            ("primary", Ok("00:00 - Single line only".to_string())),
            ("fallback", Ok(VALID.to_string())),
        ]);
        let generator = ChapterGenerator::new(
            Arc::new(backend),
            vec!["primary".to_string(), "fallback".to_string()],
        );

        let out = generator.generate("sys", "transcript").await.unwrap();
        assert_eq!(out, VALID);
    }

    #[tokio::test]
    async fn test_transport_error_falls_through() {
        let backend = ScriptedGenerator::new(vec![
            ("primary", Err("connection refused".to_string())),
            ("fallback", Ok(VALID.to_string())),
        ]);
        let generator = ChapterGenerator::new(
            Arc::new(backend),
            vec!["primary".to_string(), "fallback".to_string()],
        );

        assert_eq!(generator.generate("sys", "t").await.unwrap(), VALID);
    }

    #[tokio::test]
    async fn test_exhausted_variants_aggregate_failures() {
        let backend = ScriptedGenerator::new(vec![
            ("primary", Err("timeout".to_string())),
            ("fallback", Ok("no timestamps here\nat all".to_string())),
        ]);
        let generator = ChapterGenerator::new(
            Arc::new(backend),
            vec!["primary".to_string(), "fallback".to_string()],
        );

        let err = generator.generate("sys", "t").await.unwrap_err();
        match err {
            PipelineError::GenerationExhausted(msg) => {
                assert!(msg.contains("primary: timeout"));
                assert!(msg.contains("fallback:"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_refinement_failure_keeps_draft() {
        // Backend succeeds on the draft pass, dies on the refinement pass
        struct TwoPass {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl TextGenerator for TwoPass {
            async fn generate(
                &self,
                _model: &str,
                _system: &str,
                _content: &str,
            ) -> Result<GenerationResponse> {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call == 0 {
                    Ok(GenerationResponse {
                        content: VALID.to_string(),
                        tokens_used: None,
                    })
                } else {
                    Err(anyhow!("refinement backend down"))
                }
            }

            fn provider_type(&self) -> GenerationProvider {
                GenerationProvider::Gemini
            }
        }

        let generator = ChapterGenerator::new(
            Arc::new(TwoPass {
                calls: AtomicUsize::new(0),
            }),
            vec!["only".to_string()],
        );

        let out = generator.generate_refined("sys", "t").await.unwrap();
        assert_eq!(out, VALID);
    }
}

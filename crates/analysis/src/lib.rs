//! Content-analysis stages for the executive-presence pipeline
//!
//! Each stage issues one structured-generation request against a fixed
//! rubric, defensively extracts the JSON span from the free-form response,
//! and degrades to a documented neutral default when the collaborator
//! misbehaves. One noisy dimension must not sink an otherwise-successful
//! job, so the stage entry points never return an error: transport failures
//! are retried with bounded backoff and then folded into the same fallback.
//!
//! The stages are mutually independent: both read only the transcript, so
//! the orchestrator is free to run them concurrently.

pub mod coaching;
pub mod gravitas;
pub mod json;
pub mod model;
pub mod storytelling;

pub use model::{AnalysisConfig, AnalysisModel, HttpAnalysisModel};

use presence_common::{AnalysisResult, Result, RetryPolicy, Transcript};
use std::collections::BTreeMap;
use tracing::warn;

const GRAVITAS_MAX_TOKENS: u32 = 600;
const STORYTELLING_MAX_TOKENS: u32 = 500;
const COACHING_MAX_TOKENS: u32 = 400;

/// Issue one completion with bounded retries on transport failure
async fn complete_with_retry(
    model: &dyn AnalysisModel,
    prompt: &str,
    max_tokens: u32,
    policy: &RetryPolicy,
) -> Result<String> {
    let mut last_error = presence_common::PipelineError::ModelUnavailable(
        "no attempts made".to_string(),
    );

    for attempt in 1..=policy.max_attempts {
        match model.complete(prompt, max_tokens).await {
            Ok(text) => return Ok(text),
            Err(e) => {
                warn!(
                    "Analysis request attempt {}/{} failed: {}",
                    attempt, policy.max_attempts, e
                );
                last_error = e;
            }
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.delay_after(attempt)).await;
        }
    }

    Err(last_error)
}

/// Run the gravitas analysis stage. Never fails: degraded responses fall
/// back to the neutral default.
pub async fn analyze_gravitas(
    model: &dyn AnalysisModel,
    transcript: &Transcript,
    policy: &RetryPolicy,
) -> AnalysisResult {
    let prompt = gravitas::prompt(&transcript.text);
    match complete_with_retry(model, &prompt, GRAVITAS_MAX_TOKENS, policy).await {
        Ok(text) => gravitas::parse_response(&text).unwrap_or_else(|| {
            warn!("Gravitas response could not be parsed, using fallback default");
            gravitas::fallback()
        }),
        Err(e) => {
            warn!("Gravitas analysis unavailable, using fallback default: {}", e);
            gravitas::fallback()
        }
    }
}

/// Run the storytelling analysis stage. Never fails: degraded responses
/// fall back to the neutral default; a transcript that genuinely has no
/// story comes back `not_applicable`.
pub async fn analyze_storytelling(
    model: &dyn AnalysisModel,
    transcript: &Transcript,
    policy: &RetryPolicy,
) -> AnalysisResult {
    let prompt = storytelling::prompt(&transcript.text);
    match complete_with_retry(model, &prompt, STORYTELLING_MAX_TOKENS, policy).await {
        Ok(text) => storytelling::parse_response(&text).unwrap_or_else(|| {
            warn!("Storytelling response could not be parsed, using fallback default");
            storytelling::fallback()
        }),
        Err(e) => {
            warn!(
                "Storytelling analysis unavailable, using fallback default: {}",
                e
            );
            storytelling::fallback()
        }
    }
}

/// Run the coaching synthesis stage over the merged analysis results.
/// Never fails: any unusable outcome yields the fixed default tip list.
pub async fn generate_coaching_tips(
    model: &dyn AnalysisModel,
    dimensions: &BTreeMap<String, AnalysisResult>,
    policy: &RetryPolicy,
) -> Vec<String> {
    let prompt = coaching::prompt(dimensions);
    match complete_with_retry(model, &prompt, COACHING_MAX_TOKENS, policy).await {
        Ok(text) => coaching::parse_response(&text).unwrap_or_else(|| {
            warn!("Coaching response could not be parsed, using default tips");
            coaching::fallback()
        }),
        Err(e) => {
            warn!("Coaching synthesis unavailable, using default tips: {}", e);
            coaching::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_common::PipelineError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedModel {
        response: Option<&'static str>,
        calls: AtomicU32,
    }

    impl FixedModel {
        fn responding(response: &'static str) -> Self {
            Self {
                response: Some(response),
                calls: AtomicU32::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                response: None,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl AnalysisModel for FixedModel {
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.response {
                Some(text) => Ok(text.to_string()),
                None => Err(PipelineError::ModelUnavailable("502".to_string())),
            }
        }
    }

    fn transcript() -> Transcript {
        Transcript {
            text: "last spring our rollout stalled, so we rebuilt the plan around three \
                   customer commitments and shipped two weeks early"
                .to_string(),
            duration: 42.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_gravitas_happy_path() {
        let model = FixedModel::responding(
            r#"{"commanding_presence": 75, "decisiveness": 82, "poise_under_pressure": 64,
                "emotional_intelligence": 70, "vision_articulation": 77,
                "overall_gravitas": 73.6, "key_observations": ["Decisive framing"]}"#,
        );
        let result = analyze_gravitas(&model, &transcript(), &RetryPolicy::immediate(3)).await;
        assert_eq!(result.overall, 73.6);
        assert!(!result.degraded);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gravitas_malformed_response_falls_back_without_retry() {
        let model = FixedModel::responding("I am unable to score this transcript.");
        let result = analyze_gravitas(&model, &transcript(), &RetryPolicy::immediate(3)).await;
        assert!(result.degraded);
        assert!(result.scores.values().all(|s| *s == 60.0));
        // A parseable-but-useless response is a fallback, not a retry
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gravitas_transport_failure_retries_then_falls_back() {
        let model = FixedModel::failing();
        let result = analyze_gravitas(&model, &transcript(), &RetryPolicy::immediate(3)).await;
        assert!(result.degraded);
        assert_eq!(result.overall, 60.0);
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_storytelling_no_story() {
        let model = FixedModel::responding(r#"{"has_story": false, "observations": []}"#);
        let result =
            analyze_storytelling(&model, &transcript(), &RetryPolicy::immediate(3)).await;
        assert!(result.not_applicable);
        assert!(!result.degraded);
    }

    #[tokio::test]
    async fn test_coaching_failure_yields_default_tips() {
        let model = FixedModel::failing();
        let tips =
            generate_coaching_tips(&model, &BTreeMap::new(), &RetryPolicy::immediate(2)).await;
        assert_eq!(tips, coaching::fallback());
    }

    #[tokio::test]
    async fn test_coaching_parses_tip_list() {
        let model =
            FixedModel::responding(r#"["Lead with the decision", "Pause after key numbers"]"#);
        let tips =
            generate_coaching_tips(&model, &BTreeMap::new(), &RetryPolicy::immediate(2)).await;
        assert_eq!(tips.len(), 2);
        assert_eq!(tips[0], "Lead with the decision");
    }
}

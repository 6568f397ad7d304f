//! Gravitas analysis stage
//!
//! Scores a transcript along five leadership-delivery sub-dimensions via one
//! structured-generation request. Malformed or unreachable collaborator
//! responses degrade to the neutral default instead of failing the job.

use crate::json::extract_json_object;
use presence_common::AnalysisResult;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Dimension name used to key results and weights
pub const DIMENSION: &str = "gravitas";

/// Neutral score used when the analysis is unavailable
pub const FALLBACK_SCORE: f64 = 60.0;

const SUB_SCORES: &[&str] = &[
    "commanding_presence",
    "decisiveness",
    "poise_under_pressure",
    "emotional_intelligence",
    "vision_articulation",
];

/// Build the rubric prompt for one transcript
#[must_use]
pub fn prompt(transcript_text: &str) -> String {
    format!(
        r#"Analyze this executive's transcript for GRAVITAS indicators. Score each dimension 0-100:

**Transcript:**
{transcript_text}

**Gravitas Dimensions:**
1. **Commanding Presence**: Directness, confident language, reduced hedging
2. **Decisiveness**: Clear decisions, reasoning with 'because/therefore', closure statements
3. **Poise Under Pressure**: Calm framing, problem decomposition when discussing challenges
4. **Emotional Intelligence**: Empathy markers, stakeholder framing, ownership, respectful language
5. **Vision Articulation**: Clear why/what/how, outcomes, strategic alignment

Provide JSON response:
{{
  "commanding_presence": float,
  "decisiveness": float,
  "poise_under_pressure": float,
  "emotional_intelligence": float,
  "vision_articulation": float,
  "overall_gravitas": float,
  "key_observations": ["point 1", "point 2"]
}}"#
    )
}

#[derive(Debug, Deserialize)]
struct GravitasResponse {
    commanding_presence: f64,
    decisiveness: f64,
    poise_under_pressure: f64,
    emotional_intelligence: f64,
    vision_articulation: f64,
    overall_gravitas: f64,
    #[serde(default)]
    key_observations: Vec<String>,
}

/// Parse the collaborator's free-form response into a result.
/// Returns `None` when no well-formed rubric object can be located.
#[must_use]
pub fn parse_response(text: &str) -> Option<AnalysisResult> {
    let span = extract_json_object(text)?;
    let response: GravitasResponse = serde_json::from_str(&span).ok()?;

    let mut scores = BTreeMap::new();
    scores.insert("commanding_presence".to_string(), response.commanding_presence);
    scores.insert("decisiveness".to_string(), response.decisiveness);
    scores.insert(
        "poise_under_pressure".to_string(),
        response.poise_under_pressure,
    );
    scores.insert(
        "emotional_intelligence".to_string(),
        response.emotional_intelligence,
    );
    scores.insert("vision_articulation".to_string(), response.vision_articulation);

    Some(AnalysisResult {
        scores,
        overall: response.overall_gravitas,
        observations: response.key_observations,
        not_applicable: false,
        degraded: false,
    })
}

/// The documented neutral default: every sub-score at the mid-scale value,
/// explicitly marked as unavailable
#[must_use]
pub fn fallback() -> AnalysisResult {
    let scores = SUB_SCORES
        .iter()
        .map(|name| ((*name).to_string(), FALLBACK_SCORE))
        .collect();

    AnalysisResult {
        scores,
        overall: FALLBACK_SCORE,
        observations: vec!["Analysis unavailable".to_string()],
        not_applicable: false,
        degraded: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed_response() {
        let text = r#"{
            "commanding_presence": 78.0,
            "decisiveness": 71.0,
            "poise_under_pressure": 65.0,
            "emotional_intelligence": 80.0,
            "vision_articulation": 74.0,
            "overall_gravitas": 73.6,
            "key_observations": ["Strong ownership language"]
        }"#;

        let result = parse_response(text).unwrap();
        assert_eq!(result.overall, 73.6);
        assert_eq!(result.scores.len(), 5);
        assert_eq!(result.scores["commanding_presence"], 78.0);
        assert!(!result.degraded);
        assert!(!result.not_applicable);
    }

    #[test]
    fn test_parse_response_wrapped_in_prose() {
        let text = concat!(
            "Sure! Based on the transcript:\n```json\n",
            r#"{"commanding_presence": 60, "decisiveness": 60, "poise_under_pressure": 60,
               "emotional_intelligence": 60, "vision_articulation": 60,
               "overall_gravitas": 60, "key_observations": []}"#,
            "\n```\nLet me know if you need more detail."
        );
        assert!(parse_response(text).is_some());
    }

    #[test]
    fn test_malformed_response_yields_none() {
        assert!(parse_response("I could not analyze this transcript.").is_none());
        assert!(parse_response(r#"{"commanding_presence": "high"}"#).is_none());
    }

    #[test]
    fn test_fallback_is_neutral_and_marked() {
        let result = fallback();
        assert_eq!(result.overall, FALLBACK_SCORE);
        assert_eq!(result.scores.len(), 5);
        assert!(result.scores.values().all(|s| *s == FALLBACK_SCORE));
        assert!(result.degraded);
        assert_eq!(result.observations, vec!["Analysis unavailable"]);
    }

    #[test]
    fn test_prompt_embeds_transcript() {
        let p = prompt("we shipped the migration on time");
        assert!(p.contains("we shipped the migration on time"));
        assert!(p.contains("overall_gravitas"));
    }
}

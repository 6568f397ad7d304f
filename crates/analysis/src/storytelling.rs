//! Storytelling analysis stage
//!
//! Detects whether the transcript carries a narrative and, if so, scores
//! its structure. A transcript with no story is a legitimate outcome
//! (`not_applicable`), distinct from the degraded fallback used when the
//! collaborator response cannot be parsed.

use crate::json::extract_json_object;
use presence_common::AnalysisResult;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Dimension name used to key results and weights
pub const DIMENSION: &str = "storytelling";

const SUB_SCORES: &[&str] = &["narrative_structure", "authenticity", "concreteness", "pacing"];

/// Build the rubric prompt for one transcript
#[must_use]
pub fn prompt(transcript_text: &str) -> String {
    format!(
        r#"Analyze this transcript for STORYTELLING quality:

**Transcript:**
{transcript_text}

**Analysis:**
1. Does it contain a story with setup -> conflict -> resolution?
2. If YES, score these (0-100):
   - Narrative Structure: Clear beginning/middle/end
   - Authenticity: First-person lessons, reflections, responsibility
   - Concreteness: Specific details and examples
   - Pacing: Story portion as % of total
3. If NO story detected, return has_story: false

JSON response:
{{
  "has_story": bool,
  "narrative_structure": float or null,
  "authenticity": float or null,
  "concreteness": float or null,
  "pacing": float or null,
  "story_excerpt": "brief excerpt" or null,
  "observations": ["point 1", "point 2"]
}}"#
    )
}

#[derive(Debug, Deserialize)]
struct StorytellingResponse {
    has_story: bool,
    narrative_structure: Option<f64>,
    authenticity: Option<f64>,
    concreteness: Option<f64>,
    pacing: Option<f64>,
    story_excerpt: Option<String>,
    #[serde(default)]
    observations: Vec<String>,
}

/// Parse the collaborator's free-form response into a result.
/// Returns `None` when no well-formed rubric object can be located.
#[must_use]
pub fn parse_response(text: &str) -> Option<AnalysisResult> {
    let span = extract_json_object(text)?;
    let response: StorytellingResponse = serde_json::from_str(&span).ok()?;

    let mut observations = response.observations;
    if let Some(excerpt) = response.story_excerpt {
        observations.push(format!("Story excerpt: {excerpt}"));
    }

    if !response.has_story {
        return Some(AnalysisResult {
            scores: BTreeMap::new(),
            overall: 0.0,
            observations,
            not_applicable: true,
            degraded: false,
        });
    }

    let mut scores = BTreeMap::new();
    for (name, value) in [
        ("narrative_structure", response.narrative_structure),
        ("authenticity", response.authenticity),
        ("concreteness", response.concreteness),
        ("pacing", response.pacing),
    ] {
        if let Some(value) = value {
            scores.insert(name.to_string(), value);
        }
    }

    // A story with no scores at all is malformed, not applicable
    if scores.is_empty() {
        return None;
    }

    let overall = scores.values().sum::<f64>() / scores.len() as f64;

    Some(AnalysisResult {
        scores,
        overall,
        observations,
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
        .map(|name| ((*name).to_string(), crate::gravitas::FALLBACK_SCORE))
        .collect();

    AnalysisResult {
        scores,
        overall: crate::gravitas::FALLBACK_SCORE,
        observations: vec!["Analysis unavailable".to_string()],
        not_applicable: false,
        degraded: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_story_response() {
        let text = r#"{
            "has_story": true,
            "narrative_structure": 70.0,
            "authenticity": 80.0,
            "concreteness": 60.0,
            "pacing": 50.0,
            "story_excerpt": "when our launch slipped by a quarter...",
            "observations": ["Clear arc"]
        }"#;

        let result = parse_response(text).unwrap();
        assert_eq!(result.scores.len(), 4);
        assert_eq!(result.overall, 65.0);
        assert!(!result.not_applicable);
        assert!(result
            .observations
            .iter()
            .any(|o| o.starts_with("Story excerpt:")));
    }

    #[test]
    fn test_no_story_is_not_applicable() {
        let text = r#"{"has_story": false, "narrative_structure": null, "authenticity": null,
                       "concreteness": null, "pacing": null, "story_excerpt": null,
                       "observations": ["No narrative present"]}"#;

        let result = parse_response(text).unwrap();
        assert!(result.not_applicable);
        assert!(!result.degraded);
        assert!(result.scores.is_empty());
    }

    #[test]
    fn test_partial_scores_average_over_present_values() {
        let text = r#"{"has_story": true, "narrative_structure": 80.0, "authenticity": null,
                       "concreteness": 40.0, "pacing": null}"#;

        let result = parse_response(text).unwrap();
        assert_eq!(result.scores.len(), 2);
        assert_eq!(result.overall, 60.0);
    }

    #[test]
    fn test_story_with_no_scores_is_malformed() {
        let text = r#"{"has_story": true, "narrative_structure": null, "authenticity": null,
                       "concreteness": null, "pacing": null}"#;
        assert!(parse_response(text).is_none());
    }

    #[test]
    fn test_fallback_is_neutral_and_marked() {
        let result = fallback();
        assert_eq!(result.scores.len(), 4);
        assert!(result.degraded);
        assert_eq!(result.overall, 60.0);
    }
}

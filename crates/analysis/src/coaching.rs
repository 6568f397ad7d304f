//! Coaching synthesis stage
//!
//! Turns the merged analysis results into a short ordered list of
//! actionable tips. Coaching is an enhancement, not a correctness-critical
//! output: any failure falls back to the fixed default list and never
//! blocks job completion.

use crate::json::extract_json_array;
use presence_common::AnalysisResult;
use std::collections::BTreeMap;

/// Upper bound on the number of tips in a report
pub const MAX_TIPS: usize = 7;

/// Fixed tips used when the collaborator cannot produce a usable list
pub const DEFAULT_TIPS: &[&str] = &[
    "Practice strategic pauses before key points",
    "Reduce filler words with deliberate pacing",
    "Maintain eye contact with the camera lens",
    "Use concrete examples to support your points",
    "Frame challenges as opportunities for growth",
];

/// Build the synthesis prompt from the merged per-dimension results
#[must_use]
pub fn prompt(dimensions: &BTreeMap<String, AnalysisResult>) -> String {
    let metrics =
        serde_json::to_string_pretty(dimensions).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"Based on these executive-presence metrics, provide 5-7 actionable coaching tips:

**Metrics Summary:**
{metrics}

Generate coaching tips that are:
- Specific and actionable
- Supportive and constructive
- Mapped to weak areas
- Include 1-2 positive reinforcements

Return JSON array: ["tip 1", "tip 2", ...]"#
    )
}

/// Parse the collaborator's free-form response into an ordered tip list.
/// Returns `None` when no usable array can be located.
#[must_use]
pub fn parse_response(text: &str) -> Option<Vec<String>> {
    let span = extract_json_array(text)?;
    let mut tips: Vec<String> = serde_json::from_str(&span).ok()?;
    tips.retain(|tip| !tip.trim().is_empty());
    if tips.is_empty() {
        return None;
    }
    tips.truncate(MAX_TIPS);
    Some(tips)
}

/// The fixed default tip list
#[must_use]
pub fn fallback() -> Vec<String> {
    DEFAULT_TIPS.iter().map(|tip| (*tip).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tip_array() {
        let text = r#"Here you go:
["Open with your conclusion", "Slow down during transitions", "Keep using concrete numbers"]"#;

        let tips = parse_response(text).unwrap();
        assert_eq!(tips.len(), 3);
        assert_eq!(tips[0], "Open with your conclusion");
    }

    #[test]
    fn test_parse_caps_at_seven_tips() {
        let many: Vec<String> = (0..10).map(|i| format!("tip {i}")).collect();
        let text = serde_json::to_string(&many).unwrap();
        let tips = parse_response(&text).unwrap();
        assert_eq!(tips.len(), MAX_TIPS);
    }

    #[test]
    fn test_unusable_response_yields_none() {
        assert!(parse_response("no list here").is_none());
        assert!(parse_response("[]").is_none());
        assert!(parse_response(r#"[1, 2, 3]"#).is_none());
    }

    #[test]
    fn test_fallback_list_is_stable() {
        let tips = fallback();
        assert_eq!(tips.len(), 5);
        assert_eq!(tips[0], "Practice strategic pauses before key points");
    }
}

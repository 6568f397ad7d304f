//! Report assembler
//!
//! Merges the per-dimension analysis results and coaching tips for one job
//! into a single report with a composite overall score. The composite is a
//! deterministic weighted mean over the applicable dimensions, so
//! re-assembling the same inputs always produces the same score.

use chrono::Utc;
use presence_common::{AnalysisResult, Report};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Assembler configuration: per-dimension weights for the composite score.
/// Dimensions without an entry weigh 1.0 (equal weighting by default).
#[derive(Debug, Clone, Default)]
pub struct AssemblerConfig {
    pub weights: BTreeMap<String, f64>,
}

/// Assembles one report per successfully analyzed job
#[derive(Debug, Clone, Default)]
pub struct ReportAssembler {
    config: AssemblerConfig,
}

impl ReportAssembler {
    #[must_use]
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    fn weight(&self, dimension: &str) -> f64 {
        self.config.weights.get(dimension).copied().unwrap_or(1.0)
    }

    /// Weighted mean of the applicable dimensions' overall scores.
    /// Dimensions flagged `not_applicable` do not participate.
    #[must_use]
    pub fn composite_score(&self, dimensions: &BTreeMap<String, AnalysisResult>) -> f64 {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for (name, result) in dimensions {
            if result.not_applicable {
                continue;
            }
            let weight = self.weight(name);
            weighted_sum += weight * result.overall;
            weight_total += weight;
        }

        if weight_total == 0.0 {
            return 0.0;
        }
        weighted_sum / weight_total
    }

    /// Build a fully-formed report, ready to be persisted in one write
    #[must_use]
    pub fn assemble(
        &self,
        user_id: &str,
        job_id: &str,
        dimensions: BTreeMap<String, AnalysisResult>,
        tips: Vec<String>,
    ) -> Report {
        let overall_score = self.composite_score(&dimensions);

        Report {
            report_id: format!("report_{}", Uuid::new_v4().simple()),
            user_id: user_id.to_string(),
            job_id: job_id.to_string(),
            dimensions,
            overall_score,
            tips,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(overall: f64, not_applicable: bool) -> AnalysisResult {
        AnalysisResult {
            scores: BTreeMap::new(),
            overall,
            observations: vec![],
            not_applicable,
            degraded: false,
        }
    }

    fn dims(pairs: &[(&str, AnalysisResult)]) -> BTreeMap<String, AnalysisResult> {
        pairs
            .iter()
            .map(|(name, result)| ((*name).to_string(), result.clone()))
            .collect()
    }

    #[test]
    fn test_equal_weight_composite_is_the_mean() {
        let assembler = ReportAssembler::default();
        let dimensions = dims(&[
            ("gravitas", result(80.0, false)),
            ("storytelling", result(60.0, false)),
        ]);
        assert_eq!(assembler.composite_score(&dimensions), 70.0);
    }

    #[test]
    fn test_not_applicable_dimension_is_excluded() {
        let assembler = ReportAssembler::default();
        let dimensions = dims(&[
            ("gravitas", result(72.0, false)),
            ("storytelling", result(0.0, true)),
        ]);
        assert_eq!(assembler.composite_score(&dimensions), 72.0);
    }

    #[test]
    fn test_all_not_applicable_scores_zero() {
        let assembler = ReportAssembler::default();
        let dimensions = dims(&[("storytelling", result(0.0, true))]);
        assert_eq!(assembler.composite_score(&dimensions), 0.0);
    }

    #[test]
    fn test_configured_weights_bias_the_composite() {
        let mut weights = BTreeMap::new();
        weights.insert("gravitas".to_string(), 3.0);
        weights.insert("storytelling".to_string(), 1.0);
        let assembler = ReportAssembler::new(AssemblerConfig { weights });

        let dimensions = dims(&[
            ("gravitas", result(80.0, false)),
            ("storytelling", result(40.0, false)),
        ]);
        assert_eq!(assembler.composite_score(&dimensions), 70.0);
    }

    #[test]
    fn test_assembly_is_deterministic_for_the_same_inputs() {
        let assembler = ReportAssembler::default();
        let dimensions = dims(&[
            ("gravitas", result(73.6, false)),
            ("storytelling", result(65.0, false)),
        ]);
        let tips = vec!["Pause before key points".to_string()];

        let first = assembler.assemble("user-1", "job-1", dimensions.clone(), tips.clone());
        let second = assembler.assemble("user-1", "job-1", dimensions, tips);

        assert_eq!(first.overall_score, second.overall_score);
        assert_eq!(first.dimensions, second.dimensions);
        assert_eq!(first.tips, second.tips);
    }
}

//! Discrete supremum distance between `f_n(x)` and its pointwise limit `f(x)`.
//!
//! The judgement derived from `max_diff` is a display heuristic on a finite
//! grid at one index `n`. A small distance is evidence of uniform convergence,
//! not a proof of it, and a large one only says that convergence has not
//! become uniform *at this index* on the sampled points.

use serde::Serialize;
use tracing::debug;

use crate::config::UniformityConfig;
use crate::error::SyntaxFault;
use crate::eval::{SamplePoint, VariableScope};
use crate::formula::FormulaCompiler;

pub const DOMAIN_VARIABLE: &str = "x";
pub const INDEX_VARIABLE: &str = "n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UniformityJudgement {
    /// `max_diff` is below the threshold.
    UniformEvidence,
    /// `max_diff` is at or above the threshold: only pointwise convergence
    /// is visible at this index.
    PointwiseOnly,
    /// No sample had both sides defined.
    Inconclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SupDistance {
    pub max_diff: f64,
    pub compared_points: usize,
}

/// Largest `|a - b|` over points where both outputs are defined.
///
/// Points where either side is `None` are skipped rather than counted as zero
/// or infinite difference. Curves are paired positionally.
pub fn sup_distance(sequence: &[SamplePoint], limit: &[SamplePoint]) -> SupDistance {
    sequence
        .iter()
        .zip(limit)
        .filter_map(|(s, l)| Some((s.output? - l.output?).abs()))
        .fold(
            SupDistance {
                max_diff: 0.0,
                compared_points: 0,
            },
            |acc, diff| SupDistance {
                max_diff: acc.max_diff.max(diff),
                compared_points: acc.compared_points + 1,
            },
        )
}

pub fn judge(distance: SupDistance, threshold: f64) -> UniformityJudgement {
    if distance.compared_points == 0 {
        UniformityJudgement::Inconclusive
    } else if distance.max_diff < threshold {
        UniformityJudgement::UniformEvidence
    } else {
        UniformityJudgement::PointwiseOnly
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniformityAnalysis {
    pub index: u32,
    /// `f_n` on the domain grid; empty when that formula is blank or faulty.
    pub sequence_curve: Vec<SamplePoint>,
    /// `f` on the domain grid; empty when that formula is blank or faulty.
    pub limit_curve: Vec<SamplePoint>,
    pub sequence_error: Option<SyntaxFault>,
    pub limit_error: Option<SyntaxFault>,
    /// `None` whenever either formula is blank or faulty.
    pub distance: Option<SupDistance>,
    pub judgement: Option<UniformityJudgement>,
    pub threshold: f64,
}

impl UniformityAnalysis {
    pub fn max_diff(&self) -> Option<f64> {
        self.distance.map(|d| d.max_diff)
    }
}

/// Holds one compile cache per formula box.
#[derive(Debug, Default)]
pub struct FunctionSequenceAnalyzer {
    sequence_compiler: FormulaCompiler,
    limit_compiler: FormulaCompiler,
    config: UniformityConfig,
}

impl FunctionSequenceAnalyzer {
    pub fn new(config: UniformityConfig) -> Self {
        Self {
            sequence_compiler: FormulaCompiler::new(),
            limit_compiler: FormulaCompiler::new(),
            config,
        }
    }

    pub fn config(&self) -> &UniformityConfig {
        &self.config
    }

    pub fn compilations(&self) -> (usize, usize) {
        (
            self.sequence_compiler.compilations(),
            self.limit_compiler.compilations(),
        )
    }

    /// Compare `f_n` (in `x` and `n`) with `f` (in `x`) at index `index`.
    pub fn analyze(&mut self, sequence_formula: &str, limit_formula: &str, index: u32) -> UniformityAnalysis {
        let xs = self.config.domain_samples();
        let guard = self.config.magnitude_guard;
        let threshold = self.config.uniform_threshold;

        let sequence_scope = VariableScope::new().with(INDEX_VARIABLE, f64::from(index));
        let limit_scope = VariableScope::new();

        let sequence = self.sequence_compiler.compile(sequence_formula);
        let limit = self.limit_compiler.compile(limit_formula);

        let sequence_curve = match sequence {
            Ok(Some(f)) => f.evaluate_range(DOMAIN_VARIABLE, &xs, &sequence_scope, guard),
            _ => Vec::new(),
        };
        let limit_curve = match limit {
            Ok(Some(f)) => f.evaluate_range(DOMAIN_VARIABLE, &xs, &limit_scope, guard),
            _ => Vec::new(),
        };

        let both_compiled = matches!((&sequence, &limit), (Ok(Some(_)), Ok(Some(_))));
        let distance = both_compiled.then(|| sup_distance(&sequence_curve, &limit_curve));
        let judgement = distance.map(|d| judge(d, threshold));

        debug!(
            sequence_formula,
            limit_formula,
            index,
            max_diff = ?distance.map(|d| d.max_diff),
            "function sequence analysed"
        );

        UniformityAnalysis {
            index,
            sequence_curve,
            limit_curve,
            sequence_error: sequence.err(),
            limit_error: limit.err(),
            distance,
            judgement,
            threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pts(values: &[Option<f64>]) -> Vec<SamplePoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &output)| SamplePoint {
                input: i as f64,
                output,
            })
            .collect()
    }

    #[test]
    fn undefined_points_are_skipped() {
        let a = pts(&[Some(1.0), None, Some(5.0), Some(0.0)]);
        let b = pts(&[Some(0.5), Some(100.0), None, Some(-0.25)]);
        let d = sup_distance(&a, &b);
        assert_eq!(d.compared_points, 2);
        assert_eq!(d.max_diff, 0.5);
    }

    #[test]
    fn nothing_comparable_is_inconclusive() {
        let d = sup_distance(&pts(&[None, None]), &pts(&[Some(1.0), Some(2.0)]));
        assert_eq!(d.compared_points, 0);
        assert_eq!(judge(d, 0.1), UniformityJudgement::Inconclusive);
    }

    #[test]
    fn threshold_is_strict() {
        let d = SupDistance {
            max_diff: 0.1,
            compared_points: 3,
        };
        assert_eq!(judge(d, 0.1), UniformityJudgement::PointwiseOnly);
    }

    #[test]
    fn power_sequence_is_only_pointwise_on_unit_interval() {
        // x^n -> 0 pointwise on [0, 1) but the gap at x = 1 stays 1
        let mut analyzer = FunctionSequenceAnalyzer::default();
        let result = analyzer.analyze("x^n", "0", 20);
        assert_eq!(result.sequence_curve.len(), 51);
        assert_eq!(result.max_diff(), Some(1.0));
        assert_eq!(result.judgement, Some(UniformityJudgement::PointwiseOnly));
    }

    #[test]
    fn shrinking_line_converges_uniformly() {
        let mut analyzer = FunctionSequenceAnalyzer::default();
        let result = analyzer.analyze("x/n", "0", 20);
        assert_relative_eq!(result.max_diff().unwrap(), 0.05, max_relative = 1e-12);
        assert_eq!(result.judgement, Some(UniformityJudgement::UniformEvidence));

        let early = analyzer.analyze("x/n", "0", 1);
        assert_eq!(early.max_diff(), Some(1.0));
        assert_eq!(early.judgement, Some(UniformityJudgement::PointwiseOnly));
    }

    #[test]
    fn index_is_bound_into_the_sequence_only() {
        let mut analyzer = FunctionSequenceAnalyzer::default();
        let result = analyzer.analyze("x + n", "x", 10);
        assert_eq!(result.sequence_curve[0].output, Some(10.0));
        assert_relative_eq!(result.max_diff().unwrap(), 10.0, max_relative = 1e-12);
        // `n` is not in scope for the limit formula
        let result = analyzer.analyze("x", "n", 10);
        assert!(result.limit_curve.iter().all(|p| p.output.is_none()));
        assert_eq!(result.judgement, Some(UniformityJudgement::Inconclusive));
    }

    #[test]
    fn over_guard_values_are_skipped_not_counted() {
        let mut analyzer = FunctionSequenceAnalyzer::default();
        // 1/x blows up near 0; the point at x = 0 is undefined
        let result = analyzer.analyze("1/x", "1/x", 3);
        assert_eq!(result.sequence_curve[0].output, None);
        assert_eq!(result.max_diff(), Some(0.0));
        assert_eq!(result.distance.unwrap().compared_points, 50);
    }

    #[test]
    fn syntax_fault_in_either_formula_suppresses_analysis() {
        let mut analyzer = FunctionSequenceAnalyzer::default();
        let result = analyzer.analyze("x ^^ n", "0", 3);
        assert_eq!(result.sequence_error, Some(SyntaxFault));
        assert!(result.sequence_curve.is_empty());
        assert_eq!(result.limit_curve.len(), 51);
        assert_eq!(result.distance, None);
        assert_eq!(result.judgement, None);

        let result = analyzer.analyze("x^n", "(", 3);
        assert_eq!(result.limit_error, Some(SyntaxFault));
        assert_eq!(result.max_diff(), None);
    }

    #[test]
    fn blank_formula_suppresses_analysis_without_error() {
        let mut analyzer = FunctionSequenceAnalyzer::default();
        let result = analyzer.analyze("x^n", "", 3);
        assert_eq!(result.limit_error, None);
        assert_eq!(result.max_diff(), None);
    }

    #[test]
    fn moving_the_index_does_not_recompile() {
        let mut analyzer = FunctionSequenceAnalyzer::default();
        for n in 1..=30 {
            analyzer.analyze("x^n", "0", n);
        }
        assert_eq!(analyzer.compilations(), (1, 1));
    }
}

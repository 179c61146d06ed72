//! Epsilon-tube test for a sequence `a_n` against a claimed limit.
//!
//! A point at index `n` is only tested once `n > N`; up to and including `N`
//! the quantifier "for all n > N" says nothing about it.

use serde::Serialize;
use tracing::debug;

use crate::config::SequenceConfig;
use crate::error::SyntaxFault;
use crate::eval::{sample_formula, SamplePoint, VariableScope};
use crate::formula::FormulaCompiler;

pub const SEQUENCE_VARIABLE: &str = "n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointStatus {
    /// At or before the threshold index.
    Neutral,
    /// Past the threshold and inside the tube.
    Success,
    /// Past the threshold and outside the tube.
    Danger,
    /// The term is undefined.
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedPoint {
    pub input: f64,
    pub output: Option<f64>,
    pub status: PointStatus,
    pub inside_tube: bool,
}

/// Classify a single sample. Pure in `(output, limit, epsilon, threshold, input)`.
///
/// The tube is open: a point exactly `epsilon` away is outside.
pub fn classify_point(point: SamplePoint, limit: f64, epsilon: f64, threshold: u32) -> ClassifiedPoint {
    let Some(value) = point.output else {
        return ClassifiedPoint {
            input: point.input,
            output: None,
            status: PointStatus::Invalid,
            inside_tube: false,
        };
    };

    let inside_tube = (value - limit).abs() < epsilon;
    let status = if point.input <= f64::from(threshold) {
        PointStatus::Neutral
    } else if inside_tube {
        PointStatus::Success
    } else {
        PointStatus::Danger
    };

    ClassifiedPoint {
        input: point.input,
        output: point.output,
        status,
        inside_tube,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceVerdict {
    pub is_convergent: bool,
    pub first_violation: Option<ClassifiedPoint>,
}

/// Convergent iff no point past `threshold` is outside the tube.
///
/// Undefined terms past the threshold are not violations. An empty set is
/// never convergent.
pub fn verdict(points: &[ClassifiedPoint], threshold: u32) -> ConvergenceVerdict {
    if points.is_empty() {
        return ConvergenceVerdict {
            is_convergent: false,
            first_violation: None,
        };
    }

    let first_violation = points
        .iter()
        .filter(|p| p.input > f64::from(threshold) && p.status == PointStatus::Danger)
        .min_by(|a, b| a.input.total_cmp(&b.input))
        .copied();

    ConvergenceVerdict {
        is_convergent: first_violation.is_none(),
        first_violation,
    }
}

/// The term used to walk through `|a_n - L| < ε` in an explanation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPoint {
    pub index: f64,
    pub value: f64,
    pub distance: f64,
    pub within_epsilon: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceAnalysis {
    pub data: Vec<ClassifiedPoint>,
    pub error: Option<SyntaxFault>,
    #[serde(flatten)]
    pub verdict: ConvergenceVerdict,
    pub limit: f64,
    pub epsilon: f64,
    pub threshold: u32,
}

impl SequenceAnalysis {
    fn cleared(error: Option<SyntaxFault>, limit: f64, epsilon: f64, threshold: u32) -> Self {
        Self {
            data: Vec::new(),
            error,
            verdict: verdict(&[], threshold),
            limit,
            epsilon,
            threshold,
        }
    }

    pub fn is_convergent(&self) -> bool {
        self.verdict.is_convergent
    }

    pub fn first_violation(&self) -> Option<&ClassifiedPoint> {
        self.verdict.first_violation.as_ref()
    }

    /// The first term past the threshold (`N + 1`), falling back to the first
    /// sampled term. `None` when that term is undefined or there is no data.
    pub fn check_point(&self) -> Option<CheckPoint> {
        let next = f64::from(self.threshold) + 1.0;
        let point = self
            .data
            .iter()
            .find(|p| p.input == next)
            .or_else(|| self.data.first())?;
        let value = point.output?;
        let distance = (value - self.limit).abs();
        Some(CheckPoint {
            index: point.input,
            value,
            distance,
            within_epsilon: distance < self.epsilon,
        })
    }
}

/// Owns its compile cache; reuse one analyzer per formula input box.
#[derive(Debug, Default)]
pub struct SequenceAnalyzer {
    compiler: FormulaCompiler,
    config: SequenceConfig,
}

impl SequenceAnalyzer {
    pub fn new(config: SequenceConfig) -> Self {
        Self {
            compiler: FormulaCompiler::new(),
            config,
        }
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    pub fn compiler(&self) -> &FormulaCompiler {
        &self.compiler
    }

    pub fn analyze(&mut self, formula: &str, limit: f64, epsilon: f64, threshold: u32) -> SequenceAnalysis {
        let inputs = self.config.indices();
        let evaluation = sample_formula(
            &mut self.compiler,
            formula,
            SEQUENCE_VARIABLE,
            &inputs,
            &VariableScope::new(),
            self.config.magnitude_guard,
        );

        if let Some(fault) = evaluation.error {
            debug!(formula, "sequence analysis cleared by syntax fault");
            return SequenceAnalysis::cleared(Some(fault), limit, epsilon, threshold);
        }

        let data: Vec<ClassifiedPoint> = evaluation
            .data
            .into_iter()
            .map(|p| classify_point(p, limit, epsilon, threshold))
            .collect();
        let verdict = verdict(&data, threshold);
        debug!(
            formula,
            limit,
            epsilon,
            threshold,
            convergent = verdict.is_convergent,
            "sequence analysed"
        );

        SequenceAnalysis {
            data,
            error: None,
            verdict,
            limit,
            epsilon,
            threshold,
        }
    }
}

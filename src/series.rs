//! Radius of convergence of `Σ a_n z^n` by a finite-sample ratio test.
//!
//! `R ≈ |a_{n₀} / a_{n₀+1}|` at a single large index. This is a heuristic, not
//! a proof: coefficient sequences whose ratio is not eventually smooth
//! (sign-alternating, sparse, oscillating) can be misjudged, and nothing here
//! tries to detect that.
//!
//! Coefficients such as `2^n` or `n!` leave the f64 range long before
//! `n₀ = 10000`. When the primary samples overflow (or both underflow to zero)
//! the estimator walks down a ladder of smaller indices to the largest one
//! whose samples are representable, and compares the ratio there with the
//! ratio one rung lower. A ratio that still scales like a power of `n` is
//! extrapolated to `0` or `∞`; a settled one is used as is.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::RadiusConfig;
use crate::eval::{function_context, VariableScope};
use crate::formula::{CompiledFormula, FormulaCompiler};

pub const COEFFICIENT_VARIABLE: &str = "n";

/// `Indeterminate` means "could not be estimated". It is not a radius of zero
/// and must not be displayed like one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RadiusEstimate {
    Finite(f64),
    Unbounded,
    Indeterminate,
}

impl RadiusEstimate {
    /// `Some(f64::INFINITY)` for `Unbounded`, `None` for `Indeterminate`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RadiusEstimate::Finite(r) => Some(*r),
            RadiusEstimate::Unbounded => Some(f64::INFINITY),
            RadiusEstimate::Indeterminate => None,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, RadiusEstimate::Indeterminate)
    }
}

impl fmt::Display for RadiusEstimate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RadiusEstimate::Finite(r) => write!(f, "{}", r),
            RadiusEstimate::Unbounded => write!(f, "oo"),
            RadiusEstimate::Indeterminate => write!(f, "undetermined"),
        }
    }
}

/// Where a complex point sits relative to the disk `|z| < R`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskMembership {
    Converges,
    Diverges,
    /// `|z| = R`: the ratio test says nothing.
    Boundary,
    Unknown,
}

impl DiskMembership {
    pub fn classify(z: (f64, f64), estimate: RadiusEstimate) -> Self {
        let modulus = z.0.hypot(z.1);
        if !modulus.is_finite() {
            return DiskMembership::Unknown;
        }
        match estimate {
            RadiusEstimate::Indeterminate => DiskMembership::Unknown,
            RadiusEstimate::Unbounded => DiskMembership::Converges,
            // every power series converges at its centre
            RadiusEstimate::Finite(_) if modulus == 0.0 => DiskMembership::Converges,
            RadiusEstimate::Finite(r) if modulus < r => DiskMembership::Converges,
            RadiusEstimate::Finite(r) if modulus > r => DiskMembership::Diverges,
            RadiusEstimate::Finite(_) => DiskMembership::Boundary,
        }
    }
}

/// Raw intermediates for walking through the ratio test at a readable index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatioWorkedExample {
    pub index: u32,
    pub a_n: f64,
    pub a_next: f64,
    /// `|a_n / a_next|` unrounded; may be non-finite.
    pub ratio: f64,
    pub radius: RadiusEstimate,
}

enum SamplePair {
    Representable(f64, f64),
    Overflow,
    /// Both terms exactly zero: underflow, or a sequence that is eventually zero.
    Vanished,
    NotANumber,
}

fn classify_pair(a: f64, b: f64) -> SamplePair {
    if a.is_nan() || b.is_nan() {
        SamplePair::NotANumber
    } else if a.is_infinite() || b.is_infinite() {
        SamplePair::Overflow
    } else if a == 0.0 && b == 0.0 {
        SamplePair::Vanished
    } else {
        SamplePair::Representable(a, b)
    }
}

/// `(a_m, a_{m+1})`, or `None` on a runtime fault in either evaluation.
fn sample_pair(compiled: &CompiledFormula, index: u32) -> Option<(f64, f64)> {
    let n = f64::from(index);
    let ctx = function_context(&VariableScope::new());
    let a = compiled.evaluate_raw_at(COEFFICIENT_VARIABLE, n, &ctx)?;
    let b = compiled.evaluate_raw_at(COEFFICIENT_VARIABLE, n + 1.0, &ctx)?;
    Some((a, b))
}

/// Cosmetic rounding: snap to a nearby integer, else keep a few decimals.
pub fn round_for_display(ratio: f64, config: &RadiusConfig) -> f64 {
    let nearest = ratio.round();
    if (ratio - nearest).abs() < config.snap_tolerance {
        return nearest;
    }
    let scale = 10f64.powi(config.round_decimals);
    let rounded = (ratio * scale).round() / scale;
    if rounded.is_finite() {
        rounded
    } else {
        ratio
    }
}

fn finalize(ratio: f64, config: &RadiusConfig) -> RadiusEstimate {
    if ratio.is_nan() {
        RadiusEstimate::Indeterminate
    } else if !ratio.is_finite() {
        RadiusEstimate::Unbounded
    } else {
        RadiusEstimate::Finite(round_for_display(ratio, config))
    }
}

/// The ratio test at `n₀` with both samples in range.
fn primary_estimate(a: f64, b: f64, config: &RadiusConfig) -> RadiusEstimate {
    if b.abs() < config.zero_tolerance {
        // vanishing next term: unbounded radius, unless both vanish
        return if a.abs() < config.zero_tolerance {
            RadiusEstimate::Indeterminate
        } else {
            RadiusEstimate::Unbounded
        };
    }
    finalize((a / b).abs(), config)
}

/// Samples at `n₀` left the f64 range; estimate from smaller indices.
///
/// `vanished` is set when both samples at `n₀` were exactly zero. A genuine
/// underflow is still tiny at the first representable rung; anything at or
/// above `zero_tolerance` there means the coefficients are eventually zero,
/// and both-terms-vanish is indeterminate as at `n₀`.
fn retreat_estimate(compiled: &CompiledFormula, config: &RadiusConfig, vanished: bool) -> RadiusEstimate {
    let mut ratios = Vec::with_capacity(2);

    for index in config.retreat_ladder() {
        let Some((a, b)) = sample_pair(compiled, index) else {
            return RadiusEstimate::Indeterminate;
        };
        match classify_pair(a, b) {
            SamplePair::NotANumber => return RadiusEstimate::Indeterminate,
            SamplePair::Overflow | SamplePair::Vanished => continue,
            SamplePair::Representable(a, b) => {
                if ratios.is_empty()
                    && vanished
                    && (a.abs() >= config.zero_tolerance || b.abs() >= config.zero_tolerance)
                {
                    debug!(index, a, b, "coefficients are eventually zero");
                    return RadiusEstimate::Indeterminate;
                }
                if ratios.is_empty() && b == 0.0 {
                    debug!(index, "next coefficient vanishes after retreat");
                    return RadiusEstimate::Unbounded;
                }
                if b != 0.0 {
                    ratios.push((index, (a / b).abs()));
                }
            }
        }
        if ratios.len() == 2 {
            break;
        }
    }

    match *ratios.as_slice() {
        [] => {
            debug!("no representable coefficients on the ladder");
            RadiusEstimate::Indeterminate
        }
        [(index, ratio)] => {
            debug!(index, ratio, "single representable rung");
            finalize(ratio, config)
        }
        [(index, ratio), (lower_index, lower), ..] => {
            if !ratio.is_finite() {
                return finalize(ratio, config);
            }
            // r(m) ~ m^drift between the two rungs; factorial-like growth
            // gives |drift| near 1, geometric-times-polynomial stays near 0
            let drift = (ratio / lower).ln() / (f64::from(index) / f64::from(lower_index)).ln();
            debug!(index, ratio, lower_index, lower, drift, "ratio trend across rungs");
            if drift > config.drift_exponent_limit {
                RadiusEstimate::Unbounded
            } else if drift < -config.drift_exponent_limit {
                RadiusEstimate::Finite(0.0)
            } else {
                finalize(ratio, config)
            }
        }
    }
}

/// Estimate from an already compiled coefficient formula.
pub fn estimate_compiled(compiled: &CompiledFormula, config: &RadiusConfig) -> RadiusEstimate {
    let Some((a, b)) = sample_pair(compiled, config.ratio_index) else {
        return RadiusEstimate::Indeterminate;
    };
    match classify_pair(a, b) {
        SamplePair::NotANumber => RadiusEstimate::Indeterminate,
        SamplePair::Representable(a, b) => primary_estimate(a, b, config),
        pair @ (SamplePair::Overflow | SamplePair::Vanished) => {
            let vanished = matches!(pair, SamplePair::Vanished);
            debug!(
                formula = compiled.source(),
                index = config.ratio_index,
                vanished,
                "coefficients out of range, retreating"
            );
            retreat_estimate(compiled, config, vanished)
        }
    }
}

/// Owns its compile cache; the estimate is a pure function of the text.
#[derive(Debug, Default)]
pub struct RadiusEstimator {
    compiler: FormulaCompiler,
    config: RadiusConfig,
}

impl RadiusEstimator {
    pub fn new(config: RadiusConfig) -> Self {
        Self {
            compiler: FormulaCompiler::new(),
            config,
        }
    }

    pub fn config(&self) -> &RadiusConfig {
        &self.config
    }

    pub fn compiler(&self) -> &FormulaCompiler {
        &self.compiler
    }

    pub fn estimate(&mut self, formula: &str) -> RadiusEstimate {
        let config = self.config;
        match self.compiler.compile(formula) {
            Ok(Some(compiled)) => {
                let estimate = estimate_compiled(compiled, &config);
                debug!(formula, %estimate, "radius estimated");
                estimate
            }
            Ok(None) | Err(_) => RadiusEstimate::Indeterminate,
        }
    }

    /// `a_m`, `a_{m+1}` and their ratio at the configured worked-example
    /// index. `None` for blank or faulty formulas.
    pub fn worked_example(&mut self, formula: &str) -> Option<RatioWorkedExample> {
        let radius = self.estimate(formula);
        let index = self.config.worked_example_index;
        let compiled = self.compiler.compile(formula).ok()??;
        let (a_n, a_next) = sample_pair(compiled, index)?;
        Some(RatioWorkedExample {
            index,
            a_n,
            a_next,
            ratio: (a_n / a_next).abs(),
            radius,
        })
    }
}

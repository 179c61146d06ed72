//! Sanitized formula sampling and convergence diagnostics.
//!
//! A user-typed formula is compiled once ([`formula::FormulaCompiler`]),
//! evaluated per sample point with every undefined, non-finite or oversized
//! result mapped to `None` ([`eval`]), and fed to one of three analyzers:
//!
//! - [`sequence::SequenceAnalyzer`]: epsilon-tube test of `a_n` against a
//!   claimed limit past a threshold index `N`.
//! - [`uniform::FunctionSequenceAnalyzer`]: discrete supremum distance between
//!   `f_n(x)` and `f(x)` on a sampled domain.
//! - [`series::RadiusEstimator`]: radius of convergence of `Σ a_n z^n` by a
//!   finite-sample ratio test.
//!
//! Everything is synchronous and pure: identical inputs produce bit-identical
//! outputs, and each analyzer owns its own compile cache.
//!
//! ```
//! use convergence_lab::sequence::SequenceAnalyzer;
//!
//! let mut analyzer = SequenceAnalyzer::default();
//! let analysis = analyzer.analyze("1/n", 0.0, 0.5, 2);
//! assert!(analysis.is_convergent());
//! ```

pub mod config;
pub mod error;
pub mod eval;
pub mod formula;
pub mod sequence;
pub mod series;
pub mod uniform;

pub use config::{RadiusConfig, SequenceConfig, UniformityConfig};
pub use error::SyntaxFault;
pub use eval::{sample_formula, sanitize, Evaluation, SamplePoint, VariableScope};
pub use formula::{CompiledFormula, FormulaCompiler};
pub use sequence::{ClassifiedPoint, ConvergenceVerdict, PointStatus, SequenceAnalysis, SequenceAnalyzer};
pub use series::{DiskMembership, RadiusEstimate, RadiusEstimator, RatioWorkedExample};
pub use uniform::{FunctionSequenceAnalyzer, UniformityAnalysis, UniformityJudgement};

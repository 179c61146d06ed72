//! Formula text -> compiled, repeatedly evaluable unit.
//!
//! Compilation goes through [`preprocess::normalize`] and then meval's parser.
//! A [`FormulaCompiler`] memoizes the most recent text so that re-sampling the
//! same formula with new variable bindings never re-parses it.

pub mod functions;
pub mod preprocess;

use meval::Expr;
use tracing::{debug, trace};

use crate::error::SyntaxFault;

/// A parsed formula. Evaluation lives in [`crate::eval`].
#[derive(Debug)]
pub struct CompiledFormula {
    source: String,
    pub(crate) expr: Expr,
}

impl CompiledFormula {
    /// The text exactly as the user supplied it.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Parse `text` without any caching.
///
/// Blank text is the "no formula" state, not a fault.
pub fn compile_uncached(text: &str) -> Result<Option<CompiledFormula>, SyntaxFault> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let normalized = preprocess::normalize(text);
    match normalized.parse::<Expr>() {
        Ok(expr) => Ok(Some(CompiledFormula {
            source: text.to_string(),
            expr,
        })),
        Err(err) => {
            debug!(formula = text, normalized = %normalized, error = %err, "formula rejected by parser");
            Err(SyntaxFault)
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    text: String,
    outcome: Result<Option<CompiledFormula>, SyntaxFault>,
}

/// Single-entry memo table keyed by exact formula text.
#[derive(Debug, Default)]
pub struct FormulaCompiler {
    last: Option<CacheEntry>,
    compilations: usize,
}

impl FormulaCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `text`, reusing the previous result when the text is unchanged.
    ///
    /// Faults are memoized too: identical bad text is not re-parsed.
    pub fn compile(&mut self, text: &str) -> Result<Option<&CompiledFormula>, SyntaxFault> {
        let entry = match self.last.take() {
            Some(entry) if entry.text == text => {
                trace!(formula = text, "compile cache hit");
                entry
            }
            _ => {
                self.compilations += 1;
                CacheEntry {
                    text: text.to_string(),
                    outcome: compile_uncached(text),
                }
            }
        };
        match &self.last.insert(entry).outcome {
            Ok(compiled) => Ok(compiled.as_ref()),
            Err(fault) => Err(*fault),
        }
    }

    /// How many times the cache missed and the text was (re)compiled.
    pub fn compilations(&self) -> usize {
        self.compilations
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}

//! Scoped evaluation and output sanitization.
//!
//! Runtime faults are data here: an undefined point comes back as `None` and
//! the rest of the range is still evaluated. No NaN, infinity or over-guard
//! value ever leaves [`CompiledFormula::evaluate`].

use std::collections::BTreeMap;

use meval::{Context, ContextProvider};
use serde::Serialize;
use tracing::trace;

use crate::error::SyntaxFault;
use crate::formula::functions::EXTRA_FUNCTIONS;
use crate::formula::{CompiledFormula, FormulaCompiler};

/// Variable bindings for a single evaluation. Names are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableScope {
    bindings: BTreeMap<String, f64>,
}

impl VariableScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.bind(name, value);
        self
    }

    pub fn bind(&mut self, name: &str, value: f64) {
        match self.bindings.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.bindings.insert(name.to_string(), value);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.bindings.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// One evaluated input. `output == None` means "omit this point", never zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplePoint {
    pub input: f64,
    pub output: Option<f64>,
}

/// Map a raw result to a plottable value.
///
/// `guard` is a display-safety clamp protecting plot axes from unbounded
/// ranges. It is not a mathematical truncation: values beyond it are dropped,
/// not clipped.
pub fn sanitize(raw: f64, guard: f64) -> Option<f64> {
    if !raw.is_finite() || raw.abs() > guard {
        None
    } else {
        Some(raw)
    }
}

/// Builtins, extra functions and the bindings of `scope`. Built once per
/// call; per-point variables are layered on top without touching it.
pub(crate) fn function_context(scope: &VariableScope) -> Context<'static> {
    let mut ctx = Context::new();
    for (name, func) in EXTRA_FUNCTIONS {
        ctx.func(name, func);
    }
    for (name, value) in scope.iter() {
        ctx.var(name, value);
    }
    ctx
}

impl CompiledFormula {
    /// Unsanitized value. `None` only for a runtime fault such as an unknown
    /// variable or function; NaN and infinities pass through.
    pub fn evaluate_raw(&self, scope: &VariableScope) -> Option<f64> {
        self.eval_in(function_context(scope))
    }

    /// Raw value with `variable = input` shadowing anything bound in `base`.
    pub(crate) fn evaluate_raw_at(&self, variable: &str, input: f64, base: &Context) -> Option<f64> {
        self.eval_in(((variable, input), base))
    }

    fn eval_in<C: ContextProvider>(&self, ctx: C) -> Option<f64> {
        match self.expr.eval_with_context(ctx) {
            Ok(value) => Some(value),
            Err(err) => {
                trace!(formula = self.source(), error = %err, "runtime fault");
                None
            }
        }
    }

    pub fn evaluate(&self, scope: &VariableScope, guard: f64) -> Option<f64> {
        self.evaluate_raw(scope).and_then(|raw| sanitize(raw, guard))
    }

    /// Evaluate once per input with `variable` bound to it on top of `aux`.
    /// Order and length of `inputs` are preserved.
    pub fn evaluate_range(
        &self,
        variable: &str,
        inputs: &[f64],
        aux: &VariableScope,
        guard: f64,
    ) -> Vec<SamplePoint> {
        let base = function_context(aux);
        inputs
            .iter()
            .map(|&input| SamplePoint {
                input,
                output: self
                    .evaluate_raw_at(variable, input, &base)
                    .and_then(|raw| sanitize(raw, guard)),
            })
            .collect()
    }
}

/// Result of compiling and sampling one formula.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    pub data: Vec<SamplePoint>,
    pub error: Option<SyntaxFault>,
}

/// Compile (through the cache) and sample `text` over `inputs`.
///
/// Blank text yields no data and no error; a syntax fault yields no data at
/// all, never a partial range.
pub fn sample_formula(
    compiler: &mut FormulaCompiler,
    text: &str,
    variable: &str,
    inputs: &[f64],
    aux: &VariableScope,
    guard: f64,
) -> Evaluation {
    match compiler.compile(text) {
        Ok(Some(compiled)) => Evaluation {
            data: compiled.evaluate_range(variable, inputs, aux, guard),
            error: None,
        },
        Ok(None) => Evaluation::default(),
        Err(fault) => Evaluation {
            data: Vec::new(),
            error: Some(fault),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FUNCTION_MAGNITUDE_GUARD, GENERIC_MAGNITUDE_GUARD};
    use crate::formula::compile_uncached;

    fn compiled(text: &str) -> CompiledFormula {
        compile_uncached(text).unwrap().unwrap()
    }

    fn sample(text: &str, inputs: &[f64]) -> Evaluation {
        let mut compiler = FormulaCompiler::new();
        sample_formula(
            &mut compiler,
            text,
            "n",
            inputs,
            &VariableScope::new(),
            GENERIC_MAGNITUDE_GUARD,
        )
    }

    #[test]
    fn sanitize_rejects_non_finite_and_over_guard() {
        assert_eq!(sanitize(f64::NAN, 10.0), None);
        assert_eq!(sanitize(f64::INFINITY, 10.0), None);
        assert_eq!(sanitize(f64::NEG_INFINITY, 10.0), None);
        assert_eq!(sanitize(10.5, 10.0), None);
        assert_eq!(sanitize(-10.5, 10.0), None);
        assert_eq!(sanitize(10.0, 10.0), Some(10.0));
        assert_eq!(sanitize(-3.25, 10.0), Some(-3.25));
    }

    #[test]
    fn square_over_small_range() {
        let result = sample("n^2", &[1.0, 2.0, 3.0]);
        assert_eq!(result.error, None);
        assert_eq!(
            result.data,
            vec![
                SamplePoint { input: 1.0, output: Some(1.0) },
                SamplePoint { input: 2.0, output: Some(4.0) },
                SamplePoint { input: 3.0, output: Some(9.0) },
            ]
        );
    }

    #[test]
    fn invalid_syntax_clears_data() {
        let result = sample("n^^2", &[1.0, 2.0, 3.0]);
        assert_eq!(result.error, Some(SyntaxFault));
        assert!(result.data.is_empty());
        assert_eq!(result.error.unwrap().to_string(), "Invalid syntax");
    }

    #[test]
    fn division_by_zero_is_a_null_point() {
        let result = sample("1/n", &[0.0, 1.0]);
        assert_eq!(result.error, None);
        assert_eq!(result.data[0], SamplePoint { input: 0.0, output: None });
        assert_eq!(result.data[1], SamplePoint { input: 1.0, output: Some(1.0) });
    }

    #[test]
    fn empty_formula_is_no_data_and_no_error() {
        let result = sample("", &[1.0, 2.0]);
        assert_eq!(result, Evaluation::default());
    }

    #[test]
    fn unknown_variable_is_null_per_point() {
        let result = sample("invalid^n", &[1.0, 2.0]);
        assert_eq!(result.error, None);
        assert!(result.data.iter().all(|p| p.output.is_none()));
    }

    #[test]
    fn non_real_results_are_null() {
        let result = sample("sqrt(n)", &[-1.0, 4.0]);
        assert_eq!(result.data[0].output, None);
        assert_eq!(result.data[1].output, Some(2.0));

        let result = sample("ln(n)", &[0.0, -2.0]);
        assert!(result.data.iter().all(|p| p.output.is_none()));
    }

    #[test]
    fn guard_is_per_call() {
        let f = compiled("x");
        let scope = VariableScope::new().with("x", 50_000.0);
        assert_eq!(f.evaluate(&scope, GENERIC_MAGNITUDE_GUARD), Some(50_000.0));
        assert_eq!(f.evaluate(&scope, FUNCTION_MAGNITUDE_GUARD), None);
    }

    #[test]
    fn raw_evaluation_passes_infinities_through() {
        let f = compiled("1/n");
        let scope = VariableScope::new().with("n", 0.0);
        assert_eq!(f.evaluate_raw(&scope), Some(f64::INFINITY));
        assert_eq!(compiled("q").evaluate_raw(&scope), None);
    }

    #[test]
    fn auxiliary_variables_are_bound() {
        let f = compiled("x^n");
        let aux = VariableScope::new().with("n", 2.0);
        let points = f.evaluate_range("x", &[2.0, 3.0], &aux, FUNCTION_MAGNITUDE_GUARD);
        assert_eq!(points[0].output, Some(4.0));
        assert_eq!(points[1].output, Some(9.0));
    }

    #[test]
    fn range_variable_shadows_auxiliary_binding() {
        let f = compiled("n + fact(k)");
        let aux = VariableScope::new().with("n", 100.0).with("k", 3.0);
        let points = f.evaluate_range("n", &[1.0, 2.0], &aux, GENERIC_MAGNITUDE_GUARD);
        assert_eq!(points[0].output, Some(7.0));
        assert_eq!(points[1].output, Some(8.0));
        assert_eq!(aux.get("n"), Some(100.0));
    }

    #[test]
    fn shared_context_matches_fresh_context_per_point() {
        let f = compiled("gamma(x + 1) / log2(8) + sin(x)");
        let inputs = [0.5, 1.0, 2.5, 4.0];
        let points = f.evaluate_range("x", &inputs, &VariableScope::new(), GENERIC_MAGNITUDE_GUARD);
        for (point, &x) in points.iter().zip(&inputs) {
            let fresh = f.evaluate(&VariableScope::new().with("x", x), GENERIC_MAGNITUDE_GUARD);
            assert_eq!(point.output, fresh);
        }
    }

    #[test]
    fn variables_are_case_sensitive() {
        let f = compiled("N + 1");
        let scope = VariableScope::new().with("n", 1.0);
        assert_eq!(f.evaluate(&scope, GENERIC_MAGNITUDE_GUARD), None);
    }

    #[test]
    fn builtins_and_extras_resolve() {
        let scope = VariableScope::new().with("n", 5.0);
        let guard = GENERIC_MAGNITUDE_GUARD;
        assert_eq!(compiled("n!").evaluate(&scope, guard), Some(120.0));
        assert_eq!(compiled("log10(100)").evaluate(&scope, guard), Some(2.0));
        assert!(compiled("sin(pi)").evaluate(&scope, guard).unwrap().abs() < 1e-12);
        assert_eq!(compiled("log(e)").evaluate(&scope, guard), Some(1.0));
    }

    #[test]
    fn sampling_is_idempotent() {
        let inputs: Vec<f64> = (0..20).map(f64::from).collect();
        let first = sample("(1 + 1/n)^n", &inputs);
        let second = sample("(1 + 1/n)^n", &inputs);
        assert_eq!(first, second);
        assert!(first
            .data
            .iter()
            .filter_map(|p| p.output)
            .all(|v| v.is_finite() && v.abs() <= GENERIC_MAGNITUDE_GUARD));
    }

    #[test]
    fn rebinding_overwrites() {
        let mut scope = VariableScope::new().with("n", 1.0);
        scope.bind("n", 7.0);
        assert_eq!(scope.get("n"), Some(7.0));
        assert_eq!(scope.iter().count(), 1);
    }
}

//! Functions registered on top of meval's builtin context.

use statrs::function::{factorial, gamma};

// Largest n whose factorial fits in an f64
const MAX_EXACT_FACTORIAL: f64 = 170.0;

/// `x!`: exact for non-negative integers, `Γ(x + 1)` elsewhere, NaN at the
/// poles (negative integers).
pub fn factorial_of(x: f64) -> f64 {
    if x.is_nan() || x == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if x == f64::INFINITY {
        return f64::INFINITY;
    }
    if x.fract() == 0.0 {
        if x < 0.0 {
            return f64::NAN;
        }
        if x > MAX_EXACT_FACTORIAL {
            return f64::INFINITY;
        }
        return factorial::factorial(x as u64);
    }
    gamma::gamma(x + 1.0)
}

pub fn gamma_of(x: f64) -> f64 {
    if x <= 0.0 && x.fract() == 0.0 {
        return f64::NAN;
    }
    gamma::gamma(x)
}

/// Extra single-argument functions: `(name, fn)`.
pub const EXTRA_FUNCTIONS: [(&str, fn(f64) -> f64); 5] = [
    (super::preprocess::FACTORIAL_FN, factorial_of),
    ("gamma", gamma_of),
    ("log10", f64::log10),
    ("log2", f64::log2),
    ("cbrt", f64::cbrt),
];

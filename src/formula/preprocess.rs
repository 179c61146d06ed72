// =============================================================================
// EXPRESSION PREPROCESSING
// =============================================================================
//
// Rewrites the notation users commonly type into what the meval grammar
// accepts. Anything this pass cannot make sense of is left untouched so the
// parser rejects it.

use regex::Regex;
use std::sync::LazyLock;

static NATURAL_LOG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\blog\s*\(").expect("static regex"));

/// Name of the context function postfix `!` is rewritten to.
pub const FACTORIAL_FN: &str = "fact";

pub fn normalize(input: &str) -> String {
    // Handle common Python notation
    let s = input.trim().replace("**", "^");
    // `log` is the natural log in the notation users type; meval calls it `ln`
    let s = NATURAL_LOG.replace_all(&s, "ln(");
    expand_factorials(&s)
}

/// `n!` -> `fact(n)`, `(n+1)!` -> `fact((n+1))`, `sqrt(n)!` -> `fact(sqrt(n))`.
fn expand_factorials(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    for ch in input.chars() {
        if ch != '!' {
            out.push(ch);
            continue;
        }
        let end = out.trim_end().len();
        match operand_start(&out[..end]) {
            Some(start) => {
                let operand = out[start..end].to_string();
                out.truncate(start);
                out.push_str(FACTORIAL_FN);
                out.push('(');
                out.push_str(&operand);
                out.push(')');
            }
            None => out.push(ch),
        }
    }
    out
}

fn is_operand_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Byte offset where the operand ending at `s.len()` begins.
fn operand_start(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let last = *bytes.last()?;

    if last == b')' {
        let mut depth = 0usize;
        let mut open = None;
        for (i, &b) in bytes.iter().enumerate().rev() {
            match b {
                b')' => depth += 1,
                b'(' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        open = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        // Pull in a function name directly before the parenthesis
        let open = open?;
        let name_len = s[..open]
            .chars()
            .rev()
            .take_while(|&c| is_operand_char(c))
            .count();
        return Some(open - name_len);
    }

    let len = s.chars().rev().take_while(|&c| is_operand_char(c)).count();
    if len == 0 {
        None
    } else {
        Some(s.len() - len)
    }
}

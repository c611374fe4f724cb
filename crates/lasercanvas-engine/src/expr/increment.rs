use crate::expr::{BinaryOp, Expr};

/// Rewrites `source` (whose parse tree is `expr`) so that it evaluates to
/// `amount` more than before, keeping the user's symbolic structure.
///
/// When the expression ends in a free additive literal (`x + 4`, `3 - 2`) that
/// literal is adjusted in place. Otherwise a new term is appended (`x * 2 + 3`).
/// Literals in exponential notation are never adjusted in place.
pub fn increment_expression(source: &str, expr: &Expr, amount: f64) -> String {
    if let Some((prefix_end, current)) = trailing_literal(source, expr) {
        let base = source[..prefix_end].trim_end();
        return append_term(base, current + amount);
    }
    append_term(source.trim_end(), amount)
}

/// Finds a trailing `+ literal` / `- literal` term at the top level.
///
/// Returns the byte offset of the operator and the signed literal value.
fn trailing_literal(source: &str, expr: &Expr) -> Option<(usize, f64)> {
    let Expr::Binary {
        op,
        op_span,
        rhs,
        ..
    } = expr
    else {
        return None;
    };
    if !op.is_additive() {
        return None;
    }

    // `x + -4` carries its own sign on the literal.
    let (literal, literal_sign) = match rhs.as_ref() {
        Expr::Neg { operand, .. } => (operand.as_ref(), -1.0),
        other => (other, 1.0),
    };
    let Expr::Number {
        value,
        exponent: false,
        span,
    } = literal
    else {
        return None;
    };

    // Anything after the literal (a closing parenthesis, say) means it is not
    // the final term of the text.
    if span.end != source.trim_end().len() {
        return None;
    }

    let op_sign = if *op == BinaryOp::Sub { -1.0 } else { 1.0 };
    Some((op_span.start, op_sign * literal_sign * value))
}

fn append_term(base: &str, value: f64) -> String {
    let sign = if value >= 0.0 { '+' } else { '-' };
    let magnitude = format_magnitude(value.abs());
    if base.is_empty() {
        return if value >= 0.0 {
            magnitude
        } else {
            format!("-{magnitude}")
        };
    }
    format!("{base} {sign} {magnitude}")
}

/// Plain decimal for everyday magnitudes, shortest exponent form outside them.
fn format_magnitude(magnitude: f64) -> String {
    if magnitude != 0.0 && !(1e-6..1e15).contains(&magnitude) {
        format!("{magnitude:e}")
    } else {
        format!("{magnitude}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expression;
    use pretty_assertions::assert_eq;

    fn inc(src: &str, amount: f64) -> String {
        increment_expression(src, &parse_expression(src).unwrap(), amount)
    }

    #[test]
    fn adjusts_signed_literal_terms() {
        assert_eq!(inc("x - 4", 1.0), "x - 3");
        assert_eq!(inc("x - 4", 5.0), "x + 1");
        assert_eq!(inc("x + -4", 1.0), "x - 3");
        assert_eq!(inc("x*2   +   1.5", 1.0), "x*2 + 2.5");
        assert_eq!(inc("x + 4 ", 0.5), "x + 4.5");
    }

    #[test]
    fn appends_when_literal_is_not_free() {
        assert_eq!(inc("(x + 4)", 1.0), "(x + 4) + 1");
        assert_eq!(inc("x + (4)", 1.0), "x + (4) + 1");
        assert_eq!(inc("x - 2 * 3", 1.0), "x - 2 * 3 + 1");
        assert_eq!(inc("x / 4", -1.0), "x / 4 - 1");
        assert_eq!(inc("- 4", 1.0), "- 4 + 1");
    }

    #[test]
    fn empty_base_yields_bare_literal() {
        assert_eq!(append_term("", 3.0), "3");
        assert_eq!(append_term("", -3.0), "-3");
    }

    #[test]
    fn extreme_amounts_use_exponent_form() {
        assert_eq!(inc("x * 2", 1e-300), "x * 2 + 1e-300");
        assert_eq!(inc("x * 2", -2.5e20), "x * 2 - 2.5e20");
        assert_eq!(append_term("", -4e-7), "-4e-7");
        assert_eq!(inc("x * 2", 0.000125), "x * 2 + 0.000125");
        // Exponent literals are never folded.
        assert_eq!(inc("x + 1e-300", 1.0), "x + 1e-300 + 1");
    }
}

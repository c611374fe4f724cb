//! Allow-list gate for user-typed expressions.
//!
//! Every multi-character word in the input must be a known function, constant,
//! or variable name. Single characters, numeric literals, and operator symbols
//! are never checked. The gate runs before parsing on every accepted edit.

use crate::expr::lexer::{is_ident_continue, is_ident_start, scan_number};
use crate::expr::{Constant, MathFn};

pub const MATH_FUNCTIONS: [&str; 4] = ["abs", "cos", "sin", "tan"];
pub const CONSTANTS: [&str; 1] = ["pi"];
pub const VARIABLE_NAMES: [&str; 2] = ["x", "y"];

/// Returns `true` when `word` belongs to the expression vocabulary.
pub fn is_allowed_word(word: &str) -> bool {
    MathFn::from_name(word).is_some()
        || Constant::from_name(word).is_some()
        || VARIABLE_NAMES.contains(&word)
}

/// Returns the first multi-character word in `src` that is not in the vocabulary.
pub fn first_disallowed_word(src: &str) -> Option<&str> {
    let mut rest = src;
    let mut offset = 0;
    while let Some(ch) = rest.chars().next() {
        let consumed = if ch.is_ascii_digit() || ch == '.' {
            scan_number(rest).map_or(1, |(len, _)| len)
        } else if is_ident_start(ch) {
            let len = rest
                .char_indices()
                .find(|&(_, c)| !is_ident_continue(c))
                .map_or(rest.len(), |(idx, _)| idx);
            let word = &src[offset..offset + len];
            if len >= 2 && !is_allowed_word(word) {
                return Some(word);
            }
            len
        } else {
            ch.len_utf8()
        };
        offset += consumed;
        rest = &src[offset..];
    }
    None
}

/// Validates `src` against the vocabulary.
pub fn validate(src: &str) -> bool {
    first_disallowed_word(src).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_matches_parser_names() {
        for name in MATH_FUNCTIONS {
            assert_eq!(MathFn::from_name(name).map(MathFn::name), Some(name));
        }
        for name in CONSTANTS {
            assert_eq!(Constant::from_name(name).map(Constant::name), Some(name));
        }
    }

    #[test]
    fn accepts_known_words_and_numbers() {
        assert!(validate("2 * x + sin(y)"));
        assert!(validate("abs(cos(pi) - tan(x))"));
        assert!(validate("x + 3e2"));
        assert!(validate("x + 3E-2 * .5"));
        assert!(validate("a + b"));
        assert!(validate(""));
    }

    #[test]
    fn reports_first_unknown_word() {
        assert_eq!(first_disallowed_word("1 + nope"), Some("nope"));
        assert_eq!(first_disallowed_word("sin(x) + exp(1)"), Some("exp"));
        assert_eq!(first_disallowed_word("x2"), Some("x2"));
        assert_eq!(first_disallowed_word("PI"), Some("PI"));
        assert_eq!(first_disallowed_word("3ex"), Some("ex"));
    }
}

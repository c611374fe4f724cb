use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expr::lexer::scan_number;
use crate::expr::vocabulary::first_disallowed_word;
use crate::expr::{
    evaluate, increment_expression, parse_expression, Bindings, Expr, NoBindings, ParseError,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EquationError {
    #[error("`{0}` is not an allowed name")]
    Disallowed(String),
    #[error("invalid expression: {0}")]
    Parse(#[from] ParseError),
    #[error("number must be finite (got {0})")]
    NonFinite(f64),
    #[error("equation has neither a number nor an expression")]
    Empty,
}

/// Serialized form of an [`Equation`]: exactly one of the fields is non-null.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquationJson {
    pub number: Option<f64>,
    pub expression: Option<String>,
}

/// Anything an [`Equation`] can be set from.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EquationInput {
    Number(f64),
    Text(String),
    Object(EquationJson),
}

impl From<f64> for EquationInput {
    fn from(value: f64) -> Self {
        EquationInput::Number(value)
    }
}

impl From<&str> for EquationInput {
    fn from(value: &str) -> Self {
        EquationInput::Text(value.to_string())
    }
}

impl From<String> for EquationInput {
    fn from(value: String) -> Self {
        EquationInput::Text(value)
    }
}

impl From<EquationJson> for EquationInput {
    fn from(value: EquationJson) -> Self {
        EquationInput::Object(value)
    }
}

/// A user-editable value: either a literal number or a validated expression.
///
/// The number takes precedence; setting one mode clears the other. Invalid input
/// is ignored and the previous value is kept, so a fresh equation that is given
/// garbage still evaluates to `0`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "EquationInput", into = "EquationJson")]
pub struct Equation {
    numeric: Option<f64>,
    expression: Option<String>,
    parsed: Option<Expr>,
}

impl Default for Equation {
    fn default() -> Self {
        Self {
            numeric: Some(0.0),
            expression: None,
            parsed: None,
        }
    }
}

impl Equation {
    pub fn new(value: impl Into<EquationInput>) -> Self {
        let mut equation = Self::default();
        equation.set(value);
        equation
    }

    /// Sets the value, returning `false` (and keeping the previous value) when the
    /// input is rejected.
    pub fn set(&mut self, value: impl Into<EquationInput>) -> bool {
        let result = match value.into() {
            EquationInput::Number(number) => self.set_number(number),
            EquationInput::Text(text) => self.set_expression(&text),
            EquationInput::Object(json) => self.set_json(json),
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                log::debug!("rejected equation input: {err}");
                false
            }
        }
    }

    pub fn set_number(&mut self, number: f64) -> Result<(), EquationError> {
        if !number.is_finite() {
            return Err(EquationError::NonFinite(number));
        }
        self.numeric = Some(number);
        self.expression = None;
        self.parsed = None;
        Ok(())
    }

    /// Sets an expression. Plain numeric text (`"4"`, `"-2.5"`, `"3e2"`) is
    /// stored as a number.
    pub fn set_expression(&mut self, src: &str) -> Result<(), EquationError> {
        if let Some(number) = parse_numeric_literal(src) {
            return self.set_number(number);
        }
        let parsed = checked_parse(src)?;
        self.numeric = None;
        self.expression = Some(src.to_string());
        self.parsed = Some(parsed);
        Ok(())
    }

    fn set_json(&mut self, json: EquationJson) -> Result<(), EquationError> {
        match (json.number, json.expression) {
            (Some(number), _) => self.set_number(number),
            (None, Some(expression)) => self.set_expression(&expression),
            (None, None) => Err(EquationError::Empty),
        }
    }

    pub fn number(&self) -> Option<f64> {
        self.numeric
    }

    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric.is_some()
    }

    /// Parsed tree of the expression, when in expression mode.
    pub fn parsed(&self) -> Option<&Expr> {
        self.parsed.as_ref()
    }

    /// Evaluates with no bound variables.
    pub fn value(&self) -> f64 {
        self.value_with(&NoBindings)
    }

    /// Evaluates against `bindings`; unbound variables read as `0`.
    pub fn value_with<B: Bindings + ?Sized>(&self, bindings: &B) -> f64 {
        match (self.numeric, &self.parsed) {
            (Some(number), _) => number,
            (None, Some(expr)) => evaluate(expr, bindings),
            (None, None) => 0.0,
        }
    }

    /// Adds `amount` while keeping the current mode.
    ///
    /// Numbers are adjusted directly. Expressions have their trailing additive
    /// literal adjusted in place, or get a new `+ amount` / `- amount` term.
    pub fn increment(&mut self, amount: f64) {
        if !amount.is_finite() {
            log::debug!("ignored non-finite increment {amount}");
            return;
        }
        if let Some(number) = self.numeric {
            self.numeric = Some(number + amount);
            return;
        }

        let (Some(source), Some(parsed)) = (&self.expression, &self.parsed) else {
            self.numeric = Some(amount);
            return;
        };
        let rewritten = increment_expression(source, parsed, amount);
        match checked_parse(&rewritten) {
            Ok(parsed) => {
                self.expression = Some(rewritten);
                self.parsed = Some(parsed);
            }
            Err(err) => log::warn!("increment produced an unusable expression `{rewritten}`: {err}"),
        }
    }

    pub fn to_json(&self) -> EquationJson {
        EquationJson {
            number: self.numeric,
            expression: self.expression.clone(),
        }
    }
}

fn checked_parse(src: &str) -> Result<Expr, EquationError> {
    if let Some(word) = first_disallowed_word(src) {
        return Err(EquationError::Disallowed(word.to_string()));
    }
    Ok(parse_expression(src)?)
}

/// Parses text that is nothing but an optionally signed decimal literal.
fn parse_numeric_literal(src: &str) -> Option<f64> {
    let trimmed = src.trim();
    let unsigned = trimmed
        .strip_prefix(['+', '-'])
        .unwrap_or(trimmed);
    match scan_number(unsigned) {
        Some((len, _)) if len == unsigned.len() => trimmed.parse::<f64>().ok(),
        _ => None,
    }
}

impl PartialEq for Equation {
    fn eq(&self, other: &Self) -> bool {
        self.numeric == other.numeric && self.expression == other.expression
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.numeric, &self.expression) {
            (Some(number), _) => write!(f, "{number}"),
            (None, Some(expression)) => f.write_str(expression),
            (None, None) => f.write_str("0"),
        }
    }
}

impl From<EquationInput> for Equation {
    fn from(value: EquationInput) -> Self {
        Equation::new(value)
    }
}

impl From<Equation> for EquationJson {
    fn from(value: Equation) -> Self {
        EquationJson {
            number: value.numeric,
            expression: value.expression,
        }
    }
}

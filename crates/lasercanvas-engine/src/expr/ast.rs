use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Byte range into the expression source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn cover(self, other: Span) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// One-argument math functions callable from an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathFn {
    Abs,
    Cos,
    Sin,
    Tan,
}

impl MathFn {
    pub const ALL: [MathFn; 4] = [MathFn::Abs, MathFn::Cos, MathFn::Sin, MathFn::Tan];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            MathFn::Abs => "abs",
            MathFn::Cos => "cos",
            MathFn::Sin => "sin",
            MathFn::Tan => "tan",
        }
    }

    pub fn apply(self, arg: f64) -> f64 {
        match self {
            MathFn::Abs => arg.abs(),
            MathFn::Cos => arg.cos(),
            MathFn::Sin => arg.sin(),
            MathFn::Tan => arg.tan(),
        }
    }
}

/// Named mathematical constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    Pi,
}

impl Constant {
    pub const ALL: [Constant; 1] = [Constant::Pi];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Constant::Pi => "pi",
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Constant::Pi => PI,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// Additive operators bind looser than multiplicative ones.
    pub fn is_additive(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub)
    }

    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        f.write_str(op)
    }
}

/// Parsed expression tree.
///
/// Every node remembers where it came from in the source text so that edits
/// (see [`crate::expr::increment_expression`]) can rewrite a single term and
/// leave the rest of the user's formatting untouched. Parentheses do not get
/// their own node; a parenthesized sub-expression keeps the span of its
/// contents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number {
        value: f64,
        /// The literal was written in exponential notation (`3e2`).
        exponent: bool,
        span: Span,
    },
    Variable {
        name: String,
        span: Span,
    },
    Constant {
        constant: Constant,
        span: Span,
    },
    Neg {
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        op_span: Span,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: MathFn,
        arg: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number { span, .. }
            | Expr::Variable { span, .. }
            | Expr::Constant { span, .. }
            | Expr::Neg { span, .. }
            | Expr::Call { span, .. } => *span,
            Expr::Binary { lhs, rhs, .. } => lhs.span().cover(rhs.span()),
        }
    }
}

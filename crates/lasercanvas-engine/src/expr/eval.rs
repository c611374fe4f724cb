use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use crate::expr::Expr;

/// Source of variable values during evaluation.
pub trait Bindings {
    fn lookup(&self, name: &str) -> Option<f64>;
}

/// Bindings with no variables; every variable evaluates to `0`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoBindings;

impl Bindings for NoBindings {
    fn lookup(&self, _name: &str) -> Option<f64> {
        None
    }
}

impl<S: BuildHasher> Bindings for HashMap<String, f64, S> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl Bindings for BTreeMap<String, f64> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl Bindings for [(&str, f64)] {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, value)| *value)
    }
}

impl<const N: usize> Bindings for [(&str, f64); N] {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.as_slice().lookup(name)
    }
}

impl<B: Bindings + ?Sized> Bindings for &B {
    fn lookup(&self, name: &str) -> Option<f64> {
        (**self).lookup(name)
    }
}

/// Evaluates `expr` by tree traversal. Unbound variables read as `0`.
pub fn evaluate<B: Bindings + ?Sized>(expr: &Expr, bindings: &B) -> f64 {
    match expr {
        Expr::Number { value, .. } => *value,
        Expr::Variable { name, .. } => bindings.lookup(name).unwrap_or(0.0),
        Expr::Constant { constant, .. } => constant.value(),
        Expr::Neg { operand, .. } => -evaluate(operand, bindings),
        Expr::Binary { op, lhs, rhs, .. } => {
            op.apply(evaluate(lhs, bindings), evaluate(rhs, bindings))
        }
        Expr::Call { function, arg, .. } => function.apply(evaluate(arg, bindings)),
    }
}

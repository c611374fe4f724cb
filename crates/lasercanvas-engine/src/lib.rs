#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Parametric core of LaserCanvas.
//!
//! Element properties are [`Equation`]s: a literal number or a small arithmetic
//! expression over the variables in a [`VariableStore`]. A [`Scanner`] sweeps
//! variables across their ranges so that a host can re-evaluate the system at
//! every sample. Two-dimensional scans refine progressively and yield between
//! rounds; starting a new 2-D scan supersedes the one in flight.
//!
//! Expressions are restricted to `+ - * /`, parentheses, `abs`, `cos`, `sin`,
//! `tan`, `pi` and declared variables. See [`expr::vocabulary`].

pub mod expr;

mod equation;
mod panel;
mod scan;
mod variables;

pub use equation::{Equation, EquationError, EquationInput, EquationJson};
pub use panel::{PanelSnapshot, VariablePanel, VariableState};
pub use scan::{
    ScanConfig, ScanError, ScanOutcome, ScanRange, ScanToken, Scanner, MAX_SCAN2_RESOLUTION,
};
pub use variables::{SharedVariables, VariableError, VariableStore, DEFAULT_VARIABLE_VALUE};

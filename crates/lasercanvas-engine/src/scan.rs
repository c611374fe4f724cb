//! Variable scans.
//!
//! A 1-D scan steps one variable across its range and runs to completion inside
//! the call. A 2-D scan fills a grid coarse-to-fine: each round doubles the
//! resolution and only visits points the previous round did not sample. Rounds
//! are separated by a cooperative yield, and a scan started later supersedes any
//! scan still waiting for its next round.

use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::variables::{SharedVariables, VariableError, VariableStore};

/// Upper bound on the 2-D resolution, to keep a round's sample count sane.
pub const MAX_SCAN2_RESOLUTION: usize = 4_096;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    #[error(transparent)]
    Variable(#[from] VariableError),
    #[error("invalid scan configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Inclusive range a variable is scanned over.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ScanRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl ScanRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Builds a range whose `max` lies strictly above `min`; an empty or inverted
    /// range becomes `[min, min + 1]`.
    pub fn normalized(min: f64, max: f64) -> Self {
        if max <= min {
            Self { min, max: min + 1.0 }
        } else {
            Self { min, max }
        }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Value at `index` of `divisions` equal steps from `min`.
    pub fn sample(&self, index: usize, divisions: usize) -> f64 {
        self.min + index as f64 * self.span() / divisions as f64
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    /// Steps of a 1-D scan, not counting the starting point.
    pub steps: usize,
    /// Resolution of the first 2-D round.
    pub start_resolution: usize,
    /// Resolution of the last 2-D round.
    pub max_resolution: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            steps: 64,
            start_resolution: 16,
            max_resolution: 64,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.steps == 0 {
            return Err(ScanError::InvalidConfig("steps must be >= 1"));
        }
        if self.start_resolution == 0 {
            return Err(ScanError::InvalidConfig("start_resolution must be >= 1"));
        }
        if self.start_resolution > self.max_resolution {
            return Err(ScanError::InvalidConfig(
                "start_resolution must be <= max_resolution",
            ));
        }
        if self.max_resolution > MAX_SCAN2_RESOLUTION {
            return Err(ScanError::InvalidConfig("max_resolution is too large"));
        }
        Ok(())
    }

    /// Resolutions visited by a complete 2-D scan, in order.
    pub fn resolutions(&self) -> impl Iterator<Item = usize> {
        let max = self.max_resolution;
        std::iter::successors(Some(self.start_resolution), |n| n.checked_mul(2))
            .take_while(move |n| *n <= max)
    }
}

/// How a 2-D scan ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed { rounds: usize },
    Superseded { rounds_completed: usize },
}

/// Identity of one 2-D scan. It goes stale as soon as a newer scan starts or the
/// scanner is cancelled.
#[derive(Clone, Debug)]
pub struct ScanToken {
    generation: u64,
    live: Rc<Cell<u64>>,
}

impl ScanToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_superseded(&self) -> bool {
        self.live.get() != self.generation
    }
}

/// Drives scans over a shared [`VariableStore`].
///
/// Callbacks receive the store, immutably borrowed for the duration of the call,
/// so they can read the sampled point. They must not try to mutate the store
/// through another handle.
#[derive(Clone, Debug)]
pub struct Scanner {
    variables: SharedVariables,
    generation: Rc<Cell<u64>>,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(variables: SharedVariables) -> Self {
        Self {
            variables,
            generation: Rc::new(Cell::new(0)),
            config: ScanConfig::default(),
        }
    }

    pub fn with_config(variables: SharedVariables, config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(variables)
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn variables(&self) -> &SharedVariables {
        &self.variables
    }

    /// Generation of the most recently started 2-D scan.
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Supersedes every 2-D scan started so far.
    pub fn cancel(&self) {
        self.generation.set(self.generation.get() + 1);
    }

    fn begin(&self) -> ScanToken {
        self.cancel();
        ScanToken {
            generation: self.generation.get(),
            live: Rc::clone(&self.generation),
        }
    }

    /// Steps `name` through `steps + 1` evenly spaced values of `range` and calls
    /// `callback(step, steps, store)` after each one.
    ///
    /// The variable is left at `range.max`; callers that need the prior value
    /// restore it themselves.
    pub fn scan<F>(
        &self,
        name: &str,
        range: ScanRange,
        steps: usize,
        mut callback: F,
    ) -> Result<(), ScanError>
    where
        F: FnMut(usize, usize, &VariableStore),
    {
        if steps == 0 {
            return Err(ScanError::InvalidConfig("steps must be >= 1"));
        }
        if !self.variables.borrow().contains(name) {
            return Err(VariableError::Undeclared(name.to_string()).into());
        }

        for step in 0..=steps {
            self.variables
                .borrow_mut()
                .set(name, range.sample(step, steps))?;
            let store = self.variables.borrow();
            callback(step, steps, &store);
        }
        Ok(())
    }

    /// Starts a progressive 2-D scan of `names[0]` × `names[1]`.
    ///
    /// The scan's identity is taken immediately, so a previously started scan is
    /// superseded as soon as this returns, even before the returned future is
    /// polled. Each round calls `callback([x, y], resolution, store)` in row-major
    /// order, then restores both variables to the values they had when this
    /// method was called.
    pub fn scan2<F>(
        &self,
        names: [&str; 2],
        ranges: [ScanRange; 2],
        mut callback: F,
    ) -> Result<impl Future<Output = ScanOutcome>, ScanError>
    where
        F: FnMut([usize; 2], usize, &VariableStore),
    {
        let saved = {
            let store = self.variables.borrow();
            let mut saved = [0.0; 2];
            for (slot, name) in saved.iter_mut().zip(names) {
                *slot = store
                    .get(name)
                    .ok_or_else(|| VariableError::Undeclared(name.to_string()))?;
            }
            saved
        };

        let names = names.map(str::to_string);
        let token = self.begin();
        let variables = Rc::clone(&self.variables);
        let config = self.config.clone();

        Ok(async move {
            let mut rounds = 0;
            for resolution in config.resolutions() {
                tokio::task::yield_now().await;
                if token.is_superseded() {
                    log::debug!(
                        "scan2 generation {} superseded after {rounds} round(s)",
                        token.generation()
                    );
                    return ScanOutcome::Superseded {
                        rounds_completed: rounds,
                    };
                }

                log::debug!(
                    "scan2 generation {} round {resolution}x{resolution}",
                    token.generation()
                );
                let refine = resolution > config.start_resolution;
                run_round(&variables, &names, &ranges, resolution, refine, &mut callback);
                restore(&variables, &names, saved);
                rounds += 1;
            }
            ScanOutcome::Completed { rounds }
        })
    }
}

fn run_round<F>(
    variables: &SharedVariables,
    names: &[String; 2],
    ranges: &[ScanRange; 2],
    resolution: usize,
    refine: bool,
    callback: &mut F,
) where
    F: FnMut([usize; 2], usize, &VariableStore),
{
    for x in 0..resolution {
        write(variables, &names[0], ranges[0].sample(x, resolution));
        for y in 0..resolution {
            // Already sampled by the previous, half-resolution round.
            if refine && x % 2 == 0 && y % 2 == 0 {
                continue;
            }
            write(variables, &names[1], ranges[1].sample(y, resolution));
            let store = variables.borrow();
            callback([x, y], resolution, &store);
        }
    }
}

fn restore(variables: &SharedVariables, names: &[String; 2], saved: [f64; 2]) {
    for (name, value) in names.iter().zip(saved) {
        write(variables, name, value);
    }
}

fn write(variables: &SharedVariables, name: &str, value: f64) {
    if let Err(err) = variables.borrow_mut().set(name, value) {
        log::warn!("scan could not write variable: {err}");
    }
}

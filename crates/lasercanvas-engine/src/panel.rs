use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::scan::{ScanConfig, ScanError, ScanOutcome, ScanRange, Scanner};
use crate::variables::{SharedVariables, VariableError, VariableStore};

/// Persisted state of one variable.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableState {
    pub min: f64,
    pub max: f64,
    pub value: f64,
}

/// Panel state keyed by variable name.
pub type PanelSnapshot = BTreeMap<String, VariableState>;

/// Host-side owner of the variables: it keeps a scan range per variable and
/// announces user edits on a revision channel.
///
/// Only [`set_value`] and [`set_range`] bump the revision. Scans and
/// [`restore`] write the store without announcing it.
///
/// [`set_value`]: VariablePanel::set_value
/// [`set_range`]: VariablePanel::set_range
/// [`restore`]: VariablePanel::restore
#[derive(Debug)]
pub struct VariablePanel {
    scanner: Scanner,
    ranges: HashMap<String, ScanRange>,
    revision: watch::Sender<u64>,
}

impl VariablePanel {
    pub fn new(variables: SharedVariables) -> Self {
        Self::from_scanner(Scanner::new(variables))
    }

    pub fn with_config(variables: SharedVariables, config: ScanConfig) -> Result<Self, ScanError> {
        Ok(Self::from_scanner(Scanner::with_config(variables, config)?))
    }

    fn from_scanner(scanner: Scanner) -> Self {
        let ranges = scanner
            .variables()
            .borrow()
            .iter()
            .map(|(name, value)| {
                let mut range = ScanRange::default();
                extend_to(&mut range, value);
                (name.to_string(), range)
            })
            .collect();
        let (revision, _) = watch::channel(0);
        Self {
            scanner,
            ranges,
            revision,
        }
    }

    pub fn variables(&self) -> &SharedVariables {
        self.scanner.variables()
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.variables().borrow().get(name)
    }

    pub fn range(&self, name: &str) -> Option<ScanRange> {
        self.ranges.get(name).copied()
    }

    /// Sets a variable on behalf of the user. A value outside the variable's
    /// range widens the range to include it.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<(), VariableError> {
        self.variables().borrow_mut().set(name, value)?;
        extend_to(self.range_entry(name), value);
        self.bump();
        Ok(())
    }

    /// Sets a variable's scan range. An empty or inverted range becomes
    /// `[min, min + 1]`, and the current value is clamped into it.
    pub fn set_range(&mut self, name: &str, min: f64, max: f64) -> Result<(), VariableError> {
        let range = ScanRange::normalized(min, max);
        {
            let mut store = self.variables().borrow_mut();
            let current = store
                .get(name)
                .ok_or_else(|| VariableError::Undeclared(name.to_string()))?;
            store.set(name, range.clamp(current))?;
        }
        *self.range_entry(name) = range;
        self.bump();
        Ok(())
    }

    /// Receiver that observes a new revision after every user edit.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// 1-D scan of `name` over its range, restoring the variable afterwards.
    pub fn scan<F>(&self, name: &str, callback: F) -> Result<(), ScanError>
    where
        F: FnMut(usize, usize, &VariableStore),
    {
        let range = self.scan_range(name)?;
        let saved = self
            .value(name)
            .ok_or_else(|| VariableError::Undeclared(name.to_string()))?;
        let result = self
            .scanner
            .scan(name, range, self.scanner.config().steps, callback);
        self.variables().borrow_mut().set(name, saved)?;
        result
    }

    /// Progressive 2-D scan of `names[0]` × `names[1]` over their ranges.
    pub fn scan2<F>(
        &self,
        names: [&str; 2],
        callback: F,
    ) -> Result<impl Future<Output = ScanOutcome>, ScanError>
    where
        F: FnMut([usize; 2], usize, &VariableStore),
    {
        let ranges = [self.scan_range(names[0])?, self.scan_range(names[1])?];
        self.scanner.scan2(names, ranges, callback)
    }

    /// Supersedes any 2-D scan in flight.
    pub fn cancel_scans(&self) {
        self.scanner.cancel();
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        self.variables()
            .borrow()
            .iter()
            .map(|(name, value)| {
                let range = self.ranges.get(name).copied().unwrap_or_default();
                let state = VariableState {
                    min: range.min,
                    max: range.max,
                    value,
                };
                (name.to_string(), state)
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot())
    }

    /// Applies a snapshot without bumping the revision. Entries for undeclared
    /// names are skipped.
    pub fn restore(&mut self, snapshot: &PanelSnapshot) {
        for (name, state) in snapshot {
            if let Err(err) = self.variables().borrow_mut().set(name, state.value) {
                log::warn!("skipping snapshot entry: {err}");
                continue;
            }
            let mut range = ScanRange::normalized(state.min, state.max);
            extend_to(&mut range, state.value);
            *self.range_entry(name) = range;
        }
    }

    pub fn restore_json(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let snapshot: PanelSnapshot = serde_json::from_str(json)?;
        self.restore(&snapshot);
        Ok(())
    }

    fn scan_range(&self, name: &str) -> Result<ScanRange, VariableError> {
        if !self.variables().borrow().contains(name) {
            return Err(VariableError::Undeclared(name.to_string()));
        }
        Ok(self.range(name).unwrap_or_default())
    }

    fn range_entry(&mut self, name: &str) -> &mut ScanRange {
        self.ranges.entry(name.to_string()).or_default()
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

fn extend_to(range: &mut ScanRange, value: f64) {
    if value < range.min {
        range.min = value;
    }
    if value > range.max {
        range.max = value;
    }
}

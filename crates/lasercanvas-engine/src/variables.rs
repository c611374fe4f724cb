use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use thiserror::Error;

use crate::expr::vocabulary::VARIABLE_NAMES;
use crate::expr::Bindings;

/// Value given to every variable of a [`VariableStore::default`] store.
pub const DEFAULT_VARIABLE_VALUE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariableError {
    #[error("variable `{0}` is not declared")]
    Undeclared(String),
}

/// Named scalar variables, iterated in declaration order.
///
/// Only declared names can be written; writing any other name fails with
/// [`VariableError::Undeclared`] and leaves the store unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableStore {
    names: Vec<String>,
    values: HashMap<String, f64>,
}

/// Variable store shared between the host and the scan engine on one thread.
pub type SharedVariables = Rc<RefCell<VariableStore>>;

impl Default for VariableStore {
    fn default() -> Self {
        let mut store = Self::new(VARIABLE_NAMES);
        for name in VARIABLE_NAMES {
            store.values.insert(name.to_string(), DEFAULT_VARIABLE_VALUE);
        }
        store
    }
}

impl VariableStore {
    /// Declares `names` with value `0`. Repeated names are declared once.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = Self {
            names: Vec::new(),
            values: HashMap::new(),
        };
        for name in names {
            let name = name.into();
            if store.values.contains_key(&name) {
                continue;
            }
            store.values.insert(name.clone(), 0.0);
            store.names.push(name);
        }
        store
    }

    pub fn shared(self) -> SharedVariables {
        Rc::new(RefCell::new(self))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Sets a declared variable, returning its previous value.
    pub fn set(&mut self, name: &str, value: f64) -> Result<f64, VariableError> {
        let slot = self
            .values
            .get_mut(name)
            .ok_or_else(|| VariableError::Undeclared(name.to_string()))?;
        Ok(std::mem::replace(slot, value))
    }

    /// Name/value pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names.iter().map(|name| {
            let value = self.values.get(name).copied().unwrap_or_default();
            (name.as_str(), value)
        })
    }

    pub fn for_each(&self, mut visit: impl FnMut(&str, f64)) {
        for (name, value) in self.iter() {
            visit(name, value);
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }
}

impl Bindings for VariableStore {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name)
    }
}

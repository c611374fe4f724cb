//! Compiled element evaluators shared by the host and the worker.
//!
//! Both sides link the same registry. The host names the kinds it wants the
//! worker to handle (and the registry version it was built against); nothing
//! about an element's behavior crosses the message boundary.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use lasercanvas_engine::{Equation, EquationInput, VariableStore};
use serde::{Deserialize, Deserializer, Serialize};

use crate::matrix::Matrix2x2;
use crate::protocol::ProtocolError;

/// Version of the compiled evaluators. Bumped whenever an ABCD routine or a
/// property name changes.
pub const REGISTRY_VERSION: u32 = 1;

pub const DISTANCE_TO_NEXT: &str = "distanceToNext";
pub const RADIUS_OF_CURVATURE: &str = "radiusOfCurvature";
pub const ANGLE_OF_INCIDENCE: &str = "angleOfIncidence";
pub const FOCAL_LENGTH: &str = "focalLength";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    Mirror,
    Lens,
    Screen,
}

impl ElementKind {
    pub const ALL: [ElementKind; 3] = [ElementKind::Mirror, ElementKind::Lens, ElementKind::Screen];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Mirror => "mirror",
            ElementKind::Lens => "lens",
            ElementKind::Screen => "screen",
        }
    }

    /// Properties read by this kind's ABCD routine and getter.
    pub fn properties(self) -> &'static [&'static str] {
        match self {
            ElementKind::Mirror => &[DISTANCE_TO_NEXT, RADIUS_OF_CURVATURE, ANGLE_OF_INCIDENCE],
            ElementKind::Lens => &[DISTANCE_TO_NEXT, FOCAL_LENGTH],
            ElementKind::Screen => &[DISTANCE_TO_NEXT],
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Transverse plane an ABCD matrix applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModePlane {
    Sagittal,
    Tangential,
}

/// Direction of propagation through an element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Forward,
    Backward,
}

/// Registry entry announced by the host in an `init` message.
///
/// Older hosts also sent `getStr` / `elementAbcdStr` source text; those fields
/// are accepted and ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "current_version")]
    pub version: u32,
}

fn current_version() -> u32 {
    REGISTRY_VERSION
}

impl ElementDef {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind: kind.name().to_string(),
            version: REGISTRY_VERSION,
        }
    }
}

/// One element of a system snapshot.
///
/// Only properties that read as an equation are kept; flags such as
/// `startOptic` are dropped on load.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementJson {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub loc: serde_json::Value,
    #[serde(default, deserialize_with = "equation_props")]
    pub prop: BTreeMap<String, Equation>,
}

fn equation_props<'de, D>(deserializer: D) -> Result<BTreeMap<String, Equation>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    let mut props = BTreeMap::new();
    for (name, value) in raw {
        match serde_json::from_value::<Equation>(value) {
            Ok(equation) => {
                props.insert(name, equation);
            }
            Err(err) => log::debug!("ignoring element property `{name}`: {err}"),
        }
    }
    Ok(props)
}

impl ElementJson {
    pub fn new(kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            kind: kind.name().to_string(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_prop(mut self, name: &str, value: impl Into<EquationInput>) -> Self {
        self.prop.insert(name.to_string(), Equation::new(value));
        self
    }
}

/// Set of element kinds the worker has been told to evaluate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementRegistry {
    kinds: BTreeSet<ElementKind>,
}

impl ElementRegistry {
    /// Registry holding every compiled kind.
    pub fn builtin() -> Self {
        Self {
            kinds: ElementKind::ALL.into_iter().collect(),
        }
    }

    /// Definitions a host sends to make the worker mirror this registry.
    pub fn definitions(&self) -> Vec<ElementDef> {
        self.kinds.iter().copied().map(ElementDef::new).collect()
    }

    /// Builds a registry from host definitions. Definitions that name an
    /// unknown kind or a different registry version are returned as errors
    /// and left out.
    pub fn from_definitions(defs: &[ElementDef]) -> (Self, Vec<ProtocolError>) {
        let mut registry = Self::default();
        let mut rejected = Vec::new();
        for def in defs {
            match resolve_definition(def) {
                Ok(kind) => {
                    registry.kinds.insert(kind);
                }
                Err(err) => rejected.push(err),
            }
        }
        (registry, rejected)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ElementKind> + '_ {
        self.kinds.iter().copied()
    }

    pub fn contains(&self, kind: ElementKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Binds a snapshot element to `variables`.
    pub fn instantiate<'a>(
        &self,
        element: &'a ElementJson,
        variables: &'a VariableStore,
    ) -> Result<BoundElement<'a>, ProtocolError> {
        let kind = ElementKind::from_name(&element.kind)
            .ok_or_else(|| ProtocolError::UnknownKind(element.kind.clone()))?;
        if !self.contains(kind) {
            return Err(ProtocolError::NotRegistered(kind));
        }
        Ok(BoundElement {
            kind,
            element,
            variables,
        })
    }
}

fn resolve_definition(def: &ElementDef) -> Result<ElementKind, ProtocolError> {
    let kind =
        ElementKind::from_name(&def.kind).ok_or_else(|| ProtocolError::UnknownKind(def.kind.clone()))?;
    if def.version != REGISTRY_VERSION {
        return Err(ProtocolError::VersionMismatch {
            kind,
            got: def.version,
            expected: REGISTRY_VERSION,
        });
    }
    Ok(kind)
}

/// A snapshot element whose properties evaluate against a particular
/// variable store.
#[derive(Clone, Copy, Debug)]
pub struct BoundElement<'a> {
    kind: ElementKind,
    element: &'a ElementJson,
    variables: &'a VariableStore,
}

impl BoundElement<'_> {
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.element.name
    }

    /// Current value of a property. Missing properties read as `0`; the
    /// distance to the next element is never negative.
    pub fn get(&self, property: &str) -> f64 {
        let value = self
            .element
            .prop
            .get(property)
            .map_or(0.0, |eq| eq.value_with(self.variables));
        if property == DISTANCE_TO_NEXT {
            value.max(0.0)
        } else {
            value
        }
    }

    /// ABCD matrix of the element itself, excluding propagation to the next one.
    pub fn abcd(&self, _direction: Direction, plane: ModePlane) -> Matrix2x2 {
        match self.kind {
            ElementKind::Mirror => {
                let radius = self.get(RADIUS_OF_CURVATURE);
                let cos_q = self.get(ANGLE_OF_INCIDENCE).to_radians().cos();
                let effective = match plane {
                    ModePlane::Sagittal => radius / cos_q,
                    ModePlane::Tangential => radius * cos_q,
                };
                // A flat mirror is written as radius 0.
                Matrix2x2::thin(if radius == 0.0 { 0.0 } else { -2.0 / effective })
            }
            ElementKind::Lens => {
                let focal_length = self.get(FOCAL_LENGTH);
                Matrix2x2::thin(if focal_length == 0.0 { 0.0 } else { -1.0 / focal_length })
            }
            ElementKind::Screen => Matrix2x2::IDENTITY,
        }
    }
}

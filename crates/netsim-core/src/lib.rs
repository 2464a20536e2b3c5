//! # netsim-core: network model builder
//!
//! Holds the data side of a netsim study: nodes (buses), a closed set of typed
//! components attached to them, the snapshot index, per-snapshot attribute
//! series, and the most recent evaluation result.
//!
//! ## Design
//!
//! - Components are tagged variants ([`ComponentParams`]) with fixed attribute
//!   structs. Defaults live in one [`schema`] registry.
//! - Every builder call either succeeds completely or leaves the model as it
//!   was, returning a [`NetworkError`].
//! - A structural revision counter invalidates stored results when nodes or
//!   components are added or removed, or when the snapshot index is replaced.
//!
//! ## Quick Start
//!
//! ```
//! use netsim_core::*;
//!
//! let mut network = Network::new();
//! network.add_node("a", BusParams::default()).unwrap();
//! network.add_node("b", BusParams::default()).unwrap();
//! network
//!     .add_generator("gen", "a", GeneratorParams::with_capacity(100.0))
//!     .unwrap();
//! network.add_load("demand", "b", LoadParams::new(50.0, 0.0)).unwrap();
//! network
//!     .add_line("a-b", "a", "b", LineParams::new(0.1, 0.01, 100.0))
//!     .unwrap();
//!
//! // Referencing a missing node fails and changes nothing
//! assert!(network
//!     .add_load("ghost", "c", LoadParams::default())
//!     .is_err());
//! assert_eq!(network.components().len(), 3);
//!
//! // Nothing has been evaluated yet
//! assert!(matches!(
//!     network.read_static(ComponentKind::Generator),
//!     Err(NetworkError::NoResultAvailable)
//! ));
//! ```
//!
//! ## Modules
//!
//! - [`components`] - component kinds and attribute structs
//! - [`schema`] - attribute registry (bounds, defaults, time-varying flags)
//! - [`snapshots`] - evaluation horizon
//! - [`results`] - result tables read back through [`Network`]
//! - [`diagnostics`] - non-fatal pre-flight checks
//! - [`graph_utils`] - sub-network detection
//! - [`solver`] - dense linear-system backends

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

pub mod components;
pub mod diagnostics;
pub mod error;
pub mod graph_utils;
mod network;
pub mod results;
pub mod schema;
pub mod snapshots;
pub mod solver;

pub use components::{
    Attachment, Component, ComponentKind, ComponentParams, Control, Extension, GeneratorParams,
    LineParams, LinkParams, LoadParams, StorageParams,
};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{IdScope, NetworkError, NetworkResult};
pub use graph_utils::{sub_networks, SubNetwork};
pub use network::{Network, NetworkStats};
pub use results::{AnalysisKind, EvaluationResult, ResultSeries, StaticTable};
pub use snapshots::{Snapshot, SnapshotIndex};
pub use solver::*;

/// Identifier of a node (bus). Unique among nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

/// Identifier of a component. Unique across all component kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl NodeId {
    #[inline]
    pub fn new(value: impl Into<String>) -> Self {
        NodeId(value.into())
    }
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ComponentId {
    #[inline]
    pub fn new(value: impl Into<String>) -> Self {
        ComponentId(value.into())
    }
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId(value)
    }
}

impl From<&str> for ComponentId {
    fn from(value: &str) -> Self {
        ComponentId(value.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(value: String) -> Self {
        ComponentId(value)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ComponentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Node attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusParams {
    /// Nominal voltage (kV)
    pub v_nom: f64,
    pub carrier: String,
    /// Voltage magnitude set-point for slack and PV buses (p.u.)
    pub v_mag_pu_set: f64,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl Default for BusParams {
    fn default() -> Self {
        Self {
            v_nom: 1.0,
            carrier: "AC".to_string(),
            v_mag_pu_set: 1.0,
            x: None,
            y: None,
        }
    }
}

impl BusParams {
    pub fn with_v_nom(v_nom: f64) -> Self {
        Self {
            v_nom,
            ..Self::default()
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub(crate) fn validate(&self, id: &str) -> NetworkResult<()> {
        use schema::Bound;
        let check = |attribute: &str, value: f64, bound: Bound| {
            bound
                .check(value)
                .map_err(|reason| NetworkError::invalid(id, attribute, reason))
        };
        check("v_nom", self.v_nom, Bound::Positive)?;
        check("v_mag_pu_set", self.v_mag_pu_set, Bound::Positive)?;
        if let Some(x) = self.x {
            check("x", x, Bound::Unbounded)?;
        }
        if let Some(y) = self.y {
            check("y", y, Bound::Unbounded)?;
        }
        Ok(())
    }
}

/// A node of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: NodeId,
    pub params: BusParams,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn ids_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(ComponentId::new("g1"), 1);
        assert_eq!(map.get("g1"), Some(&1));
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&NodeId::new("north")).unwrap();
        assert_eq!(json, "\"north\"");
    }

    #[test]
    fn bus_voltage_must_be_positive() {
        assert!(BusParams::with_v_nom(0.0).validate("b").is_err());
        assert!(BusParams::with_v_nom(380.0).validate("b").is_ok());
    }
}

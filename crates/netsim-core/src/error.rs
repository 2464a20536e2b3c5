//! Error taxonomy for model building and evaluation.
//!
//! [`NetworkError`] separates two families of failure:
//!
//! - **Structural / validation errors** (duplicate ids, unknown references,
//!   bad horizons, out-of-bound attribute values) are returned by the offending
//!   builder call, which leaves the model untouched.
//! - **Evaluation errors** (`PowerFlowDivergence`, `SolverFailure`) are never
//!   returned by the evaluator itself; it reports a status/condition instead.
//!   A caller that wants a hard failure converts the report with
//!   `EvaluationReport::check`.
//!
//! # Example
//!
//! ```
//! use netsim_core::{Network, NetworkError, BusParams};
//!
//! let mut network = Network::new();
//! network.add_node("north", BusParams::default()).unwrap();
//! let err = network.add_node("north", BusParams::default()).unwrap_err();
//! assert!(matches!(err, NetworkError::DuplicateIdentifier { .. }));
//! ```

use crate::components::ComponentKind;
use crate::snapshots::Snapshot;
use thiserror::Error;

/// Namespace in which an identifier collided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdScope {
    Node,
    Component,
}

impl std::fmt::Display for IdScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdScope::Node => write!(f, "node"),
            IdScope::Component => write!(f, "component"),
        }
    }
}

/// Unified error type for netsim operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// Identifier already used within its namespace
    #[error("duplicate {scope} identifier '{id}'")]
    DuplicateIdentifier { id: String, scope: IdScope },

    /// A component references a node that does not exist
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    /// No component with this identifier exists
    #[error("unknown component '{0}'")]
    UnknownComponent(String),

    /// The attribute does not exist, or does not accept a time series
    #[error("{kind} does not accept time-varying attribute '{attribute}'")]
    UnknownAttribute {
        kind: ComponentKind,
        attribute: String,
    },

    /// Missing, non-finite or out-of-bound attribute value
    #[error("invalid value for '{attribute}' on '{id}': {reason}")]
    InvalidAttributeValue {
        id: String,
        attribute: String,
        reason: String,
    },

    /// Snapshot labels are empty or not strictly increasing
    #[error("invalid snapshot horizon: {0}")]
    InvalidHorizon(String),

    /// A time series was attached before any snapshot index existed
    #[error("no snapshot horizon defined")]
    NoHorizonDefined,

    /// Series length does not match the snapshot index
    #[error("expected {expected} values to match the snapshot index, got {actual}")]
    HorizonMismatch { expected: usize, actual: usize },

    /// Newton-Raphson did not converge for one or more snapshots
    #[error(
        "power flow did not converge for {} snapshot(s) (max mismatch {max_mismatch:.3e})",
        snapshots.len()
    )]
    PowerFlowDivergence {
        snapshots: Vec<Snapshot>,
        max_mismatch: f64,
    },

    /// No successful evaluation since the model was built or last changed structurally
    #[error("no evaluation result available")]
    NoResultAvailable,

    /// The LP backend reported an error, infeasibility or unboundedness
    #[error("solver failure: {0}")]
    SolverFailure(String),
}

/// Convenience type alias for Results using NetworkError.
pub type NetworkResult<T> = Result<T, NetworkError>;

impl NetworkError {
    /// Shorthand for `InvalidAttributeValue`.
    pub fn invalid(
        id: impl Into<String>,
        attribute: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        NetworkError::InvalidAttributeValue {
            id: id.into(),
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised by builder calls (the model was malformed).
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            NetworkError::PowerFlowDivergence { .. }
                | NetworkError::SolverFailure(_)
                | NetworkError::NoResultAvailable
        )
    }
}

//! Snapshot index: the ordered evaluation horizon.

use crate::error::{NetworkError, NetworkResult};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One discrete time point of the evaluation horizon.
pub type Snapshot = NaiveDateTime;

/// Ordered, strictly increasing snapshot labels with per-snapshot weightings.
///
/// The weighting is the number of hours a snapshot stands for. It scales
/// marginal costs in the objective and energy in storage continuity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshotIndex")]
pub struct SnapshotIndex {
    labels: Vec<Snapshot>,
    weightings: Vec<f64>,
}

/// Unchecked wire form; deserialization re-runs the constructor checks.
#[derive(Deserialize)]
struct RawSnapshotIndex {
    labels: Vec<Snapshot>,
    weightings: Option<Vec<f64>>,
}

impl TryFrom<RawSnapshotIndex> for SnapshotIndex {
    type Error = NetworkError;

    fn try_from(raw: RawSnapshotIndex) -> NetworkResult<Self> {
        let mut index = SnapshotIndex::new(raw.labels)?;
        if let Some(weightings) = raw.weightings {
            index.set_weightings(weightings)?;
        }
        Ok(index)
    }
}

impl SnapshotIndex {
    /// Build an index with unit weightings.
    ///
    /// Fails with `InvalidHorizon` when `labels` is empty or not strictly increasing.
    pub fn new(labels: Vec<Snapshot>) -> NetworkResult<Self> {
        if labels.is_empty() {
            return Err(NetworkError::InvalidHorizon(
                "snapshot index must not be empty".into(),
            ));
        }
        if let Some(pos) = labels.windows(2).position(|w| w[0] >= w[1]) {
            return Err(NetworkError::InvalidHorizon(format!(
                "snapshot {} ({}) does not follow {} strictly",
                pos + 1,
                labels[pos + 1],
                labels[pos]
            )));
        }
        let weightings = vec![1.0; labels.len()];
        Ok(Self { labels, weightings })
    }

    /// `count` hourly snapshots starting at `start`.
    pub fn hourly(start: Snapshot, count: usize) -> NetworkResult<Self> {
        Self::with_step(start, count, Duration::hours(1))
    }

    /// `count` evenly spaced snapshots; each is weighted by the step length in hours.
    pub fn with_step(start: Snapshot, count: usize, step: Duration) -> NetworkResult<Self> {
        if step <= Duration::zero() {
            return Err(NetworkError::InvalidHorizon(
                "snapshot step must be positive".into(),
            ));
        }
        let steps = i32::try_from(count).map_err(|_| {
            NetworkError::InvalidHorizon(format!("{count} snapshots exceed the supported range"))
        })?;
        let labels = (0..steps)
            .map(|i| {
                step.checked_mul(i)
                    .and_then(|offset| start.checked_add_signed(offset))
                    .ok_or_else(|| {
                        NetworkError::InvalidHorizon(format!(
                            "snapshot {i} lies beyond the representable calendar"
                        ))
                    })
            })
            .collect::<NetworkResult<Vec<_>>>()?;
        let mut index = Self::new(labels)?;
        let hours = step.num_seconds() as f64 / 3600.0;
        index.weightings = vec![hours; count];
        Ok(index)
    }

    /// Replace the weightings. Lengths must match and weights must be positive.
    pub fn set_weightings(&mut self, weightings: Vec<f64>) -> NetworkResult<()> {
        if weightings.len() != self.labels.len() {
            return Err(NetworkError::HorizonMismatch {
                expected: self.labels.len(),
                actual: weightings.len(),
            });
        }
        if let Some(bad) = weightings.iter().find(|w| !w.is_finite() || **w <= 0.0) {
            return Err(NetworkError::invalid(
                "snapshots",
                "weighting",
                format!("weightings must be positive, got {bad}"),
            ));
        }
        self.weightings = weightings;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[Snapshot] {
        &self.labels
    }

    pub fn weightings(&self) -> &[f64] {
        &self.weightings
    }

    #[inline]
    pub fn weight(&self, t: usize) -> f64 {
        self.weightings[t]
    }

    /// Position of a label within the index.
    pub fn position(&self, label: &Snapshot) -> Option<usize> {
        self.labels.binary_search(label).ok()
    }

    /// Total hours represented by the index.
    pub fn total_hours(&self) -> f64 {
        self.weightings.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Snapshot)> {
        self.labels.iter().enumerate()
    }
}

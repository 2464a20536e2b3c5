use chrono::Timelike;
use netsim_core::{Network, NetworkError, NetworkResult, Snapshot, SnapshotIndex};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A rule that yields exactly one value per snapshot.
///
/// Parametric shapes are evaluated on the hour of day of each snapshot label,
/// so a multi-day index repeats the daily shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Profile {
    /// One value per snapshot, in order
    Literal { values: Vec<f64> },
    /// The same value at every snapshot
    Constant { value: f64 },
    /// Half-sine between sunrise and sunset (hours), zero at night
    Diurnal { sunrise: f64, sunset: f64, peak: f64 },
    /// Piecewise-linear over `(hour, value)` control points, wrapping at midnight
    Interpolated { points: Vec<(f64, f64)> },
    /// Another profile multiplied by a constant
    Scaled { base: Box<Profile>, factor: f64 },
}

impl Profile {
    pub fn constant(value: f64) -> Self {
        Profile::Constant { value }
    }

    pub fn literal(values: Vec<f64>) -> Self {
        Profile::Literal { values }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Profile::Scaled {
            base: Box::new(self),
            factor,
        }
    }

    /// Evaluate over a snapshot index. Deterministic; the output length
    /// always equals `index.len()`.
    pub fn generate(&self, index: &SnapshotIndex) -> NetworkResult<Vec<f64>> {
        match self {
            Profile::Literal { values } => {
                if values.len() != index.len() {
                    return Err(NetworkError::HorizonMismatch {
                        expected: index.len(),
                        actual: values.len(),
                    });
                }
                Ok(values.clone())
            }
            Profile::Constant { value } => {
                finite("value", *value)?;
                Ok(vec![*value; index.len()])
            }
            Profile::Diurnal {
                sunrise,
                sunset,
                peak,
            } => {
                finite("peak", *peak)?;
                if !(0.0..24.0).contains(sunrise) || !(*sunrise < *sunset && *sunset <= 24.0) {
                    return Err(NetworkError::invalid(
                        "profile",
                        "sunset",
                        format!("need 0 <= sunrise < sunset <= 24, got {sunrise}..{sunset}"),
                    ));
                }
                Ok(index
                    .labels()
                    .iter()
                    .map(|label| {
                        let h = hour_of_day(label);
                        if h <= *sunrise || h >= *sunset {
                            0.0
                        } else {
                            peak * (PI * (h - sunrise) / (sunset - sunrise)).sin()
                        }
                    })
                    .collect())
            }
            Profile::Interpolated { points } => {
                let points = sorted_points(points)?;
                Ok(index
                    .labels()
                    .iter()
                    .map(|label| interpolate(&points, hour_of_day(label)))
                    .collect())
            }
            Profile::Scaled { base, factor } => {
                finite("factor", *factor)?;
                Ok(base
                    .generate(index)?
                    .into_iter()
                    .map(|v| v * factor)
                    .collect())
            }
        }
    }

    /// Generate over the network's horizon and store the result as the
    /// attribute's time series.
    pub fn attach(
        &self,
        network: &mut Network,
        component_id: &str,
        attribute: &str,
    ) -> NetworkResult<()> {
        let values = self.generate(network.horizon()?)?;
        network.set_time_series(component_id, attribute, values)
    }
}

fn finite(attribute: &str, value: f64) -> NetworkResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(NetworkError::invalid(
            "profile",
            attribute,
            format!("must be finite, got {value}"),
        ))
    }
}

fn hour_of_day(label: &Snapshot) -> f64 {
    label.hour() as f64 + label.minute() as f64 / 60.0 + label.second() as f64 / 3600.0
}

fn sorted_points(points: &[(f64, f64)]) -> NetworkResult<Vec<(f64, f64)>> {
    if points.is_empty() {
        return Err(NetworkError::invalid(
            "profile",
            "points",
            "at least one control point is required",
        ));
    }
    for (hour, value) in points {
        if !(0.0..24.0).contains(hour) {
            return Err(NetworkError::invalid(
                "profile",
                "points",
                format!("hour {hour} is outside [0, 24)"),
            ));
        }
        finite("points", *value)?;
    }
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    if let Some(pair) = sorted.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(NetworkError::invalid(
            "profile",
            "points",
            format!("hour {} is given twice", pair[0].0),
        ));
    }
    Ok(sorted)
}

/// Linear interpolation on a 24-hour circle. `points` is sorted and non-empty.
fn interpolate(points: &[(f64, f64)], hour: f64) -> f64 {
    let (first, last) = (points[0], points[points.len() - 1]);
    if points.len() == 1 {
        return first.1;
    }
    if let Some(pair) = points
        .windows(2)
        .find(|w| w[0].0 <= hour && hour < w[1].0)
    {
        let (a, b) = (pair[0], pair[1]);
        return a.1 + (b.1 - a.1) * (hour - a.0) / (b.0 - a.0);
    }
    // Between the last point and the first point of the next day.
    let span = first.0 + 24.0 - last.0;
    let offset = if hour >= last.0 {
        hour - last.0
    } else {
        hour + 24.0 - last.0
    };
    last.1 + (first.1 - last.1) * offset / span
}

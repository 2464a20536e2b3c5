//! Schema registry: the one place attribute metadata and defaults are declared.
//!
//! Every numeric attribute of every component kind is listed here together
//! with its bound, whether it may vary over snapshots, and its default. The
//! `Default` impls of the `*Params` structs read their values from this table,
//! and the builder consults it to accept or reject time series.

use crate::components::ComponentKind;

/// Admissible range of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Any finite value
    Unbounded,
    /// `v >= 0`
    NonNegative,
    /// `v > 0`
    Positive,
    /// `0 <= v <= 1`
    Fraction,
    /// `0 < v <= 1`
    PositiveFraction,
    /// `-1 <= v <= 1`
    SignedFraction,
}

impl Bound {
    /// Check a value, returning a human-readable reason on violation.
    pub fn check(self, value: f64) -> Result<(), String> {
        if !value.is_finite() {
            return Err(format!("value must be finite, got {value}"));
        }
        let ok = match self {
            Bound::Unbounded => true,
            Bound::NonNegative => value >= 0.0,
            Bound::Positive => value > 0.0,
            Bound::Fraction => (0.0..=1.0).contains(&value),
            Bound::PositiveFraction => value > 0.0 && value <= 1.0,
            Bound::SignedFraction => (-1.0..=1.0).contains(&value),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("{value} is outside {}", self.describe()))
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Bound::Unbounded => "(-inf, inf)",
            Bound::NonNegative => "[0, inf)",
            Bound::Positive => "(0, inf)",
            Bound::Fraction => "[0, 1]",
            Bound::PositiveFraction => "(0, 1]",
            Bound::SignedFraction => "[-1, 1]",
        }
    }
}

/// How an attribute is filled when the caller does not supply it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fallback {
    /// Declared default value
    Value(f64),
    /// Must be provided; the params struct holds NaN until it is
    Required,
    /// May stay unset (`None`)
    Optional,
}

/// Metadata for one numeric attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub time_varying: bool,
    pub bound: Bound,
    pub fallback: Fallback,
    pub unit: &'static str,
}

const fn attr(
    name: &'static str,
    time_varying: bool,
    bound: Bound,
    fallback: Fallback,
    unit: &'static str,
) -> AttributeSpec {
    AttributeSpec {
        name,
        time_varying,
        bound,
        fallback,
        unit,
    }
}

use Bound::*;
use Fallback::{Optional, Required, Value};

const GENERATOR: &[AttributeSpec] = &[
    attr("p_nom", false, NonNegative, Value(0.0), "MW"),
    attr("p_min_pu", true, Fraction, Value(0.0), "per unit"),
    attr("p_max_pu", true, Fraction, Value(1.0), "per unit"),
    attr("p_set", true, Unbounded, Optional, "MW"),
    attr("q_set", true, Unbounded, Value(0.0), "Mvar"),
    attr("marginal_cost", true, NonNegative, Value(0.0), "currency/MWh"),
    attr("ramp_limit_up", false, Fraction, Optional, "per unit"),
    attr("ramp_limit_down", false, Fraction, Optional, "per unit"),
];

const LOAD: &[AttributeSpec] = &[
    attr("p_set", true, Unbounded, Value(0.0), "MW"),
    attr("q_set", true, Unbounded, Value(0.0), "Mvar"),
];

const LINE: &[AttributeSpec] = &[
    attr("x", false, Positive, Required, "per unit"),
    attr("r", false, NonNegative, Value(0.0), "per unit"),
    attr("b", false, NonNegative, Value(0.0), "per unit"),
    attr("s_nom", false, NonNegative, Value(0.0), "MVA"),
    attr("s_max_pu", true, Fraction, Value(1.0), "per unit"),
];

const LINK: &[AttributeSpec] = &[
    attr("p_nom", false, NonNegative, Value(0.0), "MW"),
    attr("efficiency", true, Fraction, Value(1.0), "per unit"),
    attr("p_min_pu", true, SignedFraction, Value(0.0), "per unit"),
    attr("p_max_pu", true, Fraction, Value(1.0), "per unit"),
    attr("p_set", true, Unbounded, Optional, "MW"),
    attr("marginal_cost", true, Unbounded, Value(0.0), "currency/MWh"),
];

const STORAGE: &[AttributeSpec] = &[
    attr("p_nom", false, NonNegative, Value(0.0), "MW"),
    attr("e_nom", false, NonNegative, Value(0.0), "MWh"),
    attr("e_min_pu", false, Fraction, Value(0.0), "per unit"),
    attr("e_max_pu", false, Fraction, Value(1.0), "per unit"),
    attr("e_initial_pu", false, Fraction, Value(0.0), "per unit"),
    attr("efficiency_store", false, PositiveFraction, Value(1.0), "per unit"),
    attr("efficiency_dispatch", false, PositiveFraction, Value(1.0), "per unit"),
    attr("standing_loss", false, Fraction, Value(0.0), "per unit per hour"),
    attr("p_set", true, Unbounded, Optional, "MW"),
    attr("marginal_cost", true, Unbounded, Value(0.0), "currency/MWh"),
];

/// All numeric attributes of a component kind.
pub fn attributes(kind: ComponentKind) -> &'static [AttributeSpec] {
    match kind {
        ComponentKind::Generator => GENERATOR,
        ComponentKind::Load => LOAD,
        ComponentKind::Line => LINE,
        ComponentKind::Link => LINK,
        ComponentKind::Storage => STORAGE,
    }
}

pub fn lookup(kind: ComponentKind, name: &str) -> Option<&'static AttributeSpec> {
    attributes(kind).iter().find(|spec| spec.name == name)
}

/// Attributes of `kind` that accept a time series.
pub fn series_attributes(kind: ComponentKind) -> impl Iterator<Item = &'static AttributeSpec> {
    attributes(kind).iter().filter(|spec| spec.time_varying)
}

/// Declared default, NaN for required attributes and for unknown names.
pub(crate) fn default_value(kind: ComponentKind, name: &str) -> f64 {
    match lookup(kind, name).map(|spec| spec.fallback) {
        Some(Value(v)) => v,
        _ => f64::NAN,
    }
}

//! Closed set of component variants and their statically typed attributes.
//!
//! Every variant carries its own `*Params` struct. Defaults come from the
//! schema registry, so `GeneratorParams::default()` and friends always agree
//! with [`crate::schema`].

use crate::error::{NetworkError, NetworkResult};
use crate::schema::{self, default_value, Fallback};
use crate::{ComponentId, NodeId};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Component kinds known to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Generator,
    Load,
    Line,
    Link,
    Storage,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Generator,
        ComponentKind::Load,
        ComponentKind::Line,
        ComponentKind::Link,
        ComponentKind::Storage,
    ];

    /// Binary kinds attach to two nodes, unary kinds to one.
    pub fn is_binary(self) -> bool {
        matches!(self, ComponentKind::Line | ComponentKind::Link)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Generator => "generator",
            ComponentKind::Load => "load",
            ComponentKind::Line => "line",
            ComponentKind::Link => "link",
            ComponentKind::Storage => "storage",
        }
    }

    /// Plural name used for tables and exported files.
    pub fn table_name(self) -> &'static str {
        match self {
            ComponentKind::Generator => "generators",
            ComponentKind::Load => "loads",
            ComponentKind::Line => "lines",
            ComponentKind::Link => "links",
            ComponentKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let lowered = input.to_ascii_lowercase();
        ComponentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered || kind.table_name() == lowered)
            .ok_or_else(|| {
                anyhow!(
                    "unknown component kind '{}'; supported values: generator, load, line, link, storage",
                    input
                )
            })
    }
}

/// Power-flow role of a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    /// Absorbs the island's mismatch; voltage magnitude and angle fixed
    Slack,
    /// Fixed active power and voltage magnitude
    PV,
    /// Fixed active and reactive power
    #[default]
    PQ,
}

/// Capacity-expansion settings consumed by investment optimization.
///
/// `nom_max = None` leaves the capacity unbounded above. With `unit_size`
/// set, builds are integer multiples of that size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Extension {
    pub capital_cost: f64,
    pub nom_min: f64,
    pub nom_max: Option<f64>,
    pub unit_size: Option<f64>,
    pub allow_retirement: bool,
    pub lifetime_periods: Option<usize>,
}

impl Default for Extension {
    fn default() -> Self {
        Self {
            capital_cost: 0.0,
            nom_min: 0.0,
            nom_max: None,
            unit_size: None,
            allow_retirement: false,
            lifetime_periods: None,
        }
    }
}

impl Extension {
    pub fn with_capital_cost(capital_cost: f64) -> Self {
        Self {
            capital_cost,
            ..Self::default()
        }
    }

    pub fn upper(&self) -> f64 {
        self.nom_max.unwrap_or(f64::INFINITY)
    }

    fn validate(&self, id: &str) -> NetworkResult<()> {
        let check = |attribute: &str, value: f64, bound: schema::Bound| {
            bound
                .check(value)
                .map_err(|reason| NetworkError::invalid(id, attribute, reason))
        };
        check("extension.capital_cost", self.capital_cost, schema::Bound::NonNegative)?;
        check("extension.nom_min", self.nom_min, schema::Bound::NonNegative)?;
        if let Some(max) = self.nom_max {
            check("extension.nom_max", max, schema::Bound::NonNegative)?;
            if max < self.nom_min {
                return Err(NetworkError::invalid(
                    id,
                    "extension.nom_max",
                    format!("nom_max {max} is below nom_min {}", self.nom_min),
                ));
            }
        }
        if let Some(size) = self.unit_size {
            check("extension.unit_size", size, schema::Bound::Positive)?;
        }
        if self.lifetime_periods == Some(0) {
            return Err(NetworkError::invalid(
                id,
                "extension.lifetime_periods",
                "lifetime must cover at least one period",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorParams {
    pub p_nom: f64,
    pub p_min_pu: f64,
    pub p_max_pu: f64,
    pub p_set: Option<f64>,
    pub q_set: f64,
    pub marginal_cost: f64,
    pub control: Control,
    pub ramp_limit_up: Option<f64>,
    pub ramp_limit_down: Option<f64>,
    pub carrier: String,
    pub extension: Option<Extension>,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        let kind = ComponentKind::Generator;
        Self {
            p_nom: default_value(kind, "p_nom"),
            p_min_pu: default_value(kind, "p_min_pu"),
            p_max_pu: default_value(kind, "p_max_pu"),
            p_set: None,
            q_set: default_value(kind, "q_set"),
            marginal_cost: default_value(kind, "marginal_cost"),
            control: Control::default(),
            ramp_limit_up: None,
            ramp_limit_down: None,
            carrier: String::new(),
            extension: None,
        }
    }
}

impl GeneratorParams {
    pub fn with_capacity(p_nom: f64) -> Self {
        Self {
            p_nom,
            ..Self::default()
        }
    }

    pub fn with_p_limits(mut self, p_min_pu: f64, p_max_pu: f64) -> Self {
        self.p_min_pu = p_min_pu;
        self.p_max_pu = p_max_pu;
        self
    }

    pub fn with_marginal_cost(mut self, cost: f64) -> Self {
        self.marginal_cost = cost;
        self
    }

    pub fn with_p_set(mut self, p_set: f64) -> Self {
        self.p_set = Some(p_set);
        self
    }

    pub fn with_control(mut self, control: Control) -> Self {
        self.control = control;
        self
    }

    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.carrier = carrier.into();
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension = Some(extension);
        self
    }

    fn values(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![
            ("p_nom", Some(self.p_nom)),
            ("p_min_pu", Some(self.p_min_pu)),
            ("p_max_pu", Some(self.p_max_pu)),
            ("p_set", self.p_set),
            ("q_set", Some(self.q_set)),
            ("marginal_cost", Some(self.marginal_cost)),
            ("ramp_limit_up", self.ramp_limit_up),
            ("ramp_limit_down", self.ramp_limit_down),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadParams {
    pub p_set: f64,
    pub q_set: f64,
}

impl Default for LoadParams {
    fn default() -> Self {
        Self {
            p_set: default_value(ComponentKind::Load, "p_set"),
            q_set: default_value(ComponentKind::Load, "q_set"),
        }
    }
}

impl LoadParams {
    pub fn new(p_set: f64, q_set: f64) -> Self {
        Self { p_set, q_set }
    }

    fn values(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![("p_set", Some(self.p_set)), ("q_set", Some(self.q_set))]
    }
}

/// AC line. `x` has no default and must be supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineParams {
    pub x: f64,
    pub r: f64,
    pub b: f64,
    pub s_nom: f64,
    pub s_max_pu: f64,
    pub extension: Option<Extension>,
}

impl Default for LineParams {
    fn default() -> Self {
        let kind = ComponentKind::Line;
        Self {
            x: default_value(kind, "x"),
            r: default_value(kind, "r"),
            b: default_value(kind, "b"),
            s_nom: default_value(kind, "s_nom"),
            s_max_pu: default_value(kind, "s_max_pu"),
            extension: None,
        }
    }
}

impl LineParams {
    pub fn new(x: f64, r: f64, s_nom: f64) -> Self {
        Self {
            x,
            r,
            s_nom,
            ..Self::default()
        }
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension = Some(extension);
        self
    }

    fn values(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![
            ("x", Some(self.x)),
            ("r", Some(self.r)),
            ("b", Some(self.b)),
            ("s_nom", Some(self.s_nom)),
            ("s_max_pu", Some(self.s_max_pu)),
        ]
    }
}

/// Controllable point-to-point transfer with conversion efficiency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkParams {
    pub p_nom: f64,
    pub efficiency: f64,
    pub p_min_pu: f64,
    pub p_max_pu: f64,
    pub p_set: Option<f64>,
    pub marginal_cost: f64,
    pub extension: Option<Extension>,
}

impl Default for LinkParams {
    fn default() -> Self {
        let kind = ComponentKind::Link;
        Self {
            p_nom: default_value(kind, "p_nom"),
            efficiency: default_value(kind, "efficiency"),
            p_min_pu: default_value(kind, "p_min_pu"),
            p_max_pu: default_value(kind, "p_max_pu"),
            p_set: None,
            marginal_cost: default_value(kind, "marginal_cost"),
            extension: None,
        }
    }
}

impl LinkParams {
    pub fn with_capacity(p_nom: f64) -> Self {
        Self {
            p_nom,
            ..Self::default()
        }
    }

    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }

    pub fn bidirectional(mut self) -> Self {
        self.p_min_pu = -1.0;
        self
    }

    fn values(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![
            ("p_nom", Some(self.p_nom)),
            ("efficiency", Some(self.efficiency)),
            ("p_min_pu", Some(self.p_min_pu)),
            ("p_max_pu", Some(self.p_max_pu)),
            ("p_set", self.p_set),
            ("marginal_cost", Some(self.marginal_cost)),
        ]
    }
}

/// Energy storage unit. Positive `p` discharges into the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageParams {
    pub p_nom: f64,
    pub e_nom: f64,
    pub e_min_pu: f64,
    pub e_max_pu: f64,
    pub e_initial_pu: f64,
    pub e_cyclic: bool,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    pub standing_loss: f64,
    pub p_set: Option<f64>,
    pub marginal_cost: f64,
    pub extension: Option<Extension>,
}

impl Default for StorageParams {
    fn default() -> Self {
        let kind = ComponentKind::Storage;
        Self {
            p_nom: default_value(kind, "p_nom"),
            e_nom: default_value(kind, "e_nom"),
            e_min_pu: default_value(kind, "e_min_pu"),
            e_max_pu: default_value(kind, "e_max_pu"),
            e_initial_pu: default_value(kind, "e_initial_pu"),
            e_cyclic: false,
            efficiency_store: default_value(kind, "efficiency_store"),
            efficiency_dispatch: default_value(kind, "efficiency_dispatch"),
            standing_loss: default_value(kind, "standing_loss"),
            p_set: None,
            marginal_cost: default_value(kind, "marginal_cost"),
            extension: None,
        }
    }
}

impl StorageParams {
    pub fn new(p_nom: f64, e_nom: f64) -> Self {
        Self {
            p_nom,
            e_nom,
            ..Self::default()
        }
    }

    pub fn with_energy_limits(mut self, e_min_pu: f64, e_max_pu: f64) -> Self {
        self.e_min_pu = e_min_pu;
        self.e_max_pu = e_max_pu;
        self
    }

    pub fn with_efficiencies(mut self, store: f64, dispatch: f64) -> Self {
        self.efficiency_store = store;
        self.efficiency_dispatch = dispatch;
        self
    }

    pub fn with_initial_energy(mut self, e_initial_pu: f64) -> Self {
        self.e_initial_pu = e_initial_pu;
        self
    }

    /// Hours of full-power discharge, when both ratings are non-zero.
    pub fn max_hours(&self) -> Option<f64> {
        (self.p_nom > 0.0 && self.e_nom > 0.0).then(|| self.e_nom / self.p_nom)
    }

    fn values(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![
            ("p_nom", Some(self.p_nom)),
            ("e_nom", Some(self.e_nom)),
            ("e_min_pu", Some(self.e_min_pu)),
            ("e_max_pu", Some(self.e_max_pu)),
            ("e_initial_pu", Some(self.e_initial_pu)),
            ("efficiency_store", Some(self.efficiency_store)),
            ("efficiency_dispatch", Some(self.efficiency_dispatch)),
            ("standing_loss", Some(self.standing_loss)),
            ("p_set", self.p_set),
            ("marginal_cost", Some(self.marginal_cost)),
        ]
    }
}

/// Attribute struct of any component kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentParams {
    Generator(GeneratorParams),
    Load(LoadParams),
    Line(LineParams),
    Link(LinkParams),
    Storage(StorageParams),
}

impl ComponentParams {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentParams::Generator(_) => ComponentKind::Generator,
            ComponentParams::Load(_) => ComponentKind::Load,
            ComponentParams::Line(_) => ComponentKind::Line,
            ComponentParams::Link(_) => ComponentKind::Link,
            ComponentParams::Storage(_) => ComponentKind::Storage,
        }
    }

    /// Default attributes for a kind.
    pub fn defaults(kind: ComponentKind) -> Self {
        match kind {
            ComponentKind::Generator => GeneratorParams::default().into(),
            ComponentKind::Load => LoadParams::default().into(),
            ComponentKind::Line => LineParams::default().into(),
            ComponentKind::Link => LinkParams::default().into(),
            ComponentKind::Storage => StorageParams::default().into(),
        }
    }

    /// Every numeric attribute with its static value, in registry order.
    pub fn numeric_values(&self) -> Vec<(&'static str, Option<f64>)> {
        match self {
            ComponentParams::Generator(p) => p.values(),
            ComponentParams::Load(p) => p.values(),
            ComponentParams::Line(p) => p.values(),
            ComponentParams::Link(p) => p.values(),
            ComponentParams::Storage(p) => p.values(),
        }
    }

    /// Static value of a numeric attribute; `None` when unset or unknown.
    pub fn static_value(&self, attribute: &str) -> Option<f64> {
        self.numeric_values()
            .into_iter()
            .find(|(name, _)| *name == attribute)
            .and_then(|(_, value)| value)
    }

    pub fn extension(&self) -> Option<&Extension> {
        match self {
            ComponentParams::Generator(p) => p.extension.as_ref(),
            ComponentParams::Load(_) => None,
            ComponentParams::Line(p) => p.extension.as_ref(),
            ComponentParams::Link(p) => p.extension.as_ref(),
            ComponentParams::Storage(p) => p.extension.as_ref(),
        }
    }

    /// Nominal capacity subject to extension (`p_nom`, `s_nom` or `e_nom`).
    pub fn nominal(&self) -> Option<(&'static str, f64)> {
        match self {
            ComponentParams::Generator(p) => Some(("p_nom", p.p_nom)),
            ComponentParams::Load(_) => None,
            ComponentParams::Line(p) => Some(("s_nom", p.s_nom)),
            ComponentParams::Link(p) => Some(("p_nom", p.p_nom)),
            ComponentParams::Storage(p) => Some(("e_nom", p.e_nom)),
        }
    }

    /// Attribute pairs that must hold `lo <= hi`, statically and at every snapshot.
    pub fn ordered_pairs(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            ComponentParams::Generator(_) | ComponentParams::Link(_) => {
                &[("p_min_pu", "p_max_pu")]
            }
            ComponentParams::Storage(_) => &[("e_min_pu", "e_max_pu")],
            ComponentParams::Load(_) | ComponentParams::Line(_) => &[],
        }
    }

    /// Check required attributes, registry bounds and cross-field constraints.
    pub fn validate(&self, id: &str) -> NetworkResult<()> {
        let kind = self.kind();
        for (name, value) in self.numeric_values() {
            let Some(spec) = schema::lookup(kind, name) else {
                continue;
            };
            match value {
                Some(v) if v.is_nan() && spec.fallback == Fallback::Required => {
                    return Err(NetworkError::invalid(
                        id,
                        name,
                        format!("required {kind} attribute is missing"),
                    ));
                }
                Some(v) => spec
                    .bound
                    .check(v)
                    .map_err(|reason| NetworkError::invalid(id, name, reason))?,
                None => {}
            }
        }

        for &(lo_name, hi_name) in self.ordered_pairs() {
            let (Some(lo), Some(hi)) = (self.static_value(lo_name), self.static_value(hi_name))
            else {
                continue;
            };
            if lo > hi {
                return Err(NetworkError::invalid(
                    id,
                    lo_name,
                    format!("{lo_name} {lo} exceeds {hi_name} {hi}"),
                ));
            }
        }
        if let ComponentParams::Storage(p) = self {
            if !p.e_cyclic && !(p.e_min_pu..=p.e_max_pu).contains(&p.e_initial_pu) {
                return Err(NetworkError::invalid(
                    id,
                    "e_initial_pu",
                    format!(
                        "e_initial_pu {} lies outside [{}, {}]",
                        p.e_initial_pu, p.e_min_pu, p.e_max_pu
                    ),
                ));
            }
        }

        if let Some(extension) = self.extension() {
            extension.validate(id)?;
        }
        Ok(())
    }
}

impl From<GeneratorParams> for ComponentParams {
    fn from(params: GeneratorParams) -> Self {
        ComponentParams::Generator(params)
    }
}

impl From<LoadParams> for ComponentParams {
    fn from(params: LoadParams) -> Self {
        ComponentParams::Load(params)
    }
}

impl From<LineParams> for ComponentParams {
    fn from(params: LineParams) -> Self {
        ComponentParams::Line(params)
    }
}

impl From<LinkParams> for ComponentParams {
    fn from(params: LinkParams) -> Self {
        ComponentParams::Link(params)
    }
}

impl From<StorageParams> for ComponentParams {
    fn from(params: StorageParams) -> Self {
        ComponentParams::Storage(params)
    }
}

/// Node references of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Attachment {
    Binary { bus0: NodeId, bus1: NodeId },
    Unary { bus: NodeId },
}

impl Attachment {
    pub fn nodes(&self) -> Vec<&NodeId> {
        match self {
            Attachment::Unary { bus } => vec![bus],
            Attachment::Binary { bus0, bus1 } => vec![bus0, bus1],
        }
    }

    /// The single node of a unary component, or `bus0` of a binary one.
    pub fn primary(&self) -> &NodeId {
        match self {
            Attachment::Unary { bus } => bus,
            Attachment::Binary { bus0, .. } => bus0,
        }
    }

    /// `bus1` of a binary component.
    pub fn secondary(&self) -> Option<&NodeId> {
        match self {
            Attachment::Unary { .. } => None,
            Attachment::Binary { bus1, .. } => Some(bus1),
        }
    }
}

/// A typed component attached to one or two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub attachment: Attachment,
    pub params: ComponentParams,
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        self.params.kind()
    }

    pub fn bus(&self) -> &NodeId {
        self.attachment.primary()
    }

    pub fn as_generator(&self) -> Option<&GeneratorParams> {
        match &self.params {
            ComponentParams::Generator(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_load(&self) -> Option<&LoadParams> {
        match &self.params {
            ComponentParams::Load(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&LineParams> {
        match &self.params {
            ComponentParams::Line(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&LinkParams> {
        match &self.params {
            ComponentParams::Link(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_storage(&self) -> Option<&StorageParams> {
        match &self.params {
            ComponentParams::Storage(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_singular_and_table_names() {
        assert_eq!("Generator".parse::<ComponentKind>().unwrap(), ComponentKind::Generator);
        assert_eq!("lines".parse::<ComponentKind>().unwrap(), ComponentKind::Line);
        assert!("transformer".parse::<ComponentKind>().is_err());
    }

    #[test]
    fn defaults_match_registry() {
        let storage = StorageParams::default();
        assert_eq!(storage.efficiency_store, 1.0);
        assert_eq!(storage.e_max_pu, 1.0);
        let line = LineParams::default();
        assert!(line.x.is_nan());
        assert_eq!(line.s_max_pu, 1.0);
    }

    #[test]
    fn missing_reactance_is_rejected() {
        let err = ComponentParams::from(LineParams::default())
            .validate("l1")
            .unwrap_err();
        assert!(matches!(
            err,
            NetworkError::InvalidAttributeValue { ref attribute, .. } if attribute == "x"
        ));
    }

    #[test]
    fn fraction_outside_bound_is_rejected() {
        let params = GeneratorParams::with_capacity(100.0).with_p_limits(0.0, 1.2);
        assert!(ComponentParams::from(params).validate("g").is_err());
    }

    #[test]
    fn negative_capacity_is_rejected() {
        let params = StorageParams::new(-1.0, 4.0);
        assert!(ComponentParams::from(params).validate("s").is_err());
    }

    #[test]
    fn inverted_energy_limits_are_rejected() {
        let params = StorageParams::new(1.0, 4.0).with_energy_limits(0.9, 0.1);
        let err = ComponentParams::from(params).validate("s").unwrap_err();
        assert!(err.to_string().contains("e_min_pu"));
    }

    #[test]
    fn initial_energy_must_lie_within_limits() {
        let params = StorageParams::new(1.0, 4.0)
            .with_energy_limits(0.2, 0.9)
            .with_initial_energy(0.95);
        let err = ComponentParams::from(params.clone()).validate("s").unwrap_err();
        assert!(matches!(
            err,
            NetworkError::InvalidAttributeValue { ref attribute, .. } if attribute == "e_initial_pu"
        ));

        let mut cyclic = params;
        cyclic.e_cyclic = true;
        assert!(ComponentParams::from(cyclic).validate("s").is_ok());
    }

    #[test]
    fn extension_bounds_are_checked() {
        let extension = Extension {
            nom_min: 10.0,
            nom_max: Some(5.0),
            ..Extension::default()
        };
        let params = GeneratorParams::with_capacity(1.0).with_extension(extension);
        assert!(ComponentParams::from(params).validate("g").is_err());
    }

    #[test]
    fn static_value_skips_unset_optionals() {
        let params = ComponentParams::from(GeneratorParams::with_capacity(80.0));
        assert_eq!(params.static_value("p_nom"), Some(80.0));
        assert_eq!(params.static_value("p_set"), None);
        assert_eq!(params.static_value("no_such_attribute"), None);
    }

    #[test]
    fn params_serialize_with_kind_tag() {
        let params = ComponentParams::from(LoadParams::new(50.0, 5.0));
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"kind\":\"load\""));
        let back: ComponentParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn storage_max_hours() {
        assert_eq!(StorageParams::new(2.0, 8.0).max_hours(), Some(4.0));
        assert_eq!(StorageParams::new(0.0, 8.0).max_hours(), None);
    }
}

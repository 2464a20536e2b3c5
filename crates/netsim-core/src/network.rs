use crate::components::{Attachment, Component, ComponentKind, ComponentParams};
use crate::components::{GeneratorParams, LineParams, LinkParams, LoadParams, StorageParams};
use crate::diagnostics::Diagnostics;
use crate::error::{IdScope, NetworkError, NetworkResult};
use crate::graph_utils::sub_networks;
use crate::results::{EvaluationResult, StaticTable};
use crate::schema;
use crate::snapshots::{Snapshot, SnapshotIndex};
use crate::{Bus, BusParams, ComponentId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

type SeriesStore = BTreeMap<ComponentId, BTreeMap<String, Vec<f64>>>;

/// A network model: nodes, typed components, horizon and attribute series.
///
/// The model exclusively owns its data. Evaluators borrow it read-only and the
/// caller stores their result back with [`Network::store_result`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(into = "NetworkData", try_from = "NetworkData")]
pub struct Network {
    name: String,
    buses: Vec<Bus>,
    bus_index: HashMap<NodeId, usize>,
    components: Vec<Component>,
    component_index: HashMap<ComponentId, usize>,
    snapshots: Option<SnapshotIndex>,
    series: SeriesStore,
    revision: u64,
    result: Option<EvaluationResult>,
}

/// Serialized form of a model. Loading replays it through the builder, so
/// every invariant is checked again.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NetworkData {
    #[serde(default)]
    name: String,
    #[serde(default)]
    snapshots: Option<SnapshotIndex>,
    #[serde(default)]
    buses: Vec<Bus>,
    #[serde(default)]
    components: Vec<Component>,
    #[serde(default)]
    series: SeriesStore,
}

impl From<Network> for NetworkData {
    fn from(network: Network) -> Self {
        NetworkData {
            name: network.name,
            snapshots: network.snapshots,
            buses: network.buses,
            components: network.components,
            series: network.series,
        }
    }
}

impl TryFrom<NetworkData> for Network {
    type Error = NetworkError;

    fn try_from(data: NetworkData) -> NetworkResult<Self> {
        let mut network = Network::with_name(data.name);
        if let Some(index) = data.snapshots {
            network.set_snapshot_index(index);
        }
        for bus in data.buses {
            network.add_node(bus.id, bus.params)?;
        }
        for component in data.components {
            network.insert_component(component)?;
        }
        for (id, attrs) in data.series {
            for (attribute, values) in attrs {
                network.set_time_series(id.as_str(), &attribute, values)?;
            }
        }
        Ok(network)
    }
}

impl PartialEq for Network {
    /// Models compare equal when their definitions match; stored results and
    /// revision counters are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.buses == other.buses
            && self.components == other.components
            && self.snapshots == other.snapshots
            && self.series == other.series
    }
}

impl Network {
    /// Empty model: no nodes, no components, no snapshot index.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Structural revision; bumps on node/component changes and horizon replacement.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump_revision(&mut self) {
        self.revision += 1;
    }

    // =========================================================================
    // Horizon
    // =========================================================================

    /// Replace the snapshot index.
    ///
    /// Fails with `InvalidHorizon` when `labels` is empty or not strictly
    /// increasing. On success every stored time series is dropped.
    pub fn set_snapshots(&mut self, labels: Vec<Snapshot>) -> NetworkResult<()> {
        let index = SnapshotIndex::new(labels)?;
        self.set_snapshot_index(index);
        Ok(())
    }

    /// Replace the snapshot index with a prebuilt one.
    pub fn set_snapshot_index(&mut self, index: SnapshotIndex) {
        if !self.series.is_empty() {
            debug!(
                dropped = self.series.len(),
                "snapshot index replaced; dropping attached series"
            );
        }
        self.series.clear();
        self.snapshots = Some(index);
        self.bump_revision();
    }

    pub fn set_snapshot_weightings(&mut self, weightings: Vec<f64>) -> NetworkResult<()> {
        let index = self
            .snapshots
            .as_mut()
            .ok_or(NetworkError::NoHorizonDefined)?;
        index.set_weightings(weightings)
    }

    pub fn snapshots(&self) -> Option<&SnapshotIndex> {
        self.snapshots.as_ref()
    }

    /// The snapshot index, or `NoHorizonDefined`.
    pub fn horizon(&self) -> NetworkResult<&SnapshotIndex> {
        self.snapshots.as_ref().ok_or(NetworkError::NoHorizonDefined)
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    pub fn add_node(&mut self, id: impl Into<NodeId>, params: BusParams) -> NetworkResult<()> {
        let id = id.into();
        if self.bus_index.contains_key(&id) {
            return Err(NetworkError::DuplicateIdentifier {
                id: id.to_string(),
                scope: IdScope::Node,
            });
        }
        params.validate(id.as_str())?;
        self.bus_index.insert(id.clone(), self.buses.len());
        self.buses.push(Bus { id, params });
        self.bump_revision();
        Ok(())
    }

    pub fn nodes(&self) -> &[Bus] {
        &self.buses
    }

    pub fn node(&self, id: &str) -> Option<&Bus> {
        self.bus_index.get(id).map(|&i| &self.buses[i])
    }

    /// Position of a node in [`Network::nodes`]; stable until the next structural change.
    pub fn node_position(&self, id: &str) -> Option<usize> {
        self.bus_index.get(id).copied()
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Attach a component of `kind` to one (unary) or two (binary) nodes.
    ///
    /// Nothing changes unless every check passes: the params variant matches
    /// `kind`, the node count matches, the id is unused across all kinds, all
    /// referenced nodes exist and all attribute values are within bounds.
    pub fn add_component(
        &mut self,
        kind: ComponentKind,
        id: impl Into<ComponentId>,
        node_refs: &[&str],
        params: impl Into<ComponentParams>,
    ) -> NetworkResult<()> {
        let id = id.into();
        let params = params.into();
        if params.kind() != kind {
            return Err(NetworkError::invalid(
                id.as_str(),
                "kind",
                format!("{kind} component given {} attributes", params.kind()),
            ));
        }
        let attachment = match (kind.is_binary(), node_refs) {
            (false, [bus]) => Attachment::Unary {
                bus: NodeId::from(*bus),
            },
            (true, [bus0, bus1]) => Attachment::Binary {
                bus0: NodeId::from(*bus0),
                bus1: NodeId::from(*bus1),
            },
            (binary, refs) => {
                return Err(NetworkError::invalid(
                    id.as_str(),
                    "bus",
                    format!(
                        "{kind} expects {} node reference(s), got {}",
                        if binary { 2 } else { 1 },
                        refs.len()
                    ),
                ))
            }
        };
        self.insert_component(Component {
            id,
            attachment,
            params,
        })
    }

    fn insert_component(&mut self, component: Component) -> NetworkResult<()> {
        let id = component.id.as_str();
        if self.component_index.contains_key(id) {
            return Err(NetworkError::DuplicateIdentifier {
                id: id.to_string(),
                scope: IdScope::Component,
            });
        }
        if component.kind().is_binary() != matches!(component.attachment, Attachment::Binary { .. })
        {
            return Err(NetworkError::invalid(
                id,
                "bus",
                format!("attachment does not fit a {}", component.kind()),
            ));
        }
        for node in component.attachment.nodes() {
            if !self.bus_index.contains_key(node) {
                return Err(NetworkError::UnknownNode(node.to_string()));
            }
        }
        if let Attachment::Binary { bus0, bus1 } = &component.attachment {
            if bus0 == bus1 {
                return Err(NetworkError::invalid(
                    id,
                    "bus1",
                    format!("both ends attach to '{bus0}'"),
                ));
            }
        }
        component.params.validate(id)?;

        self.component_index
            .insert(component.id.clone(), self.components.len());
        self.components.push(component);
        self.bump_revision();
        Ok(())
    }

    pub fn add_generator(
        &mut self,
        id: impl Into<ComponentId>,
        bus: &str,
        params: GeneratorParams,
    ) -> NetworkResult<()> {
        self.add_component(ComponentKind::Generator, id, &[bus], params)
    }

    pub fn add_load(
        &mut self,
        id: impl Into<ComponentId>,
        bus: &str,
        params: LoadParams,
    ) -> NetworkResult<()> {
        self.add_component(ComponentKind::Load, id, &[bus], params)
    }

    pub fn add_storage(
        &mut self,
        id: impl Into<ComponentId>,
        bus: &str,
        params: StorageParams,
    ) -> NetworkResult<()> {
        self.add_component(ComponentKind::Storage, id, &[bus], params)
    }

    pub fn add_line(
        &mut self,
        id: impl Into<ComponentId>,
        bus0: &str,
        bus1: &str,
        params: LineParams,
    ) -> NetworkResult<()> {
        self.add_component(ComponentKind::Line, id, &[bus0, bus1], params)
    }

    pub fn add_link(
        &mut self,
        id: impl Into<ComponentId>,
        bus0: &str,
        bus1: &str,
        params: LinkParams,
    ) -> NetworkResult<()> {
        self.add_component(ComponentKind::Link, id, &[bus0, bus1], params)
    }

    /// Remove a component and its series. Structural.
    pub fn remove_component(&mut self, id: &str) -> NetworkResult<Component> {
        let position = self
            .component_index
            .get(id)
            .copied()
            .ok_or_else(|| NetworkError::UnknownComponent(id.to_string()))?;
        let removed = self.components.remove(position);
        self.component_index.remove(id);
        for index in self.component_index.values_mut() {
            if *index > position {
                *index -= 1;
            }
        }
        self.series.remove(id);
        self.bump_revision();
        Ok(removed)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.component_index.get(id).map(|&i| &self.components[i])
    }

    pub fn components_of(&self, kind: ComponentKind) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(move |c| c.kind() == kind)
    }

    /// Components attached (at either end) to a node.
    pub fn components_at<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a Component> {
        self.components
            .iter()
            .filter(move |c| c.attachment.nodes().iter().any(|n| n.as_str() == node))
    }

    // =========================================================================
    // Time series
    // =========================================================================

    /// Attach per-snapshot values to a time-varying attribute.
    ///
    /// A failed call leaves any previously stored series untouched.
    pub fn set_time_series(
        &mut self,
        component_id: &str,
        attribute: &str,
        values: Vec<f64>,
    ) -> NetworkResult<()> {
        let component = self
            .component(component_id)
            .ok_or_else(|| NetworkError::UnknownComponent(component_id.to_string()))?;
        let kind = component.kind();
        let spec = schema::lookup(kind, attribute)
            .filter(|spec| spec.time_varying)
            .ok_or_else(|| NetworkError::UnknownAttribute {
                kind,
                attribute: attribute.to_string(),
            })?;
        let horizon = self.horizon()?;
        if values.len() != horizon.len() {
            return Err(NetworkError::HorizonMismatch {
                expected: horizon.len(),
                actual: values.len(),
            });
        }
        for (t, value) in values.iter().enumerate() {
            spec.bound.check(*value).map_err(|reason| {
                NetworkError::invalid(component_id, attribute, format!("snapshot {t}: {reason}"))
            })?;
        }
        for &(lo_name, hi_name) in component.params.ordered_pairs() {
            for (t, value) in values.iter().copied().enumerate() {
                let (lo, hi) = if attribute == lo_name {
                    (Some(value), self.attribute_at(component, hi_name, t))
                } else if attribute == hi_name {
                    (self.attribute_at(component, lo_name, t), Some(value))
                } else {
                    break;
                };
                if let (Some(lo), Some(hi)) = (lo, hi) {
                    if lo > hi {
                        return Err(NetworkError::invalid(
                            component_id,
                            attribute,
                            format!("snapshot {t}: {lo_name} {lo} exceeds {hi_name} {hi}"),
                        ));
                    }
                }
            }
        }

        let id = component.id.clone();
        self.series
            .entry(id)
            .or_default()
            .insert(attribute.to_string(), values);
        Ok(())
    }

    pub fn time_series(&self, component_id: &str, attribute: &str) -> Option<&[f64]> {
        self.series
            .get(component_id)
            .and_then(|attrs| attrs.get(attribute))
            .map(Vec::as_slice)
    }

    /// All stored series as `(component, attribute, values)`.
    pub fn iter_time_series(&self) -> impl Iterator<Item = (&ComponentId, &str, &[f64])> {
        self.series.iter().flat_map(|(id, attrs)| {
            attrs
                .iter()
                .map(move |(attr, values)| (id, attr.as_str(), values.as_slice()))
        })
    }

    /// Value of `attribute` at snapshot `t`: the series value when one is
    /// attached, else the static value. `None` for unset optional attributes.
    pub fn attribute_at(&self, component: &Component, attribute: &str, t: usize) -> Option<f64> {
        self.time_series(component.id.as_str(), attribute)
            .and_then(|values| values.get(t).copied())
            .or_else(|| component.params.static_value(attribute))
    }

    // =========================================================================
    // Results
    // =========================================================================

    /// Replace the stored result wholesale. `None` clears it.
    pub fn store_result(&mut self, result: Option<EvaluationResult>) {
        self.result = result;
    }

    /// Stored result, if it still matches the current structure.
    pub fn result(&self) -> NetworkResult<&EvaluationResult> {
        self.result
            .as_ref()
            .filter(|result| result.revision == self.revision)
            .ok_or(NetworkError::NoResultAvailable)
    }

    /// Static result table of one component kind.
    pub fn read_static(&self, kind: ComponentKind) -> NetworkResult<&StaticTable> {
        Ok(self.result()?.static_table(kind))
    }

    /// Static result table of the nodes.
    pub fn read_node_static(&self) -> NetworkResult<&StaticTable> {
        Ok(self.result()?.node_table())
    }

    /// Per-snapshot result values of one component attribute.
    pub fn read_timeseries(
        &self,
        component_id: &str,
        attribute: &str,
    ) -> NetworkResult<&[Option<f64>]> {
        let result = self.result()?;
        let component = self
            .component(component_id)
            .ok_or_else(|| NetworkError::UnknownComponent(component_id.to_string()))?;
        result
            .series(component_id, attribute)
            .map(Vec::as_slice)
            .ok_or_else(|| NetworkError::UnknownAttribute {
                kind: component.kind(),
                attribute: attribute.to_string(),
            })
    }

    /// Per-snapshot result values of one node attribute.
    pub fn read_node_timeseries(
        &self,
        node_id: &str,
        attribute: &str,
    ) -> NetworkResult<&[Option<f64>]> {
        let result = self.result()?;
        if self.node(node_id).is_none() {
            return Err(NetworkError::UnknownNode(node_id.to_string()));
        }
        result
            .node_series(node_id, attribute)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                NetworkError::invalid(node_id, attribute, "no such node result attribute")
            })
    }

    // =========================================================================
    // Summary and validation
    // =========================================================================

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats {
            num_buses: self.buses.len(),
            num_snapshots: self.snapshots.as_ref().map_or(0, SnapshotIndex::len),
            ..NetworkStats::default()
        };
        for component in &self.components {
            match component.kind() {
                ComponentKind::Generator => stats.num_generators += 1,
                ComponentKind::Load => stats.num_loads += 1,
                ComponentKind::Line => stats.num_lines += 1,
                ComponentKind::Link => stats.num_links += 1,
                ComponentKind::Storage => stats.num_storage += 1,
            }
            if let Some(generator) = component.as_generator() {
                stats.total_gen_capacity_mw += generator.p_nom;
            }
        }
        stats.peak_load_mw = (0..stats.num_snapshots.max(1))
            .map(|t| {
                self.components_of(ComponentKind::Load)
                    .filter_map(|load| self.attribute_at(load, "p_set", t))
                    .sum::<f64>()
            })
            .fold(0.0, f64::max);
        stats
    }

    /// Non-fatal pre-flight checks for common modelling mistakes.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let stats = self.stats();

        if stats.num_buses == 0 {
            diag.add_error("structure", "network has no buses");
            return;
        }
        if stats.num_generators == 0 {
            diag.add_error("structure", "network has no generators");
        }
        if stats.num_loads == 0 {
            diag.add_warning("structure", "network has no loads");
        }
        if self.snapshots.is_none() {
            diag.add_warning("horizon", "no snapshot index defined");
        }

        let extendable = self
            .components
            .iter()
            .any(|c| c.params.extension().is_some());
        if !extendable && stats.total_gen_capacity_mw < stats.peak_load_mw {
            diag.add_warning(
                "capacity",
                &format!(
                    "generation capacity ({:.1} MW) is below peak load ({:.1} MW)",
                    stats.total_gen_capacity_mw, stats.peak_load_mw
                ),
            );
        }

        if stats.num_buses > 1 {
            for bus in &self.buses {
                let connected = self
                    .components_at(bus.id.as_str())
                    .any(|c| c.kind().is_binary());
                if !connected {
                    diag.add_warning_for("topology", "bus has no line or link", bus.id.as_str());
                }
            }
        }

        for island in sub_networks(self) {
            let has_source = island.buses.iter().any(|bus| {
                self.components_at(bus.as_str()).any(|c| {
                    matches!(
                        c.kind(),
                        ComponentKind::Generator | ComponentKind::Storage
                    )
                })
            });
            if has_source {
                continue;
            }
            match island.buses.as_slice() {
                [bus] => diag.add_warning_for(
                    "topology",
                    &format!("sub-network {} has no generator or storage", island.id),
                    bus.as_str(),
                ),
                buses => diag.add_warning(
                    "topology",
                    &format!(
                        "sub-network {} ({} buses) has no generator or storage",
                        island.id,
                        buses.len()
                    ),
                ),
            }
        }
    }
}

/// Statistics about a network's size and capacity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_generators: usize,
    pub num_loads: usize,
    pub num_lines: usize,
    pub num_links: usize,
    pub num_storage: usize,
    pub num_snapshots: usize,
    pub total_gen_capacity_mw: f64,
    pub peak_load_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} lines, {} links, {} generators ({:.0} MW), {} loads (peak {:.0} MW), {} storage, {} snapshots",
            self.num_buses,
            self.num_lines,
            self.num_links,
            self.num_generators,
            self.total_gen_capacity_mw,
            self.num_loads,
            self.peak_load_mw,
            self.num_storage,
            self.num_snapshots
        )
    }
}

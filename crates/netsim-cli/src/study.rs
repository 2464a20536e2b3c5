//! Study files: a whole model, its time series and an optional investment
//! plan in one YAML (or JSON) document.
//!
//! ```yaml
//! name: solar-battery
//! snapshots: { start: 2024-06-21T00:00:00, count: 24, step_minutes: 60 }
//! buses:
//!   - { id: home }
//! generators:
//!   - { id: pv, bus: home, p_nom: 1.0, marginal_cost: 0.0 }
//! series:
//!   - component: pv
//!     attribute: p_max_pu
//!     profile: { shape: diurnal, sunrise: 6, sunset: 18, peak: 1 }
//!   - { component: demand, attribute: p_set, file: demand.csv, column: kw }
//! ```

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use netsim_algo::InvestmentPlan;
use netsim_core::{
    BusParams, ComponentKind, ComponentParams, GeneratorParams, LineParams, LinkParams,
    LoadParams, Network, SnapshotIndex, StorageParams,
};
use netsim_io::{import_csv_folder, import_json};
use netsim_ts::{load_labelled_profile, load_profile, Profile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    #[serde(default)]
    pub name: String,
    pub snapshots: Option<SnapshotSpec>,
    #[serde(default)]
    pub buses: Vec<BusEntry>,
    #[serde(default)]
    pub generators: Vec<UnaryEntry<GeneratorParams>>,
    #[serde(default)]
    pub loads: Vec<UnaryEntry<LoadParams>>,
    #[serde(default)]
    pub storage: Vec<UnaryEntry<StorageParams>>,
    #[serde(default)]
    pub lines: Vec<BinaryEntry<LineParams>>,
    #[serde(default)]
    pub links: Vec<BinaryEntry<LinkParams>>,
    #[serde(default)]
    pub series: Vec<SeriesEntry>,
    pub investment: Option<InvestmentPlan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSpec {
    pub start: NaiveDateTime,
    pub count: usize,
    #[serde(default = "default_step_minutes")]
    pub step_minutes: i64,
    /// Overrides the step-derived weightings
    pub weightings: Option<Vec<f64>>,
}

fn default_step_minutes() -> i64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEntry {
    pub id: String,
    #[serde(flatten)]
    pub params: BusParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnaryEntry<P> {
    pub id: String,
    pub bus: String,
    #[serde(flatten)]
    pub params: P,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryEntry<P> {
    pub id: String,
    pub bus0: String,
    pub bus1: String,
    #[serde(flatten)]
    pub params: P,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesEntry {
    pub component: String,
    pub attribute: String,
    #[serde(flatten)]
    pub source: SeriesSource,
}

/// Where the values of one series come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesSource {
    Profile {
        profile: Profile,
    },
    /// A CSV (or Parquet) column, in file order or aligned through a label column
    File {
        file: PathBuf,
        column: String,
        #[serde(default)]
        label_column: Option<String>,
    },
}

impl SnapshotSpec {
    pub fn index(&self) -> Result<SnapshotIndex> {
        let step = Duration::try_minutes(self.step_minutes).with_context(|| {
            format!("snapshot step of {} minutes is out of range", self.step_minutes)
        })?;
        let mut index = SnapshotIndex::with_step(self.start, self.count, step)?;
        if let Some(weightings) = &self.weightings {
            index.set_weightings(weightings.clone())?;
        }
        Ok(index)
    }
}

pub fn load_study(path: &Path) -> Result<Study> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading study '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing study json")
        }
        _ => serde_yaml::from_str(&data).context("parsing study yaml"),
    }
}

/// A model read from any supported input, with the study's plan if any.
pub struct LoadedModel {
    pub network: Network,
    pub plan: Option<InvestmentPlan>,
}

/// Read a study file, an exported CSV folder, or (with `model_json`) an
/// exported JSON model.
pub fn load_model(path: &Path, model_json: bool) -> Result<LoadedModel> {
    if path.is_dir() {
        let network = import_csv_folder(path)?;
        return Ok(LoadedModel {
            network,
            plan: None,
        });
    }
    if model_json {
        let network = import_json(path)?;
        return Ok(LoadedModel {
            network,
            plan: None,
        });
    }
    let study = load_study(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let network = study
        .build(base)
        .with_context(|| format!("building study '{}'", path.display()))?;
    Ok(LoadedModel {
        network,
        plan: study.investment,
    })
}

impl Study {
    /// Build the model. Relative series file paths resolve against `base`.
    pub fn build(&self, base: &Path) -> Result<Network> {
        let mut network = Network::with_name(self.name.clone());
        if let Some(snapshots) = &self.snapshots {
            network.set_snapshot_index(snapshots.index().context("snapshots")?);
        }
        for bus in &self.buses {
            network
                .add_node(bus.id.as_str(), bus.params.clone())
                .with_context(|| format!("bus '{}'", bus.id))?;
        }

        add_unary(&mut network, ComponentKind::Generator, &self.generators)?;
        add_unary(&mut network, ComponentKind::Load, &self.loads)?;
        add_unary(&mut network, ComponentKind::Storage, &self.storage)?;
        add_binary(&mut network, ComponentKind::Line, &self.lines)?;
        add_binary(&mut network, ComponentKind::Link, &self.links)?;

        for entry in &self.series {
            let values = match &entry.source {
                SeriesSource::Profile { profile } => profile.generate(network.horizon()?)?,
                SeriesSource::File {
                    file,
                    column,
                    label_column,
                } => {
                    let path = base.join(file);
                    match label_column {
                        Some(label) => {
                            load_labelled_profile(&path, label, column, network.horizon()?)?
                        }
                        None => load_profile(&path, column)?,
                    }
                }
            };
            network
                .set_time_series(&entry.component, &entry.attribute, values)
                .with_context(|| format!("series {}.{}", entry.component, entry.attribute))?;
        }

        debug!(study = %self.name, stats = %network.stats(), "built study");
        Ok(network)
    }
}

fn add_unary<P>(network: &mut Network, kind: ComponentKind, entries: &[UnaryEntry<P>]) -> Result<()>
where
    P: Clone + Into<ComponentParams>,
{
    for entry in entries {
        network
            .add_component(kind, entry.id.as_str(), &[entry.bus.as_str()], entry.params.clone())
            .with_context(|| format!("{kind} '{}'", entry.id))?;
    }
    Ok(())
}

fn add_binary<P>(
    network: &mut Network,
    kind: ComponentKind,
    entries: &[BinaryEntry<P>],
) -> Result<()>
where
    P: Clone + Into<ComponentParams>,
{
    for entry in entries {
        network
            .add_component(
                kind,
                entry.id.as_str(),
                &[entry.bus0.as_str(), entry.bus1.as_str()],
                entry.params.clone(),
            )
            .with_context(|| format!("{kind} '{}'", entry.id))?;
    }
    Ok(())
}

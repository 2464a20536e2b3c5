//! Mode dispatch and result storage.

use crate::investment::{optimize_investment, InvestmentPlan};
use crate::opf::{optimize_operations, OptimizationOptions};
use crate::power_flow::{run_power_flow, PowerFlowOptions};
use crate::report::EvaluationReport;
use netsim_core::{AnalysisKind, Network, NetworkResult};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Which analysis to run, with its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AnalysisMode {
    PowerFlow(PowerFlowOptions),
    Operational(OptimizationOptions),
    Investment {
        plan: InvestmentPlan,
        #[serde(default)]
        options: OptimizationOptions,
    },
}

impl AnalysisMode {
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisMode::PowerFlow(_) => AnalysisKind::PowerFlow,
            AnalysisMode::Operational(_) => AnalysisKind::Operational,
            AnalysisMode::Investment { .. } => AnalysisKind::Investment,
        }
    }
}

/// Runs an analysis and keeps its result on the network.
pub struct Evaluator;

impl Evaluator {
    /// Evaluate without touching the network.
    pub fn run(network: &Network, mode: &AnalysisMode) -> NetworkResult<EvaluationReport> {
        match mode {
            AnalysisMode::PowerFlow(options) => run_power_flow(network, options),
            AnalysisMode::Operational(options) => optimize_operations(network, options),
            AnalysisMode::Investment { plan, options } => {
                optimize_investment(network, plan, options)
            }
        }
    }

    /// Evaluate and store the result on `network`.
    ///
    /// A hard error leaves the previously stored result in place. A soft
    /// failure (no usable result) clears it, so readers fail with
    /// `NoResultAvailable` rather than returning stale values.
    pub fn evaluate(network: &mut Network, mode: &AnalysisMode) -> NetworkResult<EvaluationReport> {
        let report = Self::run(network, mode)?;
        info!(
            mode = %report.mode,
            status = %report.status,
            condition = %report.condition,
            warnings = report.diagnostics.warning_count(),
            "evaluation finished"
        );
        network.store_result(report.result.clone());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use netsim_core::{
        BusParams, ComponentKind, GeneratorParams, LoadParams, NetworkError, SnapshotIndex,
    };

    fn single_bus() -> Network {
        let mut network = Network::new();
        network.add_node("a", BusParams::default()).unwrap();
        network
            .add_generator(
                "g",
                "a",
                GeneratorParams::with_capacity(10.0).with_marginal_cost(1.0),
            )
            .unwrap();
        network.add_load("d", "a", LoadParams::new(4.0, 0.0)).unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        network.set_snapshot_index(SnapshotIndex::hourly(start, 3).unwrap());
        network
    }

    #[test]
    fn evaluate_stores_result() {
        let mut network = single_bus();
        assert_eq!(
            network.read_static(ComponentKind::Generator).unwrap_err(),
            NetworkError::NoResultAvailable
        );
        let mode = AnalysisMode::Operational(OptimizationOptions::default());
        let report = Evaluator::evaluate(&mut network, &mode).unwrap();
        assert!(report.is_ok());
        let p = network.read_timeseries("g", "p").unwrap();
        assert_eq!(p.len(), 3);
        assert!((p[0].unwrap() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn hard_error_keeps_previous_result() {
        let mut network = single_bus();
        Evaluator::evaluate(
            &mut network,
            &AnalysisMode::Operational(OptimizationOptions::default()),
        )
        .unwrap();
        let bad = AnalysisMode::Investment {
            plan: InvestmentPlan {
                periods: vec![],
                discount_rate: 0.0,
            },
            options: OptimizationOptions::default(),
        };
        assert!(matches!(
            Evaluator::evaluate(&mut network, &bad),
            Err(NetworkError::InvalidHorizon(_))
        ));
        assert!(network.read_timeseries("g", "p").is_ok());
    }

    #[test]
    fn soft_failure_clears_result() {
        let mut network = single_bus();
        Evaluator::evaluate(
            &mut network,
            &AnalysisMode::Operational(OptimizationOptions::default()),
        )
        .unwrap();
        network
            .set_time_series("d", "p_set", vec![4.0, 40.0, 4.0])
            .unwrap();
        let report = Evaluator::evaluate(
            &mut network,
            &AnalysisMode::Operational(OptimizationOptions::default()),
        )
        .unwrap();
        assert!(!report.is_ok());
        assert_eq!(
            network.read_static(ComponentKind::Generator).unwrap_err(),
            NetworkError::NoResultAvailable
        );
    }

    #[test]
    fn modes_deserialize_from_tagged_json() {
        let mode: AnalysisMode =
            serde_json::from_str(r#"{"mode": "power_flow", "method": "linear"}"#).unwrap();
        assert_eq!(mode.kind(), AnalysisKind::PowerFlow);
        let mode: AnalysisMode = serde_json::from_str(
            r#"{"mode": "investment", "plan": {"periods": [{"year": 2030, "years": 5}]}}"#,
        )
        .unwrap();
        assert_eq!(mode.kind(), AnalysisKind::Investment);
    }
}

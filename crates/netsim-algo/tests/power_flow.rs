//! Power-flow mode against small reference networks.

use chrono::NaiveDate;
use netsim_algo::{AnalysisMode, Condition, Evaluator, PowerFlowOptions, Status};
use netsim_core::{
    BusParams, ComponentKind, GeneratorParams, LineParams, LoadParams, Network, NetworkError,
    SnapshotIndex, SolverKind,
};

fn start() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Three buses in a ring, one generator (100 MW, p_min_pu 0.3), 50 MW load.
fn ring() -> Network {
    let mut network = Network::with_name("ring");
    for bus in ["b0", "b1", "b2"] {
        network.add_node(bus, BusParams::with_v_nom(20.0)).unwrap();
    }
    network
        .add_generator(
            "gen",
            "b0",
            GeneratorParams::with_capacity(100.0).with_p_limits(0.3, 1.0),
        )
        .unwrap();
    network
        .add_load("load", "b1", LoadParams::new(50.0, 0.0))
        .unwrap();
    for (id, from, to) in [("l01", "b0", "b1"), ("l12", "b1", "b2"), ("l20", "b2", "b0")] {
        network
            .add_line(id, from, to, LineParams::new(0.1, 0.01, 100.0))
            .unwrap();
    }
    network.set_snapshot_index(SnapshotIndex::hourly(start(), 1).unwrap());
    network
}

#[test]
fn ring_converges_with_losses() {
    let mut network = ring();
    let mode = AnalysisMode::PowerFlow(PowerFlowOptions::default());
    let report = Evaluator::evaluate(&mut network, &mode).unwrap();
    assert_eq!(report.status, Status::Ok);
    assert_eq!(report.condition, Condition::Converged);
    assert!(report.snapshot_outcomes[0].max_mismatch < 1e-6);

    let dispatch = network.read_timeseries("gen", "p").unwrap()[0].unwrap();
    assert!(dispatch > 50.0 && dispatch < 51.0, "dispatch {dispatch}");

    let slack_voltage = network.read_node_timeseries("b0", "v_mag_pu").unwrap()[0].unwrap();
    assert!((slack_voltage - 1.0).abs() < 1e-12);
    let angle = network.read_node_timeseries("b1", "v_ang").unwrap()[0].unwrap();
    assert!(angle < 0.0);

    // Losses: what enters each line minus what leaves it.
    let losses: f64 = ["l01", "l12", "l20"]
        .iter()
        .map(|id| {
            let p0 = network.read_timeseries(id, "p0").unwrap()[0].unwrap();
            let p1 = network.read_timeseries(id, "p1").unwrap()[0].unwrap();
            p0 + p1
        })
        .sum();
    assert!((dispatch - 50.0 - losses).abs() < 1e-3);
}

#[test]
fn lossless_ring_dispatches_exactly_the_load() {
    let mut network = ring();
    for solver in [SolverKind::Faer, SolverKind::Gauss] {
        let options = PowerFlowOptions::linear().with_linear_solver(solver);
        Evaluator::evaluate(&mut network, &AnalysisMode::PowerFlow(options)).unwrap();
        let dispatch = network.read_timeseries("gen", "p").unwrap()[0].unwrap();
        assert!((dispatch - 50.0).abs() < 1e-6, "{solver:?}: {dispatch}");
    }
    // Two parallel paths from b0 to b1: direct (x) and via b2 (2x).
    let direct = network.read_timeseries("l01", "p0").unwrap()[0].unwrap();
    assert!((direct - 100.0 / 3.0).abs() < 1e-6);
}

#[test]
fn static_tables_echo_nominal_values() {
    let mut network = ring();
    Evaluator::evaluate(
        &mut network,
        &AnalysisMode::PowerFlow(PowerFlowOptions::linear()),
    )
    .unwrap();
    let generators = network.read_static(ComponentKind::Generator).unwrap();
    assert_eq!(generators.get("gen", "p_nom_opt"), Some(100.0));
    let energy = generators.get("gen", "energy").unwrap();
    assert!((energy - 50.0).abs() < 1e-6);
    let lines = network.read_static(ComponentKind::Line).unwrap();
    assert_eq!(lines.get("l12", "s_nom_opt"), Some(100.0));
}

#[test]
fn bus_table_carries_nominal_and_mean_voltages() {
    let mut network = ring();
    Evaluator::evaluate(
        &mut network,
        &AnalysisMode::PowerFlow(PowerFlowOptions::default()),
    )
    .unwrap();
    let buses = network.read_node_static().unwrap();
    assert_eq!(buses.len(), 3);
    assert_eq!(buses.get("b1", "v_nom"), Some(20.0));
    let v = buses.get("b1", "v_mag_pu_mean").unwrap();
    let series = network.read_node_timeseries("b1", "v_mag_pu").unwrap()[0].unwrap();
    assert!((v - series).abs() < 1e-12);
    assert!(v < 1.0);
}

#[test]
fn stranded_load_is_flagged_in_the_report() {
    let mut network = ring();
    network.add_node("b3", BusParams::with_v_nom(20.0)).unwrap();
    network
        .add_load("stranded", "b3", LoadParams::new(5.0, 0.0))
        .unwrap();
    let report = Evaluator::evaluate(
        &mut network,
        &AnalysisMode::PowerFlow(PowerFlowOptions::linear()),
    )
    .unwrap();
    assert!(report
        .diagnostics
        .issues_by_category("topology")
        .any(|issue| issue.entity.as_deref() == Some("b3")
            && issue.message.contains("no generator or storage")));
}

#[test]
fn reading_before_evaluation_fails() {
    let network = ring();
    assert_eq!(
        network.read_timeseries("gen", "p").unwrap_err(),
        NetworkError::NoResultAvailable
    );
    assert_eq!(
        network.read_static(ComponentKind::Line).unwrap_err(),
        NetworkError::NoResultAvailable
    );
}

#[test]
fn evaluation_without_horizon_fails() {
    let mut network = Network::new();
    network.add_node("b0", BusParams::default()).unwrap();
    let err = Evaluator::evaluate(
        &mut network,
        &AnalysisMode::PowerFlow(PowerFlowOptions::default()),
    )
    .unwrap_err();
    assert_eq!(err, NetworkError::NoHorizonDefined);
}

#[test]
fn structural_change_invalidates_result() {
    let mut network = ring();
    Evaluator::evaluate(
        &mut network,
        &AnalysisMode::PowerFlow(PowerFlowOptions::linear()),
    )
    .unwrap();
    assert!(network.read_timeseries("gen", "p").is_ok());
    network.add_node("b3", BusParams::default()).unwrap();
    assert_eq!(
        network.read_timeseries("gen", "p").unwrap_err(),
        NetworkError::NoResultAvailable
    );
}

#[test]
fn divergent_snapshot_is_withheld_and_others_kept() {
    let mut network = ring();
    network.set_snapshot_index(SnapshotIndex::hourly(start(), 3).unwrap());
    network
        .set_time_series("load", "p_set", vec![50.0, 20_000.0, 60.0])
        .unwrap();
    let report = Evaluator::evaluate(
        &mut network,
        &AnalysisMode::PowerFlow(PowerFlowOptions::default()),
    )
    .unwrap();
    assert_eq!(report.status, Status::Warning);
    assert_eq!(report.condition, Condition::PartiallyConverged);
    assert_eq!(report.failed_snapshots(), vec![network.horizon().unwrap().labels()[1]]);

    let p = network.read_timeseries("gen", "p").unwrap();
    assert!(p[0].is_some());
    assert_eq!(p[1], None);
    assert!(p[2].is_some());
    assert!(matches!(
        report.check(),
        Err(NetworkError::PowerFlowDivergence { ref snapshots, .. }) if snapshots.len() == 1
    ));
}

#[test]
fn all_snapshots_diverging_leaves_no_result() {
    let mut network = ring();
    network
        .set_time_series("load", "p_set", vec![20_000.0])
        .unwrap();
    let report = Evaluator::evaluate(
        &mut network,
        &AnalysisMode::PowerFlow(PowerFlowOptions::default()),
    )
    .unwrap();
    assert_eq!(report.condition, Condition::Diverged);
    assert!(report.result.is_none());
    assert_eq!(
        network.read_timeseries("gen", "p").unwrap_err(),
        NetworkError::NoResultAvailable
    );
}

#[test]
fn second_generator_without_set_point_is_rejected() {
    let mut network = ring();
    network
        .add_generator("peaker", "b2", GeneratorParams::with_capacity(20.0))
        .unwrap();
    let err = Evaluator::evaluate(
        &mut network,
        &AnalysisMode::PowerFlow(PowerFlowOptions::default()),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        NetworkError::InvalidAttributeValue { ref id, .. } if id == "peaker"
    ));
}

#[test]
fn set_point_series_drive_non_slack_generators() {
    let mut network = ring();
    network
        .add_generator("peaker", "b2", GeneratorParams::with_capacity(20.0))
        .unwrap();
    network.set_snapshot_index(SnapshotIndex::hourly(start(), 2).unwrap());
    network
        .set_time_series("peaker", "p_set", vec![0.0, 20.0])
        .unwrap();
    Evaluator::evaluate(
        &mut network,
        &AnalysisMode::PowerFlow(PowerFlowOptions::linear()),
    )
    .unwrap();
    let p = network.read_timeseries("gen", "p").unwrap();
    assert!((p[0].unwrap() - 50.0).abs() < 1e-6);
    assert!((p[1].unwrap() - 30.0).abs() < 1e-6);
}

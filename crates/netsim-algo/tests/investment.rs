//! Investment optimization: capacity expansion against an expensive backstop.

use chrono::NaiveDate;
use netsim_algo::{
    optimize_investment, AnalysisMode, Condition, Evaluator, InvestmentPeriod, InvestmentPlan,
    OptimizationOptions,
};
use netsim_core::{
    BusParams, ComponentKind, Extension, GeneratorParams, LineParams, LoadParams, Network,
    NetworkError, SnapshotIndex, StorageParams,
};

fn two_hours() -> SnapshotIndex {
    let start = NaiveDate::from_ymd_opt(2030, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    SnapshotIndex::hourly(start, 2).unwrap()
}

/// 80 MW of load, an expensive backstop and an extendable gas plant with no
/// existing capacity.
fn greenfield(extension: Extension) -> Network {
    let mut network = Network::new();
    network.add_node("city", BusParams::default()).unwrap();
    network.set_snapshot_index(two_hours());
    network
        .add_load("demand", "city", LoadParams::new(80.0, 0.0))
        .unwrap();
    network
        .add_generator(
            "backstop",
            "city",
            GeneratorParams::with_capacity(1000.0).with_marginal_cost(500.0),
        )
        .unwrap();
    network
        .add_generator(
            "gas",
            "city",
            GeneratorParams::with_capacity(0.0)
                .with_marginal_cost(20.0)
                .with_extension(extension),
        )
        .unwrap();
    network
}

fn capacity(network: &Network, id: &str, column: &str) -> f64 {
    network
        .read_static(ComponentKind::Generator)
        .unwrap()
        .get(id, column)
        .unwrap()
}

#[test]
fn builds_exactly_the_needed_capacity() {
    let mut network = greenfield(Extension::with_capital_cost(10.0));
    let mode = AnalysisMode::Investment {
        plan: InvestmentPlan::single(2030),
        options: OptimizationOptions::default(),
    };
    let report = Evaluator::evaluate(&mut network, &mode).unwrap();
    assert_eq!(report.condition, Condition::Optimal);
    assert!((capacity(&network, "gas", "p_nom_opt") - 80.0).abs() < 1e-3);
    assert!((capacity(&network, "gas", "nom_opt@2030") - 80.0).abs() < 1e-3);
    assert_eq!(capacity(&network, "backstop", "p_nom_opt"), 1000.0);
    // 80·10 capital + 2 h · 80 · 20
    assert!((report.objective.unwrap() - 4000.0).abs() < 1e-1);

    let p = network.read_timeseries("gas", "p").unwrap();
    assert!((p[0].unwrap() - 80.0).abs() < 1e-3);
    assert_eq!(
        network.read_timeseries("gas", "p@2030").unwrap(),
        network.read_timeseries("gas", "p").unwrap()
    );
    let buses = network.read_node_static().unwrap();
    assert_eq!(buses.get("city", "v_nom"), Some(1.0));
    assert!(buses.get("city", "v_ang_mean").is_some());
    assert!(buses.get("city", "v_ang@2030_mean").is_none());
}

#[test]
fn nom_max_caps_the_build() {
    let extension = Extension {
        nom_max: Some(50.0),
        ..Extension::with_capital_cost(10.0)
    };
    let network = greenfield(extension);
    let report = optimize_investment(
        &network,
        &InvestmentPlan::single(2030),
        &OptimizationOptions::default(),
    )
    .unwrap();
    let result = report.result.unwrap();
    let table = result.static_table(ComponentKind::Generator);
    assert!((table.get("gas", "p_nom_opt").unwrap() - 50.0).abs() < 1e-3);
    let backstop = result.series("backstop", "p").unwrap()[0].unwrap();
    assert!((backstop - 30.0).abs() < 1e-3);
}

#[test]
fn too_expensive_capacity_is_not_built() {
    let network = greenfield(Extension::with_capital_cost(1e6));
    let report = optimize_investment(
        &network,
        &InvestmentPlan::single(2030),
        &OptimizationOptions::default(),
    )
    .unwrap();
    let result = report.result.unwrap();
    let built = result
        .static_table(ComponentKind::Generator)
        .get("gas", "p_nom_opt")
        .unwrap();
    assert!(built.abs() < 1e-3, "built {built}");
}

#[test]
fn builds_persist_across_periods_until_lifetime_ends() {
    let plan = InvestmentPlan::new(
        vec![
            InvestmentPeriod::new(2030, 10.0),
            InvestmentPeriod::new(2040, 10.0),
        ],
        0.0,
    )
    .unwrap();

    let network = greenfield(Extension::with_capital_cost(10.0));
    let report =
        optimize_investment(&network, &plan, &OptimizationOptions::default()).unwrap();
    let result = report.result.unwrap();
    let table = result.static_table(ComponentKind::Generator);
    assert!((table.get("gas", "build@2030").unwrap() - 80.0).abs() < 1e-3);
    assert!(table.get("gas", "build@2040").unwrap().abs() < 1e-3);
    assert!((table.get("gas", "nom_opt@2040").unwrap() - 80.0).abs() < 1e-3);

    let short_lived = Extension {
        lifetime_periods: Some(1),
        ..Extension::with_capital_cost(10.0)
    };
    let network = greenfield(short_lived);
    let report =
        optimize_investment(&network, &plan, &OptimizationOptions::default()).unwrap();
    let result = report.result.unwrap();
    let table = result.static_table(ComponentKind::Generator);
    assert!((table.get("gas", "build@2040").unwrap() - 80.0).abs() < 1e-3);
}

#[test]
#[cfg(feature = "solver-clarabel")]
fn integer_units_are_relaxed_with_a_warning_on_clarabel() {
    let extension = Extension {
        unit_size: Some(30.0),
        ..Extension::with_capital_cost(10.0)
    };
    let network = greenfield(extension);
    let report = optimize_investment(
        &network,
        &InvestmentPlan::single(2030),
        &OptimizationOptions::default(),
    )
    .unwrap();
    assert_eq!(report.condition, Condition::Optimal);
    assert!(report.diagnostics.warning_count() >= 1);
    let built = report
        .result
        .unwrap()
        .static_table(ComponentKind::Generator)
        .get("gas", "p_nom_opt")
        .unwrap();
    assert!((built - 80.0).abs() < 1e-3);
}

#[test]
fn line_expands_to_reach_cheap_generation() {
    let mut network = Network::new();
    network.add_node("plant", BusParams::default()).unwrap();
    network.add_node("town", BusParams::default()).unwrap();
    network.set_snapshot_index(two_hours());
    network
        .add_generator(
            "hydro",
            "plant",
            GeneratorParams::with_capacity(100.0).with_marginal_cost(10.0),
        )
        .unwrap();
    network
        .add_generator(
            "backstop",
            "town",
            GeneratorParams::with_capacity(1000.0).with_marginal_cost(500.0),
        )
        .unwrap();
    network
        .add_load("demand", "town", LoadParams::new(40.0, 0.0))
        .unwrap();
    network
        .add_line(
            "corridor",
            "plant",
            "town",
            LineParams::new(0.1, 0.0, 10.0).with_extension(Extension::with_capital_cost(1.0)),
        )
        .unwrap();
    let report = optimize_investment(
        &network,
        &InvestmentPlan::single(2030),
        &OptimizationOptions::default(),
    )
    .unwrap();
    let result = report.result.unwrap();
    let lines = result.static_table(ComponentKind::Line);
    assert!((lines.get("corridor", "s_nom_opt").unwrap() - 40.0).abs() < 1e-3);
    assert!((lines.get("corridor", "build@2030").unwrap() - 30.0).abs() < 1e-3);
}

#[test]
fn storage_energy_and_power_expand_together() {
    let mut network = Network::new();
    network.add_node("city", BusParams::default()).unwrap();
    network.set_snapshot_index(two_hours());
    network
        .add_generator(
            "solar",
            "city",
            GeneratorParams::with_capacity(50.0).with_marginal_cost(0.0),
        )
        .unwrap();
    network
        .set_time_series("solar", "p_max_pu", vec![1.0, 0.0])
        .unwrap();
    network
        .add_generator(
            "backstop",
            "city",
            GeneratorParams::with_capacity(1000.0).with_marginal_cost(500.0),
        )
        .unwrap();
    network
        .add_load("demand", "city", LoadParams::new(0.0, 0.0))
        .unwrap();
    network
        .set_time_series("demand", "p_set", vec![0.0, 10.0])
        .unwrap();
    let mut battery = StorageParams::new(1.0, 2.0);
    battery.extension = Some(Extension::with_capital_cost(1.0));
    network.add_storage("battery", "city", battery).unwrap();

    let report = optimize_investment(
        &network,
        &InvestmentPlan::single(2030),
        &OptimizationOptions::default(),
    )
    .unwrap();
    let result = report.result.unwrap();
    let table = result.static_table(ComponentKind::Storage);
    // Two hours of storage: 10 MW of discharge needs 20 MWh.
    assert!((table.get("battery", "e_nom_opt").unwrap() - 20.0).abs() < 1e-3);
    assert!((table.get("battery", "p_nom_opt").unwrap() - 10.0).abs() < 1e-3);
    let backstop = result.series("backstop", "p").unwrap()[1].unwrap();
    assert!(backstop.abs() < 1e-4);
}

#[test]
fn invalid_plan_is_a_hard_error() {
    let mut network = greenfield(Extension::with_capital_cost(10.0));
    let plan = InvestmentPlan {
        periods: vec![
            InvestmentPeriod::new(2040, 10.0),
            InvestmentPeriod::new(2030, 10.0),
        ],
        discount_rate: 0.0,
    };
    let err = Evaluator::evaluate(
        &mut network,
        &AnalysisMode::Investment {
            plan,
            options: OptimizationOptions::default(),
        },
    )
    .unwrap_err();
    assert!(matches!(err, NetworkError::InvalidHorizon(_)));
}

//! Operational optimization: storage arbitrage over a solar day.

use chrono::NaiveDate;
use netsim_algo::{
    optimize_operations, AnalysisMode, Condition, Evaluator, OptimizationOptions, Status,
};
use netsim_core::{
    BusParams, ComponentKind, GeneratorParams, LinkParams, LoadParams, Network, NetworkError,
    SnapshotIndex, StorageParams,
};
use netsim_ts::Profile;

fn day() -> SnapshotIndex {
    let start = NaiveDate::from_ymd_opt(2024, 6, 21)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    SnapshotIndex::hourly(start, 24).unwrap()
}

/// One bus: free solar peaking at noon, a battery, a small constant load and
/// a very expensive generator standing for unserved energy.
fn solar_battery() -> Network {
    let mut network = Network::with_name("solar-battery");
    network.add_node("home", BusParams::default()).unwrap();
    network.set_snapshot_index(day());

    network
        .add_generator(
            "pv",
            "home",
            GeneratorParams::with_capacity(1.0)
                .with_marginal_cost(0.0)
                .with_carrier("solar"),
        )
        .unwrap();
    Profile::Diurnal {
        sunrise: 6.0,
        sunset: 18.0,
        peak: 1.0,
    }
    .attach(&mut network, "pv", "p_max_pu")
    .unwrap();

    network
        .add_storage(
            "battery",
            "home",
            StorageParams::new(0.5, 1.2)
                .with_energy_limits(0.1, 0.95)
                .with_efficiencies(0.9, 0.9)
                .with_initial_energy(0.5),
        )
        .unwrap();
    network
        .add_load("demand", "home", LoadParams::new(0.05, 0.0))
        .unwrap();
    network
        .add_generator(
            "unmet",
            "home",
            GeneratorParams::with_capacity(10.0).with_marginal_cost(1e4),
        )
        .unwrap();
    network
}

#[test]
fn battery_covers_the_night() {
    let mut network = solar_battery();
    let mode = AnalysisMode::Operational(OptimizationOptions::default());
    let report = Evaluator::evaluate(&mut network, &mode).unwrap();
    assert_eq!(report.status, Status::Ok);
    assert_eq!(report.condition, Condition::Optimal);
    assert!(report.objective.unwrap().abs() < 1e-3);

    let unmet = network.read_timeseries("unmet", "p").unwrap();
    assert_eq!(unmet.len(), 24);
    for value in unmet {
        assert!(value.unwrap() < 1e-6, "unmet {value:?}");
    }

    let soc = network.read_timeseries("battery", "state_of_energy").unwrap();
    for value in soc {
        let e = value.unwrap();
        assert!(e >= 0.12 - 1e-6 && e <= 1.14 + 1e-6, "state of energy {e}");
    }
}

#[test]
fn storage_power_splits_into_store_and_dispatch() {
    let mut network = solar_battery();
    Evaluator::evaluate(
        &mut network,
        &AnalysisMode::Operational(OptimizationOptions::default()),
    )
    .unwrap();
    let p = network.read_timeseries("battery", "p").unwrap();
    let store = network.read_timeseries("battery", "p_store").unwrap();
    let dispatch = network.read_timeseries("battery", "p_dispatch").unwrap();
    for t in 0..24 {
        let net = dispatch[t].unwrap() - store[t].unwrap();
        assert!((p[t].unwrap() - net).abs() < 1e-9);
        assert!(p[t].unwrap().abs() <= 0.5 + 1e-6);
    }
    // Before sunrise only the battery can serve the load.
    assert!(p[2].unwrap() > 0.04);
}

#[test]
fn load_balance_holds_every_hour() {
    let network = solar_battery();
    let report = optimize_operations(&network, &OptimizationOptions::default()).unwrap();
    let result = report.result.unwrap();
    for t in 0..24 {
        let supply = result.series("pv", "p").unwrap()[t].unwrap()
            + result.series("unmet", "p").unwrap()[t].unwrap()
            + result.series("battery", "p").unwrap()[t].unwrap();
        assert!((supply - 0.05).abs() < 1e-6, "hour {t}: {supply}");
    }
}

#[test]
fn reading_is_idempotent() {
    let mut network = solar_battery();
    Evaluator::evaluate(
        &mut network,
        &AnalysisMode::Operational(OptimizationOptions::default()),
    )
    .unwrap();
    let first = network.read_timeseries("pv", "p").unwrap().to_vec();
    let second = network.read_timeseries("pv", "p").unwrap().to_vec();
    assert_eq!(first, second);
    let table = network.read_static(ComponentKind::Storage).unwrap().clone();
    assert_eq!(network.read_static(ComponentKind::Storage).unwrap(), &table);
    assert_eq!(table.get("battery", "e_nom_opt"), Some(1.2));
    assert_eq!(table.get("battery", "p_nom_opt"), Some(0.5));

    let buses = network.read_node_static().unwrap();
    assert_eq!(buses.get("home", "v_nom"), Some(1.0));
    assert!(buses.get("home", "v_ang_mean").is_some());
}

#[test]
fn unknown_series_attribute_is_reported() {
    let mut network = solar_battery();
    Evaluator::evaluate(
        &mut network,
        &AnalysisMode::Operational(OptimizationOptions::default()),
    )
    .unwrap();
    assert!(matches!(
        network.read_timeseries("pv", "q"),
        Err(NetworkError::UnknownAttribute { .. })
    ));
    assert!(matches!(
        network.read_timeseries("ghost", "p"),
        Err(NetworkError::UnknownComponent(_))
    ));
}

#[test]
fn cyclic_storage_ends_where_it_starts() {
    let mut network = solar_battery();
    let mut battery = StorageParams::new(0.5, 1.2)
        .with_energy_limits(0.1, 0.95)
        .with_efficiencies(0.9, 0.9);
    battery.e_cyclic = true;
    network.remove_component("battery").unwrap();
    network.add_storage("battery", "home", battery).unwrap();
    let report = optimize_operations(&network, &OptimizationOptions::default()).unwrap();
    let result = report.result.unwrap();
    let soc = result.series("battery", "state_of_energy").unwrap();
    let dispatch = result.series("battery", "p_dispatch").unwrap();
    let store = result.series("battery", "p_store").unwrap();
    // e_0 follows from e_23 through the first snapshot's flows.
    let expected = soc[23].unwrap() + 0.9 * store[0].unwrap() - dispatch[0].unwrap() / 0.9;
    assert!((soc[0].unwrap() - expected).abs() < 1e-6);
}

#[test]
fn link_carries_energy_with_losses() {
    let mut network = Network::new();
    network.add_node("plant", BusParams::default()).unwrap();
    network.add_node("town", BusParams::default()).unwrap();
    network.set_snapshot_index(day());
    network
        .add_generator(
            "gas",
            "plant",
            GeneratorParams::with_capacity(100.0).with_marginal_cost(20.0),
        )
        .unwrap();
    network
        .add_link(
            "hvdc",
            "plant",
            "town",
            LinkParams::with_capacity(50.0).with_efficiency(0.8),
        )
        .unwrap();
    network
        .add_load("demand", "town", LoadParams::new(40.0, 0.0))
        .unwrap();
    let report = optimize_operations(&network, &OptimizationOptions::default()).unwrap();
    let result = report.result.unwrap();
    assert!((result.series("hvdc", "p0").unwrap()[0].unwrap() - 50.0).abs() < 1e-4);
    assert!((result.series("hvdc", "p1").unwrap()[0].unwrap() + 40.0).abs() < 1e-4);
    assert!((result.series("gas", "p").unwrap()[0].unwrap() - 50.0).abs() < 1e-4);
}

#[test]
fn infeasible_dispatch_is_a_soft_outcome() {
    let mut network = solar_battery();
    network.remove_component("unmet").unwrap();
    network
        .set_time_series("demand", "p_set", vec![5.0; 24])
        .unwrap();
    let report = Evaluator::evaluate(
        &mut network,
        &AnalysisMode::Operational(OptimizationOptions::default()),
    )
    .unwrap();
    assert_eq!(report.status, Status::Warning);
    assert!(report.check().is_err());
    assert_eq!(
        network.read_timeseries("pv", "p").unwrap_err(),
        NetworkError::NoResultAvailable
    );
}

//! Export/import of models and results.

use chrono::NaiveDate;
use netsim_algo::{AnalysisMode, Evaluator, OptimizationOptions};
use netsim_core::{
    BusParams, ComponentKind, Control, Extension, GeneratorParams, LineParams, LinkParams,
    LoadParams, Network, NetworkError, SnapshotIndex, StorageParams,
};
use netsim_io::{
    export_csv_folder, export_json, export_result_csv, from_json_str, import_csv_folder,
    import_json, to_json_string, FormatError,
};
use std::fs;
use tempfile::tempdir;

fn sample() -> Network {
    let start = NaiveDate::from_ymd_opt(2025, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut network = Network::with_name("sample");
    let mut index = SnapshotIndex::hourly(start, 4).unwrap();
    index.set_weightings(vec![1.0, 1.0, 2.0, 0.5]).unwrap();
    network.set_snapshot_index(index);

    network
        .add_node("north", BusParams::with_v_nom(110.0).at(1.5, -2.25))
        .unwrap();
    network.add_node("south", BusParams::default()).unwrap();
    network
        .add_generator(
            "hydro",
            "north",
            GeneratorParams::with_capacity(120.0)
                .with_p_limits(0.1, 1.0)
                .with_marginal_cost(3.3)
                .with_control(Control::Slack)
                .with_carrier("hydro"),
        )
        .unwrap();
    network
        .add_generator(
            "wind",
            "south",
            GeneratorParams::with_capacity(0.0)
                .with_p_set(12.5)
                .with_extension(Extension {
                    nom_max: Some(300.0),
                    lifetime_periods: Some(3),
                    ..Extension::with_capital_cost(1.0 / 3.0)
                }),
        )
        .unwrap();
    network
        .add_load("city", "south", LoadParams::new(40.0, 8.0))
        .unwrap();
    network
        .add_line("ns", "north", "south", LineParams::new(0.1, 0.01, 100.0))
        .unwrap();
    network
        .add_link(
            "dc",
            "south",
            "north",
            LinkParams::with_capacity(25.0).with_efficiency(0.97),
        )
        .unwrap();
    network
        .add_storage(
            "pumped",
            "north",
            StorageParams::new(10.0, 60.0).with_efficiencies(0.85, 0.9),
        )
        .unwrap();

    network
        .set_time_series("wind", "p_max_pu", vec![0.2, 0.75, 1.0, 0.1])
        .unwrap();
    network
        .set_time_series("city", "p_set", vec![40.0, 35.5, 42.125, 38.0])
        .unwrap();
    network
}

fn assert_same_model(a: &Network, b: &Network) {
    assert_eq!(a.name(), b.name());
    assert_eq!(a.snapshots(), b.snapshots());
    assert_eq!(a.nodes(), b.nodes());
    for kind in ComponentKind::ALL {
        let left: Vec<_> = a.components_of(kind).collect();
        let right: Vec<_> = b.components_of(kind).collect();
        assert_eq!(left, right, "{kind} components differ");
    }
    let mut left: Vec<_> = a.iter_time_series().collect();
    let mut right: Vec<_> = b.iter_time_series().collect();
    left.sort_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));
    right.sort_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));
    assert_eq!(left, right);
}

#[test]
fn csv_folder_round_trips() {
    let dir = tempdir().unwrap();
    let network = sample();
    export_csv_folder(&network, dir.path()).unwrap();

    assert!(dir.path().join("generators-p_max_pu.csv").exists());
    assert!(dir.path().join("loads-p_set.csv").exists());

    let back = import_csv_folder(dir.path()).unwrap();
    assert_same_model(&network, &back);
}

#[test]
fn csv_folder_keeps_empty_text_and_signed_zero() {
    let dir = tempdir().unwrap();
    let mut network = Network::with_name("edge");
    network
        .add_node(
            "bare",
            BusParams {
                carrier: String::new(),
                ..BusParams::default()
            },
        )
        .unwrap();
    network
        .add_load("export", "bare", LoadParams::new(-0.0, 0.0))
        .unwrap();
    export_csv_folder(&network, dir.path()).unwrap();

    let back = import_csv_folder(dir.path()).unwrap();
    assert_eq!(back.node("bare").unwrap().params.carrier, "");
    let p_set = back.component("export").unwrap().as_load().unwrap().p_set;
    assert!(p_set == 0.0 && p_set.is_sign_negative());
    assert_same_model(&network, &back);
}

#[test]
fn export_replaces_stale_series_files() {
    let dir = tempdir().unwrap();
    let mut network = sample();
    export_csv_folder(&network, dir.path()).unwrap();

    network.remove_component("wind").unwrap();
    export_csv_folder(&network, dir.path()).unwrap();
    assert!(!dir.path().join("generators-p_max_pu.csv").exists());

    let back = import_csv_folder(dir.path()).unwrap();
    assert!(back.component("wind").is_none());
    assert_same_model(&network, &back);
}

#[test]
fn json_round_trips_exactly() {
    let network = sample();
    let back = from_json_str(&to_json_string(&network).unwrap()).unwrap();
    assert_eq!(back, network);

    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("model.json");
    export_json(&network, &path).unwrap();
    assert_eq!(import_json(&path).unwrap(), network);
}

#[test]
fn dangling_reference_rejects_the_whole_folder() {
    let dir = tempdir().unwrap();
    export_csv_folder(&sample(), dir.path()).unwrap();
    fs::write(
        dir.path().join("loads.csv"),
        "id,bus,p_set\ncity,south,40\nfactory,nowhere,5\n",
    )
    .unwrap();
    fs::remove_file(dir.path().join("loads-p_set.csv")).unwrap();

    let err = import_csv_folder(dir.path()).unwrap_err();
    assert_eq!(
        err.downcast_ref::<NetworkError>(),
        Some(&NetworkError::UnknownNode("nowhere".into()))
    );
}

#[test]
fn malformed_cell_names_file_and_column() {
    let dir = tempdir().unwrap();
    export_csv_folder(&sample(), dir.path()).unwrap();
    fs::write(
        dir.path().join("lines.csv"),
        "id,bus0,bus1,x,s_nom\nns,north,south,0.1,lots\n",
    )
    .unwrap();

    let err = import_csv_folder(dir.path()).unwrap_err();
    match err.downcast_ref::<FormatError>() {
        Some(FormatError::InvalidCell {
            file, column, value, ..
        }) => {
            assert_eq!(file, "lines.csv");
            assert_eq!(column, "s_nom");
            assert_eq!(value, "lots");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unknown_column_is_rejected() {
    let dir = tempdir().unwrap();
    export_csv_folder(&sample(), dir.path()).unwrap();
    fs::write(
        dir.path().join("loads.csv"),
        "id,bus,p_set,colour\ncity,south,40,blue\n",
    )
    .unwrap();

    let err = import_csv_folder(dir.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NetworkError>(),
        Some(NetworkError::UnknownAttribute { kind: ComponentKind::Load, attribute }) if attribute == "colour"
    ));
}

#[test]
fn series_on_a_shifted_horizon_is_rejected() {
    let dir = tempdir().unwrap();
    export_csv_folder(&sample(), dir.path()).unwrap();
    fs::write(
        dir.path().join("loads-p_set.csv"),
        "snapshot,city\n2025-03-01T01:00:00,1\n2025-03-01T02:00:00,1\n\
         2025-03-01T03:00:00,1\n2025-03-01T04:00:00,1\n",
    )
    .unwrap();

    let err = import_csv_folder(dir.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NetworkError>(),
        Some(NetworkError::InvalidHorizon(_))
    ));
}

#[test]
fn newer_format_version_is_refused() {
    let dir = tempdir().unwrap();
    export_csv_folder(&sample(), dir.path()).unwrap();
    fs::write(dir.path().join("network.csv"), "name,format_version\nx,99\n").unwrap();

    let err = import_csv_folder(dir.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FormatError>(),
        Some(FormatError::UnsupportedVersion { .. })
    ));
}

#[test]
fn result_export_needs_an_evaluation() {
    let dir = tempdir().unwrap();
    let mut network = Network::new();
    network.add_node("a", BusParams::default()).unwrap();
    let err = export_result_csv(&network, dir.path()).unwrap_err();
    assert_eq!(
        err.downcast_ref::<NetworkError>(),
        Some(&NetworkError::NoResultAvailable)
    );
}

#[test]
fn result_tables_are_written_after_optimization() {
    let dir = tempdir().unwrap();
    let mut network = sample();
    let report = Evaluator::evaluate(
        &mut network,
        &AnalysisMode::Operational(OptimizationOptions::default()),
    )
    .unwrap();
    assert!(report.is_ok());

    export_result_csv(&network, dir.path()).unwrap();
    let summary = fs::read_to_string(dir.path().join("summary.csv")).unwrap();
    assert!(summary.lines().nth(1).unwrap().contains(",4,4"));

    let series = fs::read_to_string(dir.path().join("series.csv")).unwrap();
    assert!(series.starts_with("id,attribute,snapshot,value"));
    assert!(series.contains("hydro,p,2025-03-01T00:00:00,"));

    let generators = fs::read_to_string(dir.path().join("generators.csv")).unwrap();
    assert!(generators.lines().any(|line| line.starts_with("hydro,")));

    let buses = fs::read_to_string(dir.path().join("buses.csv")).unwrap();
    assert!(buses.lines().next().unwrap().contains("v_nom"));
    assert!(buses.lines().any(|line| line.starts_with("north,110")));
}

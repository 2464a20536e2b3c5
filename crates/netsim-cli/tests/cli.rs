use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn repo_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join(relative)
}

/// `netsim` with an empty home, so no user config leaks into the run.
fn netsim(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("netsim").unwrap();
    cmd.env("HOME", home).arg("--log-level").arg("warn");
    cmd
}

#[test]
fn ring_power_flow_converges() {
    let home = tempdir().unwrap();
    netsim(home.path())
        .args(["pf", repo_path("demos/ring.yaml").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("power flow: ok (converged)"));
}

#[test]
fn ring_power_flow_writes_result_tables() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();
    netsim(home.path())
        .args([
            "pf",
            repo_path("demos/ring.yaml").to_str().unwrap(),
            "--out",
            out.path().to_str().unwrap(),
        ])
        .assert()
        .success();
    let series = fs::read_to_string(out.path().join("series.csv")).unwrap();
    assert!(series.contains("gen,p,2024-01-01T00:00:00,"));
    assert!(out.path().join("lines.csv").exists());
    assert!(out.path().join("summary.csv").exists());
}

#[test]
fn linear_method_reports_json() {
    let home = tempdir().unwrap();
    netsim(home.path())
        .args([
            "pf",
            repo_path("demos/ring.yaml").to_str().unwrap(),
            "--method",
            "linear",
            "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"ok\""))
        .stdout(predicate::str::contains("\"condition\": \"converged\""));
}

#[test]
fn solar_battery_dispatch_is_optimal() {
    let home = tempdir().unwrap();
    netsim(home.path())
        .args(["opf", repo_path("demos/solar_battery.yaml").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok (optimal)"))
        .stdout(predicate::str::contains("snapshots: 24/24 solved"));
}

#[test]
fn greenfield_investment_uses_study_plan() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();
    netsim(home.path())
        .args([
            "invest",
            repo_path("demos/greenfield.yaml").to_str().unwrap(),
            "--out",
            out.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("investment optimization: ok"));
    let generators = fs::read_to_string(out.path().join("generators.csv")).unwrap();
    assert!(generators.lines().next().unwrap().contains("p_nom_opt"));
}

#[test]
fn investment_without_plan_fails() {
    let home = tempdir().unwrap();
    netsim(home.path())
        .args(["invest", repo_path("demos/ring.yaml").to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no investment plan"));
}

#[test]
fn validate_reports_stats() {
    let home = tempdir().unwrap();
    netsim(home.path())
        .args(["validate", repo_path("demos/ring.yaml").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("ring: 3 buses, 3 lines"));
}

#[test]
fn dangling_bus_is_reported() {
    let home = tempdir().unwrap();
    let dir = tempdir().unwrap();
    let study = dir.path().join("broken.yaml");
    fs::write(
        &study,
        "buses: [{ id: a }]\nloads: [{ id: d, bus: nowhere, p_set: 1 }]\n",
    )
    .unwrap();
    netsim(home.path())
        .args(["validate", study.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown node 'nowhere'"));
}

#[test]
fn exported_folder_evaluates_like_the_study() {
    let home = tempdir().unwrap();
    let dir = tempdir().unwrap();
    let folder = dir.path().join("ring");
    netsim(home.path())
        .args([
            "export",
            repo_path("demos/ring.yaml").to_str().unwrap(),
            "--out",
            folder.to_str().unwrap(),
        ])
        .assert()
        .success();
    assert!(folder.join("buses.csv").exists());

    netsim(home.path())
        .args(["pf", folder.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("converged"));
}

#[test]
fn json_export_round_trips_through_the_cli() {
    let home = tempdir().unwrap();
    let dir = tempdir().unwrap();
    let model = dir.path().join("solar.json");
    netsim(home.path())
        .args([
            "export",
            repo_path("demos/solar_battery.yaml").to_str().unwrap(),
            "--format",
            "json",
            "--out",
            model.to_str().unwrap(),
        ])
        .assert()
        .success();

    netsim(home.path())
        .args(["opf", model.to_str().unwrap(), "--model-json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("optimal"));
}

#[test]
fn config_file_sets_defaults() {
    let home = tempdir().unwrap();
    let config = home.path().join("netsim.toml");
    fs::write(&config, "[power_flow]\nmethod = \"linear\"\n").unwrap();
    netsim(home.path())
        .args([
            "--config",
            config.to_str().unwrap(),
            "pf",
            repo_path("demos/ring.yaml").to_str().unwrap(),
            "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"iterations\": 1"));
}

#[test]
fn missing_config_file_fails() {
    let home = tempdir().unwrap();
    netsim(home.path())
        .args([
            "--config",
            "/nonexistent/netsim.toml",
            "opf",
            repo_path("demos/ring.yaml").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn completions_generate() {
    let home = tempdir().unwrap();
    netsim(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("netsim"));
}

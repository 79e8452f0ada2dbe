use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_system(dir: &Path) {
    fs::write(dir.join("bus.csv"), "Bus Name,Bus No.\nNorth,1\nSouth,2\n").unwrap();
    fs::write(
        dir.join("branch.csv"),
        "From Bus,To Bus,Rating,MTTF,MTTR\n1,2,80,2000,10\n",
    )
    .unwrap();
    fs::write(
        dir.join("gen.csv"),
        "Bus No.,Max Cap,Min Cap,MTTF,MTTR,Cost\n1,60,0,300,30,20\n1,60,0,300,30,25\n2,30,0,500,25,40\n",
    )
    .unwrap();
    fs::write(
        dir.join("storage.csv"),
        "Name,Bus,Pmax,Duration,max_SOC,min_SOC,Efficiency,MTTF,MTTR,Units\n\
         Battery,2,10,4,0.9,0.1,0.81,1000,20,2\n",
    )
    .unwrap();
    let mut load = String::from("Hour,North,South\n");
    for hour in 0..24 {
        let south = if (17..21).contains(&hour) { 70 } else { 50 };
        load.push_str(&format!("{hour},30,{south}\n"));
    }
    fs::write(dir.join("load.csv"), load).unwrap();
}

fn sra() -> Command {
    Command::cargo_bin("sra").unwrap()
}

#[test]
fn validate_reports_clean_system() {
    let dir = tempdir().unwrap();
    write_system(dir.path());
    sra()
        .args(["validate", "--system", dir.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("System: 2 buses in 1 island,"))
        .stdout(predicate::str::contains("Diagnostics:"));
}

#[test]
fn validate_fails_on_dangling_branch() {
    let dir = tempdir().unwrap();
    write_system(dir.path());
    fs::write(
        dir.path().join("branch.csv"),
        "From Bus,To Bus,Rating,MTTF,MTTR\n1,9,80,2000,10\n",
    )
    .unwrap();
    sra()
        .args(["validate", "--system", dir.path().to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("topology"));
}

#[test]
fn matrices_prints_dimensions() {
    let dir = tempdir().unwrap();
    write_system(dir.path());
    sra()
        .args(["matrices", "--system", dir.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("incidence"))
        .stdout(predicate::str::contains("gen_map"));
}

#[test]
fn run_writes_indices_and_exports() {
    let dir = tempdir().unwrap();
    write_system(dir.path());
    let out = dir.path().join("out/indices.json");
    let events = dir.path().join("out/events.csv");
    let heatmap = dir.path().join("out/heatmap.csv");
    let buses = dir.path().join("out/buses.csv");

    sra()
        .args([
            "run",
            "--system",
            dir.path().to_str().unwrap(),
            "--trials",
            "4",
            "--hours",
            "48",
            "--workers",
            "2",
            "--seed",
            "11",
            "--mode",
            "lite",
            "--out",
            out.to_str().unwrap(),
            "--events",
            events.to_str().unwrap(),
            "--heatmap",
            heatmap.to_str().unwrap(),
            "--buses",
            buses.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("LOLE"))
        .stdout(predicate::str::contains("EUE"));

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(report["indices"]["trials"], 4);
    assert_eq!(report["config"]["dispatch_mode"], "lite");
    assert_eq!(report["buses"].as_array().unwrap().len(), 2);
    assert!(report["indices"]["lole"].as_f64().unwrap() >= 0.0);

    assert!(events.exists());
    let heat = fs::read_to_string(&heatmap).unwrap();
    assert_eq!(heat.lines().count(), 13);
    assert!(heat.starts_with("month,0,1,"));
    let bus_rows = fs::read_to_string(&buses).unwrap();
    assert!(bus_rows.starts_with("bus,name,eue,lolh"));
}

#[test]
fn run_accepts_config_file_and_renewables() {
    let dir = tempdir().unwrap();
    write_system(dir.path());
    let config = dir.path().join("study.toml");
    fs::write(
        &config,
        "trials = 2\nhorizon_hours = 24\nseed = 3\ndispatch_mode = \"full\"\n",
    )
    .unwrap();
    let wind = dir.path().join("wind.csv");
    fs::write(&wind, "Hour,South\n0,10\n1,12\n2,8\n").unwrap();
    let out = dir.path().join("indices.json");

    sra()
        .args([
            "run",
            "--system",
            dir.path().to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--renewables",
            wind.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(report["indices"]["trials"], 2);
    assert_eq!(report["indices"]["horizon_hours"], 24);
    assert_eq!(report["renewable_scenarios"], 1);
}

#[test]
fn run_rejects_unknown_config_keys() {
    let dir = tempdir().unwrap();
    write_system(dir.path());
    let config = dir.path().join("study.toml");
    fs::write(&config, "trails = 2\n").unwrap();

    sra()
        .args([
            "run",
            "--system",
            dir.path().to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("study config"));
}

#[test]
fn run_rejects_zero_workers() {
    let dir = tempdir().unwrap();
    write_system(dir.path());
    sra()
        .args([
            "run",
            "--system",
            dir.path().to_str().unwrap(),
            "--workers",
            "0",
        ])
        .assert()
        .failure();
}

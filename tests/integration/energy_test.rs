use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use resmon::{
    EnergyEstimator, EstimatorConfig, MonitorConfig, NetworkCounters, NullEstimator,
    PowercapEstimator, ResourceMonitor,
};

use super::support::ScriptedSource;

#[test]
fn test_missing_estimator_data_degrades_to_zero_report() {
    let source = ScriptedSource::constant(5.0, 50.0, NetworkCounters::default());
    let mut monitor = ResourceMonitor::with_parts(Box::new(source), Box::new(NullEstimator));

    let config = MonitorConfig::with_sampling_interval(Duration::from_millis(50));
    monitor.start(config).unwrap();
    let report = monitor.stop().unwrap();

    assert_eq!(report.energy.total_energy_kwh, 0.0);
    assert_eq!(report.energy.cpu_energy_kwh, 0.0);
    assert_eq!(report.energy.gpu_power_w, 0.0);
    assert_eq!(report.energy.ram_power_w, 0.0);
}

fn write_domain(dir: &Path, name: &str, energy_uj: u64) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("name"), format!("{name}\n")).unwrap();
    fs::write(dir.join("energy_uj"), format!("{energy_uj}\n")).unwrap();
    fs::write(dir.join("max_energy_range_uj"), "262143328850\n").unwrap();
}

#[test]
fn test_powercap_estimator_accumulates_and_exports_csv() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("powercap");
    write_domain(&base.join("intel-rapl:0"), "package-0", 1_000);
    // core overlaps the package counter and must be ignored
    write_domain(&base.join("intel-rapl:0:0"), "core", 999);
    write_domain(&base.join("intel-rapl:0:1"), "dram", 500);

    let csv_path = dir.path().join("energy.csv");
    let mut estimator = PowercapEstimator::with_paths(&base, &csv_path);

    let config = EstimatorConfig {
        persist_to_storage: true,
        polling_cadence: Duration::from_millis(40),
        verbose: false,
    };
    estimator.start(&config).unwrap();
    thread::sleep(Duration::from_millis(100));

    // 3.6e9 uJ = 0.001 kWh on the package, half that on dram
    fs::write(
        base.join("intel-rapl:0").join("energy_uj"),
        format!("{}\n", 1_000u64 + 3_600_000_000),
    )
    .unwrap();
    fs::write(
        base.join("intel-rapl:0:1").join("energy_uj"),
        format!("{}\n", 500u64 + 1_800_000_000),
    )
    .unwrap();

    estimator.stop();
    let report = estimator.final_report().unwrap();

    assert!((report.cpu_energy_kwh - 0.001).abs() < 1e-9);
    assert!((report.ram_energy_kwh - 0.0005).abs() < 1e-9);
    assert!((report.total_energy_kwh - 0.0015).abs() < 1e-9);
    assert_eq!(report.gpu_energy_kwh, 0.0);
    assert!(report.cpu_power_w > 0.0);

    // The report is handed out once
    assert!(estimator.final_report().is_none());

    let csv = fs::read_to_string(&csv_path).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "timestamp,elapsed_secs,cpu_energy_kwh,ram_energy_kwh,total_energy_kwh"
    );
    let row = lines.next().unwrap();
    assert_eq!(row.split(',').count(), 5);
}

#[test]
fn test_powercap_without_domains_produces_no_report() {
    let dir = tempfile::tempdir().unwrap();
    let mut estimator = PowercapEstimator::with_paths(
        dir.path().join("does-not-exist"),
        dir.path().join("energy.csv"),
    );

    estimator.start(&EstimatorConfig::default()).unwrap();
    estimator.stop();

    assert!(estimator.final_report().is_none());
}

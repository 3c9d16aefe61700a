use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use resmon::{MetricSource, MonitorError, NetworkCounters, Result, Sampler, SharedSource};

use super::support::ScriptedSource;

fn shared(source: impl MetricSource + 'static) -> SharedSource {
    Arc::new(Mutex::new(Box::new(source) as Box<dyn MetricSource>))
}

#[test]
fn test_scripted_readings_average_and_max() {
    // The script exhausts after three readings, so the series hold
    // exactly these values regardless of how many ticks ran.
    let source = ScriptedSource::new(vec![10.0, 20.0, 30.0], vec![40.0, 50.0, 60.0], vec![]);

    let sampler = Sampler::spawn(
        shared(source),
        Duration::from_millis(15),
        NetworkCounters::default(),
        Instant::now(),
    )
    .unwrap();
    thread::sleep(Duration::from_millis(120));
    let series = sampler.stop(Duration::from_secs(1));

    assert_eq!(series.cpu.len(), 3);
    assert!((series.cpu.average().unwrap() - 20.0).abs() < 1e-9);
    assert!((series.cpu.max().unwrap() - 30.0).abs() < 1e-9);
    assert!((series.memory.average().unwrap() - 50.0).abs() < 1e-9);
    assert!((series.memory.max().unwrap() - 60.0).abs() < 1e-9);

    // Empty network script: every read failed, no samples recorded
    assert!(series.net_sent.is_empty());
    assert!(series.net_recv.is_empty());
}

#[test]
fn test_network_deltas_are_baseline_relative() {
    let source = ScriptedSource::constant(
        1.0,
        1.0,
        NetworkCounters {
            bytes_sent: 1500,
            bytes_recv: 2600,
        },
    );
    let baseline = NetworkCounters {
        bytes_sent: 1000,
        bytes_recv: 2000,
    };

    let sampler = Sampler::spawn(
        shared(source),
        Duration::from_millis(10),
        baseline,
        Instant::now(),
    )
    .unwrap();
    thread::sleep(Duration::from_millis(60));
    let series = sampler.stop(Duration::from_secs(1));

    assert!(!series.net_sent.is_empty());
    assert!(series.net_sent.samples().iter().all(|s| s.value == 500.0));
    assert!(series.net_recv.samples().iter().all(|s| s.value == 600.0));
}

#[test]
fn test_sample_count_and_monotonic_elapsed() {
    let source = ScriptedSource::constant(5.0, 50.0, NetworkCounters::default());

    let interval = Duration::from_millis(20);
    let sampler = Sampler::spawn(
        shared(source),
        interval,
        NetworkCounters::default(),
        Instant::now(),
    )
    .unwrap();
    thread::sleep(Duration::from_millis(200));
    let series = sampler.stop(Duration::from_secs(1));

    // ~10 expected; generous margins for scheduling jitter
    assert!(
        (5..=13).contains(&series.cpu.len()),
        "unexpected sample count: {}",
        series.cpu.len()
    );
    assert_eq!(series.cpu.len(), series.memory.len());
    assert_eq!(series.cpu.len(), series.net_sent.len());
    assert_eq!(series.cpu.len(), series.net_recv.len());

    let elapsed: Vec<f64> = series.cpu.samples().iter().map(|s| s.elapsed_secs).collect();
    assert!(elapsed.windows(2).all(|pair| pair[0] < pair[1]));
}

struct FlakyCpuSource;

impl MetricSource for FlakyCpuSource {
    fn cpu_percent(&mut self) -> Result<f64> {
        Err(MonitorError::metric("sensor offline"))
    }

    fn memory_percent(&mut self) -> Result<f64> {
        Ok(42.0)
    }

    fn network_counters(&mut self) -> Result<NetworkCounters> {
        Ok(NetworkCounters {
            bytes_sent: 10,
            bytes_recv: 20,
        })
    }
}

#[test]
fn test_failed_read_skips_only_that_series() {
    let sampler = Sampler::spawn(
        shared(FlakyCpuSource),
        Duration::from_millis(15),
        NetworkCounters::default(),
        Instant::now(),
    )
    .unwrap();
    thread::sleep(Duration::from_millis(90));
    let series = sampler.stop(Duration::from_secs(1));

    // The loop survives the failing reads and keeps the other series going
    assert!(series.cpu.is_empty());
    assert!(series.memory.len() >= 2);
    assert_eq!(series.memory.len(), series.net_sent.len());
}

//! Best-effort energy estimation.
//!
//! The session drives an [`EnergyEstimator`] as an opaque start/stop
//! bracket and only ever pulls a final report from it. Absence of data is
//! normal: the report then defaults to zero values.
//!
//! [`PowercapEstimator`] reads the kernel's cumulative RAPL counters from
//! `/sys/class/powercap` on its own polling thread. Package domains are
//! attributed to the CPU, the dram domain to RAM; RAPL exposes no GPU
//! domain, so that component stays at zero.

use std::fs::{self, File};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{MonitorError, Result};

const UJ_PER_KWH: f64 = 3.6e12;
const POWERCAP_BASE: &str = "/sys/class/powercap";
const DEFAULT_CSV_PATH: &str = "resmon_energy.csv";

/// Sleep slice inside the poll loop, so stop is observed promptly even
/// with a long cadence.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Aggregated energy/power figures for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyReport {
    pub total_energy_kwh: f64,
    pub cpu_energy_kwh: f64,
    pub gpu_energy_kwh: f64,
    pub ram_energy_kwh: f64,
    pub cpu_power_w: f64,
    pub gpu_power_w: f64,
    pub ram_power_w: f64,
}

/// Configuration handed to the estimator at session start.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Persist readings as CSV
    pub persist_to_storage: bool,
    /// How often the estimator polls its counters
    pub polling_cadence: Duration,
    /// Log each poll at info level instead of debug
    pub verbose: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            persist_to_storage: false,
            polling_cadence: Duration::from_secs(60),
            verbose: false,
        }
    }
}

/// Opaque energy estimation subsystem.
///
/// Implementations manage their own concurrency. `final_report` returns
/// `None` when no data was produced; callers substitute zero values.
pub trait EnergyEstimator: Send {
    fn start(&mut self, config: &EstimatorConfig) -> Result<()>;
    fn stop(&mut self);
    fn final_report(&mut self) -> Option<EnergyReport>;
}

/// Estimator that never produces data. Default on platforms without a
/// readable powercap tree, and handy in tests.
#[derive(Debug, Default)]
pub struct NullEstimator;

impl EnergyEstimator for NullEstimator {
    fn start(&mut self, _config: &EstimatorConfig) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn final_report(&mut self) -> Option<EnergyReport> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RaplKind {
    Cpu,
    Ram,
}

/// One powercap domain with its accumulated consumption.
struct RaplDomain {
    kind: RaplKind,
    energy_path: PathBuf,
    max_range_uj: u64,
    last_uj: u64,
    total_uj: u64,
}

impl RaplDomain {
    fn advance(&mut self) {
        match read_counter(&self.energy_path) {
            Ok(current) => self.apply(current),
            Err(e) => log::debug!(
                "energy counter read failed for {}: {e}",
                self.energy_path.display()
            ),
        }
    }

    /// Fold a new cumulative reading into the running total, accounting
    /// for counter wraparound at `max_range_uj`.
    fn apply(&mut self, current_uj: u64) {
        let diff = if current_uj >= self.last_uj {
            current_uj - self.last_uj
        } else {
            (self.max_range_uj - self.last_uj).saturating_add(current_uj)
        };
        self.total_uj = self.total_uj.saturating_add(diff);
        self.last_uj = current_uj;
    }
}

fn read_counter(path: &Path) -> Result<u64> {
    let text = fs::read_to_string(path)?;
    text.trim()
        .parse::<u64>()
        .map_err(|e| MonitorError::energy(format!("bad counter in {}: {e}", path.display())))
}

/// Scan a powercap tree for usable RAPL domains.
///
/// Package domains count toward CPU, dram toward RAM. Sub-domains like
/// core/uncore/psys overlap the package counters and are skipped.
/// Domains whose counters are unreadable (commonly root-only) are
/// skipped as well.
fn discover_domains(base: &Path) -> Vec<RaplDomain> {
    let entries = match fs::read_dir(base) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut domains = Vec::new();
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with("intel-rapl") {
            continue;
        }
        let dir = entry.path();

        let name = match fs::read_to_string(dir.join("name")) {
            Ok(name) => name.trim().to_string(),
            Err(_) => continue,
        };
        let kind = if name.starts_with("package") {
            RaplKind::Cpu
        } else if name == "dram" {
            RaplKind::Ram
        } else {
            continue;
        };

        let energy_path = dir.join("energy_uj");
        let last_uj = match read_counter(&energy_path) {
            Ok(value) => value,
            Err(_) => continue,
        };
        let max_range_uj = read_counter(&dir.join("max_energy_range_uj")).unwrap_or(u64::MAX);

        domains.push(RaplDomain {
            kind,
            energy_path,
            max_range_uj,
            last_uj,
            total_uj: 0,
        });
    }

    domains
}

fn totals_uj(domains: &[RaplDomain]) -> (u64, u64) {
    let mut cpu_uj = 0u64;
    let mut ram_uj = 0u64;
    for domain in domains {
        match domain.kind {
            RaplKind::Cpu => cpu_uj = cpu_uj.saturating_add(domain.total_uj),
            RaplKind::Ram => ram_uj = ram_uj.saturating_add(domain.total_uj),
        }
    }
    (cpu_uj, ram_uj)
}

/// Tabular export of energy readings.
struct CsvExport {
    file: File,
}

impl CsvExport {
    fn create(path: &Path) -> io::Result<Self> {
        let mut file = File::create(path)?;
        writeln!(
            file,
            "timestamp,elapsed_secs,cpu_energy_kwh,ram_energy_kwh,total_energy_kwh"
        )?;
        Ok(Self { file })
    }

    fn write_row(&mut self, elapsed_secs: f64, cpu_kwh: f64, ram_kwh: f64) -> io::Result<()> {
        let timestamp = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S");
        writeln!(
            self.file,
            "{timestamp},{elapsed_secs:.3},{cpu_kwh:.9},{ram_kwh:.9},{total_kwh:.9}",
            total_kwh = cpu_kwh + ram_kwh
        )
    }
}

struct PollerHandle {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Vec<RaplDomain>>,
    started_at: Instant,
}

/// [`EnergyEstimator`] backed by the Linux powercap (RAPL) sysfs tree.
pub struct PowercapEstimator {
    base_path: PathBuf,
    csv_path: PathBuf,
    run: Option<PollerHandle>,
    finished: Option<EnergyReport>,
}

impl PowercapEstimator {
    pub fn new() -> Self {
        Self::with_paths(POWERCAP_BASE, DEFAULT_CSV_PATH)
    }

    /// Estimator reading from a custom powercap tree and writing its CSV
    /// to a custom location.
    pub fn with_paths<B: Into<PathBuf>, C: Into<PathBuf>>(base_path: B, csv_path: C) -> Self {
        Self {
            base_path: base_path.into(),
            csv_path: csv_path.into(),
            run: None,
            finished: None,
        }
    }
}

impl Default for PowercapEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl EnergyEstimator for PowercapEstimator {
    fn start(&mut self, config: &EstimatorConfig) -> Result<()> {
        if self.run.is_some() {
            return Err(MonitorError::energy("estimator is already running"));
        }
        self.finished = None;

        let domains = discover_domains(&self.base_path);
        if domains.is_empty() {
            log::debug!(
                "no readable powercap domains under {}; energy will be reported as zero",
                self.base_path.display()
            );
            return Ok(());
        }

        let csv = if config.persist_to_storage {
            match CsvExport::create(&self.csv_path) {
                Ok(csv) => Some(csv),
                Err(e) => {
                    log::warn!(
                        "could not create {}: {e}; energy export disabled",
                        self.csv_path.display()
                    );
                    None
                }
            }
        } else {
            None
        };

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let cadence = config.polling_cadence;
        let verbose = config.verbose;
        let started_at = Instant::now();

        let handle = thread::Builder::new()
            .name("resmon-energy".into())
            .spawn(move || poll_loop(domains, flag, cadence, csv, started_at, verbose))?;

        self.run = Some(PollerHandle {
            stop,
            handle,
            started_at,
        });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };

        run.stop.store(true, Ordering::Relaxed);
        let domains = match run.handle.join() {
            Ok(domains) => domains,
            Err(_) => {
                log::warn!("energy poller thread panicked; dropping its data");
                return;
            }
        };

        let duration_secs = run.started_at.elapsed().as_secs_f64();
        let (cpu_uj, ram_uj) = totals_uj(&domains);
        let cpu_energy_kwh = cpu_uj as f64 / UJ_PER_KWH;
        let ram_energy_kwh = ram_uj as f64 / UJ_PER_KWH;

        let (cpu_power_w, ram_power_w) = if duration_secs > 0.0 {
            (
                cpu_uj as f64 / 1e6 / duration_secs,
                ram_uj as f64 / 1e6 / duration_secs,
            )
        } else {
            (0.0, 0.0)
        };

        self.finished = Some(EnergyReport {
            total_energy_kwh: cpu_energy_kwh + ram_energy_kwh,
            cpu_energy_kwh,
            gpu_energy_kwh: 0.0,
            ram_energy_kwh,
            cpu_power_w,
            gpu_power_w: 0.0,
            ram_power_w,
        });
    }

    fn final_report(&mut self) -> Option<EnergyReport> {
        self.finished.take()
    }
}

fn poll_loop(
    mut domains: Vec<RaplDomain>,
    stop: Arc<AtomicBool>,
    cadence: Duration,
    mut csv: Option<CsvExport>,
    origin: Instant,
    verbose: bool,
) -> Vec<RaplDomain> {
    loop {
        let mut slept = Duration::ZERO;
        while slept < cadence && !stop.load(Ordering::Relaxed) {
            let slice = POLL_SLICE.min(cadence - slept);
            thread::sleep(slice);
            slept += slice;
        }

        // One last reading on the way out so the totals cover the full
        // bracket, not just the final full cadence.
        for domain in &mut domains {
            domain.advance();
        }

        let (cpu_uj, ram_uj) = totals_uj(&domains);
        let cpu_kwh = cpu_uj as f64 / UJ_PER_KWH;
        let ram_kwh = ram_uj as f64 / UJ_PER_KWH;

        if verbose {
            log::info!("energy poll: cpu {cpu_kwh:.6} kWh, ram {ram_kwh:.6} kWh");
        } else {
            log::debug!("energy poll: cpu {cpu_kwh:.6} kWh, ram {ram_kwh:.6} kWh");
        }

        if let Some(export) = csv.as_mut() {
            if let Err(e) = export.write_row(origin.elapsed().as_secs_f64(), cpu_kwh, ram_kwh) {
                log::warn!("energy CSV write failed: {e}; export disabled");
                csv = None;
            }
        }

        if stop.load(Ordering::Relaxed) {
            break;
        }
    }

    domains
}

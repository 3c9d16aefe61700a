//! Final report computation and rendering.

use std::fmt;
use std::time::Duration;

use crate::core::energy::EnergyReport;
use crate::core::sampler::SeriesSet;

const SEPARATOR_WIDTH: usize = 38;
const BYTES_PER_KB: f64 = 1024.0;

/// Average and maximum over one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSummary {
    pub average: f64,
    pub max: f64,
}

/// Final cumulative network traffic in KB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkTotals {
    pub sent_kb: f64,
    pub recv_kb: f64,
}

/// Aggregated session report.
///
/// Summaries are `None` for series that collected no samples (for
/// example when the session was shorter than one sampling interval);
/// those lines are omitted from the rendered output. Network totals are
/// taken from the last recorded sample of the cumulative delta series;
/// traffic between the last tick and session end is not included.
#[derive(Debug, Clone, Copy)]
pub struct MonitorReport {
    pub duration_secs: f64,
    pub energy: EnergyReport,
    pub cpu: Option<SeriesSummary>,
    pub memory: Option<SeriesSummary>,
    pub network: Option<NetworkTotals>,
}

impl MonitorReport {
    pub fn new(series: &SeriesSet, energy: EnergyReport, duration: Duration) -> Self {
        let cpu = summarize(&series.cpu);
        let memory = summarize(&series.memory);

        let network = match (series.net_sent.last_value(), series.net_recv.last_value()) {
            (Some(sent), Some(recv)) => Some(NetworkTotals {
                sent_kb: sent / BYTES_PER_KB,
                recv_kb: recv / BYTES_PER_KB,
            }),
            _ => None,
        };

        Self {
            duration_secs: duration.as_secs_f64(),
            energy,
            cpu,
            memory,
            network,
        }
    }
}

fn summarize(series: &crate::core::sampler::Series) -> Option<SeriesSummary> {
    match (series.average(), series.max()) {
        (Some(average), Some(max)) => Some(SeriesSummary { average, max }),
        _ => None,
    }
}

impl fmt::Display for MonitorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = "=".repeat(SEPARATOR_WIDTH);

        writeln!(f)?;
        writeln!(f, "{separator}")?;
        writeln!(f, "Resources Monitor Report:")?;
        writeln!(f, "Execution Time: {:.6} seconds", self.duration_secs)?;
        writeln!(f, "Total Energy: {:.6} kWh", self.energy.total_energy_kwh)?;
        writeln!(
            f,
            "  • CPU : {:.6} kWh (Power: {:.1} W)",
            self.energy.cpu_energy_kwh, self.energy.cpu_power_w
        )?;
        writeln!(
            f,
            "  • GPU : {:.6} kWh (Power: {:.1} W)",
            self.energy.gpu_energy_kwh, self.energy.gpu_power_w
        )?;
        writeln!(
            f,
            "  • RAM : {:.6} kWh (Power: {:.1} W)",
            self.energy.ram_energy_kwh, self.energy.ram_power_w
        )?;

        if let Some(cpu) = &self.cpu {
            writeln!(f, "CPU Usage: Avg {:.2}% | Max {:.2}%", cpu.average, cpu.max)?;
        }

        if let Some(memory) = &self.memory {
            writeln!(
                f,
                "Memory Usage: Avg {:.2}% | Max {:.2}%",
                memory.average, memory.max
            )?;
        }

        if let Some(network) = &self.network {
            writeln!(
                f,
                "Network: Sent {:.2} KB | Recv {:.2} KB",
                network.sent_kb, network.recv_kb
            )?;
        }

        write!(f, "{separator}")
    }
}

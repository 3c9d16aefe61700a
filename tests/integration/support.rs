use std::collections::VecDeque;

use resmon::{MetricSource, MonitorError, NetworkCounters, Result};

/// Deterministic metric source fed from pre-recorded readings.
///
/// A source built with [`ScriptedSource::new`] starts failing once its
/// script runs out, so a series holds exactly the scripted values no
/// matter how many ticks the sampler manages to squeeze in. A source
/// built with [`ScriptedSource::repeating`] keeps returning the last
/// reading instead.
pub struct ScriptedSource {
    cpu: VecDeque<f64>,
    memory: VecDeque<f64>,
    network: VecDeque<NetworkCounters>,
    repeat_last: bool,
    last_cpu: Option<f64>,
    last_memory: Option<f64>,
    last_network: Option<NetworkCounters>,
}

impl ScriptedSource {
    pub fn new(cpu: Vec<f64>, memory: Vec<f64>, network: Vec<NetworkCounters>) -> Self {
        Self {
            cpu: cpu.into(),
            memory: memory.into(),
            network: network.into(),
            repeat_last: false,
            last_cpu: None,
            last_memory: None,
            last_network: None,
        }
    }

    pub fn repeating(cpu: Vec<f64>, memory: Vec<f64>, network: Vec<NetworkCounters>) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(cpu, memory, network)
        }
    }

    /// Source that forever returns the same three readings.
    pub fn constant(cpu: f64, memory: f64, network: NetworkCounters) -> Self {
        Self::repeating(vec![cpu], vec![memory], vec![network])
    }
}

fn next_value<T: Copy>(
    queue: &mut VecDeque<T>,
    last: &mut Option<T>,
    repeat_last: bool,
    what: &str,
) -> Result<T> {
    if let Some(value) = queue.pop_front() {
        *last = Some(value);
        return Ok(value);
    }
    if repeat_last {
        if let Some(value) = *last {
            return Ok(value);
        }
    }
    Err(MonitorError::metric(format!("{what} script exhausted")))
}

impl MetricSource for ScriptedSource {
    fn cpu_percent(&mut self) -> Result<f64> {
        next_value(&mut self.cpu, &mut self.last_cpu, self.repeat_last, "cpu")
    }

    fn memory_percent(&mut self) -> Result<f64> {
        next_value(
            &mut self.memory,
            &mut self.last_memory,
            self.repeat_last,
            "memory",
        )
    }

    fn network_counters(&mut self) -> Result<NetworkCounters> {
        next_value(
            &mut self.network,
            &mut self.last_network,
            self.repeat_last,
            "network",
        )
    }
}

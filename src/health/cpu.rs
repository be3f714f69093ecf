//! CPU utilization from cumulative usage counters.
//!
//! The container runtime reports cumulative CPU time for the container and
//! for the whole host, once for the current read and once for the previous
//! read. Utilization is the container's share of the host delta, scaled by
//! the number of schedulable cores.

use serde::Deserialize;

use crate::health::FetchError;

/// One point-in-time usage sample for a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuSample {
    /// Cumulative CPU time used by the backend, current read.
    pub target_usage: u64,
    /// Cumulative CPU time used by the backend, previous read.
    pub prev_target_usage: u64,
    /// Cumulative host CPU time, current read.
    pub system_usage: u64,
    /// Cumulative host CPU time, previous read.
    pub prev_system_usage: u64,
    /// Schedulable cores, when the runtime reports them.
    pub online_cpus: Option<u32>,
}

impl CpuSample {
    /// Utilization in percent of one core. Counter resets clamp to zero.
    pub fn cpu_percent(&self) -> f64 {
        let cpu_delta = self.target_usage.saturating_sub(self.prev_target_usage);
        let system_delta = self.system_usage.saturating_sub(self.prev_system_usage);

        if system_delta == 0 || cpu_delta == 0 {
            return 0.0;
        }

        let cores = match self.online_cpus {
            Some(n) if n > 0 => n,
            _ => 1,
        };

        (cpu_delta as f64 / system_delta as f64) * f64::from(cores) * 100.0
    }
}

/// Mean utilization across several samples of the same backend.
pub fn average_cpu_percent(samples: &[CpuSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let total: f64 = samples.iter().map(CpuSample::cpu_percent).sum();
    Some(total / samples.len() as f64)
}

// Docker Engine `/containers/{id}/stats` payload. Only the fields the
// computation needs are modelled; everything else is ignored.

#[derive(Debug, Deserialize)]
struct StatsDocument {
    cpu_stats: CpuStats,
    precpu_stats: CpuStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CpuStats {
    cpu_usage: Option<CpuUsage>,
    system_cpu_usage: Option<u64>,
    online_cpus: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CpuUsage {
    total_usage: Option<u64>,
    percpu_usage: Option<Vec<u64>>,
}

impl CpuStats {
    fn total_usage(&self) -> u64 {
        self.cpu_usage.as_ref().and_then(|u| u.total_usage).unwrap_or(0)
    }

    fn core_count(&self) -> Option<u32> {
        self.online_cpus.or_else(|| {
            self.cpu_usage
                .as_ref()
                .and_then(|u| u.percpu_usage.as_ref())
                .map(|per_cpu| per_cpu.len() as u32)
        })
    }
}

impl From<StatsDocument> for CpuSample {
    fn from(doc: StatsDocument) -> Self {
        CpuSample {
            target_usage: doc.cpu_stats.total_usage(),
            prev_target_usage: doc.precpu_stats.total_usage(),
            system_usage: doc.cpu_stats.system_cpu_usage.unwrap_or(0),
            prev_system_usage: doc.precpu_stats.system_cpu_usage.unwrap_or(0),
            online_cpus: doc.cpu_stats.core_count(),
        }
    }
}

/// Parse a stats response into samples.
///
/// Accepts a single JSON document or several documents back to back
/// (newline-delimited or simply concatenated). A document without
/// `cpu_stats`/`precpu_stats`, or a body with no documents at all, is
/// malformed.
pub fn parse_stats(body: &[u8]) -> Result<Vec<CpuSample>, FetchError> {
    let samples = serde_json::Deserializer::from_slice(body)
        .into_iter::<StatsDocument>()
        .map(|doc| doc.map(CpuSample::from))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| FetchError::Malformed(e.to_string()))?;

    if samples.is_empty() {
        return Err(FetchError::Malformed("empty stats response".to_string()));
    }
    Ok(samples)
}

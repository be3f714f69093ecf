//! Least CPU load balancing strategy.

use crate::load_balancer::backend::BackendTarget;

/// Select the healthy backend with the lowest CPU utilization.
///
/// Returns its index into `targets`. Ties go to the earliest registered
/// backend, since `min_by` keeps the first of equal elements.
pub fn pick(targets: &[BackendTarget]) -> Option<usize> {
    targets
        .iter()
        .enumerate()
        .filter(|(_, t)| t.healthy)
        .min_by(|(_, a), (_, b)| a.cpu_percent.total_cmp(&b.cpu_percent))
        .map(|(i, _)| i)
}

//! Round-robin load balancing strategy.

use crate::load_balancer::backend::BackendTarget;

/// Rotate through the healthy backends.
///
/// `cursor` is reduced modulo the current healthy count before use, so it
/// stays valid when backends change health between calls. On success the
/// cursor is advanced past the returned position. Returns an index into
/// `targets`.
pub fn pick(targets: &[BackendTarget], cursor: &mut usize) -> Option<usize> {
    let healthy: Vec<usize> = targets
        .iter()
        .enumerate()
        .filter(|(_, t)| t.healthy)
        .map(|(i, _)| i)
        .collect();

    if healthy.is_empty() {
        return None;
    }

    let count = healthy.len();
    let position = *cursor % count;
    *cursor = (position + 1) % count;
    Some(healthy[position])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(n: usize) -> Vec<BackendTarget> {
        (0..n)
            .map(|i| BackendTarget::new(format!("b{i}"), "127.0.0.1", 8000 + i as u16))
            .collect()
    }

    #[test]
    fn test_round_robin() {
        let backends = targets(2);
        let mut cursor = 0;

        assert_eq!(pick(&backends, &mut cursor), Some(0));
        assert_eq!(pick(&backends, &mut cursor), Some(1));
        assert_eq!(pick(&backends, &mut cursor), Some(0));
    }

    #[test]
    fn skips_unhealthy() {
        let mut backends = targets(3);
        backends[1].healthy = false;
        let mut cursor = 0;

        let picks: Vec<_> = (0..4).map(|_| pick(&backends, &mut cursor).unwrap()).collect();
        assert_eq!(picks, vec![0, 2, 0, 2]);
    }

    #[test]
    fn cursor_survives_shrinking_healthy_set() {
        let mut backends = targets(3);
        let mut cursor = 0;
        pick(&backends, &mut cursor);
        pick(&backends, &mut cursor);
        assert_eq!(cursor, 2);

        backends[2].healthy = false;
        // 2 mod 2 == 0: wraps to the first healthy backend.
        assert_eq!(pick(&backends, &mut cursor), Some(0));
        assert_eq!(pick(&backends, &mut cursor), Some(1));
    }

    #[test]
    fn none_leaves_cursor_untouched() {
        let mut backends = targets(2);
        for b in &mut backends {
            b.healthy = false;
        }
        let mut cursor = 1;
        assert_eq!(pick(&backends, &mut cursor), None);
        assert_eq!(cursor, 1);
    }
}

//! Shared routing state.
//!
//! # Responsibilities
//! - Own every backend record and its live metrics
//! - Accept metric reports from the collector
//! - Answer concurrent selection queries for the relay engine
//! - Provide point-in-time snapshots for status output

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::load_balancer::{
    backend::{BackendAddr, BackendTarget},
    RegistryError, Strategy,
};

/// Registry contents guarded by a single lock.
#[derive(Debug, Default)]
struct Registry {
    /// Backends in registration order.
    targets: Vec<BackendTarget>,
    /// Round-robin position among the healthy backends.
    cursor: usize,
}

/// Thread-safe registry of backends; the single synchronization point
/// between the collector and the relay engine.
///
/// Every operation runs under one mutex and never performs I/O while holding
/// it, so observers see the same results as a fully serialized execution.
#[derive(Debug)]
pub struct RoutingState {
    strategy: Strategy,
    registry: Mutex<Registry>,
}

impl RoutingState {
    /// Create an empty registry using the given selection strategy.
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Change the selection strategy. Startup only: requires exclusive access,
    /// so it cannot race with selections once the state is shared.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.strategy = strategy;
    }

    /// The configured selection strategy.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Register a new backend as healthy with 0% CPU.
    pub fn register(
        &self,
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let mut registry = self.lock();
        if registry.targets.iter().any(|t| t.name == name) {
            return Err(RegistryError::DuplicateTarget(name));
        }
        let target = BackendTarget::new(name, host, port);
        tracing::info!(backend = %target.name, address = %target.addr().authority(), "Backend registered");
        registry.targets.push(target);
        Ok(())
    }

    /// Copy of every backend, in registration order.
    pub fn snapshot(&self) -> Vec<BackendTarget> {
        self.lock().targets.clone()
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.lock().targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a collector sample for the named backend.
    ///
    /// Unknown names are ignored: a sample may race with a backend that is no
    /// longer tracked.
    pub fn report_metric(&self, name: &str, cpu_percent: f64, healthy: bool) {
        let mut registry = self.lock();
        match registry.targets.iter_mut().find(|t| t.name == name) {
            Some(target) => target.apply_sample(cpu_percent, healthy),
            None => tracing::debug!(backend = %name, "Metric reported for unknown target, ignoring"),
        }
    }

    /// Choose a backend for a new connection.
    ///
    /// Returns `None` when no backend is healthy; the caller decides what to
    /// do with the client.
    pub fn select_backend(&self) -> Option<BackendAddr> {
        let mut guard = self.lock();
        let registry = &mut *guard;
        let index = self.strategy.pick(&registry.targets, &mut registry.cursor)?;
        Some(registry.targets[index].addr())
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Each critical section leaves the registry consistent, so a poisoned
        // lock still guards valid data.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RoutingState {
    fn default() -> Self {
        Self::new(Strategy::default())
    }
}

//! CPU-aware TCP load-balancing proxy for local containers.

pub mod config;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use lifecycle::{Proxy, Shutdown};
pub use load_balancer::{RoutingState, Strategy};

//! Tokio drivers for the sans-IO protocol engines.

pub mod routing;
pub mod tunnel;

pub use routing::RoutingClient;
pub use tunnel::TunnelClient;

//! Ingress Gateway Library
//!
//! Watches routing rules (host + path → service) and serves HTTP traffic
//! against the routing table they produce.

pub mod config;
pub mod controller;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod resource;
pub mod routing;
pub mod watch;

pub use config::schema::GatewayConfig;
pub use controller::Controller;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use routing::RoutingTable;

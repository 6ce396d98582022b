//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → dispatch.rs (host/path → RouteKey → RoutingTable lookup)
//!         ├─ miss → response.rs (404 page)
//!         └─ hit  → proxy.rs (forward to service.namespace:port, stream back)
//! ```

pub mod dispatch;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use dispatch::DispatchState;
pub use proxy::ReverseProxy;
pub use request::{request_id, RequestIdLayer, X_REQUEST_ID};
pub use server::GatewayServer;

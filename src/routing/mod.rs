//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Reconciler (writer, one key at a time per resource)
//!     → table.rs (upsert / remove)
//!
//! Inbound request (host, path)
//!     → route.rs (derive RouteKey)
//!     → table.rs (lookup)
//!     → Return: RouteTarget or NoMatch
//! ```
//!
//! # Design Decisions
//! - Exact string match only; no prefix or regex matching
//! - Sharded concurrent map: readers never wait on writers of other keys
//! - Last write wins when two resources contribute the same key

pub mod route;
pub mod table;

pub use route::{RouteKey, RouteTarget};
pub use table::RoutingTable;

//! Routing-rule resources.
//!
//! # Data Flow
//! ```text
//! networking.k8s.io/v1 Ingress (cluster state)
//!     → ingress.rs (lossy conversion)
//!     → RuleObject (the only shape the controller reads)
//! ```
//!
//! # Design Decisions
//! - RuleObject is owned and cloneable so delete snapshots never borrow from a cache
//! - `class_name` is optional; an absent class never matches any configured class

pub mod ingress;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a resource: `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// A routing-rule resource as consumed by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleObject {
    pub namespace: String,
    pub name: String,
    /// Class this resource is addressed to.
    pub class_name: Option<String>,
    pub rules: Vec<HostRule>,
}

impl RuleObject {
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.namespace, &self.name)
    }

    /// True only when a class is present and equals `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.class_name.as_deref() == Some(class)
    }
}

/// All paths routed for one host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostRule {
    pub host: String,
    pub paths: Vec<PathRule>,
}

/// A single `path → service:port` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    pub path: String,
    pub service_name: String,
    pub service_port: u16,
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the ingress gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener configuration.
    pub listener: ListenerConfig,

    /// Reconciliation settings.
    pub controller: ControllerConfig,

    /// Cluster connection settings.
    pub kube: KubeConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:80").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:80".to_string(),
        }
    }
}

/// Controller and work queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Only resources with this class contribute routes.
    pub ingress_class: String,

    /// Number of concurrent reconciler workers.
    pub workers: usize,

    /// Rate-limited requeues before a failing key is dropped.
    pub max_retries: u32,

    /// Base delay for per-key exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum per-key backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Sustained requeue rate across all keys.
    pub queue_qps: u32,

    /// Requeue burst across all keys.
    pub queue_burst: u32,

    /// How long to wait for the initial cache sync before giving up.
    pub cache_sync_timeout_secs: u64,

    /// Remove routes a resource no longer contributes when it is updated.
    pub prune_on_update: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ingress_class: "d3os".to_string(),
            workers: 2,
            max_retries: 5,
            base_delay_ms: 5,
            max_delay_ms: 1_000_000,
            queue_qps: 10,
            queue_burst: 100,
            cache_sync_timeout_secs: 60,
            prune_on_update: false,
        }
    }
}

/// Kubernetes API connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct KubeConfig {
    /// Path to a kubeconfig file. In-cluster / default inference when unset.
    pub kubeconfig_path: Option<String>,

    /// API server URL overriding the kubeconfig's cluster URL.
    pub master: Option<String>,

    /// Restrict the watch to one namespace.
    pub namespace: Option<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    /// Unset means requests are bounded only by the transport.
    pub request_secs: Option<u64>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

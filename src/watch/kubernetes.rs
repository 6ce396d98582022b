//! Kubernetes Ingress watch source.
//!
//! # Responsibilities
//! - Build a client from kubeconfig, master override, or in-cluster config
//! - List + watch `networking.k8s.io/v1` Ingress objects
//! - Keep a local key → RuleObject cache and translate watch events into
//!   Add / Update / Delete

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::{future, stream, stream::BoxStream, StreamExt};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{
    api::Api,
    config::{KubeConfigOptions, Kubeconfig},
    runtime::{
        watcher::{self, Event as WatchEvent},
        WatchStreamExt,
    },
    Client, Config,
};

use crate::config::KubeConfig;
use crate::controller::event::Event;
use crate::resource::{ResourceKey, RuleObject};
use crate::watch::{WatchError, WatchSource};

/// Connect to the API server described by `config`.
pub async fn connect(config: &KubeConfig) -> Result<Client, WatchError> {
    let mut client_config = match &config.kubeconfig_path {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .map_err(|e| WatchError::Client(format!("reading {}: {}", path, e)))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| WatchError::Client(e.to_string()))?
        }
        None => Config::infer()
            .await
            .map_err(|e| WatchError::Client(e.to_string()))?,
    };

    if let Some(master) = &config.master {
        client_config.cluster_url = master
            .parse()
            .map_err(|e| WatchError::Client(format!("invalid master url {}: {}", master, e)))?;
    }

    tracing::info!(cluster_url = %client_config.cluster_url, "Kubernetes client configured");
    Ok(Client::try_from(client_config)?)
}

/// Local cache of converted Ingress objects.
#[derive(Debug, Default)]
pub struct IngressCache {
    objects: DashMap<ResourceKey, RuleObject>,
    synced: AtomicBool,
}

impl IngressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one watch event to the cache and return the resulting events.
    pub fn apply(&self, event: WatchEvent<Ingress>) -> Vec<Event> {
        match event {
            WatchEvent::Applied(ingress) => vec![self.upsert(RuleObject::from(&ingress))],
            WatchEvent::Deleted(ingress) => {
                let obj = RuleObject::from(&ingress);
                self.objects.remove(&obj.key());
                vec![Event::deleted(obj)]
            }
            WatchEvent::Restarted(list) => {
                let mut events = Vec::with_capacity(list.len());
                let mut listed = HashSet::with_capacity(list.len());
                for ingress in &list {
                    let obj = RuleObject::from(ingress);
                    listed.insert(obj.key());
                    events.push(self.upsert(obj));
                }

                // Deleted while the watch was down.
                let gone: Vec<ResourceKey> = self
                    .objects
                    .iter()
                    .filter(|entry| !listed.contains(entry.key()))
                    .map(|entry| entry.key().clone())
                    .collect();
                for key in gone {
                    if let Some((key, snapshot)) = self.objects.remove(&key) {
                        events.push(Event::Delete(key, snapshot));
                    }
                }

                if !self.synced.swap(true, Ordering::SeqCst) {
                    tracing::info!(objects = list.len(), "Ingress cache synced");
                } else {
                    tracing::debug!(objects = list.len(), "Ingress watch relisted");
                }
                events
            }
        }
    }

    fn upsert(&self, obj: RuleObject) -> Event {
        let key = obj.key();
        match self.objects.insert(key.clone(), obj) {
            Some(_) => Event::Update(key),
            None => Event::Add(key),
        }
    }

    pub fn get(&self, key: &ResourceKey) -> Option<RuleObject> {
        self.objects.get(key).map(|entry| entry.value().clone())
    }

    pub fn has_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }
}

/// Watch source backed by the Kubernetes API.
pub struct KubeWatchSource {
    api: Api<Ingress>,
    cache: IngressCache,
}

impl KubeWatchSource {
    /// Watch Ingresses in `namespace`, or in every namespace when `None`.
    pub fn new(client: Client, namespace: Option<&str>) -> Self {
        let api = match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        Self {
            api,
            cache: IngressCache::new(),
        }
    }
}

impl WatchSource for KubeWatchSource {
    fn subscribe(self: Arc<Self>) -> BoxStream<'static, Event> {
        let stream = watcher::watcher(self.api.clone(), watcher::Config::default()).default_backoff();
        tracing::info!("Ingress watcher started");

        stream
            .filter_map(move |result| {
                let events = match result {
                    Ok(event) => Some(stream::iter(self.cache.apply(event))),
                    Err(e) => {
                        tracing::warn!(error = %e, "Ingress watch error");
                        None
                    }
                };
                future::ready(events)
            })
            .flatten()
            .boxed()
    }

    fn get_by_key(&self, key: &ResourceKey) -> Result<Option<RuleObject>, WatchError> {
        Ok(self.cache.get(key))
    }

    fn has_synced(&self) -> bool {
        self.cache.has_synced()
    }
}

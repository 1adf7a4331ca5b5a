//! Service registry lookups.
//!
//! `ConsulRegistry` asks a Consul agent for passing instances of a service;
//! `StaticRegistry` serves endpoints listed in the configuration file.
//! `ResolvedService` pins the first healthy endpoint for the life of the
//! process and only looks again after a connection failure.

use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::ServiceRegistry;
use super::client::check_status;
use crate::error::CollaboratorError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceEndpoint {
    pub address: String,
    pub port: u16,
}

impl ServiceEndpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// `http://address:port` followed by `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.address, self.port, path)
    }
}

impl std::fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Registry backed by a Consul agent's health API.
pub struct ConsulRegistry {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ConsulEntry {
    #[serde(rename = "Node")]
    node: ConsulNode,
    #[serde(rename = "Service")]
    service: ConsulService,
}

#[derive(Debug, Deserialize)]
struct ConsulNode {
    #[serde(rename = "Address", default)]
    address: String,
}

#[derive(Debug, Deserialize)]
struct ConsulService {
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Port")]
    port: u16,
}

/// Services registered without their own address are reachable at the node
/// address.
fn endpoints_from_entries(entries: Vec<ConsulEntry>) -> Vec<ServiceEndpoint> {
    entries
        .into_iter()
        .map(|entry| {
            let address = if entry.service.address.is_empty() {
                entry.node.address
            } else {
                entry.service.address
            };
            ServiceEndpoint::new(address, entry.service.port)
        })
        .collect()
}

impl ConsulRegistry {
    /// `base_url` is the agent's HTTP address, e.g. `http://127.0.0.1:8500`.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ServiceRegistry for ConsulRegistry {
    fn lookup(&self, service: &str) -> Result<Vec<ServiceEndpoint>, CollaboratorError> {
        let url = format!("{}/v1/health/service/{}", self.base_url, service);
        let registry_error = |reason: String| CollaboratorError::Registry {
            service: service.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .query(&[("passing", "true")])
            .send()
            .map_err(|e| registry_error(e.to_string()))?;
        let response = check_status(&url, response).map_err(|e| registry_error(e.to_string()))?;
        let entries: Vec<ConsulEntry> = response.json().map_err(|e| registry_error(format!("unreadable health response: {}", e)))?;

        Ok(endpoints_from_entries(entries))
    }
}

/// Registry serving a fixed endpoint list per service.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    endpoints: HashMap<String, Vec<ServiceEndpoint>>,
}

impl StaticRegistry {
    pub fn new(endpoints: HashMap<String, Vec<ServiceEndpoint>>) -> Self {
        Self { endpoints }
    }
}

impl ServiceRegistry for StaticRegistry {
    fn lookup(&self, service: &str) -> Result<Vec<ServiceEndpoint>, CollaboratorError> {
        Ok(self.endpoints.get(service).cloned().unwrap_or_default())
    }
}

/// A service name bound to the first healthy endpoint the registry returned.
pub struct ResolvedService {
    registry: Arc<dyn ServiceRegistry + Send + Sync>,
    name: String,
    cached: Mutex<Option<ServiceEndpoint>>,
}

impl ResolvedService {
    pub fn new(registry: Arc<dyn ServiceRegistry + Send + Sync>, name: impl Into<String>) -> Self {
        Self {
            registry,
            name: name.into(),
            cached: Mutex::new(None),
        }
    }

    /// Resolve eagerly so the lookup happens once at startup. A failure is
    /// logged and retried on first use.
    pub fn prime(&self) -> Option<ServiceEndpoint> {
        match self.endpoint() {
            Ok(endpoint) => {
                log::info!("Service {} resolved to {}", self.name, endpoint);
                Some(endpoint)
            }
            Err(err) => {
                log::warn!("Service {} not resolved at startup: {}", self.name, err);
                None
            }
        }
    }

    /// Cached endpoint, looking it up if nothing is cached.
    pub fn endpoint(&self) -> Result<ServiceEndpoint, CollaboratorError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(endpoint) = cached.as_ref() {
            return Ok(endpoint.clone());
        }
        let endpoint = self
            .registry
            .lookup(&self.name)?
            .into_iter()
            .next()
            .ok_or_else(|| CollaboratorError::NoEndpoint(self.name.clone()))?;
        *cached = Some(endpoint.clone());
        Ok(endpoint)
    }

    /// Forget the cached endpoint; the next call looks it up again.
    pub fn invalidate(&self) {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(endpoint) = cached.take() {
            log::info!("Dropping cached endpoint {} for {}", endpoint, self.name);
        }
    }

    /// Drop the cached endpoint if `err` means it is unreachable.
    pub(crate) fn observe(&self, err: &CollaboratorError) {
        if err.is_connection_failure() {
            self.invalidate();
        }
    }
}

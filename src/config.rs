//! Configuration loading.
//!
//! One TOML file configures the controller and every worker, so the barrier
//! target and the dispatch fan-out come from the same `worker-count`.
//!
//! ```toml
//! node-count = 100
//! worker-count = 2
//! seed = 7
//!
//! [registry]
//! consul-address = "http://127.0.0.1:8500"
//!
//! [node-defaults]
//! range = 2000.0
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::collaborators::{
    ConsulRegistry, DEFAULT_CHANNEL_SERVICE, DEFAULT_MOBILITY_SERVICE, LinkModels, ServiceEndpoint, ServiceRegistry, StaticRegistry,
};
use crate::simulation::broker::MAX_WORKERS;
use crate::simulation::types::{RadioParams, Velocity};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimConfig {
    pub node_count: usize,
    pub worker_count: usize,
    /// Seed for initial node placement; every process must use the same one.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub node_defaults: NodeDefaults,
    #[serde(default)]
    pub link_models: LinkModels,
}

fn default_seed() -> u64 {
    1
}

fn default_http_timeout_secs() -> u64 {
    30
}

/// Redis server joining a controller process to its worker processes.
/// Unused when everything runs in one process.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BrokerConfig {
    pub redis_url: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/".to_string(),
        }
    }
}

/// Where collaborators are looked up. A non-empty `endpoints` table takes
/// precedence over Consul.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RegistryConfig {
    pub consul_address: String,
    pub endpoints: HashMap<String, Vec<ServiceEndpoint>>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            consul_address: "http://127.0.0.1:8500".to_string(),
            endpoints: HashMap::new(),
        }
    }
}

impl RegistryConfig {
    pub fn build(&self, client: reqwest::blocking::Client) -> Arc<dyn ServiceRegistry + Send + Sync> {
        if self.endpoints.is_empty() {
            log::info!("Using Consul registry at {}", self.consul_address);
            Arc::new(ConsulRegistry::new(client, self.consul_address.clone()))
        } else {
            log::info!("Using static registry with {} services", self.endpoints.len());
            Arc::new(StaticRegistry::new(self.endpoints.clone()))
        }
    }
}

/// Registry names of the collaborator services.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServicesConfig {
    pub mobility: String,
    pub channel: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            mobility: DEFAULT_MOBILITY_SERVICE.to_string(),
            channel: DEFAULT_CHANNEL_SERVICE.to_string(),
        }
    }
}

/// Initial state shared by every generated node.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NodeDefaults {
    /// Radio range (m).
    pub range: f64,
    pub radio: RadioParams,
    pub mobility_model: String,
    pub mobility_params: serde_json::Value,
    pub velocity: Velocity,
    /// Step (s) the mobility model advances per tick.
    pub time_step: f64,
    /// Nodes are placed uniformly in `[0, spawn-box-size)` on each axis.
    pub spawn_box_size: f64,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            range: 2000.0,
            radio: RadioParams::default(),
            mobility_model: "RandomWalk".to_string(),
            mobility_params: serde_json::json!({"MinSpeed": 0.0, "MaxSpeed": 20.0}),
            velocity: Velocity { x: 10.0, y: 10.0, z: 10.0 },
            time_step: 10.0,
            spawn_box_size: 10000.0,
        }
    }
}

impl SimConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(config_path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(config_path).map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        let config: SimConfig = toml::from_str(content).map_err(|e| format!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.node_count == 0 {
            return Err("node-count must be at least 1".to_string());
        }
        if self.node_count > u32::MAX as usize {
            return Err(format!("node-count {} exceeds the node ID space", self.node_count));
        }
        if self.worker_count == 0 || self.worker_count > MAX_WORKERS {
            return Err(format!("worker-count {} must be between 1 and {}", self.worker_count, MAX_WORKERS));
        }
        if !(self.node_defaults.range.is_finite() && self.node_defaults.range > 0.0) {
            return Err(format!("node-defaults.range {} must be positive", self.node_defaults.range));
        }
        if !(self.node_defaults.spawn_box_size.is_finite() && self.node_defaults.spawn_box_size > 0.0) {
            return Err(format!(
                "node-defaults.spawn-box-size {} must be positive",
                self.node_defaults.spawn_box_size
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err("http-timeout-secs must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

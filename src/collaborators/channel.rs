//! HTTP client for the channel (propagation) model service.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::ChannelModel;
use super::client::post_json;
use super::registry::ResolvedService;
use crate::error::CollaboratorError;
use crate::simulation::types::{Position, RadioParams};

pub const CHANNEL_PATH: &str = "/model";

/// Names of the propagation models the channel service should apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkModels {
    #[serde(rename = "largescalemodel", alias = "large-scale")]
    pub large_scale: String,
    #[serde(rename = "smallscalemodel", alias = "small-scale")]
    pub small_scale: String,
}

impl Default for LinkModels {
    fn default() -> Self {
        Self {
            large_scale: "FreeSpacePathLossModel".to_string(),
            small_scale: "NakagamiFadingModel".to_string(),
        }
    }
}

/// Body of one channel model call: transmitter `tx_*`, receiver `rx_*`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkRequest {
    #[serde(rename = "linkid")]
    pub link_id: u64,
    #[serde(rename = "txnode")]
    pub tx_node: RadioParams,
    #[serde(rename = "rxnode")]
    pub rx_node: RadioParams,
    #[serde(rename = "txposition")]
    pub tx_position: Position,
    #[serde(rename = "rxposition")]
    pub rx_position: Position,
    pub model: LinkModels,
}

/// Identifier of the directed link `tx -> rx`, unique among `node_count`
/// nodes.
pub fn link_id(tx: u32, rx: u32, node_count: usize) -> u64 {
    tx as u64 * node_count as u64 + rx as u64
}

pub struct HttpChannelModel {
    client: Client,
    service: ResolvedService,
}

impl HttpChannelModel {
    pub fn new(client: Client, service: ResolvedService) -> Self {
        Self { client, service }
    }
}

impl ChannelModel for HttpChannelModel {
    fn evaluate_link(&self, request: &LinkRequest) -> Result<(), CollaboratorError> {
        let url = self.service.endpoint()?.url(CHANNEL_PATH);
        let response = post_json(&self.client, &url, request).inspect_err(|e| self.service.observe(e))?;
        // Link metrics are delivered downstream; drain the body so the
        // connection can be reused.
        response.bytes().map_err(|e| CollaboratorError::Transport {
            url,
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::test_server::{client, closed_endpoint, counting, respond_once};

    fn request() -> LinkRequest {
        LinkRequest {
            link_id: link_id(1, 2, 4),
            tx_node: RadioParams::default(),
            rx_node: RadioParams::default(),
            tx_position: Position::new(0.0, 0.0, 0.0),
            rx_position: Position::new(1.0, 0.0, 0.0),
            model: LinkModels::default(),
        }
    }

    #[test]
    fn request_uses_service_field_names() {
        let value = serde_json::to_value(request()).unwrap();
        assert_eq!(value["linkid"], 6);
        assert_eq!(value["txnode"]["modulation"], "BPSK");
        assert_eq!(value["rxposition"]["x"], 1.0);
        assert_eq!(value["model"]["largescalemodel"], "FreeSpacePathLossModel");
        assert_eq!(value["model"]["smallscalemodel"], "NakagamiFadingModel");
    }

    #[test]
    fn link_ids_are_unique_per_direction() {
        assert_ne!(link_id(0, 1, 4), link_id(1, 0, 4));
        assert_eq!(link_id(3, 3, 4), 15);
    }

    #[test]
    fn link_models_from_config_keys() {
        let models: LinkModels = toml::from_str("large-scale = \"LogDistance\"\nsmall-scale = \"Rayleigh\"").unwrap();
        assert_eq!(models.large_scale, "LogDistance");
        assert_eq!(models.small_scale, "Rayleigh");
    }

    #[test]
    fn evaluate_link_posts_request() {
        let (endpoint, server) = respond_once("200 OK", r#"{"pathloss": 80.2}"#);
        let channel = HttpChannelModel::new(client(), ResolvedService::new(counting(vec![endpoint]), "chan"));

        channel.evaluate_link(&request()).unwrap();
        let sent: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(sent["linkid"], 6);
        assert_eq!(sent["txposition"]["x"], 0.0);
    }

    #[test]
    fn error_status_is_reported() {
        let (endpoint, server) = respond_once("503 Service Unavailable", "");
        let registry = counting(vec![endpoint]);
        let channel = HttpChannelModel::new(client(), ResolvedService::new(registry.clone(), "chan"));

        let err = channel.evaluate_link(&request()).unwrap_err();
        assert!(matches!(err, CollaboratorError::Status { status: 503, .. }));
        server.join().unwrap();
        assert_eq!(registry.lookups(), 1);
    }

    #[test]
    fn connection_failure_looks_the_service_up_again() {
        let registry = counting(vec![closed_endpoint()]);
        let channel = HttpChannelModel::new(client(), ResolvedService::new(registry.clone(), "chan"));

        assert!(matches!(channel.evaluate_link(&request()), Err(CollaboratorError::Transport { .. })));
        assert!(channel.evaluate_link(&request()).is_err());
        assert_eq!(registry.lookups(), 2);
    }
}

//! HTTP client for the mobility model service.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::MobilityModel;
use super::client::post_json;
use super::registry::ResolvedService;
use crate::error::CollaboratorError;
use crate::simulation::types::MobilityState;

pub const MOBILITY_PATH: &str = "/mobility";

#[derive(Serialize)]
struct MobilityRequest<'a> {
    node: &'a MobilityState,
}

#[derive(Deserialize)]
struct MobilityResponse {
    #[serde(alias = "Node")]
    node: MobilityState,
}

pub struct HttpMobilityModel {
    client: Client,
    service: ResolvedService,
}

impl HttpMobilityModel {
    pub fn new(client: Client, service: ResolvedService) -> Self {
        Self { client, service }
    }
}

impl MobilityModel for HttpMobilityModel {
    fn next_state(&self, state: &MobilityState) -> Result<MobilityState, CollaboratorError> {
        let url = self.service.endpoint()?.url(MOBILITY_PATH);
        let response = post_json(&self.client, &url, &MobilityRequest { node: state }).inspect_err(|e| self.service.observe(e))?;
        let parsed: MobilityResponse = response.json().map_err(|e| CollaboratorError::InvalidResponse {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        Ok(parsed.node)
    }
}

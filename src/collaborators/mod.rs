//! Clients for the external services a tick depends on.
//!
//! The tick pipeline only sees the traits below. The HTTP implementations
//! locate their service through a [`ServiceRegistry`] and talk JSON over a
//! blocking `reqwest` client.

pub mod channel;
pub mod client;
pub mod mobility;
pub mod registry;

#[cfg(test)]
mod test_server;

pub use channel::{HttpChannelModel, LinkModels, LinkRequest};
pub use client::build_http_client;
pub use mobility::HttpMobilityModel;
pub use registry::{ConsulRegistry, ResolvedService, ServiceEndpoint, StaticRegistry};

use crate::error::CollaboratorError;
use crate::simulation::types::MobilityState;

/// Service name the mobility model registers under.
pub const DEFAULT_MOBILITY_SERVICE: &str = "Default_MobilityModel";
/// Service name the channel model registers under.
pub const DEFAULT_CHANNEL_SERVICE: &str = "Default_ChannelModel";

/// Looks up network endpoints by service name.
pub trait ServiceRegistry {
    /// Healthy endpoints for `service`, best first.
    fn lookup(&self, service: &str) -> Result<Vec<ServiceEndpoint>, CollaboratorError>;
}

/// Advances a node's kinematic state by one step.
pub trait MobilityModel {
    fn next_state(&self, state: &MobilityState) -> Result<MobilityState, CollaboratorError>;
}

/// Computes physical-layer metrics for one directed link. The result is
/// consumed downstream, not by the tick pipeline.
pub trait ChannelModel {
    fn evaluate_link(&self, request: &LinkRequest) -> Result<(), CollaboratorError>;
}

//! Fleet Gateway Port (Driven Port)
//!
//! Stateless request/response access to the fleet manager. Every call is
//! one HTTP round trip; nothing is cached or retried behind this trait.

use async_trait::async_trait;

use crate::domain::fleet::{
    ContainerInfo, ContainerStats, CreateNetworkRequest, CreateVolumeRequest, HealthResponse,
    ImageInfo, NetworkInfo, StackInfo, StatusResponse, SystemStats, VolumeInfo,
};

/// Gateway error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The server answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The response body did not have the expected shape.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// HTTP status code, for errors the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Log lines requested when the caller does not choose a tail.
pub const DEFAULT_LOG_TAIL: &str = "100";

/// Port for the fleet manager's REST API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FleetGateway: Send + Sync {
    // -- System ---------------------------------------------------------------

    /// `GET /stats`.
    async fn system_stats(&self) -> Result<SystemStats, GatewayError>;

    /// `GET /health` (served outside the API prefix).
    async fn health(&self) -> Result<HealthResponse, GatewayError>;

    // -- Stacks ---------------------------------------------------------------

    /// `GET /stacks`.
    async fn list_stacks(&self) -> Result<Vec<StackInfo>, GatewayError>;

    /// `GET /stacks/{name}`.
    async fn get_stack(&self, name: &str) -> Result<StackInfo, GatewayError>;

    /// `POST /stacks/{name}/start`.
    async fn start_stack(&self, name: &str) -> Result<StatusResponse, GatewayError>;

    /// `POST /stacks/{name}/stop`.
    async fn stop_stack(&self, name: &str) -> Result<StatusResponse, GatewayError>;

    /// `POST /stacks/{name}/restart`.
    async fn restart_stack(&self, name: &str) -> Result<StatusResponse, GatewayError>;

    /// `POST /stacks/{name}/pull`.
    async fn pull_stack(&self, name: &str) -> Result<StatusResponse, GatewayError>;

    /// `GET /stacks/{name}/compose`, returning the file content.
    async fn compose_file(&self, name: &str) -> Result<String, GatewayError>;

    /// `PUT /stacks/{name}/compose`.
    async fn update_compose_file(
        &self,
        name: &str,
        content: &str,
    ) -> Result<StatusResponse, GatewayError>;

    // -- Containers -----------------------------------------------------------

    /// `GET /containers?all={all}`.
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerInfo>, GatewayError>;

    /// `GET /containers/{id}`.
    async fn get_container(&self, id: &str) -> Result<ContainerInfo, GatewayError>;

    /// `POST /containers/{id}/start`.
    async fn start_container(&self, id: &str) -> Result<StatusResponse, GatewayError>;

    /// `POST /containers/{id}/stop`.
    async fn stop_container(&self, id: &str) -> Result<StatusResponse, GatewayError>;

    /// `POST /containers/{id}/restart`.
    async fn restart_container(&self, id: &str) -> Result<StatusResponse, GatewayError>;

    /// `GET /containers/{id}/logs?tail={tail}`, returning the log text.
    async fn container_logs(&self, id: &str, tail: &str) -> Result<String, GatewayError>;

    /// The last [`DEFAULT_LOG_TAIL`] log lines of a container.
    async fn recent_logs(&self, id: &str) -> Result<String, GatewayError> {
        self.container_logs(id, DEFAULT_LOG_TAIL).await
    }

    /// `GET /containers/{id}/stats`.
    async fn container_stats(&self, id: &str) -> Result<ContainerStats, GatewayError>;

    // -- Volumes --------------------------------------------------------------

    /// `GET /volumes`.
    async fn list_volumes(&self) -> Result<Vec<VolumeInfo>, GatewayError>;

    /// `POST /volumes`.
    async fn create_volume(
        &self,
        request: &CreateVolumeRequest,
    ) -> Result<VolumeInfo, GatewayError>;

    /// `DELETE /volumes/{name}?force={force}`.
    async fn delete_volume(&self, name: &str, force: bool)
    -> Result<StatusResponse, GatewayError>;

    // -- Networks -------------------------------------------------------------

    /// `GET /networks`.
    async fn list_networks(&self) -> Result<Vec<NetworkInfo>, GatewayError>;

    /// `POST /networks`.
    async fn create_network(
        &self,
        request: &CreateNetworkRequest,
    ) -> Result<NetworkInfo, GatewayError>;

    /// `DELETE /networks/{id}`.
    async fn delete_network(&self, id: &str) -> Result<StatusResponse, GatewayError>;

    // -- Images ---------------------------------------------------------------

    /// `GET /images`.
    async fn list_images(&self) -> Result<Vec<ImageInfo>, GatewayError>;
}

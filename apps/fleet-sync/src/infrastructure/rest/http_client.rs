//! HTTP implementation of the fleet gateway.
//!
//! One request per call, no retries. Path segments are percent-encoded.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::api_types::{ComposeUpdate, error_message};
use crate::application::ports::{FleetGateway, GatewayError};
use crate::domain::fleet::{
    ComposeFile, ContainerInfo, ContainerLogs, ContainerStats, CreateNetworkRequest,
    CreateVolumeRequest, HealthResponse, ImageInfo, NetworkInfo, StackInfo, StatusResponse,
    SystemStats, VolumeInfo,
};
use crate::infrastructure::config::RestSettings;
use crate::infrastructure::metrics;

/// `FleetGateway` over the fleet manager's JSON API.
#[derive(Debug, Clone)]
pub struct HttpFleetGateway {
    client: Client,
    base_url: Url,
    health_url: Url,
}

impl HttpFleetGateway {
    /// Create a gateway from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL is invalid or the HTTP client cannot be built.
    pub fn new(settings: &RestSettings) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Self::with_client(client, &settings.base_url, &settings.health_url)
    }

    /// Create a gateway around an existing client.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL is invalid.
    pub fn with_client(
        client: Client,
        base_url: &str,
        health_url: &str,
    ) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::InvalidRequest(format!("base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidRequest(format!(
                "base URL {base_url} cannot carry paths"
            )));
        }
        let health_url = Url::parse(health_url)
            .map_err(|e| GatewayError::InvalidRequest(format!("health URL {health_url}: {e}")))?;

        Ok(Self {
            client,
            base_url,
            health_url,
        })
    }

    /// REST base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `base_url` followed by `segments`, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::InvalidRequest("base URL cannot carry paths".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn url_with_query(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Url, GatewayError> {
        let mut url = self.url(segments)?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> Result<T, GatewayError> {
        self.request(operation, Method::GET, url, None::<&()>).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> Result<T, GatewayError> {
        self.request(operation, Method::POST, url, None::<&()>).await
    }

    #[allow(clippy::future_not_send)]
    async fn send_json<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.request(operation, method, url, Some(body)).await
    }

    #[allow(clippy::future_not_send)]
    async fn request<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<T, GatewayError> {
        let started = Instant::now();
        let result = self.execute(&method, url, body).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(GatewayError::Api { .. }) => "api_error",
            Err(GatewayError::Decode(_)) => "decode_error",
            Err(_) => "network_error",
        };
        metrics::record_rest_request(operation, outcome, started.elapsed());

        if let Err(e) = &result {
            tracing::debug!(operation, method = %method, error = %e, "Fleet API request failed");
        }
        result
    }

    async fn execute<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: &Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<T, GatewayError> {
        let mut request = self.client.request(method.clone(), url);
        if let Some(b) = body {
            request = request.json(b);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        if text.trim().is_empty() {
            return decode_empty();
        }
        serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl FleetGateway for HttpFleetGateway {
    async fn system_stats(&self) -> Result<SystemStats, GatewayError> {
        self.get("system_stats", self.url(&["stats"])?).await
    }

    async fn health(&self) -> Result<HealthResponse, GatewayError> {
        self.get("health", self.health_url.clone()).await
    }

    async fn list_stacks(&self) -> Result<Vec<StackInfo>, GatewayError> {
        self.get("list_stacks", self.url(&["stacks"])?).await
    }

    async fn get_stack(&self, name: &str) -> Result<StackInfo, GatewayError> {
        self.get("get_stack", self.url(&["stacks", name])?).await
    }

    async fn start_stack(&self, name: &str) -> Result<StatusResponse, GatewayError> {
        self.post("start_stack", self.url(&["stacks", name, "start"])?)
            .await
    }

    async fn stop_stack(&self, name: &str) -> Result<StatusResponse, GatewayError> {
        self.post("stop_stack", self.url(&["stacks", name, "stop"])?)
            .await
    }

    async fn restart_stack(&self, name: &str) -> Result<StatusResponse, GatewayError> {
        self.post("restart_stack", self.url(&["stacks", name, "restart"])?)
            .await
    }

    async fn pull_stack(&self, name: &str) -> Result<StatusResponse, GatewayError> {
        self.post("pull_stack", self.url(&["stacks", name, "pull"])?)
            .await
    }

    async fn compose_file(&self, name: &str) -> Result<String, GatewayError> {
        let file: ComposeFile = self
            .get("compose_file", self.url(&["stacks", name, "compose"])?)
            .await?;
        Ok(file.content)
    }

    async fn update_compose_file(
        &self,
        name: &str,
        content: &str,
    ) -> Result<StatusResponse, GatewayError> {
        self.send_json(
            "update_compose_file",
            Method::PUT,
            self.url(&["stacks", name, "compose"])?,
            &ComposeUpdate { content },
        )
        .await
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerInfo>, GatewayError> {
        let all = if all { "true" } else { "false" };
        self.get(
            "list_containers",
            self.url_with_query(&["containers"], &[("all", all)])?,
        )
        .await
    }

    async fn get_container(&self, id: &str) -> Result<ContainerInfo, GatewayError> {
        self.get("get_container", self.url(&["containers", id])?)
            .await
    }

    async fn start_container(&self, id: &str) -> Result<StatusResponse, GatewayError> {
        self.post("start_container", self.url(&["containers", id, "start"])?)
            .await
    }

    async fn stop_container(&self, id: &str) -> Result<StatusResponse, GatewayError> {
        self.post("stop_container", self.url(&["containers", id, "stop"])?)
            .await
    }

    async fn restart_container(&self, id: &str) -> Result<StatusResponse, GatewayError> {
        self.post(
            "restart_container",
            self.url(&["containers", id, "restart"])?,
        )
        .await
    }

    async fn container_logs(&self, id: &str, tail: &str) -> Result<String, GatewayError> {
        let logs: ContainerLogs = self
            .get(
                "container_logs",
                self.url_with_query(&["containers", id, "logs"], &[("tail", tail)])?,
            )
            .await?;
        Ok(logs.logs)
    }

    async fn container_stats(&self, id: &str) -> Result<ContainerStats, GatewayError> {
        self.get("container_stats", self.url(&["containers", id, "stats"])?)
            .await
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeInfo>, GatewayError> {
        self.get("list_volumes", self.url(&["volumes"])?).await
    }

    async fn create_volume(
        &self,
        request: &CreateVolumeRequest,
    ) -> Result<VolumeInfo, GatewayError> {
        self.send_json("create_volume", Method::POST, self.url(&["volumes"])?, request)
            .await
    }

    async fn delete_volume(
        &self,
        name: &str,
        force: bool,
    ) -> Result<StatusResponse, GatewayError> {
        let force = if force { "true" } else { "false" };
        self.request(
            "delete_volume",
            Method::DELETE,
            self.url_with_query(&["volumes", name], &[("force", force)])?,
            None::<&()>,
        )
        .await
    }

    async fn list_networks(&self) -> Result<Vec<NetworkInfo>, GatewayError> {
        self.get("list_networks", self.url(&["networks"])?).await
    }

    async fn create_network(
        &self,
        request: &CreateNetworkRequest,
    ) -> Result<NetworkInfo, GatewayError> {
        self.send_json(
            "create_network",
            Method::POST,
            self.url(&["networks"])?,
            request,
        )
        .await
    }

    async fn delete_network(&self, id: &str) -> Result<StatusResponse, GatewayError> {
        self.request(
            "delete_network",
            Method::DELETE,
            self.url(&["networks", id])?,
            None::<&()>,
        )
        .await
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>, GatewayError> {
        self.get("list_images", self.url(&["images"])?).await
    }
}

/// An empty success body reads as `null`, or as `{}` for object responses.
fn decode_empty<T: DeserializeOwned>() -> Result<T, GatewayError> {
    T::deserialize(Value::Null)
        .or_else(|_| T::deserialize(Value::Object(serde_json::Map::new())))
        .map_err(|e| GatewayError::Decode(e.to_string()))
}

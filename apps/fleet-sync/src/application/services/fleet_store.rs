//! Fleet Store
//!
//! Holds the five inventory collections (containers, stacks, volumes,
//! networks, images) fetched over REST, and the per-container metrics map
//! pushed over the stream.
//!
//! # Consistency rules
//!
//! - Collections only change after a successful remote read. Nothing is
//!   updated optimistically.
//! - A mutation performs exactly one gateway call. On success it re-fetches
//!   a fixed set of collections (see [`Mutation::refetches`]); on failure it
//!   records the error and returns it, without re-fetching.
//! - The metrics map is replaced wholesale by each stream update, so a
//!   container that stops reporting disappears from it.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::application::observable::Observable;
use crate::application::ports::{FleetGateway, GatewayError};
use crate::domain::fleet::{
    self, ContainerInfo, ContainerStats, ContainerStatsPayload, CreateNetworkRequest,
    CreateVolumeRequest, ImageInfo, NetworkInfo, StackInfo, VolumeInfo,
};
use crate::domain::streaming::CONTAINER_STATS;
use crate::domain::subscription::{MessageRouter, Subscription};

// =============================================================================
// Types
// =============================================================================

/// One of the REST-sourced collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Containers.
    Containers,
    /// Stacks.
    Stacks,
    /// Volumes.
    Volumes,
    /// Networks.
    Networks,
    /// Images.
    Images,
}

impl Collection {
    /// Collection name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Containers => "containers",
            Self::Stacks => "stacks",
            Self::Volumes => "volumes",
            Self::Networks => "networks",
            Self::Images => "images",
        }
    }

    /// Whether a failed read is surfaced to the caller and recorded as the
    /// store error. Failed reads of the other collections are only logged.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::Containers | Self::Stacks)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state-changing fleet operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    /// Start every service of a stack.
    StartStack,
    /// Stop every service of a stack.
    StopStack,
    /// Restart every service of a stack.
    RestartStack,
    /// Pull the images of a stack.
    PullStack,
    /// Start a container.
    StartContainer,
    /// Stop a container.
    StopContainer,
    /// Restart a container.
    RestartContainer,
    /// Create a volume.
    CreateVolume,
    /// Delete a volume.
    DeleteVolume,
    /// Create a network.
    CreateNetwork,
    /// Delete a network.
    DeleteNetwork,
}

impl Mutation {
    /// Collections re-fetched, in order, after the operation succeeds.
    #[must_use]
    pub const fn refetches(self) -> &'static [Collection] {
        match self {
            Self::StartStack | Self::StopStack | Self::RestartStack => {
                &[Collection::Stacks, Collection::Containers]
            }
            Self::PullStack => &[],
            Self::StartContainer | Self::StopContainer => {
                &[Collection::Containers, Collection::Stacks]
            }
            Self::RestartContainer => &[Collection::Containers],
            Self::CreateVolume | Self::DeleteVolume => &[Collection::Volumes],
            Self::CreateNetwork | Self::DeleteNetwork => &[Collection::Networks],
        }
    }

    /// Operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartStack => "start stack",
            Self::StopStack => "stop stack",
            Self::RestartStack => "restart stack",
            Self::PullStack => "pull stack",
            Self::StartContainer => "start container",
            Self::StopContainer => "stop container",
            Self::RestartContainer => "restart container",
            Self::CreateVolume => "create volume",
            Self::DeleteVolume => "delete volume",
            Self::CreateNetwork => "create network",
            Self::DeleteNetwork => "delete network",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store error, mirrored into [`FleetState::error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Reading a collection failed.
    #[error("failed to fetch {collection}: {source}")]
    Fetch {
        /// Collection being read.
        collection: Collection,
        /// Gateway failure.
        #[source]
        source: GatewayError,
    },

    /// A mutation was rejected or never reached the server.
    #[error("failed to {mutation}: {source}")]
    Mutation {
        /// Operation attempted.
        mutation: Mutation,
        /// Gateway failure.
        #[source]
        source: GatewayError,
    },
}

impl StoreError {
    /// Underlying gateway failure.
    #[must_use]
    pub const fn gateway_error(&self) -> &GatewayError {
        match self {
            Self::Fetch { source, .. } | Self::Mutation { source, .. } => source,
        }
    }
}

/// Snapshot of everything the fleet store holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetState {
    /// Containers, in server order.
    pub containers: Vec<ContainerInfo>,
    /// Stacks, in server order.
    pub stacks: Vec<StackInfo>,
    /// Volumes, in server order.
    pub volumes: Vec<VolumeInfo>,
    /// Networks, in server order.
    pub networks: Vec<NetworkInfo>,
    /// Images, in server order.
    pub images: Vec<ImageInfo>,
    /// Latest per-container metrics, keyed by container id.
    pub container_stats: HashMap<String, ContainerStats>,
    /// When the metrics map was last replaced.
    pub stats_updated_at: Option<DateTime<Utc>>,
    /// A fetch is in flight.
    pub loading: bool,
    /// Last recorded error.
    pub error: Option<String>,
}

// =============================================================================
// Store
// =============================================================================

/// Fleet inventory store.
pub struct FleetStore {
    gateway: Arc<dyn FleetGateway>,
    router: MessageRouter,
    state: Observable<FleetState>,
    stats_subscription: Mutex<Option<Subscription>>,
    include_stopped: bool,
}

impl fmt::Debug for FleetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FleetStore")
            .field("router", &self.router)
            .field("include_stopped", &self.include_stopped)
            .field("subscribed", &self.stats_subscription.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl FleetStore {
    /// Create a store reading through `gateway` and listening on `router`.
    #[must_use]
    pub fn new(gateway: Arc<dyn FleetGateway>, router: MessageRouter) -> Self {
        Self {
            gateway,
            router,
            state: Observable::default(),
            stats_subscription: Mutex::new(None),
            include_stopped: true,
        }
    }

    /// List only running containers instead of all of them.
    #[must_use]
    pub const fn running_containers_only(mut self) -> Self {
        self.include_stopped = false;
        self
    }

    /// The gateway this store reads through.
    #[must_use]
    pub fn gateway(&self) -> Arc<dyn FleetGateway> {
        Arc::clone(&self.gateway)
    }

    // -- State access ---------------------------------------------------------

    /// Clone of the full state.
    #[must_use]
    pub fn state(&self) -> FleetState {
        self.state.get()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FleetState> {
        self.state.subscribe()
    }

    /// Current containers.
    #[must_use]
    pub fn containers(&self) -> Vec<ContainerInfo> {
        self.state.with(|s| s.containers.clone())
    }

    /// Current stacks.
    #[must_use]
    pub fn stacks(&self) -> Vec<StackInfo> {
        self.state.with(|s| s.stacks.clone())
    }

    /// Current volumes.
    #[must_use]
    pub fn volumes(&self) -> Vec<VolumeInfo> {
        self.state.with(|s| s.volumes.clone())
    }

    /// Current networks.
    #[must_use]
    pub fn networks(&self) -> Vec<NetworkInfo> {
        self.state.with(|s| s.networks.clone())
    }

    /// Current images.
    #[must_use]
    pub fn images(&self) -> Vec<ImageInfo> {
        self.state.with(|s| s.images.clone())
    }

    /// Whether a fetch is in flight.
    #[must_use]
    pub fn loading(&self) -> bool {
        self.state.with(|s| s.loading)
    }

    /// Last recorded error.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.with(|s| s.error.clone())
    }

    /// Latest metrics map.
    #[must_use]
    pub fn container_stats_map(&self) -> HashMap<String, ContainerStats> {
        self.state.with(|s| s.container_stats.clone())
    }

    /// Latest metrics of one container.
    #[must_use]
    pub fn container_stats(&self, container_id: &str) -> Option<ContainerStats> {
        self.state.with(|s| s.container_stats.get(container_id).cloned())
    }

    /// Containers belonging to `stack_name`, computed from labels on each call.
    #[must_use]
    pub fn stack_containers(&self, stack_name: &str) -> Vec<ContainerInfo> {
        self.state
            .with(|s| fleet::stack_containers(&s.containers, stack_name))
    }

    // -- Fetching -------------------------------------------------------------

    /// Read all five collections concurrently.
    ///
    /// `loading` is set before the requests go out and cleared once every
    /// one has settled. Failures reading containers or stacks are recorded
    /// and returned (containers first when both fail); failures for the
    /// other collections are logged and keep the previous value.
    ///
    /// # Errors
    ///
    /// Returns the containers or stacks read failure.
    pub async fn fetch_all(&self) -> Result<(), StoreError> {
        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let gateway = &self.gateway;
        let (containers, stacks, volumes, networks, images) = tokio::join!(
            gateway.list_containers(self.include_stopped),
            gateway.list_stacks(),
            gateway.list_volumes(),
            gateway.list_networks(),
            gateway.list_images(),
        );

        let mut failure = None;
        let containers = settle(Collection::Containers, containers, &mut failure);
        let stacks = settle(Collection::Stacks, stacks, &mut failure);
        let volumes = settle(Collection::Volumes, volumes, &mut failure);
        let networks = settle(Collection::Networks, networks, &mut failure);
        let images = settle(Collection::Images, images, &mut failure);

        let error = failure.as_ref().map(ToString::to_string);
        self.state.update(|s| {
            if let Some(v) = containers {
                s.containers = v;
            }
            if let Some(v) = stacks {
                s.stacks = v;
            }
            if let Some(v) = volumes {
                s.volumes = v;
            }
            if let Some(v) = networks {
                s.networks = v;
            }
            if let Some(v) = images {
                s.images = v;
            }
            s.error = error;
            s.loading = false;
        });

        failure.map_or(Ok(()), Err)
    }

    /// Read containers.
    ///
    /// # Errors
    ///
    /// Returns the read failure, which is also recorded as the store error.
    pub async fn fetch_containers(&self) -> Result<(), StoreError> {
        self.begin_critical_fetch();
        let result = self.gateway.list_containers(self.include_stopped).await;
        self.finish_critical_fetch(Collection::Containers, result, |s, v| s.containers = v)
    }

    /// Read stacks.
    ///
    /// # Errors
    ///
    /// Returns the read failure, which is also recorded as the store error.
    pub async fn fetch_stacks(&self) -> Result<(), StoreError> {
        self.begin_critical_fetch();
        let result = self.gateway.list_stacks().await;
        self.finish_critical_fetch(Collection::Stacks, result, |s, v| s.stacks = v)
    }

    /// Read volumes. Failures are logged and keep the previous value.
    pub async fn fetch_volumes(&self) {
        if let Some(v) = settle(Collection::Volumes, self.gateway.list_volumes().await, &mut None) {
            self.state.update(|s| s.volumes = v);
        }
    }

    /// Read networks. Failures are logged and keep the previous value.
    pub async fn fetch_networks(&self) {
        if let Some(v) = settle(Collection::Networks, self.gateway.list_networks().await, &mut None)
        {
            self.state.update(|s| s.networks = v);
        }
    }

    /// Read images. Failures are logged and keep the previous value.
    pub async fn fetch_images(&self) {
        if let Some(v) = settle(Collection::Images, self.gateway.list_images().await, &mut None) {
            self.state.update(|s| s.images = v);
        }
    }

    fn begin_critical_fetch(&self) {
        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn finish_critical_fetch<T>(
        &self,
        collection: Collection,
        result: Result<T, GatewayError>,
        apply: impl FnOnce(&mut FleetState, T),
    ) -> Result<(), StoreError> {
        let mut failure = None;
        let value = settle(collection, result, &mut failure);
        let error = failure.as_ref().map(ToString::to_string);

        self.state.update(|s| {
            if let Some(v) = value {
                apply(s, v);
            }
            if error.is_some() {
                s.error = error;
            }
            s.loading = false;
        });

        failure.map_or(Ok(()), Err)
    }

    async fn refetch(&self, collections: &[Collection]) {
        for collection in collections {
            // Critical read failures are already recorded on the store.
            match collection {
                Collection::Containers => {
                    let _ = self.fetch_containers().await;
                }
                Collection::Stacks => {
                    let _ = self.fetch_stacks().await;
                }
                Collection::Volumes => self.fetch_volumes().await,
                Collection::Networks => self.fetch_networks().await,
                Collection::Images => self.fetch_images().await,
            }
        }
    }

    // -- Mutations ------------------------------------------------------------

    async fn mutate<T, F>(&self, mutation: Mutation, resource: &str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        match call.await {
            Ok(value) => {
                tracing::info!(operation = %mutation, resource, "Fleet operation succeeded");
                self.refetch(mutation.refetches()).await;
                Ok(value)
            }
            Err(source) => {
                let err = StoreError::Mutation { mutation, source };
                tracing::warn!(operation = %mutation, resource, error = %err, "Fleet operation failed");
                let message = err.to_string();
                self.state.update(|s| s.error = Some(message));
                Err(err)
            }
        }
    }

    /// Start every service of a stack.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure, also recorded as the store error.
    pub async fn start_stack(&self, name: &str) -> Result<(), StoreError> {
        self.mutate(Mutation::StartStack, name, self.gateway.start_stack(name))
            .await
            .map(drop)
    }

    /// Stop every service of a stack.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure, also recorded as the store error.
    pub async fn stop_stack(&self, name: &str) -> Result<(), StoreError> {
        self.mutate(Mutation::StopStack, name, self.gateway.stop_stack(name))
            .await
            .map(drop)
    }

    /// Restart every service of a stack.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure, also recorded as the store error.
    pub async fn restart_stack(&self, name: &str) -> Result<(), StoreError> {
        self.mutate(Mutation::RestartStack, name, self.gateway.restart_stack(name))
            .await
            .map(drop)
    }

    /// Pull the images of a stack.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure, also recorded as the store error.
    pub async fn pull_stack(&self, name: &str) -> Result<(), StoreError> {
        self.mutate(Mutation::PullStack, name, self.gateway.pull_stack(name))
            .await
            .map(drop)
    }

    /// Start a container.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure, also recorded as the store error.
    pub async fn start_container(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(Mutation::StartContainer, id, self.gateway.start_container(id))
            .await
            .map(drop)
    }

    /// Stop a container.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure, also recorded as the store error.
    pub async fn stop_container(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(Mutation::StopContainer, id, self.gateway.stop_container(id))
            .await
            .map(drop)
    }

    /// Restart a container.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure, also recorded as the store error.
    pub async fn restart_container(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(
            Mutation::RestartContainer,
            id,
            self.gateway.restart_container(id),
        )
        .await
        .map(drop)
    }

    /// Create a volume.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure, also recorded as the store error.
    pub async fn create_volume(
        &self,
        request: &CreateVolumeRequest,
    ) -> Result<VolumeInfo, StoreError> {
        self.mutate(
            Mutation::CreateVolume,
            &request.name,
            self.gateway.create_volume(request),
        )
        .await
    }

    /// Delete a volume.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure, also recorded as the store error.
    pub async fn delete_volume(&self, name: &str, force: bool) -> Result<(), StoreError> {
        self.mutate(
            Mutation::DeleteVolume,
            name,
            self.gateway.delete_volume(name, force),
        )
        .await
        .map(drop)
    }

    /// Create a network.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure, also recorded as the store error.
    pub async fn create_network(
        &self,
        request: &CreateNetworkRequest,
    ) -> Result<NetworkInfo, StoreError> {
        self.mutate(
            Mutation::CreateNetwork,
            &request.name,
            self.gateway.create_network(request),
        )
        .await
    }

    /// Delete a network.
    ///
    /// # Errors
    ///
    /// Returns the gateway failure, also recorded as the store error.
    pub async fn delete_network(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(Mutation::DeleteNetwork, id, self.gateway.delete_network(id))
            .await
            .map(drop)
    }

    // -- Stream ---------------------------------------------------------------

    /// Start replacing the metrics map from `container_stats` messages.
    ///
    /// Calling this while already subscribed does nothing.
    pub fn subscribe_to_container_stats(&self) {
        let mut slot = self.stats_subscription.lock();
        if slot.is_some() {
            return;
        }

        let state = self.state.clone();
        let subscription =
            self.router
                .on_payload(CONTAINER_STATS, move |payload: ContainerStatsPayload| {
                    let received_at = Utc::now();
                    state.update(|s| {
                        s.container_stats = payload.containers;
                        s.stats_updated_at = Some(received_at);
                    });
                    Ok(())
                });

        *slot = Some(subscription);
    }

    /// Stop listening for `container_stats` messages. The last map is kept.
    pub fn unsubscribe_from_container_stats(&self) {
        if let Some(subscription) = self.stats_subscription.lock().take() {
            subscription.unsubscribe();
        }
    }

    /// Whether the store is listening for metrics messages.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.stats_subscription.lock().is_some()
    }
}

/// Resolve one read: keep the value, or log the failure and, for critical
/// collections, remember the first one.
fn settle<T>(
    collection: Collection,
    result: Result<T, GatewayError>,
    failure: &mut Option<StoreError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(source) => {
            tracing::error!(collection = %collection, error = %source, "Failed to fetch collection");
            if collection.is_critical() && failure.is_none() {
                *failure = Some(StoreError::Fetch { collection, source });
            }
            None
        }
    }
}

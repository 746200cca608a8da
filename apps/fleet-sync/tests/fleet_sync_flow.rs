//! End-to-End Synchronization Tests
//!
//! Wires `SyncContainer` to a mock REST API and a local stream server and
//! checks that snapshots, pushed metrics and mutations land in the stores.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleet_sync::{
    Collection, CreateNetworkRequest, CreateVolumeRequest, StoreError, SyncConfig, SyncContainer,
};
use support::{StreamServer, eventually};

const WAIT: Duration = Duration::from_secs(5);

fn config(api: &MockServer, stream: &StreamServer) -> SyncConfig {
    let origin = api.uri();
    let stream_url = stream.url();
    SyncConfig::from_lookup(|key| match key {
        "FLEET_ORIGIN" => Some(origin.clone()),
        "FLEET_STREAM_URL" => Some(stream_url.clone()),
        "FLEET_RECONNECT_DELAY_INITIAL_MS" => Some("50".to_string()),
        "FLEET_HTTP_TIMEOUT_SECS" => Some("5".to_string()),
        _ => None,
    })
    .unwrap()
}

async fn mount_list(api: &MockServer, route: &str, body: serde_json::Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(api)
        .await;
}

fn containers() -> serde_json::Value {
    json!([
        {"id": "abc", "name": "web-1", "state": "running",
         "labels": {"com.docker.compose.project": "web"}},
        {"id": "def", "name": "worker-1", "state": "exited", "labels": {}}
    ])
}

#[tokio::test]
async fn loads_snapshot_and_applies_pushed_metrics() {
    let api = MockServer::start().await;
    let stream = StreamServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/containers"))
        .and(query_param("all", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(containers()))
        .expect(1)
        .mount(&api)
        .await;
    mount_list(&api, "/api/stacks", json!([{"name": "web", "status": "running"}]), 1).await;
    mount_list(&api, "/api/volumes", json!([{"name": "data"}]), 1).await;
    mount_list(&api, "/api/networks", json!([]), 1).await;
    mount_list(&api, "/api/images", json!([{"id": "sha256:1", "tags": ["nginx:latest"]}]), 1).await;

    let container = SyncContainer::new(config(&api, &stream)).unwrap();
    container.start_and_load().await.unwrap();

    let fleet = container.fleet();
    assert_eq!(fleet.containers().len(), 2);
    assert_eq!(fleet.stacks().len(), 1);
    assert_eq!(fleet.volumes().len(), 1);
    assert_eq!(fleet.images().len(), 1);
    assert!(!fleet.loading());
    assert!(fleet.error().is_none());
    assert_eq!(fleet.stack_containers("web").len(), 1);

    let system = container.system();
    assert!(eventually(WAIT, || system.is_connected()).await);

    stream.send(
        json!({"type": "container_stats", "payload": {
            "containers": {"abc": {"cpuPercent": 12.5, "memoryUsage": 2048}},
            "timestamp": 1_700_000_000
        }})
        .to_string(),
    );
    stream.send(
        json!({"type": "stats", "payload": {"cpuUsage": 33.0, "hostname": "node-1"}}).to_string(),
    );

    assert!(eventually(WAIT, || fleet.container_stats("abc").is_some()).await);
    assert!(eventually(WAIT, || system.stats().hostname == "node-1").await);
    assert!(fleet.state().stats_updated_at.is_some());
    assert_eq!(fleet.container_stats("abc").unwrap().memory_usage, 2048);

    stream.send(
        json!({"type": "container_stats", "payload": {
            "containers": {"def": {"cpuPercent": 1.0}}, "timestamp": 1_700_000_005
        }})
        .to_string(),
    );
    assert!(eventually(WAIT, || fleet.container_stats("def").is_some()).await);
    assert!(fleet.container_stats("abc").is_none());

    container.shutdown();
    assert!(!system.is_connected());
    assert_eq!(fleet.containers().len(), 2);
    assert_eq!(system.stats().hostname, "node-1");
}

#[tokio::test]
async fn mutation_refetches_affected_collections() {
    let api = MockServer::start().await;
    let stream = StreamServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/containers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(containers()))
        .expect(2)
        .mount(&api)
        .await;
    mount_list(&api, "/api/stacks", json!([]), 2).await;
    mount_list(&api, "/api/volumes", json!([]), 1).await;
    mount_list(&api, "/api/networks", json!([]), 1).await;
    mount_list(&api, "/api/images", json!([]), 1).await;
    Mock::given(method("POST"))
        .and(path("/api/containers/def/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "started"})))
        .expect(1)
        .mount(&api)
        .await;

    let container = SyncContainer::new(config(&api, &stream)).unwrap();
    container.start_and_load().await.unwrap();

    container.fleet().start_container("def").await.unwrap();

    container.shutdown();
}

#[tokio::test]
async fn null_collections_from_the_backend_load_as_empty() {
    let api = MockServer::start().await;
    let stream = StreamServer::start().await;

    mount_list(
        &api,
        "/api/containers",
        json!([{"id": "abc", "name": "web-1", "state": "running", "ports": null, "labels": null}]),
        1,
    )
    .await;
    mount_list(&api, "/api/stacks", json!([]), 1).await;
    mount_list(
        &api,
        "/api/volumes",
        json!([{"name": "data", "driver": "local", "labels": null, "usedBy": null}]),
        2,
    )
    .await;
    mount_list(
        &api,
        "/api/networks",
        json!([{"id": "n0", "name": "bridge", "driver": "bridge", "containers": null}]),
        2,
    )
    .await;
    mount_list(&api, "/api/images", json!([{"id": "sha256:1", "tags": null}]), 1).await;
    Mock::given(method("POST"))
        .and(path("/api/networks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "n1", "name": "backend", "driver": "bridge", "containers": null
        })))
        .expect(1)
        .mount(&api)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/volumes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "name": "cache", "driver": "local", "labels": null, "usedBy": null
        })))
        .expect(1)
        .mount(&api)
        .await;

    let container = SyncContainer::new(config(&api, &stream)).unwrap();
    container.start_and_load().await.unwrap();

    let fleet = container.fleet();
    assert!(fleet.error().is_none());
    assert!(fleet.containers()[0].labels.is_empty());
    assert!(fleet.volumes()[0].used_by.is_empty());
    assert!(fleet.networks()[0].containers.is_empty());
    assert!(fleet.images()[0].tags.is_empty());

    let network = fleet
        .create_network(&CreateNetworkRequest::new("backend"))
        .await
        .unwrap();
    assert_eq!(network.id, "n1");
    assert!(network.containers.is_empty());

    let volume = fleet
        .create_volume(&CreateVolumeRequest::new("cache"))
        .await
        .unwrap();
    assert_eq!(volume.name, "cache");
    assert!(volume.labels.is_empty());
    assert!(fleet.error().is_none());

    container.shutdown();
}

#[tokio::test]
async fn failed_mutation_reports_server_message() {
    let api = MockServer::start().await;
    let stream = StreamServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/stacks/web/stop"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "compose down failed"})),
        )
        .expect(1)
        .mount(&api)
        .await;

    let container = SyncContainer::new(config(&api, &stream)).unwrap();

    let err = container.fleet().stop_stack("web").await.unwrap_err();

    assert!(matches!(err, StoreError::Mutation { .. }));
    assert_eq!(err.gateway_error().status(), Some(500));
    let message = container.fleet().error().unwrap();
    assert!(message.contains("compose down failed"));

    let containers_requests = api
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/api/containers")
        .count();
    assert_eq!(containers_requests, 0);
}

#[tokio::test]
async fn critical_fetch_failure_keeps_other_collections() {
    let api = MockServer::start().await;
    let stream = StreamServer::start().await;

    mount_list(&api, "/api/containers", containers(), 1).await;
    Mock::given(method("GET"))
        .and(path("/api/stacks"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "engine busy"})))
        .mount(&api)
        .await;
    mount_list(&api, "/api/volumes", json!([{"name": "data"}]), 1).await;
    Mock::given(method("GET"))
        .and(path("/api/networks"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&api)
        .await;
    mount_list(&api, "/api/images", json!([]), 1).await;

    let container = SyncContainer::new(config(&api, &stream)).unwrap();
    let err = container.start_and_load().await.unwrap_err();

    assert!(matches!(
        err,
        StoreError::Fetch {
            collection: Collection::Stacks,
            ..
        }
    ));
    let fleet = container.fleet();
    assert_eq!(fleet.error().as_deref(), Some("failed to fetch stacks: engine busy (HTTP 503)"));
    assert_eq!(fleet.containers().len(), 2);
    assert_eq!(fleet.volumes().len(), 1);
    assert!(fleet.networks().is_empty());
    assert!(!fleet.loading());

    assert!(eventually(WAIT, || container.system().is_connected()).await);
    container.shutdown();
}

#[tokio::test]
async fn malformed_host_metrics_keep_previous_snapshot() {
    let api = MockServer::start().await;
    let stream = StreamServer::start().await;

    let container = SyncContainer::new(config(&api, &stream)).unwrap();
    container.start();
    let system = container.system();
    assert!(eventually(WAIT, || system.is_connected()).await);

    stream.send(json!({"type": "stats", "payload": {"hostname": "node-1"}}).to_string());
    assert!(eventually(WAIT, || system.stats().hostname == "node-1").await);

    stream.send(json!({"type": "stats", "payload": {"cpuUsage": "very high"}}).to_string());
    assert!(eventually(WAIT, || system.error().is_some()).await);
    assert_eq!(system.stats().hostname, "node-1");
    assert!(system.is_connected());

    container.shutdown();
}

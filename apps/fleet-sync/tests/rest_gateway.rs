//! REST Gateway Integration Tests
//!
//! Exercises `HttpFleetGateway` against a mock fleet manager API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use serde_json::json;
use test_case::test_case;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleet_sync::domain::fleet::StackStatus;
use fleet_sync::{
    CreateNetworkRequest, CreateVolumeRequest, FleetGateway, FleetStore, GatewayError,
    HttpFleetGateway, MessageRouter,
};

async fn setup() -> (MockServer, HttpFleetGateway) {
    let server = MockServer::start().await;
    let gateway = HttpFleetGateway::with_client(
        reqwest::Client::new(),
        &format!("{}/api", server.uri()),
        &format!("{}/health", server.uri()),
    )
    .unwrap();
    (server, gateway)
}

#[tokio::test]
async fn lists_stacks() {
    let (server, gateway) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/stacks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "web", "path": "/srv/web", "status": "running", "services": 2, "runningServices": 2},
            {"name": "db", "status": "partial", "services": 3, "runningServices": 1}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let stacks = gateway.list_stacks().await.unwrap();

    assert_eq!(stacks.len(), 2);
    assert_eq!(stacks[0].name, "web");
    assert_eq!(stacks[0].status, StackStatus::Running);
    assert_eq!(stacks[1].running_services, 1);
    assert_eq!(stacks[1].path, "");
}

#[test_case(true, "true" ; "all containers")]
#[test_case(false, "false" ; "running only")]
#[tokio::test]
async fn list_containers_sends_all_flag(all: bool, expected: &str) {
    let (server, gateway) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/containers"))
        .and(query_param("all", expected))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "abc", "name": "web-1", "state": "running",
             "labels": {"com.docker.compose.project": "web"}}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let containers = gateway.list_containers(all).await.unwrap();

    assert_eq!(containers.len(), 1);
    assert_eq!(containers[0].stack_name(), Some("web"));
    assert!(containers[0].is_running());
}

#[tokio::test]
async fn path_segments_are_percent_encoded() {
    let (server, gateway) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/stacks/my%20stack/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "started"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = gateway.start_stack("my stack").await.unwrap();
    assert_eq!(response.status, "started");
}

#[tokio::test]
async fn null_collections_decode_as_empty() {
    let (server, gateway) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/containers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "abc", "name": "web-1", "ports": null, "labels": null}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/volumes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "data", "driver": "local", "labels": null, "usedBy": null}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "n1", "name": "backend", "driver": "bridge", "containers": null}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "sha256:1", "tags": null}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/networks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "n2", "name": "frontend", "driver": "bridge", "containers": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let containers = gateway.list_containers(true).await.unwrap();
    assert!(containers[0].ports.is_empty());
    assert!(containers[0].labels.is_empty());
    assert_eq!(containers[0].stack_name(), None);

    let volumes = gateway.list_volumes().await.unwrap();
    assert!(volumes[0].labels.is_empty());
    assert!(volumes[0].used_by.is_empty());

    let networks = gateway.list_networks().await.unwrap();
    assert!(networks[0].containers.is_empty());

    let images = gateway.list_images().await.unwrap();
    assert!(images[0].tags.is_empty());

    let network = gateway
        .create_network(&CreateNetworkRequest::new("frontend"))
        .await
        .unwrap();
    assert_eq!(network.id, "n2");
    assert!(network.containers.is_empty());
}

#[tokio::test]
async fn store_with_running_containers_only_sends_all_false() {
    let (server, gateway) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/containers"))
        .and(query_param("all", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "abc", "name": "web-1", "state": "running"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = FleetStore::new(Arc::new(gateway), MessageRouter::new()).running_containers_only();
    store.fetch_containers().await.unwrap();

    assert_eq!(store.containers().len(), 1);
}

#[tokio::test]
async fn api_error_carries_server_message() {
    let (server, gateway) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/containers/abc/stop"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"error": "container is not running"})),
        )
        .mount(&server)
        .await;

    let err = gateway.stop_container("abc").await.unwrap_err();

    assert_eq!(
        err,
        GatewayError::Api {
            status: 409,
            message: "container is not running".to_string()
        }
    );
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn api_error_without_body_falls_back_to_status() {
    let (server, gateway) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/images"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = gateway.list_images().await.unwrap_err();

    assert_eq!(
        err,
        GatewayError::Api {
            status: 502,
            message: "HTTP 502".to_string()
        }
    );
}

#[tokio::test]
async fn unexpected_body_is_a_decode_error() {
    let (server, gateway) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/volumes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"volumes": []})))
        .mount(&server)
        .await;

    let err = gateway.list_volumes().await.unwrap_err();
    assert!(matches!(err, GatewayError::Decode(_)));
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let gateway = HttpFleetGateway::with_client(
        reqwest::Client::new(),
        "http://127.0.0.1:9/api",
        "http://127.0.0.1:9/health",
    )
    .unwrap();

    let err = gateway.list_networks().await.unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)));
}

#[tokio::test]
async fn create_volume_posts_request_body() {
    let (server, gateway) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/volumes"))
        .and(body_json(json!({"name": "data", "driver": "local", "labels": {}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "name": "data", "driver": "local", "mountpoint": "/var/lib/volumes/data"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let volume = gateway
        .create_volume(&CreateVolumeRequest::new("data"))
        .await
        .unwrap();

    assert_eq!(volume.name, "data");
    assert_eq!(volume.mountpoint, "/var/lib/volumes/data");
}

#[tokio::test]
async fn delete_volume_sends_force_flag() {
    let (server, gateway) = setup().await;
    Mock::given(method("DELETE"))
        .and(path("/api/volumes/data"))
        .and(query_param("force", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "deleted"})))
        .expect(1)
        .mount(&server)
        .await;

    gateway.delete_volume("data", true).await.unwrap();
}

#[tokio::test]
async fn create_and_delete_network() {
    let (server, gateway) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/networks"))
        .and(body_json(json!({"name": "backend", "driver": "overlay"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "n1", "name": "backend", "driver": "overlay"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/networks/n1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let network = gateway
        .create_network(&CreateNetworkRequest::new("backend").with_driver("overlay"))
        .await
        .unwrap();
    assert_eq!(network.id, "n1");

    let status = gateway.delete_network("n1").await.unwrap();
    assert_eq!(status.status, "");
}

#[tokio::test]
async fn compose_file_round_trip() {
    let (server, gateway) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/stacks/web/compose"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"content": "services: {}\n"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/stacks/web/compose"))
        .and(body_json(json!({"content": "services:\n  app: {}\n"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "updated"})))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(gateway.compose_file("web").await.unwrap(), "services: {}\n");
    let status = gateway
        .update_compose_file("web", "services:\n  app: {}\n")
        .await
        .unwrap();
    assert_eq!(status.status, "updated");
}

#[tokio::test]
async fn container_logs_sends_tail() {
    let (server, gateway) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/containers/abc/logs"))
        .and(query_param("tail", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"logs": "line 1\nline 2\n"})))
        .expect(1)
        .mount(&server)
        .await;

    let logs = gateway.container_logs("abc", "50").await.unwrap();
    assert_eq!(logs.lines().count(), 2);
}

#[tokio::test]
async fn recent_logs_uses_default_tail() {
    let (server, gateway) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/containers/abc/logs"))
        .and(query_param("tail", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"logs": ""})))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(gateway.recent_logs("abc").await.unwrap(), "");
}

#[tokio::test]
async fn stats_endpoints_decode_metrics() {
    let (server, gateway) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cpuUsage": 42.0, "cpuCores": 8, "memoryPercent": 63.5, "hostname": "node-1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/containers/abc/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cpuPercent": 1.5, "memoryUsage": 1024, "memoryLimit": 4096
        })))
        .mount(&server)
        .await;

    let system = gateway.system_stats().await.unwrap();
    assert_eq!(system.cpu_cores, 8);
    assert_eq!(system.hostname, "node-1");

    let container = gateway.container_stats("abc").await.unwrap();
    assert_eq!(container.memory_limit, 4096);
    assert!((container.cpu_percent - 1.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn health_is_served_outside_api_prefix() {
    let (server, gateway) = setup().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "version": "1.4.0"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let health = gateway.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, "1.4.0");
}

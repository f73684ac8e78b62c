use mockito::{Matcher, Server};
use mongodbatlas::api::clusters::Cluster;
use mongodbatlas::{AtlasProvider, ClusterState, OperationTimeouts, ProviderConfig};
use std::sync::Arc;
use std::time::Duration;
use tfretry::{Context, ManualClock};

const CLUSTERS_PATH: &str = "/api/atlas/v1.0/groups/p1/clusters";
const CLUSTER_PATH: &str = "/api/atlas/v1.0/groups/p1/clusters/orders";

fn cluster_body(state: &str) -> String {
    format!(r#"{{"id":"c-1","name":"orders","groupId":"p1","stateName":"{}"}}"#, state)
}

fn configured_provider(url: &str, clock: &ManualClock) -> (AtlasProvider, mongodbatlas::AtlasProviderData) {
    let mut config = ProviderConfig::new("integration-token");
    config.base_url = url.to_string();
    config.retry.max_retries = 0;

    let mut provider = AtlasProvider::new();
    let data = provider
        .configure(&config)
        .unwrap()
        .with_clock(Arc::new(clock.clone()));
    (provider, data)
}

#[tokio::test(flavor = "multi_thread")]
async fn cluster_lifecycle_with_mock_server() {
    let mut server = Server::new_async().await;

    let create = server
        .mock("POST", CLUSTERS_PATH)
        .match_header("authorization", "Bearer integration-token")
        .with_status(201)
        .with_body(cluster_body("CREATING"))
        .create_async()
        .await;
    let _creating = server
        .mock("GET", CLUSTER_PATH)
        .with_body(cluster_body("CREATING"))
        .expect(3)
        .create_async()
        .await;
    let _idle = server
        .mock("GET", CLUSTER_PATH)
        .with_body(cluster_body("IDLE"))
        .expect(1)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", CLUSTER_PATH)
        .with_status(202)
        .create_async()
        .await;
    let _deleting = server
        .mock("GET", CLUSTER_PATH)
        .with_body(cluster_body("DELETING"))
        .expect(2)
        .create_async()
        .await;
    let _gone = server
        .mock("GET", CLUSTER_PATH)
        .with_status(404)
        .with_body(r#"{"error":404,"errorCode":"CLUSTER_NOT_FOUND","detail":"No cluster named orders exists in group p1."}"#)
        .create_async()
        .await;

    let clock = ManualClock::new();
    let (_provider, data) = configured_provider(&server.url(), &clock);
    let clusters = mongodbatlas::ClusterResource::new(data);
    let ctx = Context::new();
    let timeouts = OperationTimeouts::default();

    let request = Cluster {
        name: Some("orders".to_string()),
        ..Default::default()
    };
    let created = clusters
        .create(&ctx, "p1", &request, None, &timeouts)
        .await
        .unwrap();
    assert_eq!(created.state_name, Some(ClusterState::Idle));
    create.assert_async().await;

    let create_wait = clock.total_slept();
    assert_eq!(create_wait, Duration::from_secs(180 + 3 * 60));

    clusters
        .delete(&ctx, "p1", "orders", None, &timeouts)
        .await
        .unwrap();
    delete.assert_async().await;
    assert_eq!(
        clock.total_slept() - create_wait,
        Duration::from_secs(60 + 2 * 30)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn project_delete_waits_for_clusters() {
    let mut server = Server::new_async().await;

    let _deleting = server
        .mock("GET", "/api/atlas/v1.5/groups/p1/clusters")
        .with_body(r#"{"results":[{"name":"orders","stateName":"DELETING"}],"totalCount":1}"#)
        .expect(1)
        .create_async()
        .await;
    let _empty = server
        .mock("GET", "/api/atlas/v1.5/groups/p1/clusters")
        .with_body(r#"{"results":[],"totalCount":0}"#)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/api/atlas/v1.0/groups/p1")
        .with_status(202)
        .create_async()
        .await;

    let clock = ManualClock::new();
    let (provider, _data) = configured_provider(&server.url(), &clock);
    let data = provider
        .provider_data()
        .unwrap()
        .clone()
        .with_clock(Arc::new(clock.clone()));

    mongodbatlas::ProjectResource::new(data)
        .delete(&Context::new(), "p1")
        .await
        .unwrap();

    delete.assert_async().await;
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(30)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn cluster_update_fails_on_remote_error() {
    let mut server = Server::new_async().await;

    let _rejected = server
        .mock("PATCH", CLUSTER_PATH)
        .match_body(Matcher::PartialJson(serde_json::json!({"numShards": 3})))
        .with_status(400)
        .with_body(r#"{"error":400,"errorCode":"INVALID_ATTRIBUTE","detail":"Invalid attribute numShards specified."}"#)
        .create_async()
        .await;

    let clock = ManualClock::new();
    let (provider, _) = configured_provider(&server.url(), &clock);
    let clusters = provider.cluster_resource().unwrap();

    let update = mongodbatlas::resources::ClusterUpdate {
        changes: Cluster {
            num_shards: Some(3),
            ..Default::default()
        },
        ..Default::default()
    };

    let err = clusters
        .update(&Context::new(), "p1", "orders", &update, &OperationTimeouts::default())
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), Some("INVALID_ATTRIBUTE"));
    assert!(clock.sleeps().is_empty());
}

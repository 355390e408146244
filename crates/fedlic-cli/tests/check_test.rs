//! `fedlic check` against a mocked management API.

use fedlic_cli::check::check;
use fedlic_client::ClientConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn server_with(violation: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/license"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "record": {"id": "lic-7", "type": "maintenance", "maxCore": 64, "signature": "c2ln"},
            "status": {
                "host": {"coreNum": 80, "nodeNum": 4},
                "member": {"coreNum": 0, "nodeNum": 0},
                "clusterNum": 1,
                "violation": violation
            }
        })))
        .mount(&server)
        .await;
    server
}

fn config(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::new(server.uri().parse().unwrap());
    config.timeout_secs = 5;
    config
}

#[tokio::test]
async fn compliant_license_exits_zero() {
    let server = server_with(serde_json::json!({"type": "None"})).await;
    assert_eq!(check(config(&server)).await.unwrap(), 0);
}

#[tokio::test]
async fn violation_exits_one() {
    let server = server_with(serde_json::json!({
        "type": "CoreOverflow",
        "current": 80,
        "expected": 64
    }))
    .await;
    assert_eq!(check(config(&server)).await.unwrap(), 1);
}

#[tokio::test]
async fn server_error_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let err = check(config(&server)).await.unwrap_err();
    assert!(format!("{err:#}").contains("500"));
}

use httpmock::prelude::*;
use portcall_etl::core::feed::PortCallFeed;
use portcall_etl::utils::error::PortcallError;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;

fn feed_body() -> serde_json::Value {
    json!({
        "portCalls": [
            {"portCallId": 3170001, "imoLloyds": 9606900, "portToVisit": "FITKU"},
            {"portCallId": 3170002, "imoLloyds": 9300000, "portToVisit": "FIHEL"}
        ]
    })
}

#[tokio::test]
async fn test_fetch_returns_feed_payload() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/port-calls")
                .header("Accept", "application/json");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(feed_body());
        })
        .await;

    let feed = PortCallFeed::new(server.url("/port-calls"), Duration::from_secs(5)).unwrap();
    let payload = feed.fetch().await.unwrap();

    mock.assert_async().await;
    assert_eq!(payload, feed_body());
}

#[tokio::test]
async fn test_fetch_port_calls_applies_tracked_filter() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/port-calls");
            then.status(200).json_body(feed_body());
        })
        .await;

    let feed = PortCallFeed::new(server.url("/port-calls"), Duration::from_secs(5)).unwrap();
    let all = feed.fetch_port_calls(None).await.unwrap();
    let tracked: HashSet<u64> = [9300000].into_iter().collect();
    let only_tracked = feed.fetch_port_calls(Some(&tracked)).await.unwrap();

    mock.assert_hits_async(2).await;
    assert_eq!(all.len(), 2);
    assert_eq!(only_tracked.len(), 1);
    assert_eq!(only_tracked[0].port_to_visit.as_deref(), Some("FIHEL"));
}

#[tokio::test]
async fn test_fetch_error_status_is_api_error() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/port-calls");
            then.status(503).body("maintenance");
        })
        .await;

    let feed = PortCallFeed::new(server.url("/port-calls"), Duration::from_secs(5)).unwrap();
    let err = feed.fetch().await.unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, PortcallError::ApiError(_)), "unexpected error: {err:?}");
}

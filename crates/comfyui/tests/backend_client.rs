//! Integration tests for the backend HTTP session retry policies.

mod common;

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use comfyrelay_comfyui::backend::{BackendClient, BackendError, POST_RETRY_DELAY};
use comfyrelay_comfyui::retry::RetryPolicy;
use common::FakeBackend;
use serde_json::json;

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_delay: Duration::from_millis(1),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// 404 retry on POST
// ---------------------------------------------------------------------------

#[tokio::test]
async fn post_retries_404_until_success() {
    let (addr, backend) =
        common::spawn(FakeBackend::default().with_passthrough_statuses(&[404, 404])).await;
    let client = BackendClient::new(format!("http://{addr}")).unwrap();

    let started = Instant::now();
    let response = client
        .post("sdapi/v1/txt2img", &json!({"prompt": "a cat"}))
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    // One initial attempt plus exactly two retries.
    assert_eq!(backend.passthrough_hits.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= POST_RETRY_DELAY * 2);
}

#[tokio::test]
async fn post_returns_last_404_when_budget_is_spent() {
    let (addr, backend) = common::spawn(
        FakeBackend::default().with_passthrough_statuses(&[404, 404, 404, 404, 404]),
    )
    .await;
    let client = BackendClient::new(format!("http://{addr}"))
        .unwrap()
        .with_post_retries(3, Duration::from_millis(1));

    let response = client.post("/sdapi/v1/txt2img", &json!({})).await.unwrap();

    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(backend.passthrough_hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn get_does_not_retry_404() {
    let (addr, backend) =
        common::spawn(FakeBackend::default().with_passthrough_statuses(&[404])).await;
    let client = BackendClient::new(format!("http://{addr}")).unwrap();

    let response = client.get("sdapi/v1/options").await.unwrap();

    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(backend.passthrough_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn other_errors_pass_through_without_retry() {
    let (addr, backend) =
        common::spawn(FakeBackend::default().with_passthrough_statuses(&[500])).await;
    let client = BackendClient::new(format!("http://{addr}")).unwrap();

    let response = client.post("sdapi/v1/txt2img", &json!({})).await.unwrap();

    assert_eq!(response.status().as_u16(), 500);
    assert_eq!(backend.passthrough_hits.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Transport retry on 502/503/504
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_statuses_are_retried() {
    let (addr, backend) =
        common::spawn(FakeBackend::default().with_passthrough_statuses(&[502, 503, 504])).await;
    let client = BackendClient::new(format!("http://{addr}"))
        .unwrap()
        .with_policy(fast_policy(10));

    let response = client.get("sdapi/v1/options").await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(backend.passthrough_hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn post_does_not_resend_on_gateway_errors() {
    let (addr, backend) =
        common::spawn(FakeBackend::default().with_passthrough_statuses(&[504, 200])).await;
    let client = BackendClient::new(format!("http://{addr}"))
        .unwrap()
        .with_policy(fast_policy(10));

    let response = client
        .post("sdapi/v1/txt2img", &json!({"prompt": "a cat"}))
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 504);
    assert_eq!(backend.passthrough_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn post_retries_connection_failures() {
    // Reserve a port and start serving on it only after the first attempts fail.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = BackendClient::new(format!("http://{addr}"))
        .unwrap()
        .with_policy(RetryPolicy {
            max_retries: 10,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(50),
            ..Default::default()
        });
    let request =
        tokio::spawn(async move { client.post("sdapi/v1/txt2img", &json!({})).await });

    tokio::time::sleep(Duration::from_millis(120)).await;
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let (_, backend) = common::spawn_on(listener, FakeBackend::default());

    let response = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .expect("POST should be retried until the backend accepts connections")
        .unwrap()
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(backend.passthrough_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transient_retries_are_bounded() {
    let (addr, backend) =
        common::spawn(FakeBackend::default().with_passthrough_statuses(&[503; 10])).await;
    let client = BackendClient::new(format!("http://{addr}"))
        .unwrap()
        .with_policy(fast_policy(2));

    let result = client.get("sdapi/v1/options").await;

    assert_matches!(
        result,
        Err(BackendError::RetriesExhausted {
            status: 503,
            retries: 2
        })
    );
    assert_eq!(backend.passthrough_hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn connection_refused_surfaces_after_retries() {
    let client = BackendClient::new("http://127.0.0.1:9")
        .unwrap()
        .with_policy(fast_policy(1));

    let result = client.get("prompt").await;

    assert_matches!(result, Err(BackendError::Request(e)) if e.is_connect());
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn readiness_accepts_any_status() {
    // `/models` is not routed on the fake backend, so it answers 404.
    let (addr, _backend) = common::spawn(FakeBackend::default()).await;
    let client = BackendClient::new(format!("http://{addr}")).unwrap();

    tokio::time::timeout(Duration::from_secs(5), client.wait_until_ready("models"))
        .await
        .expect("readiness should return once the backend answers");
}

#[tokio::test]
async fn readiness_waits_for_backend_to_come_up() {
    // Reserve a port, release it, and only start serving after a delay.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = BackendClient::new(format!("http://{addr}")).unwrap();
    let waiter = tokio::spawn(async move { client.wait_until_ready("models").await });

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!waiter.is_finished());

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        axum::serve(listener, axum::Router::new()).await.unwrap();
    });

    tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("readiness should finish after the backend starts")
        .unwrap();
}

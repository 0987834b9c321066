//! Change feed (Server-Sent Events) tests

use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, StatusCode},
};
use futures::StreamExt;
use tower::ServiceExt;
use uuid::Uuid;

use crate::common::{request, TestApp};

/// Read SSE frames until one contains `needle`
async fn read_until(body: Body, needle: &str) -> String {
    let mut stream = body.into_data_stream();
    let mut seen = String::new();

    let found = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = stream.next().await {
            seen.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if seen.contains(needle) {
                return true;
            }
        }
        false
    })
    .await;

    assert!(
        matches!(found, Ok(true)),
        "never saw {:?} in feed: {}",
        needle,
        seen
    );
    seen
}

#[tokio::test]
async fn test_viewer_feed_sees_new_conversation() {
    let app = TestApp::new();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let response = app
        .test_router()
        .oneshot(request(Method::GET, "/v1/conversations/events", Some(b), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/event-stream"
    );

    let id = app.contact(a, b, "space", Uuid::new_v4()).await;

    let seen = read_until(response.into_body(), "event: conversation_changed").await;
    assert!(seen.contains(&id.to_string()));
}

#[tokio::test]
async fn test_conversation_feed_sees_new_message() {
    let app = TestApp::new();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let id = app.contact(a, b, "vendor", Uuid::new_v4()).await;

    let response = app
        .test_router()
        .oneshot(request(
            Method::GET,
            &format!("/v1/conversations/{}/messages/events", id),
            Some(b),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.send(id, a, "Menu attached").await;

    let seen = read_until(response.into_body(), "event: message_inserted").await;
    assert!(seen.contains("Menu attached"));
}

#[tokio::test]
async fn test_outsider_cannot_subscribe_to_conversation() {
    let app = TestApp::new();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let id = app.contact(a, b, "space", Uuid::new_v4()).await;

    let response = app
        .test_router()
        .oneshot(request(
            Method::GET,
            &format!("/v1/conversations/{}/messages/events", id),
            Some(Uuid::new_v4()),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleted_conversation_feed_is_gone() {
    let app = TestApp::new();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let id = app.contact(a, b, "space", Uuid::new_v4()).await;
    app.call(
        Method::DELETE,
        &format!("/v1/conversations/{}", id),
        Some(a),
        None,
    )
    .await;

    let response = app
        .test_router()
        .oneshot(request(
            Method::GET,
            &format!("/v1/conversations/{}/messages/events", id),
            Some(b),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GONE);
}

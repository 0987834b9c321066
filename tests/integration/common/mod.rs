//! Shared fixtures for the API integration tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use parley_app::{build_app, App};
use parley_autoreply::ReplyService;
use parley_common::{Config, VIEWER_HEADER};
use parley_conversations::{AutoResponderWorker, ConversationsRepositories};
use parley_moderation::{ContentModerator, PassthroughModerator, WordListModerator};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

/// A composed application over a fresh in-memory store
pub struct TestApp {
    router: Router,
    pub worker: Option<AutoResponderWorker>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(Arc::new(PassthroughModerator), None)
    }

    /// Masks each of `words` in stored and displayed text
    pub fn with_blocked_words(words: &[&str]) -> Self {
        let words: Vec<String> = words.iter().map(|w| w.to_string()).collect();
        Self::build(Arc::new(WordListModerator::new(&words).unwrap()), None)
    }

    pub fn with_reply_service(reply: Arc<dyn ReplyService>) -> Self {
        Self::build(Arc::new(PassthroughModerator), Some(reply))
    }

    /// Serve over caller-supplied stores
    pub fn with_repos(repos: ConversationsRepositories) -> Self {
        Self::compose(repos, Arc::new(PassthroughModerator), None)
    }

    fn build(
        moderator: Arc<dyn ContentModerator>,
        reply: Option<Arc<dyn ReplyService>>,
    ) -> Self {
        Self::compose(ConversationsRepositories::in_memory(), moderator, reply)
    }

    fn compose(
        repos: ConversationsRepositories,
        moderator: Arc<dyn ContentModerator>,
        reply: Option<Arc<dyn ReplyService>>,
    ) -> Self {
        let config = Config::from_lookup(|key| match key {
            "STORE_BACKEND" => Some("memory".to_string()),
            "AUTORESPONDER_TIMEOUT_MS" => Some("2000".to_string()),
            _ => None,
        })
        .unwrap();

        let App {
            router,
            auto_reply_worker,
            ..
        } = build_app(&config, repos, moderator, reply);
        Self {
            router,
            worker: auto_reply_worker,
        }
    }

    pub fn test_router(&self) -> Router {
        self.router.clone()
    }

    /// Send a request as `viewer` and return the status and JSON body
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        viewer: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self
            .test_router()
            .oneshot(request(method, uri, viewer, body))
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Open a conversation as `from` with `to` about a listing; returns its id
    pub async fn contact(&self, from: Uuid, to: Uuid, kind: &str, listing: Uuid) -> Uuid {
        let (status, body) = self
            .call(
                Method::POST,
                "/v1/conversations",
                Some(from),
                Some(contact_body(to, kind, listing)),
            )
            .await;
        assert!(
            status == StatusCode::CREATED || status == StatusCode::OK,
            "contact failed: {} {}",
            status,
            body
        );
        body_id(&body)
    }

    pub async fn send(&self, conversation: Uuid, sender: Uuid, content: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            &format!("/v1/conversations/{}/messages", conversation),
            Some(sender),
            Some(json!({ "content": content })),
        )
        .await
    }
}

pub fn request(method: Method, uri: &str, viewer: Option<Uuid>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(viewer) = viewer {
        builder = builder.header(VIEWER_HEADER, viewer.to_string());
    }

    match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&b).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn contact_body(other: Uuid, kind: &str, listing: Uuid) -> Value {
    json!({
        "other_participant_id": other,
        "topic": { "kind": kind, "id": listing }
    })
}

pub fn body_id(body: &Value) -> Uuid {
    body["id"].as_str().unwrap().parse().unwrap()
}

//! Message endpoint tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use parley_autoreply::{MockReplyBehavior, MockReplyService};
use parley_conversations::repository::RepositoryResult;
use parley_conversations::{
    Conversation, ConversationStore, ConversationsRepositories, InMemoryStore, PairKey, Topic,
};
use uuid::Uuid;

use crate::common::TestApp;

async fn history(app: &TestApp, conversation: Uuid, viewer: Uuid) -> Vec<serde_json::Value> {
    let (status, body) = app
        .call(
            Method::GET,
            &format!("/v1/conversations/{}/messages", conversation),
            Some(viewer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    body.as_array().unwrap().clone()
}

mod test_send {
    use super::*;

    #[tokio::test]
    async fn test_send_returns_created_message() {
        let app = TestApp::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "space", Uuid::new_v4()).await;

        let (status, body) = app.send(id, a, "Is the loft free on Friday?").await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["sender_id"], serde_json::json!(a));
        assert_eq!(body["content"], "Is the loft free on Friday?");
        assert_eq!(body["origin"], "human");
        assert_eq!(body["sequence"], 1);
    }

    #[tokio::test]
    async fn test_history_is_oldest_first() {
        let app = TestApp::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "space", Uuid::new_v4()).await;

        app.send(id, a, "one").await;
        app.send(id, b, "two").await;
        app.send(id, a, "three").await;

        let messages = history(&app, id, b).await;
        let contents: Vec<&str> = messages
            .iter()
            .map(|m| m["content"].as_str().unwrap())
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);

        let sequences: Vec<i64> = messages
            .iter()
            .map(|m| m["sequence"].as_i64().unwrap())
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_send_updates_snapshot() {
        let app = TestApp::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "vendor", Uuid::new_v4()).await;
        app.send(id, b, "We can cater for 40").await;

        let (_, body) = app
            .call(Method::GET, &format!("/v1/conversations/{}", id), Some(a), None)
            .await;

        assert_eq!(body["last_message"]["content"], "We can cater for 40");
        assert_eq!(body["last_message"]["sender_id"], serde_json::json!(b));
        assert_eq!(body["unread_for_viewer"], true);
    }

    #[tokio::test]
    async fn test_empty_and_oversized_content_rejected() {
        let app = TestApp::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "space", Uuid::new_v4()).await;

        let (status, _) = app.send(id, a, "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.send(id, a, "   ").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.send(id, a, &"x".repeat(4001)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(history(&app, id, a).await.is_empty());
    }

    #[tokio::test]
    async fn test_send_after_delete_is_gone() {
        let app = TestApp::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "space", Uuid::new_v4()).await;
        app.call(
            Method::DELETE,
            &format!("/v1/conversations/{}", id),
            Some(b),
            None,
        )
        .await;

        let (status, body) = app.send(id, a, "hello?").await;

        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["error"]["code"], "CONVERSATION_GONE");
        assert!(history(&app, id, a).await.is_empty());
    }

    /// Reads that still see the conversation as active after it was deleted
    struct LaggingReads {
        inner: Arc<InMemoryStore>,
    }

    #[async_trait]
    impl ConversationStore for LaggingReads {
        async fn find(&self, id: Uuid) -> RepositoryResult<Option<Conversation>> {
            let row = ConversationStore::find(self.inner.as_ref(), id).await?;
            Ok(row.map(|mut c| {
                c.soft_deleted = false;
                c
            }))
        }
        async fn find_active(
            &self,
            pair: PairKey,
            topic: Topic,
        ) -> RepositoryResult<Option<Conversation>> {
            self.inner.find_active(pair, topic).await
        }
        async fn insert(&self, conversation: &Conversation) -> RepositoryResult<Conversation> {
            self.inner.insert(conversation).await
        }
        async fn mark_read(
            &self,
            id: Uuid,
            viewer: Uuid,
        ) -> RepositoryResult<Option<Conversation>> {
            self.inner.mark_read(id, viewer).await
        }
        async fn soft_delete(&self, id: Uuid) -> RepositoryResult<Option<Conversation>> {
            self.inner.soft_delete(id).await
        }
        async fn list_for_participant(
            &self,
            user_id: Uuid,
        ) -> RepositoryResult<Vec<Conversation>> {
            self.inner.list_for_participant(user_id).await
        }
    }

    #[tokio::test]
    async fn test_send_racing_delete_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let app = TestApp::with_repos(ConversationsRepositories::new(
            Arc::new(LaggingReads {
                inner: store.clone(),
            }),
            store.clone(),
        ));
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "space", Uuid::new_v4()).await;
        let (status, _) = app
            .call(
                Method::DELETE,
                &format!("/v1/conversations/{}", id),
                Some(b),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = app.send(id, a, "hello?").await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "SEND_REJECTED");
        assert!(history(&app, id, a).await.is_empty());
    }
}

mod test_moderation {
    use super::*;

    #[tokio::test]
    async fn test_blocked_words_masked_in_message_and_snapshot() {
        let app = TestApp::with_blocked_words(&["venmo"]);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "space", Uuid::new_v4()).await;

        let (status, sent) = app.send(id, a, "Pay me on Venmo please").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sent["content"], "Pay me on ***** please");

        let (_, conversation) = app
            .call(Method::GET, &format!("/v1/conversations/{}", id), Some(b), None)
            .await;
        assert_eq!(
            conversation["last_message"]["content"],
            "Pay me on ***** please"
        );
    }
}

mod test_auto_reply {
    use super::*;

    async fn wait_for_jobs(app: &TestApp, count: u64) {
        let mut finished = app.worker.as_ref().unwrap().finished_jobs();
        tokio::time::timeout(Duration::from_secs(5), finished.wait_for(|done| *done >= count))
            .await
            .expect("auto-reply jobs did not finish")
            .unwrap();
    }

    #[tokio::test]
    async fn test_counterpart_auto_replies() {
        let reply = Arc::new(MockReplyService::new());
        let app = TestApp::with_reply_service(reply.clone());
        let (guest, host) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(guest, host, "space", Uuid::new_v4()).await;

        let (status, _) = app.send(id, guest, "Parking on site?").await;
        assert_eq!(status, StatusCode::CREATED);
        wait_for_jobs(&app, 1).await;

        let messages = history(&app, id, guest).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["origin"], "automated_reply");
        assert_eq!(messages[1]["sender_id"], serde_json::json!(host));
        assert_eq!(messages[1]["content"], "Auto-reply: Parking on site?");

        // The automated reply does not trigger another one
        assert_eq!(reply.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reply_leaves_message_intact() {
        let reply = Arc::new(MockReplyService::with_behavior(MockReplyBehavior::Fail(
            "provider down".to_string(),
        )));
        let app = TestApp::with_reply_service(reply);
        let (guest, host) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(guest, host, "vendor", Uuid::new_v4()).await;

        let (status, _) = app.send(id, guest, "Do you do vegan menus?").await;
        assert_eq!(status, StatusCode::CREATED);
        wait_for_jobs(&app, 1).await;

        let messages = history(&app, id, host).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["origin"], "human");
    }
}

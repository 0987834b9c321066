//! Conversation endpoint tests

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;

use crate::common::{body_id, contact_body, TestApp};

mod test_contact {
    use super::*;

    #[tokio::test]
    async fn test_first_contact_creates_then_reuses() {
        let app = TestApp::new();
        let (a, b, listing) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let (status, created) = app
            .call(
                Method::POST,
                "/v1/conversations",
                Some(a),
                Some(contact_body(b, "space", listing)),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["counterpart_id"], json!(b));
        assert_eq!(created["topic"], json!({ "kind": "space", "id": listing }));
        assert!(created["last_message"].is_null());

        let (status, again) = app
            .call(
                Method::POST,
                "/v1/conversations",
                Some(a),
                Some(contact_body(b, "space", listing)),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_id(&again), body_id(&created));
    }

    #[tokio::test]
    async fn test_pair_is_unordered() {
        let app = TestApp::new();
        let (a, b, listing) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let from_a = app.contact(a, b, "vendor", listing).await;
        let from_b = app.contact(b, a, "vendor", listing).await;

        assert_eq!(from_a, from_b);
    }

    #[tokio::test]
    async fn test_topic_distinguishes_conversations() {
        let app = TestApp::new();
        let (a, b, listing) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let space = app.contact(a, b, "space", listing).await;
        let vendor = app.contact(a, b, "vendor", listing).await;
        let other_space = app.contact(a, b, "space", Uuid::new_v4()).await;

        assert_ne!(space, vendor);
        assert_ne!(space, other_space);
    }

    #[tokio::test]
    async fn test_contacting_yourself_is_rejected() {
        let app = TestApp::new();
        let a = Uuid::new_v4();

        let (status, body) = app
            .call(
                Method::POST,
                "/v1/conversations",
                Some(a),
                Some(contact_body(a, "space", Uuid::new_v4())),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_missing_viewer_header_is_unauthorized() {
        let app = TestApp::new();

        let (status, body) = app
            .call(
                Method::POST,
                "/v1/conversations",
                None,
                Some(contact_body(Uuid::new_v4(), "space", Uuid::new_v4())),
            )
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "AUTHENTICATION_ERROR");
    }

    #[tokio::test]
    async fn test_unknown_topic_kind_is_bad_request() {
        let app = TestApp::new();

        let (status, _) = app
            .call(
                Method::POST,
                "/v1/conversations",
                Some(Uuid::new_v4()),
                Some(contact_body(Uuid::new_v4(), "event", Uuid::new_v4())),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_nil_listing_is_rejected() {
        let app = TestApp::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let (status, body) = app
            .call(
                Method::POST,
                "/v1/conversations",
                Some(a),
                Some(contact_body(b, "space", Uuid::nil())),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = app
            .call(Method::GET, "/v1/conversations", Some(a), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["spaces"].as_array().map(Vec::len), Some(0));
    }
}

mod test_access {
    use super::*;

    #[tokio::test]
    async fn test_outsider_sees_not_found() {
        let app = TestApp::new();
        let (a, b, outsider) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "space", Uuid::new_v4()).await;

        let (status, body) = app
            .call(
                Method::GET,
                &format!("/v1/conversations/{}", id),
                Some(outsider),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "CONVERSATION_NOT_FOUND");

        let (status, _) = app.send(id, outsider, "hello?").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .call(
                Method::DELETE,
                &format!("/v1/conversations/{}", id),
                Some(outsider),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_conversation_not_found() {
        let app = TestApp::new();

        let (status, _) = app
            .call(
                Method::GET,
                &format!("/v1/conversations/{}", Uuid::new_v4()),
                Some(Uuid::new_v4()),
                None,
            )
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_id_is_bad_request() {
        let app = TestApp::new();

        let (status, _) = app
            .call(
                Method::GET,
                "/v1/conversations/not-a-uuid",
                Some(Uuid::new_v4()),
                None,
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod test_directory {
    use super::*;

    #[tokio::test]
    async fn test_directory_splits_by_topic_kind() {
        let app = TestApp::new();
        let (me, host, vendor) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let space_id = app.contact(me, host, "space", Uuid::new_v4()).await;
        let vendor_id = app.contact(me, vendor, "vendor", Uuid::new_v4()).await;

        let (status, body) = app
            .call(Method::GET, "/v1/conversations", Some(me), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let spaces = body["spaces"].as_array().unwrap();
        let vendors = body["vendors"].as_array().unwrap();
        assert_eq!(spaces.len(), 1);
        assert_eq!(vendors.len(), 1);
        assert_eq!(body_id(&spaces[0]), space_id);
        assert_eq!(body_id(&vendors[0]), vendor_id);

        // The host only sees their own conversation
        let (_, host_view) = app
            .call(Method::GET, "/v1/conversations", Some(host), None)
            .await;
        assert_eq!(host_view["spaces"].as_array().unwrap().len(), 1);
        assert!(host_view["vendors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_directory_orders_by_latest_activity() {
        let app = TestApp::new();
        let (me, x, y) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let older = app.contact(me, x, "space", Uuid::new_v4()).await;
        let newer = app.contact(me, y, "space", Uuid::new_v4()).await;

        // A message bumps the older conversation to the top
        let (status, _) = app.send(older, x, "still available?").await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = app
            .call(Method::GET, "/v1/conversations", Some(me), None)
            .await;
        let ids: Vec<Uuid> = body["spaces"]
            .as_array()
            .unwrap()
            .iter()
            .map(body_id)
            .collect();
        assert_eq!(ids, vec![older, newer]);
    }

    #[tokio::test]
    async fn test_deleted_conversation_leaves_directory() {
        let app = TestApp::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "vendor", Uuid::new_v4()).await;

        let (status, _) = app
            .call(
                Method::DELETE,
                &format!("/v1/conversations/{}", id),
                Some(a),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        for viewer in [a, b] {
            let (_, body) = app
                .call(Method::GET, "/v1/conversations", Some(viewer), None)
                .await;
            assert!(body["vendors"].as_array().unwrap().is_empty());
        }
    }
}

mod test_read_state {
    use super::*;

    #[tokio::test]
    async fn test_mark_read_clears_unread_for_recipient() {
        let app = TestApp::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "space", Uuid::new_v4()).await;
        app.send(id, a, "Is Saturday free?").await;

        let (_, for_b) = app
            .call(Method::GET, &format!("/v1/conversations/{}", id), Some(b), None)
            .await;
        assert_eq!(for_b["unread"], true);
        assert_eq!(for_b["unread_for_viewer"], true);

        let (_, for_a) = app
            .call(Method::GET, &format!("/v1/conversations/{}", id), Some(a), None)
            .await;
        assert_eq!(for_a["unread_for_viewer"], false);

        let (status, read) = app
            .call(
                Method::POST,
                &format!("/v1/conversations/{}/read", id),
                Some(b),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(read["unread"], false);
        assert_eq!(read["unread_for_viewer"], false);
    }

    #[tokio::test]
    async fn test_sender_cannot_mark_own_message_read() {
        let app = TestApp::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "space", Uuid::new_v4()).await;
        app.send(id, a, "Hello").await;

        let (status, body) = app
            .call(
                Method::POST,
                &format!("/v1/conversations/{}/read", id),
                Some(a),
                None,
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["unread"], true);
    }
}

mod test_delete_and_revive {
    use super::*;

    #[tokio::test]
    async fn test_delete_is_idempotent_and_history_survives() {
        let app = TestApp::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "space", Uuid::new_v4()).await;
        app.send(id, a, "first").await;

        let uri = format!("/v1/conversations/{}", id);
        let (status, _) = app.call(Method::DELETE, &uri, Some(a), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.call(Method::DELETE, &uri, Some(b), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = app.call(Method::GET, &uri, Some(b), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["soft_deleted"], true);

        let (status, history) = app
            .call(Method::GET, &format!("{}/messages", uri), Some(b), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_revive_without_context_is_gone() {
        let app = TestApp::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "space", Uuid::new_v4()).await;
        let uri = format!("/v1/conversations/{}", id);
        app.call(Method::DELETE, &uri, Some(a), None).await;

        let (status, body) = app
            .call(Method::POST, &format!("{}/revive", uri), Some(a), None)
            .await;

        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["error"]["code"], "CONVERSATION_GONE");
    }

    #[tokio::test]
    async fn test_revive_with_context_starts_fresh_conversation() {
        let app = TestApp::new();
        let (a, b, listing) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "vendor", listing).await;
        app.send(id, a, "old thread").await;
        let uri = format!("/v1/conversations/{}", id);
        app.call(Method::DELETE, &uri, Some(b), None).await;

        let (status, revived) = app
            .call(
                Method::POST,
                &format!("{}/revive", uri),
                Some(a),
                Some(contact_body(b, "vendor", listing)),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let new_id = body_id(&revived);
        assert_ne!(new_id, id);
        assert_eq!(revived["soft_deleted"], false);
        assert!(revived["last_message"].is_null());

        // Contacting again lands on the revived conversation
        assert_eq!(app.contact(b, a, "vendor", listing).await, new_id);
    }

    #[tokio::test]
    async fn test_revive_with_foreign_context_rejected() {
        let app = TestApp::new();
        let (a, b, listing) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "space", listing).await;
        let uri = format!("/v1/conversations/{}", id);
        app.call(Method::DELETE, &uri, Some(a), None).await;

        let (status, _) = app
            .call(
                Method::POST,
                &format!("{}/revive", uri),
                Some(a),
                Some(contact_body(Uuid::new_v4(), "space", listing)),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_revive_active_conversation_returns_it() {
        let app = TestApp::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let id = app.contact(a, b, "space", Uuid::new_v4()).await;

        let (status, body) = app
            .call(
                Method::POST,
                &format!("/v1/conversations/{}/revive", id),
                Some(b),
                None,
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_id(&body), id);
    }
}

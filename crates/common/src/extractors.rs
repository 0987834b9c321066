//! Custom axum extractors for Parley

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use crate::Error;

/// Header carrying the caller's user id, set by the upstream gateway
pub const VIEWER_HEADER: &str = "x-parley-user-id";

/// The user on whose behalf a request is made.
///
/// Parley does not authenticate callers itself; the gateway in front of it
/// resolves the session and forwards the user id in [`VIEWER_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerId(pub Uuid);

impl<S> FromRequestParts<S> for ViewerId
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(VIEWER_HEADER)
            .ok_or_else(|| Error::Authentication(format!("Missing {} header", VIEWER_HEADER)))?;

        let raw = raw
            .to_str()
            .map_err(|_| Error::Authentication(format!("Malformed {} header", VIEWER_HEADER)))?;

        let id = Uuid::parse_str(raw.trim())
            .map_err(|_| Error::Authentication(format!("Malformed {} header", VIEWER_HEADER)))?;

        Ok(ViewerId(id))
    }
}

/// JSON extractor that validates the deserialized value automatically.
///
/// Replaces `Json<T>` + manual `.validate()` calls in handlers.
/// Requires `T: DeserializeOwned + Validate`.
///
/// All input errors (deserialization + validation) return 400.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

/// Rejection type for `ValidatedJson`:
/// - JSON deserialization errors → 400 (via `Error::Validation`)
/// - Validation errors → 400 (via `Error::Validation`)
#[derive(Debug)]
pub enum ValidatedJsonRejection {
    Json(JsonRejection),
    Validation(Error),
}

impl IntoResponse for ValidatedJsonRejection {
    fn into_response(self) -> Response {
        match self {
            ValidatedJsonRejection::Json(e) => Error::Validation(e.body_text()).into_response(),
            ValidatedJsonRejection::Validation(e) => e.into_response(),
        }
    }
}

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ValidatedJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidatedJsonRejection::Json)?;
        value.validate().map_err(|e| {
            ValidatedJsonRejection::Validation(Error::Validation(format!(
                "Validation failed: {}",
                e
            )))
        })?;
        Ok(ValidatedJson(value))
    }
}

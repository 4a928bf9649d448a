//! Request extractors.

use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use carebudget_shared::types::UserId;

use crate::error::ApiError;

/// Header carrying the authenticated user id, set by the upstream gateway.
pub const CALLER_HEADER: &str = "x-user-id";

/// Identity of the user performing a write.
///
/// Rejects the request with 401 when the header is missing or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub UserId);

impl CallerId {
    /// Returns the user id.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.0
    }
}

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Self(UserId::new(value)))
            .ok_or_else(|| ApiError::unauthorized(format!("{CALLER_HEADER} header is required")))
    }
}

/// Path parameters whose parse failures answer with the JSON error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParams<T>(pub T);

impl<S, T> FromRequestParts<S> for PathParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(params)| Self(params))
            .map_err(|rejection| ApiError::validation(rejection.body_text()))
    }
}

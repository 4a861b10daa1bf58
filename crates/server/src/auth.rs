// crates/server/src/auth.rs
//! Caller identity.
//!
//! Authentication happens upstream; the auth proxy forwards the verified user
//! id in [`CALLER_HEADER`]. Handlers take a [`Caller`] to scope every job
//! query to its owner.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

pub use larder_types::CALLER_HEADER;

/// The authenticated user making the request.
///
/// Use this in any handler that touches jobs:
/// ```ignore
/// async fn my_handler(caller: Caller) -> impl IntoResponse {
///     // caller.id() is the owner to scope queries to
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

impl Caller {
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or(ApiError::Unauthorized)?
            .to_str()
            .map_err(|_| ApiError::Unauthorized)?
            .trim();

        if value.is_empty() {
            return Err(ApiError::Unauthorized);
        }
        Ok(Caller(value.to_string()))
    }
}

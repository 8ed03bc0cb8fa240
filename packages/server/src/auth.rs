//! Owner identity boundary.
//!
//! Authentication happens upstream (gateway or auth middleware); it
//! forwards the authenticated user's id in the [`USER_ID_HEADER`] header.
//! This server only trusts and extracts it.

use std::future::{Ready, ready};

use actix_web::dev::Payload;
use actix_web::error::InternalError;
use actix_web::{FromRequest, HttpRequest, HttpResponse};
use noise_map_server_models::ApiError;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// The authenticated caller. Extracting it from a request without a
/// non-empty [`USER_ID_HEADER`] fails with `401 Unauthorized`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

impl AuthenticatedUser {
    /// The user's id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Self(id.to_string()));

        ready(user.ok_or_else(|| {
            log::debug!("Rejecting {} {}: no user id", req.method(), req.path());
            InternalError::from_response(
                "missing user id",
                HttpResponse::Unauthorized().json(ApiError::new("Authentication required")),
            )
            .into()
        }))
    }
}

//! Extraction of the caller identity from request headers.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user in `x-user-id` and, for staff, `x-user-role: staff`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::BuyerId;
use domain::Identity;
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

const STAFF_ROLE: &str = "staff";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .map(BuyerId::from_uuid)
            .ok_or_else(|| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER} header")))?;

        let is_staff = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|role| role.to_str().ok())
            .is_some_and(|role| role.trim().eq_ignore_ascii_case(STAFF_ROLE));

        Ok(Caller(if is_staff {
            Identity::staff(user_id)
        } else {
            Identity::buyer(user_id)
        }))
    }
}

use std::sync::Arc;

use axum::extract::FromRequestParts;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

/// Header carrying the id of the person the request acts for. It is set by
/// the gateway in front of this service after authentication.
pub const PERSON_HEADER: &str = "x-person-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentPerson(pub Uuid);

impl FromRequestParts<Arc<AppState>> for CurrentPerson {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(PERSON_HEADER)
            .ok_or_else(|| AppError::unauthorized("Missing X-Person-Id header"))?;

        raw.to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(Self)
            .ok_or_else(|| AppError::unauthorized("Invalid X-Person-Id header"))
    }
}

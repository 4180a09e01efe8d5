use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub mod person;
pub mod todo;

pub use person::{CurrentPerson, PERSON_HEADER};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new().merge(todo::router(state))
}

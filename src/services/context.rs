use sea_orm::DatabaseConnection;

use crate::{
    config::TodoConfig, db::dao::DaoContext, services::todo_service::TodoService,
    state::AppState,
};

#[derive(Clone)]
pub struct ServiceContext {
    daos: DaoContext,
    todo: TodoConfig,
}

impl ServiceContext {
    pub fn new(db: &DatabaseConnection, todo: &TodoConfig) -> Self {
        Self {
            daos: DaoContext::new(db),
            todo: todo.clone(),
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(&state.db, &state.config.todo)
    }

    pub fn todo(&self) -> TodoService {
        TodoService::new(self.daos.todo(), self.todo.conflict_retries)
    }
}

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::entities::todo,
    response::{ApiResult, JsonApiResponse},
    routes::CurrentPerson,
    services::{ListFilter, MarkStatus, ServiceContext, TodoService, TodoUpdate},
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub filter: ListFilter,
}

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTodoRequest {
    pub title: String,
    pub is_completed: Option<bool>,
    pub position: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct MarkAllRequest {
    pub status: MarkStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub todo_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct TodoResponse {
    pub id: Uuid,
    pub version: Uuid,
    pub previous_version: Option<Uuid>,
    pub person_id: Uuid,
    pub title: String,
    pub is_completed: bool,
    pub position: i32,
    pub active: bool,
    pub created_on: DateTimeWithTimeZone,
    pub changed_on: DateTimeWithTimeZone,
    pub changed_by_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct TodoData {
    pub todo: TodoResponse,
}

#[derive(Debug, Serialize)]
pub struct TodosData {
    pub todos: Vec<TodoResponse>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/todo",
            get(list_todos).post(create_todo).delete(delete_completed),
        )
        .route("/todo/mark-all", post(mark_all))
        .route("/todo/reorder", post(reorder))
        .route(
            "/todo/{id}",
            get(get_todo).patch(update_todo).delete(delete_todo),
        )
        .route("/todo/{id}/status", put(toggle_status))
        .route("/todo/{id}/history", get(todo_history))
        .with_state(state)
}

async fn list_todos(
    State(state): State<Arc<AppState>>,
    CurrentPerson(person_id): CurrentPerson,
    Query(query): Query<ListQuery>,
) -> ApiResult<TodosData> {
    let todos = todo_service(&state).get_list(person_id, query.filter).await?;
    JsonApiResponse::ok(todos.into())
}

async fn create_todo(
    State(state): State<Arc<AppState>>,
    CurrentPerson(person_id): CurrentPerson,
    Json(body): Json<CreateTodoRequest>,
) -> ApiResult<TodoData> {
    let todo = todo_service(&state)
        .create_item(person_id, &body.title)
        .await?;
    JsonApiResponse::with_status(StatusCode::CREATED, "Task created successfully.", todo.into())
}

async fn delete_completed(
    State(state): State<Arc<AppState>>,
    CurrentPerson(person_id): CurrentPerson,
) -> ApiResult<serde_json::Value> {
    todo_service(&state).delete_completed(person_id).await?;
    JsonApiResponse::with_message(
        "All completed tasks deleted successfully.",
        serde_json::Value::Null,
    )
}

async fn get_todo(
    State(state): State<Arc<AppState>>,
    CurrentPerson(_): CurrentPerson,
    Path(id): Path<Uuid>,
) -> ApiResult<TodoData> {
    let todo = todo_service(&state).get_item(id).await?;
    JsonApiResponse::ok(todo.into())
}

async fn update_todo(
    State(state): State<Arc<AppState>>,
    CurrentPerson(person_id): CurrentPerson,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTodoRequest>,
) -> ApiResult<TodoData> {
    let update = TodoUpdate {
        title: body.title,
        is_completed: body.is_completed,
        position: body.position,
    };
    let todo = todo_service(&state)
        .update_item(person_id, id, update)
        .await?;
    JsonApiResponse::with_message("Todo List updated successfully.", todo.into())
}

async fn delete_todo(
    State(state): State<Arc<AppState>>,
    CurrentPerson(person_id): CurrentPerson,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    todo_service(&state).delete_item(person_id, id).await?;
    JsonApiResponse::with_message("Todo List deleted successfully.", serde_json::Value::Null)
}

async fn toggle_status(
    State(state): State<Arc<AppState>>,
    CurrentPerson(person_id): CurrentPerson,
    Path(id): Path<Uuid>,
) -> ApiResult<TodoData> {
    let todo = todo_service(&state).toggle_status(person_id, id).await?;
    let status = if todo.is_completed {
        MarkStatus::Completed
    } else {
        MarkStatus::Active
    };
    JsonApiResponse::with_message(format!("Todo marked as {}.", status.as_str()), todo.into())
}

async fn mark_all(
    State(state): State<Arc<AppState>>,
    CurrentPerson(person_id): CurrentPerson,
    Json(body): Json<MarkAllRequest>,
) -> ApiResult<TodosData> {
    let changed = todo_service(&state).mark_all(person_id, body.status).await?;
    JsonApiResponse::with_message(
        format!("All todos marked as {}", body.status.as_str()),
        changed.into(),
    )
}

async fn reorder(
    State(state): State<Arc<AppState>>,
    CurrentPerson(person_id): CurrentPerson,
    Json(body): Json<ReorderRequest>,
) -> ApiResult<TodosData> {
    let todos = todo_service(&state)
        .reorder(person_id, &body.todo_ids)
        .await?;
    JsonApiResponse::with_message("Todos reordered successfully.", todos.into())
}

async fn todo_history(
    State(state): State<Arc<AppState>>,
    CurrentPerson(_): CurrentPerson,
    Path(id): Path<Uuid>,
) -> ApiResult<TodosData> {
    let versions = todo_service(&state).history(id).await?;
    JsonApiResponse::ok(versions.into())
}

fn todo_service(state: &AppState) -> TodoService {
    ServiceContext::from_state(state).todo()
}

impl From<todo::Model> for TodoResponse {
    fn from(model: todo::Model) -> Self {
        Self {
            id: model.entity_id,
            version: model.version,
            previous_version: model.previous_version,
            person_id: model.person_id,
            title: model.title,
            is_completed: model.is_completed,
            position: model.position,
            active: model.active,
            created_on: model.created_on,
            changed_on: model.changed_on,
            changed_by_id: model.changed_by_id,
        }
    }
}

impl From<todo::Model> for TodoData {
    fn from(model: todo::Model) -> Self {
        Self { todo: model.into() }
    }
}

impl From<Vec<todo::Model>> for TodosData {
    fn from(models: Vec<todo::Model>) -> Self {
        Self {
            todos: models.into_iter().map(TodoResponse::from).collect(),
        }
    }
}

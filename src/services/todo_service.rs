use std::{collections::HashSet, future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    db::dao::{DaoLayerError, DaoResult, TodoDao, VersionedDao},
    db::entities::todo,
    error::AppError,
};

/// Pause before replaying a lost race, multiplied by the attempt number, so
/// the winning transaction can commit first.
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Which part of a person's list to return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl ListFilter {
    fn completed(self) -> Option<bool> {
        match self {
            ListFilter::All => None,
            ListFilter::Active => Some(false),
            ListFilter::Completed => Some(true),
        }
    }
}

/// Target state for [`TodoService::mark_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkStatus {
    Completed,
    Active,
}

impl MarkStatus {
    pub fn is_completed(self) -> bool {
        matches!(self, MarkStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarkStatus::Completed => "completed",
            MarkStatus::Active => "active",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TodoUpdate {
    pub title: String,
    /// `None` keeps the stored completion state.
    pub is_completed: Option<bool>,
    /// Written as given; other items are not renumbered.
    pub position: Option<i32>,
}

/// Per-person ordered todo list on top of the versioned todo store.
///
/// Each public operation runs in one database transaction, so multi-item
/// changes (the shift on create, bulk marking, reordering) apply completely
/// or not at all. When a save loses an optimistic-concurrency race the whole
/// operation is replayed from its reads, up to `conflict_retries` times.
#[derive(Clone)]
pub struct TodoService {
    todo_dao: TodoDao,
    conflict_retries: u32,
}

impl TodoService {
    pub fn new(todo_dao: TodoDao, conflict_retries: u32) -> Self {
        Self {
            todo_dao,
            conflict_retries,
        }
    }

    pub async fn get_item(&self, entity_id: Uuid) -> Result<todo::Model, AppError> {
        Ok(self
            .todo_dao
            .find_active(self.todo_dao.db(), entity_id)
            .await?)
    }

    pub async fn get_list(
        &self,
        person_id: Uuid,
        filter: ListFilter,
    ) -> Result<Vec<todo::Model>, AppError> {
        let mut items = self
            .todo_dao
            .list_for_person(self.todo_dao.db(), person_id, filter.completed())
            .await?;
        sort_by_rank(&mut items);
        Ok(items)
    }

    /// Inserts at position 0 after moving every existing item down one rank.
    pub async fn create_item(&self, person_id: Uuid, title: &str) -> Result<todo::Model, AppError> {
        let title = normalize_title(title)?;
        let created = self
            .with_conflict_retry("create_item", move || self.try_create_item(person_id, title))
            .await?;
        info!(%person_id, entity_id = %created.entity_id, "todo created");
        Ok(created)
    }

    pub async fn update_item(
        &self,
        person_id: Uuid,
        entity_id: Uuid,
        update: TodoUpdate,
    ) -> Result<todo::Model, AppError> {
        let title = normalize_title(&update.title)?.to_string();
        if update.position.is_some_and(|position| position < 0) {
            return Err(AppError::bad_request("Position must not be negative"));
        }
        let update = &TodoUpdate { title, ..update };

        self.with_conflict_retry("update_item", move || {
            self.try_update_item(person_id, entity_id, update)
        })
        .await
    }

    pub async fn toggle_status(
        &self,
        person_id: Uuid,
        entity_id: Uuid,
    ) -> Result<todo::Model, AppError> {
        self.with_conflict_retry("toggle_status", move || {
            self.try_toggle_status(person_id, entity_id)
        })
        .await
    }

    /// Flips every item not already in `status`; returns the changed items.
    pub async fn mark_all(
        &self,
        person_id: Uuid,
        status: MarkStatus,
    ) -> Result<Vec<todo::Model>, AppError> {
        let changed = self
            .with_conflict_retry("mark_all", move || self.try_mark_all(person_id, status))
            .await?;
        info!(%person_id, status = status.as_str(), changed = changed.len(), "todos marked");
        Ok(changed)
    }

    /// Leaves the remaining positions as they are; gaps close on the next create.
    pub async fn delete_item(&self, person_id: Uuid, entity_id: Uuid) -> Result<(), AppError> {
        self.with_conflict_retry("delete_item", move || {
            self.try_delete_item(person_id, entity_id)
        })
        .await?;
        info!(%person_id, %entity_id, "todo deleted");
        Ok(())
    }

    pub async fn delete_completed(&self, person_id: Uuid) -> Result<u64, AppError> {
        let deleted = self
            .with_conflict_retry("delete_completed", move || {
                self.try_delete_completed(person_id)
            })
            .await?;
        info!(%person_id, deleted, "completed todos deleted");
        Ok(deleted)
    }

    /// Ranks `todo_ids` as 0, 1, 2, ... in the given order. Items of the
    /// person that are not listed keep their current position.
    pub async fn reorder(
        &self,
        person_id: Uuid,
        todo_ids: &[Uuid],
    ) -> Result<Vec<todo::Model>, AppError> {
        let ranking = &rank_ids(todo_ids)?;
        let reordered = self
            .with_conflict_retry("reorder", move || self.try_reorder(person_id, ranking))
            .await?;
        info!(%person_id, reordered = reordered.len(), "todos reordered");
        Ok(reordered)
    }

    /// Every version of one todo, newest first. Works for deleted todos too.
    pub async fn history(&self, entity_id: Uuid) -> Result<Vec<todo::Model>, AppError> {
        Ok(self
            .todo_dao
            .history(self.todo_dao.db(), entity_id)
            .await?)
    }

    async fn with_conflict_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DaoResult<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_conflict() && retries < self.conflict_retries => {
                    retries += 1;
                    warn!(operation, retries, error = %err, "retrying after concurrent modification");
                    tokio::time::sleep(RETRY_BACKOFF * retries).await;
                }
                result => return result.map_err(AppError::from),
            }
        }
    }

    async fn try_create_item(&self, person_id: Uuid, title: &str) -> DaoResult<todo::Model> {
        let txn = self.todo_dao.begin().await?;
        let mut existing = self.todo_dao.list_for_person(&txn, person_id, None).await?;
        sort_by_rank(&mut existing);
        // Ranks are rewritten as 1..=N, which on a dense list is the plain +1
        // shift and otherwise also closes gaps left by deletes.
        for (rank, mut item) in (1..).zip(existing) {
            item.position = rank;
            self.todo_dao.save(&txn, item, person_id).await?;
        }
        let created = self
            .todo_dao
            .save(&txn, todo::Model::new(person_id, title), person_id)
            .await?;
        txn.commit().await?;
        Ok(created)
    }

    async fn try_update_item(
        &self,
        person_id: Uuid,
        entity_id: Uuid,
        update: &TodoUpdate,
    ) -> DaoResult<todo::Model> {
        let txn = self.todo_dao.begin().await?;
        let item = self.todo_dao.find_active(&txn, entity_id).await?;
        let saved = self
            .todo_dao
            .save(&txn, apply_update(item, update), person_id)
            .await?;
        txn.commit().await?;
        Ok(saved)
    }

    async fn try_toggle_status(&self, person_id: Uuid, entity_id: Uuid) -> DaoResult<todo::Model> {
        let txn = self.todo_dao.begin().await?;
        let mut item = self.todo_dao.find_active(&txn, entity_id).await?;
        item.is_completed = !item.is_completed;
        let saved = self.todo_dao.save(&txn, item, person_id).await?;
        txn.commit().await?;
        Ok(saved)
    }

    async fn try_mark_all(
        &self,
        person_id: Uuid,
        status: MarkStatus,
    ) -> DaoResult<Vec<todo::Model>> {
        let target = status.is_completed();
        let txn = self.todo_dao.begin().await?;
        // Items already in the target state are not saved.
        let mut pending = self
            .todo_dao
            .list_for_person(&txn, person_id, Some(!target))
            .await?;
        sort_by_rank(&mut pending);

        let mut changed = Vec::with_capacity(pending.len());
        for mut item in pending {
            item.is_completed = target;
            changed.push(self.todo_dao.save(&txn, item, person_id).await?);
        }
        txn.commit().await?;
        Ok(changed)
    }

    async fn try_delete_item(&self, person_id: Uuid, entity_id: Uuid) -> DaoResult<()> {
        let txn = self.todo_dao.begin().await?;
        let item = self.todo_dao.find_active(&txn, entity_id).await?;
        self.todo_dao.delete(&txn, item, person_id).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn try_delete_completed(&self, person_id: Uuid) -> DaoResult<u64> {
        let txn = self.todo_dao.begin().await?;
        let completed = self
            .todo_dao
            .list_for_person(&txn, person_id, Some(true))
            .await?;
        let mut deleted = 0;
        for item in completed {
            self.todo_dao.delete(&txn, item, person_id).await?;
            deleted += 1;
        }
        txn.commit().await?;
        Ok(deleted)
    }

    async fn try_reorder(
        &self,
        person_id: Uuid,
        ranking: &[(Uuid, i32)],
    ) -> DaoResult<Vec<todo::Model>> {
        let txn = self.todo_dao.begin().await?;
        let mut reordered = Vec::with_capacity(ranking.len());
        for &(entity_id, position) in ranking {
            let item = self.todo_dao.find_active(&txn, entity_id).await?;
            if item.person_id != person_id {
                return Err(DaoLayerError::NotFound {
                    entity: TodoDao::ENTITY_NAME,
                    criteria: format!("entity_id={entity_id}, person_id={person_id}"),
                });
            }
            let update = TodoUpdate {
                title: item.title.clone(),
                is_completed: Some(item.is_completed),
                position: Some(position),
            };
            let saved = self
                .todo_dao
                .save(&txn, apply_update(item, &update), person_id)
                .await?;
            reordered.push(saved);
        }
        txn.commit().await?;
        Ok(reordered)
    }
}

/// Position ascending; ties fall back to creation time, then id.
pub fn sort_by_rank(items: &mut [todo::Model]) {
    items.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.created_on.cmp(&b.created_on))
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
}

fn apply_update(mut item: todo::Model, update: &TodoUpdate) -> todo::Model {
    item.title = update.title.clone();
    if let Some(is_completed) = update.is_completed {
        item.is_completed = is_completed;
    }
    if let Some(position) = update.position {
        item.position = position;
    }
    item
}

fn normalize_title(title: &str) -> Result<&str, AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request("Title required"));
    }
    Ok(trimmed)
}

fn rank_ids(todo_ids: &[Uuid]) -> Result<Vec<(Uuid, i32)>, AppError> {
    let mut seen = HashSet::with_capacity(todo_ids.len());
    todo_ids
        .iter()
        .enumerate()
        .map(|(index, id)| {
            if !seen.insert(*id) {
                return Err(AppError::bad_request(format!("Duplicate todo id {id}")));
            }
            let position = i32::try_from(index)
                .map_err(|_| AppError::bad_request("Too many todo ids"))?;
            Ok((*id, position))
        })
        .collect()
}

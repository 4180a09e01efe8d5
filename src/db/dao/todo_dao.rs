use sea_orm::{ConnectionTrait, DatabaseConnection};
use uuid::Uuid;

use super::{ColumnFilter, DaoResult, VersionedDao};
use crate::db::entities::prelude::{Todo, TodoAudit};
use crate::db::entities::todo;

#[derive(Clone)]
pub struct TodoDao {
    db: DatabaseConnection,
}

impl VersionedDao for TodoDao {
    type Entity = Todo;
    type History = TodoAudit;
    const ENTITY_NAME: &'static str = "todo";

    fn from_db(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl TodoDao {
    pub async fn find_active<C>(&self, conn: &C, entity_id: Uuid) -> DaoResult<todo::Model>
    where
        C: ConnectionTrait + Send + Sync,
    {
        self.get_one(conn, &[ColumnFilter::eq(todo::Column::EntityId, entity_id)])
            .await
    }

    /// Active todos of one person; `completed` narrows by completion state.
    pub async fn list_for_person<C>(
        &self,
        conn: &C,
        person_id: Uuid,
        completed: Option<bool>,
    ) -> DaoResult<Vec<todo::Model>>
    where
        C: ConnectionTrait + Send + Sync,
    {
        let mut filters = vec![ColumnFilter::eq(todo::Column::PersonId, person_id)];
        if let Some(completed) = completed {
            filters.push(ColumnFilter::eq(todo::Column::IsCompleted, completed));
        }
        self.get_many(conn, &filters).await
    }
}

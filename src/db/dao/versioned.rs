use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, FromQueryResult, IntoActiveModel, QueryFilter, Select, TransactionSession,
    TransactionTrait, Value,
};
use uuid::Uuid;

use super::error::{DaoLayerError, DaoResult};
use super::versioned_traits::{VersionStamp, VersionedEntity, VersionedModel};

pub type VersionedModelOf<D> = <<D as VersionedDao>::Entity as EntityTrait>::Model;
pub type VersionedColumnOf<D> = <<D as VersionedDao>::Entity as EntityTrait>::Column;

/// Exact-match condition on one column of the current view.
#[derive(Debug, Clone)]
pub struct ColumnFilter<C> {
    pub column: C,
    pub value: Value,
}

impl<C: ColumnTrait> ColumnFilter<C> {
    pub fn eq(column: C, value: impl Into<Value>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

fn apply_filters<E: EntityTrait>(select: Select<E>, filters: &[ColumnFilter<E::Column>]) -> Select<E> {
    filters.iter().fold(select, |select, filter| {
        select.filter(filter.column.eq(filter.value.clone()))
    })
}

fn describe_filters<C: ColumnTrait>(filters: &[ColumnFilter<C>]) -> String {
    filters
        .iter()
        .map(|filter| format!("{:?}={:?}", filter.column, filter.value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Append-only persistence for entities stored as a current view plus a
/// history view.
///
/// Every write goes through [`VersionedDao::save`], which links the new
/// version to the one it replaces and moves the replaced row into the
/// history table. Reads only ever see current, active rows.
///
/// All operations take the connection explicitly so callers can run several
/// of them inside one transaction obtained from [`VersionedDao::begin`].
#[async_trait::async_trait]
pub trait VersionedDao: Clone + Send + Sync + Sized
where
    <Self::Entity as EntityTrait>::Model: VersionedModel
        + FromQueryResult
        + IntoActiveModel<<Self::Entity as EntityTrait>::ActiveModel>
        + Clone
        + Send
        + Sync,
    <Self::Entity as EntityTrait>::ActiveModel:
        ActiveModelTrait<Entity = Self::Entity> + Send + Sync,
    <Self::History as EntityTrait>::Model:
        FromQueryResult + Into<<Self::Entity as EntityTrait>::Model> + Send + Sync,
    <Self::History as EntityTrait>::ActiveModel: ActiveModelTrait<Entity = Self::History>
        + From<<Self::Entity as EntityTrait>::Model>
        + Send
        + Sync,
{
    type Entity: VersionedEntity + Send + Sync;
    type History: VersionedEntity + Send + Sync;
    const ENTITY_NAME: &'static str;

    fn from_db(db: DatabaseConnection) -> Self;

    fn new(db: &DatabaseConnection) -> Self {
        Self::from_db(db.clone())
    }

    fn db(&self) -> &DatabaseConnection;

    async fn begin(&self) -> DaoResult<DatabaseTransaction> {
        self.db().begin().await.map_err(DaoLayerError::from)
    }

    async fn get_one<C>(
        &self,
        conn: &C,
        filters: &[ColumnFilter<VersionedColumnOf<Self>>],
    ) -> DaoResult<VersionedModelOf<Self>>
    where
        C: ConnectionTrait + Send + Sync,
    {
        let active = Self::Entity::find().filter(Self::Entity::active_column().eq(true));
        apply_filters(active, filters)
            .one(conn)
            .await
            .map_err(DaoLayerError::from)?
            .ok_or_else(|| DaoLayerError::NotFound {
                entity: Self::ENTITY_NAME,
                criteria: describe_filters(filters),
            })
    }

    /// Unordered; ranking is up to the caller.
    async fn get_many<C>(
        &self,
        conn: &C,
        filters: &[ColumnFilter<VersionedColumnOf<Self>>],
    ) -> DaoResult<Vec<VersionedModelOf<Self>>>
    where
        C: ConnectionTrait + Send + Sync,
    {
        let active = Self::Entity::find().filter(Self::Entity::active_column().eq(true));
        apply_filters(active, filters)
            .all(conn)
            .await
            .map_err(DaoLayerError::from)
    }

    /// Commits `model` as the new current version of its entity.
    ///
    /// `model.version()` must be the version the caller read (or
    /// `Uuid::nil()` for an entity that was never saved). Anything else is a
    /// [`DaoLayerError::Conflict`]; lock and serialization failures come back
    /// as [`DaoLayerError::Contended`]. The write runs in its own nested
    /// transaction, so a failed save leaves neither view touched.
    async fn save<C>(
        &self,
        conn: &C,
        model: VersionedModelOf<Self>,
        changed_by_id: Uuid,
    ) -> DaoResult<VersionedModelOf<Self>>
    where
        C: ConnectionTrait + TransactionTrait + Send + Sync,
    {
        let mut model = model;
        let entity_id = model.entity_id();
        let expected = model.version();

        let txn = conn.begin().await?;
        let stored = Self::Entity::find()
            .filter(Self::Entity::entity_id_column().eq(entity_id))
            .one(&txn)
            .await?;

        let outgoing = match stored {
            None if expected.is_nil() => None,
            None => {
                return Err(DaoLayerError::NotFound {
                    entity: Self::ENTITY_NAME,
                    criteria: format!("entity_id={entity_id}"),
                });
            }
            Some(stored) => {
                if stored.version() != expected {
                    return Err(DaoLayerError::Conflict {
                        entity: Self::ENTITY_NAME,
                        entity_id,
                        expected,
                    });
                }
                if !stored.is_active() {
                    return Err(DaoLayerError::NotFound {
                        entity: Self::ENTITY_NAME,
                        criteria: format!("entity_id={entity_id}"),
                    });
                }
                Some(stored)
            }
        };

        model.stamp(VersionStamp {
            version: Uuid::new_v4(),
            previous_version: outgoing.as_ref().map(|_| expected),
            changed_by_id,
            changed_on: Utc::now().fixed_offset(),
        });
        let active = model.clone().into_active_model().reset_all();

        match outgoing {
            None => {
                Self::Entity::insert(active)
                    .exec_without_returning(&txn)
                    .await?;
            }
            Some(outgoing) => {
                // The conditional update goes first: it takes the row lock,
                // so a concurrent writer with the same expected version waits
                // here and then matches zero rows.
                let result = Self::Entity::update_many()
                    .set(active)
                    .filter(Self::Entity::entity_id_column().eq(entity_id))
                    .filter(Self::Entity::version_column().eq(expected))
                    .exec(&txn)
                    .await?;
                if result.rows_affected == 0 {
                    return Err(DaoLayerError::Conflict {
                        entity: Self::ENTITY_NAME,
                        entity_id,
                        expected,
                    });
                }
                let row: <Self::History as EntityTrait>::ActiveModel = outgoing.into();
                Self::History::insert(row)
                    .exec_without_returning(&txn)
                    .await?;
            }
        }

        txn.commit().await?;
        Ok(model)
    }

    /// Soft delete: the entity is saved once more with `active = false`.
    async fn delete<C>(
        &self,
        conn: &C,
        model: VersionedModelOf<Self>,
        changed_by_id: Uuid,
    ) -> DaoResult<VersionedModelOf<Self>>
    where
        C: ConnectionTrait + TransactionTrait + Send + Sync,
    {
        let mut model = model;
        model.deactivate();
        self.save(conn, model, changed_by_id).await
    }

    /// Every version of an entity, newest first, deleted entities included.
    async fn history<C>(&self, conn: &C, entity_id: Uuid) -> DaoResult<Vec<VersionedModelOf<Self>>>
    where
        C: ConnectionTrait + Send + Sync,
    {
        let current = Self::Entity::find()
            .filter(Self::Entity::entity_id_column().eq(entity_id))
            .one(conn)
            .await?
            .ok_or_else(|| DaoLayerError::NotFound {
                entity: Self::ENTITY_NAME,
                criteria: format!("entity_id={entity_id}"),
            })?;

        let mut older: HashMap<Uuid, VersionedModelOf<Self>> = Self::History::find()
            .filter(Self::History::entity_id_column().eq(entity_id))
            .all(conn)
            .await?
            .into_iter()
            .map(|row| {
                let model: VersionedModelOf<Self> = row.into();
                (model.version(), model)
            })
            .collect();

        let mut cursor = current.previous_version();
        let mut chain = vec![current];
        while let Some(version) = cursor {
            // Removing each link as it is visited also stops a cyclic chain.
            let entry = older
                .remove(&version)
                .ok_or(DaoLayerError::BrokenHistory { entity_id, version })?;
            cursor = entry.previous_version();
            chain.push(entry);
        }

        if let Some(version) = older.into_keys().next() {
            return Err(DaoLayerError::BrokenHistory { entity_id, version });
        }

        Ok(chain)
    }
}

use sea_orm::entity::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Version metadata applied to a model when the store commits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionStamp {
    pub version: Uuid,
    pub previous_version: Option<Uuid>,
    pub changed_by_id: Uuid,
    pub changed_on: DateTimeWithTimeZone,
}

/// Accessors for the version-chain columns injected by `#[versioned_entity]`.
pub trait VersionedModel {
    fn entity_id(&self) -> Uuid;
    fn version(&self) -> Uuid;
    /// `None` marks the root of the chain.
    fn previous_version(&self) -> Option<Uuid>;
    fn is_active(&self) -> bool;
    fn changed_by_id(&self) -> Uuid;
    fn changed_on(&self) -> DateTimeWithTimeZone;
    fn stamp(&mut self, stamp: VersionStamp);
    fn deactivate(&mut self);
}

pub trait VersionedEntity: sea_orm::EntityTrait {
    fn entity_id_column() -> Self::Column;
    fn version_column() -> Self::Column;
    fn active_column() -> Self::Column;
}

use chrono::Utc;
use sea_orm::entity::prelude::*;
use versioned_entity_derive::versioned_entity;

/// Current view: the latest version of every todo, deleted ones included.
#[versioned_entity]
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, DeriveEntityModel)]
#[sea_orm(table_name = "todo")]
pub struct Model {
    #[sea_orm(indexed)]
    pub person_id: Uuid,
    pub title: String,
    #[sea_orm(indexed, default_value = false)]
    pub is_completed: bool,
    #[sea_orm(indexed, default_value = 0)]
    pub position: i32,
    pub created_on: DateTimeWithTimeZone,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// A fresh, incomplete todo ranked at the top of the owner's list.
    ///
    /// The version fields are placeholders until the store stamps the first
    /// version on save.
    pub fn new(person_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now().fixed_offset();
        Self {
            entity_id: Uuid::new_v4(),
            version: Uuid::nil(),
            previous_version: None,
            active: true,
            changed_by_id: person_id,
            changed_on: now,
            person_id,
            title: title.into(),
            is_completed: false,
            position: 0,
            created_on: now,
        }
    }
}

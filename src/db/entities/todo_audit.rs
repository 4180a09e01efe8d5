use sea_orm::{ActiveValue::Set, entity::prelude::*};
use versioned_entity_derive::versioned_entity;

use super::todo;

/// History view: every version a todo has been saved out of.
#[versioned_entity(kind = "history")]
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, DeriveEntityModel)]
#[sea_orm(table_name = "todo_audit")]
pub struct Model {
    pub person_id: Uuid,
    pub title: String,
    pub is_completed: bool,
    pub position: i32,
    pub created_on: DateTimeWithTimeZone,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<todo::Model> for ActiveModel {
    fn from(model: todo::Model) -> Self {
        Self {
            entity_id: Set(model.entity_id),
            version: Set(model.version),
            previous_version: Set(model.previous_version),
            active: Set(model.active),
            changed_by_id: Set(model.changed_by_id),
            changed_on: Set(model.changed_on),
            person_id: Set(model.person_id),
            title: Set(model.title),
            is_completed: Set(model.is_completed),
            position: Set(model.position),
            created_on: Set(model.created_on),
        }
    }
}

impl From<Model> for todo::Model {
    fn from(model: Model) -> Self {
        Self {
            entity_id: model.entity_id,
            version: model.version,
            previous_version: model.previous_version,
            active: model.active,
            changed_by_id: model.changed_by_id,
            changed_on: model.changed_on,
            person_id: model.person_id,
            title: model.title,
            is_completed: model.is_completed,
            position: model.position,
            created_on: model.created_on,
        }
    }
}

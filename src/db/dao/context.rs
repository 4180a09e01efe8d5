use sea_orm::DatabaseConnection;

use super::{TodoDao, VersionedDao};

#[derive(Clone)]
pub struct DaoContext {
    db: DatabaseConnection,
}

impl DaoContext {
    pub fn new(db: &DatabaseConnection) -> Self {
        Self { db: db.clone() }
    }

    pub fn todo(&self) -> TodoDao {
        VersionedDao::new(&self.db)
    }
}

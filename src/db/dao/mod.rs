mod context;
pub mod error;
pub mod todo_dao;
pub mod versioned;
pub mod versioned_traits;

pub use context::DaoContext;
pub use error::{DaoLayerError, DaoResult};
pub use todo_dao::TodoDao;
pub use versioned::{ColumnFilter, VersionedColumnOf, VersionedDao, VersionedModelOf};
pub use versioned_traits::{VersionStamp, VersionedEntity, VersionedModel};

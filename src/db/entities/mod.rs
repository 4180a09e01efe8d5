#[allow(unused_imports)]
pub mod prelude {
    pub use super::todo::Entity as Todo;
    pub use super::todo_audit::Entity as TodoAudit;
}

pub mod todo;
pub mod todo_audit;

use sea_orm::{DbErr, RuntimeErr, SqlErr};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DaoLayerError {
    #[error("Database error: {0}")]
    Db(#[source] DbErr),
    /// Another writer held or changed the same rows (lock timeout,
    /// serialization failure, key collision). Replaying the operation is
    /// expected to succeed.
    #[error("Database contention: {0}")]
    Contended(#[source] DbErr),
    #[error("{entity} not found ({criteria})")]
    NotFound {
        entity: &'static str,
        criteria: String,
    },
    #[error("{entity} {entity_id} was modified concurrently (expected version {expected})")]
    Conflict {
        entity: &'static str,
        entity_id: Uuid,
        expected: Uuid,
    },
    #[error("history of {entity_id} is broken at version {version}")]
    BrokenHistory { entity_id: Uuid, version: Uuid },
}

pub type DaoResult<T> = Result<T, DaoLayerError>;

impl DaoLayerError {
    /// True for both ways of losing a write race.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DaoLayerError::Conflict { .. } | DaoLayerError::Contended(_)
        )
    }
}

impl From<DbErr> for DaoLayerError {
    fn from(err: DbErr) -> Self {
        if is_contention(&err) {
            DaoLayerError::Contended(err)
        } else {
            DaoLayerError::Db(err)
        }
    }
}

fn is_contention(err: &DbErr) -> bool {
    // The only unique keys are the primary keys of the current and history
    // views, so a collision means two writers raced on one entity.
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }

    let runtime = match err {
        DbErr::Exec(runtime) | DbErr::Query(runtime) | DbErr::Conn(runtime) => runtime,
        _ => return false,
    };
    let RuntimeErr::SqlxError(sqlx_err) = runtime else {
        return false;
    };
    sqlx_err
        .as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| is_contention_code(&code))
}

fn is_contention_code(code: &str) -> bool {
    match code {
        // Postgres: serialization_failure, deadlock_detected, lock_not_available.
        "40001" | "40P01" | "55P03" => true,
        // SQLite result codes are numeric and at most four digits; the low
        // byte is the primary code (5 = BUSY, 6 = LOCKED).
        _ if code.len() < 5 => code
            .parse::<i32>()
            .is_ok_and(|code| matches!(code & 0xff, 5 | 6)),
        _ => false,
    }
}

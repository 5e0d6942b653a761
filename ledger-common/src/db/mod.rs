use diesel_async::pooled_connection::bb8::Pool as AsyncPool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::AsyncPgConnection;
use std::fmt;
use std::time::Duration;

pub mod category;
pub mod permission;
pub mod user;
pub mod ynab;

pub type DbAsyncPool = AsyncPool<AsyncPgConnection>;

#[derive(Clone, Debug)]
pub struct DbPoolBounds {
    pub max_connections: u32,
    pub min_idle: Option<u32>,
    pub max_lifetime: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

pub async fn create_db_async_pool(
    database_uri: &str,
    bounds: &DbPoolBounds,
) -> Result<DbAsyncPool, DaoError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_uri);
    AsyncPool::builder()
        .max_size(bounds.max_connections)
        .min_idle(bounds.min_idle)
        .max_lifetime(bounds.max_lifetime)
        .idle_timeout(bounds.idle_timeout)
        .build(config)
        .await
        .map_err(|e| DaoError::DbAsyncPoolFailure(e.to_string()))
}

#[derive(Debug)]
pub enum DaoError {
    DbAsyncPoolFailure(String),
    QueryFailure(diesel::result::Error),
    // Deadlock, lock timeout or serialization failure. The statement may succeed if rerun.
    LockContention(diesel::result::Error),
}

impl std::error::Error for DaoError {}

impl fmt::Display for DaoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaoError::DbAsyncPoolFailure(e) => {
                write!(f, "DaoError: Failed to obtain async DB connection: {e}")
            }
            DaoError::QueryFailure(e) => {
                write!(f, "DaoError: Query failed: {e}")
            }
            DaoError::LockContention(e) => {
                write!(f, "DaoError: Lock contention: {e}")
            }
        }
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<bb8::RunError<E>> for DaoError {
    fn from(error: bb8::RunError<E>) -> Self {
        DaoError::DbAsyncPoolFailure(error.to_string())
    }
}

impl From<diesel::result::Error> for DaoError {
    fn from(error: diesel::result::Error) -> Self {
        if is_lock_contention(&error) {
            DaoError::LockContention(error)
        } else {
            DaoError::QueryFailure(error)
        }
    }
}

// Postgres reports 40P01 (deadlock_detected) and 55P03 (lock_not_available) without a
// dedicated diesel kind, so those are recognized by their server message prefix.
fn is_lock_contention(error: &diesel::result::Error) -> bool {
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => true,
        DieselError::DatabaseError(_, info) => {
            let message = info.message();
            message.starts_with("deadlock detected")
                || message.starts_with("could not obtain lock")
                || message.starts_with("canceling statement due to lock timeout")
        }
        _ => false,
    }
}

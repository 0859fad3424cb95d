//! Typed classification of storage failures.
//!
//! The synchronizer reacts differently to a dropped connection (abandon the
//! current item, let the pool hand out a fresh connection) than to a
//! duplicate-key race with a concurrent sync (benign skip). Classification
//! happens here, at the database boundary, from sqlx error kinds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection dropped mid-operation. The affected item is abandoned;
    /// the pool replaces the broken connection on the next acquire.
    #[error("database connection lost: {0}")]
    ConnectionLost(#[source] sqlx::Error),

    /// A uniqueness constraint fired, e.g. two overlapping sync passes
    /// inserting the same (folder, uid) pair.
    #[error("duplicate key: {0}")]
    DuplicateKey(#[source] sqlx::Error),

    #[error(transparent)]
    Other(sqlx::Error),
}

impl StoreError {
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, StoreError::ConnectionLost(_))
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db)
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                StoreError::DuplicateKey(err)
            }
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::ConnectionLost(err),
            _ => StoreError::Other(err),
        }
    }
}

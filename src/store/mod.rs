//! SQLite mirror of the remote mailbox.
//!
//! This module is split into:
//! - `mod.rs` - Store struct and connection pool
//! - `schema.rs` - Database schema initialization
//! - `error.rs` - Typed classification of storage failures
//! - `folder.rs` - Folder record operations
//! - `message.rs` - Message reconciliation and persistence
//! - `attachment.rs` - Attachment row operations

mod attachment;
mod error;
mod folder;
mod message;
mod schema;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

pub use attachment::{AttachmentRecord, AttachmentRow};
pub use error::StoreError;
pub use folder::FolderRow;
pub use message::{FolderStatus, MessageRow, NewMessage, SyncedMessage};

/// Connection pool size. The scheduler and a concurrent manual sync can each
/// hold a connection while status queries run alongside.
const POOL_SIZE: u32 = 8;

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn open(path: &Path) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(POOL_SIZE)
            .connect_with(options)
            .await
            .context("Failed to create connection pool")?;

        schema::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to create in-memory connection pool")?;

        schema::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    //
    // Folder Operations (delegated to folder module)
    //

    pub async fn list_folders(&self) -> Result<Vec<FolderRow>> {
        folder::list_folders(&self.pool).await
    }

    pub async fn folder_exists(&self, name: &str) -> Result<bool> {
        folder::folder_exists(&self.pool, name).await
    }

    pub async fn insert_folder(&self, name: &str, display_name: &str, is_system: bool) -> Result<()> {
        folder::insert_folder(&self.pool, name, display_name, is_system).await
    }

    pub async fn delete_invalid_folders(&self) -> Result<u64> {
        folder::delete_invalid_folders(&self.pool).await
    }

    pub async fn prune_absent_folders(&self, server_names: &[String]) -> Result<u64> {
        folder::prune_absent_folders(&self.pool, server_names).await
    }

    //
    // Message Operations (delegated to message module)
    //

    pub async fn insert_message(
        &self,
        msg: &NewMessage,
        attachments: &[AttachmentRecord],
        now: i64,
    ) -> Result<i64, StoreError> {
        message::insert_message(&self.pool, msg, attachments, now).await
    }

    pub async fn touch_message(&self, folder: &str, uid: u32, now: i64) -> Result<bool> {
        message::touch_message(&self.pool, folder, uid, now).await
    }

    pub async fn synced_messages_in(&self, folder: &str) -> Result<Vec<SyncedMessage>> {
        message::synced_messages_in(&self.pool, folder).await
    }

    pub async fn message_id_in_other_folder(&self, message_id: &str, folder: &str) -> Result<bool> {
        message::message_id_in_other_folder(&self.pool, message_id, folder).await
    }

    pub async fn mark_deleted_on_server(&self, id: i64, now: i64) -> Result<()> {
        message::mark_deleted_on_server(&self.pool, id, now).await
    }

    pub async fn delete_message(&self, id: i64) -> Result<()> {
        message::delete_message(&self.pool, id).await
    }

    #[allow(dead_code)]
    pub async fn get_message(&self, folder: &str, uid: u32) -> Result<Option<MessageRow>> {
        message::get_message(&self.pool, folder, uid).await
    }

    pub async fn folder_status(&self, folder: &str) -> Result<FolderStatus> {
        message::folder_status(&self.pool, folder).await
    }

    //
    // Attachment Operations (delegated to attachment module)
    //

    #[allow(dead_code)]
    pub async fn attachments_for(&self, message_rowid: i64) -> Result<Vec<AttachmentRow>> {
        attachment::attachments_for(&self.pool, message_rowid).await
    }
}

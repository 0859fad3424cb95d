//! Database schema initialization.

use anyhow::Result;
use sqlx::SqlitePool;

/// Initialize database schema with all tables and indexes.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- Mirrored IMAP folders
        CREATE TABLE IF NOT EXISTS folders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL DEFAULT '',
            is_system INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        -- Mirrored messages. uid is NULL for locally composed mail, which the
        -- synchronizer never touches; (folder, uid) is unique for synced rows.
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id TEXT NOT NULL,
            folder TEXT NOT NULL,
            uid INTEGER,
            sender TEXT NOT NULL DEFAULT '',
            recipient TEXT NOT NULL DEFAULT '',
            cc TEXT NOT NULL DEFAULT '',
            subject TEXT NOT NULL DEFAULT '',
            body_text TEXT,
            body_html TEXT,
            received_at INTEGER NOT NULL,
            has_attachments INTEGER NOT NULL DEFAULT 0,
            last_synced_at INTEGER,
            deleted_on_server INTEGER NOT NULL DEFAULT 0,
            UNIQUE (folder, uid)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_message_id ON messages(message_id);
        CREATE INDEX IF NOT EXISTS idx_messages_folder ON messages(folder);
        CREATE INDEX IF NOT EXISTS idx_messages_folder_received ON messages(folder, received_at DESC);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        -- Attachments belong to exactly one message and die with it.
        -- content (inline bytes) and file_path (spooled) are mutually
        -- exclusive, selected by is_large_file.
        CREATE TABLE IF NOT EXISTS attachments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_rowid INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            filename TEXT NOT NULL DEFAULT '',
            content_type TEXT NOT NULL DEFAULT 'application/octet-stream',
            content BLOB,
            file_path TEXT,
            is_large_file INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_attachments_message ON attachments(message_rowid);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

//! Attachment row operations.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

/// A materialized attachment ready for persistence: either inline bytes or a
/// spooled file path, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRecord {
    pub filename: String,
    pub content_type: String,
    pub content: Option<Vec<u8>>,
    pub file_path: Option<String>,
    pub is_large_file: bool,
}

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct AttachmentRow {
    pub id: i64,
    pub filename: String,
    pub content_type: String,
    pub content: Option<Vec<u8>>,
    pub file_path: Option<String>,
    pub is_large_file: bool,
}

/// Insert attachment rows for a message inside the caller's transaction.
pub(crate) async fn insert_attachments(
    conn: &mut sqlx::SqliteConnection,
    message_rowid: i64,
    attachments: &[AttachmentRecord],
) -> Result<(), sqlx::Error> {
    for attachment in attachments {
        sqlx::query(
            "INSERT INTO attachments (message_rowid, filename, content_type, content, file_path, is_large_file) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(message_rowid)
        .bind(&attachment.filename)
        .bind(&attachment.content_type)
        .bind(&attachment.content)
        .bind(&attachment.file_path)
        .bind(attachment.is_large_file)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn attachments_for(pool: &SqlitePool, message_rowid: i64) -> Result<Vec<AttachmentRow>> {
    let rows = sqlx::query(
        "SELECT id, filename, content_type, content, file_path, is_large_file \
         FROM attachments WHERE message_rowid = ? ORDER BY id",
    )
    .bind(message_rowid)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| AttachmentRow {
            id: row.get("id"),
            filename: row.get("filename"),
            content_type: row.get("content_type"),
            content: row.get("content"),
            file_path: row.get("file_path"),
            is_large_file: row.get("is_large_file"),
        })
        .collect())
}

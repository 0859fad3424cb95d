//! Message row operations: sync reconciliation queries, the short-circuit
//! refresh, and the transactional insert with attachments.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::attachment::{self, AttachmentRecord};
use super::error::StoreError;

/// A fully parsed message ready for its first insert.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub message_id: String,
    pub folder: String,
    pub uid: u32,
    pub sender: String,
    pub recipient: String,
    pub cc: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub received_at: i64,
    pub has_attachments: bool,
}

/// The slice of a stored message the reconciliation pass needs.
#[derive(Debug, Clone)]
pub struct SyncedMessage {
    pub id: i64,
    pub uid: u32,
    pub message_id: String,
    pub deleted_on_server: bool,
}

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct MessageRow {
    pub id: i64,
    pub message_id: String,
    pub folder: String,
    pub uid: Option<u32>,
    pub sender: String,
    pub recipient: String,
    pub cc: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub received_at: i64,
    pub has_attachments: bool,
    pub last_synced_at: Option<i64>,
    pub deleted_on_server: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FolderStatus {
    pub messages: i64,
    pub tombstones: i64,
    pub last_synced_at: Option<i64>,
}

fn row_to_message(row: SqliteRow) -> MessageRow {
    MessageRow {
        id: row.get("id"),
        message_id: row.get("message_id"),
        folder: row.get("folder"),
        uid: row.get::<Option<i64>, _>("uid").map(|v| v as u32),
        sender: row.get("sender"),
        recipient: row.get("recipient"),
        cc: row.get("cc"),
        subject: row.get("subject"),
        body_text: row.get("body_text"),
        body_html: row.get("body_html"),
        received_at: row.get("received_at"),
        has_attachments: row.get("has_attachments"),
        last_synced_at: row.get("last_synced_at"),
        deleted_on_server: row.get("deleted_on_server"),
    }
}

/// Insert a new message and its attachments in one transaction.
/// Returns the new row id. Errors carry a [`StoreError`] classification so
/// the synchronizer can tell a duplicate-key race from a lost connection.
pub async fn insert_message(
    pool: &SqlitePool,
    msg: &NewMessage,
    attachments: &[AttachmentRecord],
    now: i64,
) -> Result<i64, StoreError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO messages
        (message_id, folder, uid, sender, recipient, cc, subject, body_text, body_html,
         received_at, has_attachments, last_synced_at, deleted_on_server)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
        "#,
    )
    .bind(&msg.message_id)
    .bind(&msg.folder)
    .bind(msg.uid as i64)
    .bind(&msg.sender)
    .bind(&msg.recipient)
    .bind(&msg.cc)
    .bind(&msg.subject)
    .bind(&msg.body_text)
    .bind(&msg.body_html)
    .bind(msg.received_at)
    .bind(msg.has_attachments)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let id = result.last_insert_rowid();

    attachment::insert_attachments(&mut *tx, id, attachments).await?;

    tx.commit().await?;
    Ok(id)
}

/// Refresh the sync timestamp and clear the tombstone flag for an existing
/// (folder, uid) row. Returns false when no such row exists, i.e. the message
/// is new and needs a full fetch.
pub async fn touch_message(pool: &SqlitePool, folder: &str, uid: u32, now: i64) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE messages SET last_synced_at = ?, deleted_on_server = 0 WHERE folder = ? AND uid = ?",
    )
    .bind(now)
    .bind(folder)
    .bind(uid as i64)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// All server-synced rows of a folder (locally composed rows have no uid and
/// are excluded).
pub async fn synced_messages_in(pool: &SqlitePool, folder: &str) -> Result<Vec<SyncedMessage>> {
    let rows = sqlx::query(
        "SELECT id, uid, message_id, deleted_on_server FROM messages \
         WHERE folder = ? AND uid IS NOT NULL",
    )
    .bind(folder)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| SyncedMessage {
            id: row.get("id"),
            uid: row.get::<i64, _>("uid") as u32,
            message_id: row.get("message_id"),
            deleted_on_server: row.get("deleted_on_server"),
        })
        .collect())
}

/// Whether the same protocol message identifier is stored under a different
/// folder, which marks a disappearance from `folder` as a move.
pub async fn message_id_in_other_folder(
    pool: &SqlitePool,
    message_id: &str,
    folder: &str,
) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE message_id = ? AND folder != ?")
            .bind(message_id)
            .bind(folder)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// First phase of the two-phase delete: keep the row, flag it server-absent.
pub async fn mark_deleted_on_server(pool: &SqlitePool, id: i64, now: i64) -> Result<()> {
    sqlx::query("UPDATE messages SET deleted_on_server = 1, last_synced_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a message row; attachments cascade.
pub async fn delete_message(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM messages WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_message(pool: &SqlitePool, folder: &str, uid: u32) -> Result<Option<MessageRow>> {
    let row = sqlx::query("SELECT * FROM messages WHERE folder = ? AND uid = ?")
        .bind(folder)
        .bind(uid as i64)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_to_message))
}

pub async fn folder_status(pool: &SqlitePool, folder: &str) -> Result<FolderStatus> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS messages, \
                COALESCE(SUM(deleted_on_server), 0) AS tombstones, \
                MAX(last_synced_at) AS last_synced_at \
         FROM messages WHERE folder = ?",
    )
    .bind(folder)
    .fetch_one(pool)
    .await?;

    Ok(FolderStatus {
        messages: row.get("messages"),
        tombstones: row.get("tombstones"),
        last_synced_at: row.get("last_synced_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn sample_message(folder: &str, uid: u32, message_id: &str) -> NewMessage {
        NewMessage {
            message_id: message_id.to_string(),
            folder: folder.to_string(),
            uid,
            sender: "Alice <alice@example.com>".to_string(),
            recipient: "team@example.com".to_string(),
            cc: String::new(),
            subject: "Weekly report".to_string(),
            body_text: Some("All green.".to_string()),
            body_html: None,
            received_at: 1_700_000_000,
            has_attachments: false,
        }
    }

    #[tokio::test]
    async fn test_insert_and_touch() {
        let store = Store::open_in_memory().await.unwrap();

        let msg = sample_message("INBOX", 7, "<a@example.com>");
        let id = store.insert_message(&msg, &[], 100).await.unwrap();
        assert!(id > 0);

        let row = store.get_message("INBOX", 7).await.unwrap().unwrap();
        assert_eq!(row.subject, "Weekly report");
        assert_eq!(row.last_synced_at, Some(100));
        assert!(!row.deleted_on_server);

        // Touch refreshes the stamp and reports the row existed
        assert!(store.touch_message("INBOX", 7, 200).await.unwrap());
        let row = store.get_message("INBOX", 7).await.unwrap().unwrap();
        assert_eq!(row.last_synced_at, Some(200));

        // Unknown uid reports absent
        assert!(!store.touch_message("INBOX", 8, 200).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_insert_classifies() {
        let store = Store::open_in_memory().await.unwrap();

        let msg = sample_message("INBOX", 7, "<a@example.com>");
        store.insert_message(&msg, &[], 100).await.unwrap();

        let err = store.insert_message(&msg, &[], 101).await.unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[tokio::test]
    async fn test_touch_clears_tombstone() {
        let store = Store::open_in_memory().await.unwrap();

        let msg = sample_message("INBOX", 3, "<b@example.com>");
        let id = store.insert_message(&msg, &[], 100).await.unwrap();
        store.mark_deleted_on_server(id, 150).await.unwrap();

        let row = store.get_message("INBOX", 3).await.unwrap().unwrap();
        assert!(row.deleted_on_server);

        store.touch_message("INBOX", 3, 200).await.unwrap();
        let row = store.get_message("INBOX", 3).await.unwrap().unwrap();
        assert!(!row.deleted_on_server);
    }

    #[tokio::test]
    async fn test_attachments_cascade_on_delete() {
        let store = Store::open_in_memory().await.unwrap();

        let msg = sample_message("INBOX", 9, "<c@example.com>");
        let attachments = vec![AttachmentRecord {
            filename: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            content: Some(vec![1, 2, 3]),
            file_path: None,
            is_large_file: false,
        }];
        let id = store.insert_message(&msg, &attachments, 100).await.unwrap();

        let stored = store.attachments_for(id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].filename, "report.pdf");
        assert_eq!(stored[0].content.as_deref(), Some(&[1u8, 2, 3][..]));

        store.delete_message(id).await.unwrap();
        assert!(store.attachments_for(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_move_lookup_and_folder_status() {
        let store = Store::open_in_memory().await.unwrap();

        let a = sample_message("INBOX", 1, "<moved@example.com>");
        let b = sample_message("Archive", 41, "<moved@example.com>");
        let c = sample_message("INBOX", 2, "<only@example.com>");
        store.insert_message(&a, &[], 100).await.unwrap();
        let id_b = store.insert_message(&b, &[], 100).await.unwrap();
        store.insert_message(&c, &[], 100).await.unwrap();

        assert!(
            store
                .message_id_in_other_folder("<moved@example.com>", "INBOX")
                .await
                .unwrap()
        );
        assert!(
            !store
                .message_id_in_other_folder("<only@example.com>", "INBOX")
                .await
                .unwrap()
        );

        store.mark_deleted_on_server(id_b, 150).await.unwrap();
        let status = store.folder_status("Archive").await.unwrap();
        assert_eq!(status.messages, 1);
        assert_eq!(status.tombstones, 1);
        assert_eq!(status.last_synced_at, Some(150));
    }
}

//! Folder record operations.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct FolderRow {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub is_system: bool,
}

pub async fn list_folders(pool: &SqlitePool) -> Result<Vec<FolderRow>> {
    let rows = sqlx::query(
        "SELECT id, name, display_name, is_system FROM folders ORDER BY is_system DESC, name ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| FolderRow {
            id: row.get("id"),
            name: row.get("name"),
            display_name: row.get("display_name"),
            is_system: row.get("is_system"),
        })
        .collect())
}

pub async fn folder_exists(pool: &SqlitePool, name: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn insert_folder(
    pool: &SqlitePool,
    name: &str,
    display_name: &str,
    is_system: bool,
) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO folders (name, display_name, is_system) VALUES (?, ?, ?)")
        .bind(name)
        .bind(display_name)
        .bind(is_system)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove folder rows with empty or slash-only names left behind by earlier
/// bad listings.
pub async fn delete_invalid_folders(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM folders WHERE TRIM(name) IN ('', '/')")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Delete local folders the server no longer reports, but only when they hold
/// no messages. Folders with messages are kept until they drain.
pub async fn prune_absent_folders(pool: &SqlitePool, server_names: &[String]) -> Result<u64> {
    let present: HashSet<&str> = server_names.iter().map(|s| s.as_str()).collect();
    let mut pruned = 0;

    for folder in list_folders(pool).await? {
        if present.contains(folder.name.as_str()) {
            continue;
        }
        let messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE folder = ?")
            .bind(&folder.name)
            .fetch_one(pool)
            .await?;
        if messages == 0 {
            sqlx::query("DELETE FROM folders WHERE id = ?")
                .bind(folder.id)
                .execute(pool)
                .await?;
            pruned += 1;
        }
    }

    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use crate::store::Store;

    #[tokio::test]
    async fn test_folder_crud() {
        let store = Store::open_in_memory().await.unwrap();

        store.insert_folder("INBOX", "INBOX", true).await.unwrap();
        store
            .insert_folder("Projects", "Projects", false)
            .await
            .unwrap();
        // Duplicate insert is ignored
        store.insert_folder("INBOX", "INBOX", true).await.unwrap();

        assert!(store.folder_exists("INBOX").await.unwrap());
        assert!(!store.folder_exists("Missing").await.unwrap());

        let folders = store.list_folders().await.unwrap();
        assert_eq!(folders.len(), 2);
        // System folders sort first
        assert_eq!(folders[0].name, "INBOX");
        assert!(folders[0].is_system);
    }

    #[tokio::test]
    async fn test_delete_invalid_folders() {
        let store = Store::open_in_memory().await.unwrap();

        store.insert_folder("/", "/", false).await.unwrap();
        store.insert_folder("  ", "  ", false).await.unwrap();
        store.insert_folder("Kept", "Kept", false).await.unwrap();

        let removed = store.delete_invalid_folders().await.unwrap();
        assert_eq!(removed, 2);

        let folders = store.list_folders().await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].name, "Kept");
    }
}

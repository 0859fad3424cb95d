//! Folder Synchronizer: mirror the server's folder listing into local
//! folder rows.

use anyhow::Result;
use std::fmt;

use crate::constants::SYSTEM_FOLDERS;
use crate::mail::ImapClient;
use crate::store::Store;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FolderSyncStats {
    pub synced: usize,
    pub skipped: usize,
    pub pruned: u64,
}

impl fmt::Display for FolderSyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} folders synced", self.synced)?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if self.pruned > 0 {
            write!(f, ", {} pruned", self.pruned)?;
        }
        Ok(())
    }
}

/// List server folders and mirror them into the store.
pub async fn sync_folders(client: &mut ImapClient, store: &Store) -> Result<FolderSyncStats> {
    let names = client.list_folders().await?;
    tracing::info!("Processing {} folders from IMAP server", names.len());
    apply_listing(store, &names).await
}

/// Apply one server folder listing: create unknown folders, clean up invalid
/// names, prune folders the server dropped once they hold no messages.
/// A failure on a single entry is logged and skipped, never fatal to the run.
pub(crate) async fn apply_listing(store: &Store, names: &[String]) -> Result<FolderSyncStats> {
    let mut stats = FolderSyncStats::default();
    let mut seen: Vec<String> = Vec::new();

    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed == "/" {
            tracing::debug!("Skipping invalid folder name: '{}'", name);
            stats.skipped += 1;
            continue;
        }
        seen.push(name.clone());

        match upsert_folder(store, name).await {
            Ok(()) => stats.synced += 1,
            Err(e) => {
                tracing::error!("Error processing folder '{}': {}", name, e);
                stats.skipped += 1;
            }
        }
    }

    stats.pruned += store.delete_invalid_folders().await?;
    stats.pruned += store.prune_absent_folders(&seen).await?;

    Ok(stats)
}

async fn upsert_folder(store: &Store, name: &str) -> Result<()> {
    if store.folder_exists(name).await? {
        return Ok(());
    }

    store
        .insert_folder(name, name, is_system_folder(name))
        .await?;
    tracing::info!("Added new folder: '{}'", name);
    Ok(())
}

pub(crate) fn is_system_folder(name: &str) -> bool {
    SYSTEM_FOLDERS.iter().any(|s| s.eq_ignore_ascii_case(name))
}

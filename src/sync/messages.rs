//! Message Synchronizer: reconcile one folder's server listing against the
//! local mirror, then fetch and persist a bounded window of recent messages.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;

use crate::constants::{CUSTOM_FOLDER_FETCH_WINDOW, SYSTEM_FOLDER_FETCH_WINDOW};
use crate::mail::{ImapClient, parser};
use crate::store::{FolderRow, NewMessage, Store};

use super::attachments::AttachmentSpool;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MessageSyncStats {
    pub new: usize,
    pub updated: usize,
    pub moved: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl fmt::Display for MessageSyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} new, {} updated, {} moved, {} deleted",
            self.new, self.updated, self.moved, self.deleted
        )?;
        if self.errors > 0 {
            write!(f, ", {} errors", self.errors)?;
        }
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        Ok(())
    }
}

/// Run the full per-folder sync state machine against the live session.
/// A failed SELECT aborts only this folder; per-message failures are absorbed
/// into the stats.
pub async fn sync_folder(
    client: &mut ImapClient,
    store: &Store,
    spool: &AttachmentSpool,
    folder: &FolderRow,
) -> Result<MessageSyncStats> {
    let mailbox = client.select_folder(&folder.name).await?;
    tracing::info!(
        "Folder '{}' contains {} messages",
        folder.name,
        mailbox.exists
    );

    let mut uids = client.search_all_uids().await?;

    let mut stats = MessageSyncStats::default();
    reconcile_missing(store, &folder.name, &uids, &mut stats).await?;

    let window = fetch_window(&mut uids, folder.is_system);
    tracing::info!(
        "Processing {} messages from folder '{}'",
        window.len(),
        folder.name
    );

    for &uid in window {
        // Existing rows only get their sync stamp refreshed; the body is
        // never re-fetched or re-parsed.
        match store
            .touch_message(&folder.name, uid, Utc::now().timestamp())
            .await
        {
            Ok(true) => {
                stats.updated += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Failed to refresh uid {} in '{}': {}", uid, folder.name, e);
                stats.errors += 1;
                continue;
            }
        }

        let raw = match client.fetch_message(uid).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to fetch uid {} from '{}': {}", uid, folder.name, e);
                stats.errors += 1;
                continue;
            }
        };

        ingest_raw(store, spool, &folder.name, uid, &raw, &mut stats).await;
    }

    Ok(stats)
}

/// Reconcile local rows whose UID is absent from the server listing.
///
/// Two-phase delete: a row absent once is tombstoned; absent again, it is
/// purged. A row whose Message-ID meanwhile exists in a different folder is
/// the stale end of a move and is deleted right away; the destination copy is
/// handled when that folder syncs.
pub(crate) async fn reconcile_missing(
    store: &Store,
    folder: &str,
    server_uids: &[u32],
    stats: &mut MessageSyncStats,
) -> Result<()> {
    let listed: HashSet<u32> = server_uids.iter().copied().collect();
    let now = Utc::now().timestamp();

    for local in store.synced_messages_in(folder).await? {
        if listed.contains(&local.uid) {
            continue;
        }

        if local.deleted_on_server {
            store.delete_message(local.id).await?;
            stats.deleted += 1;
        } else if store
            .message_id_in_other_folder(&local.message_id, folder)
            .await?
        {
            store.delete_message(local.id).await?;
            stats.moved += 1;
        } else {
            store.mark_deleted_on_server(local.id, now).await?;
            stats.deleted += 1;
        }
    }

    Ok(())
}

/// Bound the per-pass window to the most recent messages. UIDs are assigned
/// ascending within a UIDVALIDITY epoch (RFC 3501), so the highest UIDs are
/// the newest; sort before slicing the tail.
pub(crate) fn fetch_window(uids: &mut [u32], is_system: bool) -> &[u32] {
    uids.sort_unstable();
    let max = if is_system {
        SYSTEM_FOLDER_FETCH_WINDOW
    } else {
        CUSTOM_FOLDER_FETCH_WINDOW
    };
    let start = uids.len().saturating_sub(max);
    &uids[start..]
}

/// Deterministic-but-unique identifier for messages without a Message-ID
/// header.
pub(crate) fn synthesize_message_id(folder: &str, uid: u32) -> String {
    format!(
        "<{}_{}_{}@local>",
        folder,
        uid,
        Utc::now().format("%Y%m%d%H%M%S")
    )
}

/// Parse and persist one fetched message. All failure paths are absorbed
/// into the stats; nothing here aborts the folder pass.
pub(crate) async fn ingest_raw(
    store: &Store,
    spool: &AttachmentSpool,
    folder: &str,
    uid: u32,
    raw: &[u8],
    stats: &mut MessageSyncStats,
) {
    let Some(parsed) = parser::parse_message(raw) else {
        tracing::warn!("Failed to parse message uid {} in '{}'", uid, folder);
        stats.errors += 1;
        return;
    };

    let message_id = parsed
        .message_id
        .unwrap_or_else(|| synthesize_message_id(folder, uid));

    // A part that fails to materialize is skipped; the message still saves.
    let mut attachments = Vec::with_capacity(parsed.attachments.len());
    for part in &parsed.attachments {
        match spool.materialize(part) {
            Ok(record) => attachments.push(record),
            Err(e) => {
                tracing::error!(
                    "Failed to materialize attachment '{}' of uid {}: {}",
                    part.filename,
                    uid,
                    e
                );
            }
        }
    }

    let msg = NewMessage {
        message_id,
        folder: folder.to_string(),
        uid,
        sender: parsed.sender,
        recipient: parsed.recipient,
        cc: parsed.cc,
        subject: parsed.subject,
        body_text: parsed.body_text,
        body_html: parsed.body_html,
        received_at: parsed.received_at.unwrap_or_else(|| Utc::now().timestamp()),
        has_attachments: parsed.has_attachments,
    };

    match store
        .insert_message(&msg, &attachments, Utc::now().timestamp())
        .await
    {
        Ok(_) => stats.new += 1,
        Err(e) if e.is_duplicate_key() => {
            // A concurrent sync won the race; the row exists, nothing is lost
            tracing::debug!("Message already exists (duplicate key): {}", msg.message_id);
            stats.skipped += 1;
        }
        Err(e) if e.is_connection_lost() => {
            tracing::warn!(
                "Connection lost storing uid {} in '{}', abandoning item: {}",
                uid,
                folder,
                e
            );
            stats.errors += 1;
        }
        Err(e) => {
            tracing::error!("Error storing uid {} in '{}': {}", uid, folder, e);
            stats.errors += 1;
        }
    }
}

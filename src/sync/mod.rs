//! Mailbox synchronization engine.
//!
//! Data flow per pass: folder synchronizer -> message synchronizer (per
//! folder) -> attachment materializer -> store. Folders and messages are
//! processed sequentially; an overlapping manual pass is tolerated through
//! the store's duplicate-key handling.
//!
//! This module is split into:
//! - `mod.rs` - SyncEngine, one full pass over all folders
//! - `folders.rs` - Folder Synchronizer
//! - `messages.rs` - Message Synchronizer state machine
//! - `attachments.rs` - Attachment materialization
//! - `scheduler.rs` - Cancellable periodic loop

pub mod attachments;
pub mod folders;
pub mod messages;
pub mod scheduler;

use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;

use crate::config::{Config, MailboxConfig};
use crate::mail::ImapClient;
use crate::store::Store;

use attachments::AttachmentSpool;
use folders::FolderSyncStats;

pub struct SyncEngine {
    store: Arc<Store>,
    mailbox: MailboxConfig,
    password: String,
    spool: AttachmentSpool,
}

/// Human-readable outcome of one full pass.
#[derive(Debug)]
pub struct PassSummary {
    pub folders: FolderSyncStats,
    pub reports: Vec<String>,
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.folders)?;
        for line in &self.reports {
            writeln!(f, "  {}", line)?;
        }
        Ok(())
    }
}

impl SyncEngine {
    pub fn new(store: Arc<Store>, config: &Config, password: String) -> Result<Self> {
        let spool = AttachmentSpool::new(&config.upload_dir()?);
        Ok(Self {
            store,
            mailbox: config.mailbox.clone(),
            password,
            spool,
        })
    }

    /// One full pass: connect, mirror the folder listing, then sync every
    /// known folder in sequence. A connect failure aborts the pass; a single
    /// folder failing is reported and the rest continue.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let mut client = ImapClient::new(self.mailbox.clone(), self.password.clone());
        client.connect().await.context("IMAP connection failed")?;

        let folder_stats = folders::sync_folders(&mut client, &self.store).await?;
        tracing::info!("Folder sync completed: {}", folder_stats);

        let mut reports = Vec::new();
        for folder in self.store.list_folders().await? {
            match messages::sync_folder(&mut client, &self.store, &self.spool, &folder).await {
                Ok(stats) => {
                    tracing::info!("Folder '{}' sync completed: {}", folder.name, stats);
                    reports.push(format!("{}: {}", folder.display_name, stats));
                }
                Err(e) => {
                    tracing::warn!("Failed to sync folder '{}': {:#}", folder.name, e);
                    reports.push(format!("{}: failed: {:#}", folder.display_name, e));
                }
            }
        }

        client.disconnect().await;

        Ok(PassSummary {
            folders: folder_stats,
            reports,
        })
    }
}

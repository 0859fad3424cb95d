//! Daemon-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Interval between scheduled sync passes in seconds, used when the config
/// file does not override it.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

/// Most-recent messages processed per system folder per pass.
/// System folders are polled often, so a small window keeps passes cheap.
pub const SYSTEM_FOLDER_FETCH_WINDOW: usize = 50;

/// Most-recent messages processed per custom folder per pass.
/// Custom folders change rarely and get a deeper backfill window.
pub const CUSTOM_FOLDER_FETCH_WINDOW: usize = 200;

/// Attachment payloads at or below this size are stored inline in the
/// attachment row; larger payloads are spooled to disk. Keeps rows under
/// typical database packet limits while small attachments stay one query away.
pub const INLINE_ATTACHMENT_MAX_BYTES: usize = 1024 * 1024;

/// Well-known folder names that mark a folder as system-defined.
/// Matched case-insensitively against the server's folder names.
pub const SYSTEM_FOLDERS: [&str; 6] = ["INBOX", "Drafts", "Sent", "Archive", "Trash", "Spam"];

/// Fallback filename stem for attachments that arrive without one.
pub const DEFAULT_ATTACHMENT_NAME: &str = "attachment";

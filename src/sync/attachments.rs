//! Attachment materialization: small payloads stay inline in the attachment
//! row, large ones are spooled to disk and referenced by path.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_ATTACHMENT_NAME, INLINE_ATTACHMENT_MAX_BYTES};
use crate::mail::types::AttachmentPart;
use crate::store::AttachmentRecord;

pub struct AttachmentSpool {
    dir: PathBuf,
    inline_max: usize,
}

impl AttachmentSpool {
    pub fn new(upload_dir: &Path) -> Self {
        Self {
            dir: upload_dir.join("attachments"),
            inline_max: INLINE_ATTACHMENT_MAX_BYTES,
        }
    }

    /// Turn a decoded attachment part into a persistable record. Payloads at
    /// or below the inline threshold keep their bytes in the row; larger ones
    /// are written under the spool directory and only the path is stored.
    pub fn materialize(&self, part: &AttachmentPart) -> Result<AttachmentRecord> {
        if part.data.len() <= self.inline_max {
            return Ok(AttachmentRecord {
                filename: part.filename.clone(),
                content_type: part.content_type.clone(),
                content: Some(part.data.clone()),
                file_path: None,
                is_large_file: false,
            });
        }

        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create attachments directory {}", self.dir.display())
        })?;

        let path = self.unique_path(&sanitize_filename(&part.filename))?;
        fs::write(&path, &part.data)
            .with_context(|| format!("Failed to spool attachment to {}", path.display()))?;

        tracing::info!(
            "Spooled large attachment '{}' ({} bytes) to {}",
            part.filename,
            part.data.len(),
            path.display()
        );

        Ok(AttachmentRecord {
            filename: part.filename.clone(),
            content_type: part.content_type.clone(),
            content: None,
            file_path: Some(path.to_string_lossy().into_owned()),
            is_large_file: true,
        })
    }

    /// Timestamped path with a random suffix so repeated syncs of equal
    /// filenames never collide.
    fn unique_path(&self, safe_filename: &str) -> Result<PathBuf> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");

        let mut rand = [0u8; 4];
        getrandom::fill(&mut rand)
            .map_err(|e| anyhow::anyhow!("Failed to generate random suffix: {}", e))?;
        let suffix: String = rand.iter().map(|b| format!("{:02x}", b)).collect();

        Ok(self.dir.join(format!("{}_{}_{}", stamp, suffix, safe_filename)))
    }
}

/// Reduce a decoded filename to a safe character subset for the spool path.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let safe: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "._- ".contains(*c))
        .collect();

    if safe.trim_matches(['.', ' ']).is_empty() {
        DEFAULT_ATTACHMENT_NAME.to_string()
    } else {
        safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INLINE_ATTACHMENT_MAX_BYTES;

    fn part(filename: &str, size: usize) -> AttachmentPart {
        AttachmentPart {
            filename: filename.to_string(),
            content_type: "application/octet-stream".to_string(),
            data: vec![0x42; size],
        }
    }

    #[test]
    fn test_threshold_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let spool = AttachmentSpool::new(dir.path());

        // Exactly at the threshold: inline
        let record = spool
            .materialize(&part("exact.bin", INLINE_ATTACHMENT_MAX_BYTES))
            .unwrap();
        assert!(!record.is_large_file);
        assert_eq!(
            record.content.as_ref().map(|c| c.len()),
            Some(INLINE_ATTACHMENT_MAX_BYTES)
        );
        assert!(record.file_path.is_none());

        // One byte over: spooled to disk
        let record = spool
            .materialize(&part("over.bin", INLINE_ATTACHMENT_MAX_BYTES + 1))
            .unwrap();
        assert!(record.is_large_file);
        assert!(record.content.is_none());

        let path = record.file_path.as_deref().unwrap();
        let written = std::fs::read(path).unwrap();
        assert_eq!(written.len(), INLINE_ATTACHMENT_MAX_BYTES + 1);
    }

    #[test]
    fn test_spool_paths_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let spool = AttachmentSpool::new(dir.path());

        let a = spool
            .materialize(&part("same name.bin", INLINE_ATTACHMENT_MAX_BYTES + 1))
            .unwrap();
        let b = spool
            .materialize(&part("same name.bin", INLINE_ATTACHMENT_MAX_BYTES + 1))
            .unwrap();

        assert_ne!(a.file_path, b.file_path);
        assert!(std::path::Path::new(a.file_path.as_deref().unwrap()).exists());
        assert!(std::path::Path::new(b.file_path.as_deref().unwrap()).exists());
    }

    #[test]
    fn test_original_filename_survives_in_record() {
        let dir = tempfile::tempdir().unwrap();
        let spool = AttachmentSpool::new(dir.path());

        let record = spool
            .materialize(&part("bericht (März).pdf", INLINE_ATTACHMENT_MAX_BYTES + 1))
            .unwrap();

        // The row keeps the decoded name; only the on-disk name is sanitized
        assert_eq!(record.filename, "bericht (März).pdf");
        let path = record.file_path.as_deref().unwrap();
        assert!(!path.contains('('));
        assert!(path.contains("bericht"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_filename("invoice #42?.pdf"), "invoice 42.pdf");
        assert_eq!(sanitize_filename("§$%&"), "attachment");
        assert_eq!(sanitize_filename(""), "attachment");
    }
}

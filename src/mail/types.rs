/// One decoded MIME part classified as an attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentPart {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// The result of parsing one raw message: everything the synchronizer
/// persists, before identifiers are synthesized and attachments materialized.
#[derive(Debug, Clone, Default)]
pub struct ParsedMessage {
    /// Protocol Message-ID in angle-bracket form, if the header was present.
    pub message_id: Option<String>,
    pub sender: String,
    pub recipient: String,
    pub cc: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    /// Unix timestamp from the Date header, if it parsed.
    pub received_at: Option<i64>,
    pub attachments: Vec<AttachmentPart>,
    /// True when any attachment part was seen, even one whose payload could
    /// not be extracted.
    pub has_attachments: bool,
}

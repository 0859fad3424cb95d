use mail_parser::{Address, MessageParser, MessagePart, MimeHeaders, PartType};

use super::headers::decode_text;
use super::types::{AttachmentPart, ParsedMessage};
use crate::constants::DEFAULT_ATTACHMENT_NAME;

/// Parse a raw RFC822 message into the fields the synchronizer persists.
/// Returns None when the bytes do not parse as a message at all.
pub fn parse_message(raw: &[u8]) -> Option<ParsedMessage> {
    let message = MessageParser::default().parse(raw)?;

    let mut parsed = ParsedMessage {
        message_id: message.message_id().map(|id| format!("<{}>", id)),
        sender: format_addresses(message.from()),
        recipient: format_addresses(message.to()),
        cc: format_addresses(message.cc()),
        subject: message.subject().map(|s| s.to_string()).unwrap_or_default(),
        received_at: message.date().map(|d| d.to_timestamp()),
        ..ParsedMessage::default()
    };

    for part in message.parts.iter() {
        let content_type = part_content_type(part);
        let dispositioned = part.content_disposition().is_some_and(|d| {
            d.ctype().eq_ignore_ascii_case("attachment") || d.ctype().eq_ignore_ascii_case("inline")
        });

        if dispositioned && !content_type.starts_with("text/") {
            // Attachment part. The flag is set before payload extraction so a
            // part that fails to decode still marks the message.
            if matches!(part.body, PartType::Multipart(_)) {
                continue;
            }
            parsed.has_attachments = true;

            let data = part.contents();
            if data.is_empty() {
                tracing::debug!("skipping attachment part with empty payload");
                continue;
            }

            let filename = part
                .attachment_name()
                .map(|name| name.to_string())
                .unwrap_or_else(|| fallback_filename(&content_type, parsed.attachments.len()));

            parsed.attachments.push(AttachmentPart {
                filename,
                content_type,
                data: data.to_vec(),
            });
            continue;
        }

        match &part.body {
            PartType::Text(text) => {
                if parsed.body_text.is_none() && !text.trim().is_empty() {
                    parsed.body_text = Some(text.to_string());
                }
            }
            PartType::Html(html) => {
                if !html.trim().is_empty() {
                    append_html(&mut parsed.body_html, html);
                }
            }
            // Text parts mail-parser could not decode itself
            PartType::Binary(data) | PartType::InlineBinary(data)
                if content_type.starts_with("text/") =>
            {
                let charset = part.content_type().and_then(|ct| ct.attribute("charset"));
                let text = decode_text(data, charset);
                if text.trim().is_empty() {
                    continue;
                }
                if content_type.starts_with("text/html") {
                    append_html(&mut parsed.body_html, &text);
                } else if parsed.body_text.is_none() {
                    parsed.body_text = Some(text);
                }
            }
            _ => {}
        }
    }

    Some(parsed)
}

fn append_html(body_html: &mut Option<String>, html: &str) {
    match body_html {
        Some(existing) => {
            existing.push('\n');
            existing.push_str(html);
        }
        None => *body_html = Some(html.to_string()),
    }
}

fn part_content_type(part: &MessagePart) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(subtype) => format!("{}/{}", ct.ctype(), subtype).to_lowercase(),
            None => ct.ctype().to_lowercase(),
        })
        .unwrap_or_else(|| "text/plain".to_string())
}

/// Synthesize a filename for attachments that arrive without one.
fn fallback_filename(content_type: &str, index: usize) -> String {
    let extension = content_type.split('/').next_back().unwrap_or("bin");
    format!("{}_{}.{}", DEFAULT_ATTACHMENT_NAME, index, extension)
}

fn format_addresses(list: Option<&Address>) -> String {
    list.map(|addrs| {
        addrs
            .iter()
            .filter_map(|addr| match (addr.name(), addr.address()) {
                (Some(name), Some(email)) => Some(format!("{} <{}>", name, email)),
                (None, Some(email)) => Some(email.to_string()),
                (Some(name), None) => Some(name.to_string()),
                (None, None) => None,
            })
            .collect::<Vec<_>>()
            .join(", ")
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_email() {
        let raw = b"From: Alice <alice@example.com>\r\n\
                    To: team@example.com\r\n\
                    Subject: =?utf-8?Q?Gr=C3=BC=C3=9Fe?=\r\n\
                    Date: Mon, 1 Jan 2024 12:00:00 +0000\r\n\
                    Message-ID: <test@example.com>\r\n\
                    \r\n\
                    Hello, this is a test email.";

        let parsed = parse_message(raw).unwrap();
        assert_eq!(parsed.message_id.as_deref(), Some("<test@example.com>"));
        assert_eq!(parsed.sender, "Alice <alice@example.com>");
        assert_eq!(parsed.recipient, "team@example.com");
        assert_eq!(parsed.subject, "Grüße");
        assert_eq!(parsed.received_at, Some(1_704_110_400));
        assert!(parsed.body_text.unwrap().contains("Hello"));
        assert!(!parsed.has_attachments);
        assert!(parsed.attachments.is_empty());
    }

    #[test]
    fn test_parse_multipart_with_attachment() {
        let raw = b"From: alice@example.com\r\n\
                    To: team@example.com\r\n\
                    Subject: Report\r\n\
                    Message-ID: <multi@example.com>\r\n\
                    MIME-Version: 1.0\r\n\
                    Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
                    \r\n\
                    --XYZ\r\n\
                    Content-Type: text/plain; charset=utf-8\r\n\
                    \r\n\
                    Hello body\r\n\
                    --XYZ\r\n\
                    Content-Type: text/html\r\n\
                    \r\n\
                    <p>One</p>\r\n\
                    --XYZ\r\n\
                    Content-Type: text/html\r\n\
                    \r\n\
                    <p>Two</p>\r\n\
                    --XYZ\r\n\
                    Content-Type: application/pdf; name=\"report.pdf\"\r\n\
                    Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
                    Content-Transfer-Encoding: base64\r\n\
                    \r\n\
                    JVBERi0xLjQ=\r\n\
                    --XYZ--\r\n";

        let parsed = parse_message(raw).unwrap();
        assert!(parsed.has_attachments);
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].filename, "report.pdf");
        assert_eq!(parsed.attachments[0].content_type, "application/pdf");
        assert_eq!(parsed.attachments[0].data, b"%PDF-1.4");

        assert_eq!(parsed.body_text.unwrap().trim(), "Hello body");
        let html = parsed.body_html.unwrap();
        assert!(html.contains("<p>One</p>"));
        assert!(html.contains("<p>Two</p>"));
    }

    #[test]
    fn test_text_part_with_attachment_disposition_stays_body() {
        let raw = b"From: alice@example.com\r\n\
                    Subject: Log excerpt\r\n\
                    MIME-Version: 1.0\r\n\
                    Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
                    \r\n\
                    --XYZ\r\n\
                    Content-Type: text/plain\r\n\
                    Content-Disposition: attachment; filename=\"log.txt\"\r\n\
                    \r\n\
                    line one\r\n\
                    --XYZ--\r\n";

        let parsed = parse_message(raw).unwrap();
        // text/* parts never become attachments, disposition or not
        assert!(parsed.attachments.is_empty());
        assert!(!parsed.has_attachments);
        assert!(parsed.body_text.unwrap().contains("line one"));
    }

    #[test]
    fn test_missing_message_id_and_date() {
        let raw = b"From: alice@example.com\r\n\
                    Subject: No identity\r\n\
                    \r\n\
                    body";

        let parsed = parse_message(raw).unwrap();
        assert!(parsed.message_id.is_none());
        assert!(parsed.received_at.is_none());
    }

    #[test]
    fn test_attachment_without_filename_gets_fallback() {
        let raw = b"From: alice@example.com\r\n\
                    Subject: Blob\r\n\
                    MIME-Version: 1.0\r\n\
                    Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
                    \r\n\
                    --XYZ\r\n\
                    Content-Type: image/png\r\n\
                    Content-Disposition: inline\r\n\
                    Content-Transfer-Encoding: base64\r\n\
                    \r\n\
                    iVBORw0KGgo=\r\n\
                    --XYZ--\r\n";

        let parsed = parse_message(raw).unwrap();
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].filename, "attachment_0.png");
    }
}

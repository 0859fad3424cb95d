//! Best-effort charset decoding for part payloads whose declared charset is
//! missing, unknown, or wrong.
//!
//! Chain: declared charset (when it decodes cleanly) -> strict UTF-8 ->
//! windows-1252. The WHATWG label registry maps iso-8859-1 and latin1 onto
//! windows-1252, and windows-1252 decodes any byte sequence, so the chain is
//! total.

use encoding_rs::{Encoding, WINDOWS_1252};

/// Decode raw part bytes into text.
pub fn decode_text(raw: &[u8], declared_charset: Option<&str>) -> String {
    if let Some(label) = declared_charset
        && let Some(encoding) = Encoding::for_label(label.trim().as_bytes())
    {
        let (text, _, had_errors) = encoding.decode(raw);
        if !had_errors {
            return text.into_owned();
        }
    }

    if let Ok(text) = std::str::from_utf8(raw) {
        return text.to_string();
    }

    let (text, _, _) = WINDOWS_1252.decode(raw);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_charset_wins() {
        // "für" in ISO-8859-1
        let raw = b"f\xfcr";
        assert_eq!(decode_text(raw, Some("iso-8859-1")), "für");
        assert_eq!(decode_text(raw, Some("latin1")), "für");
    }

    #[test]
    fn test_utf8_passthrough() {
        let raw = "grüße".as_bytes();
        assert_eq!(decode_text(raw, None), "grüße");
        // A bogus label falls through to strict UTF-8
        assert_eq!(decode_text(raw, Some("x-no-such-charset")), "grüße");
    }

    #[test]
    fn test_windows_1252_fallback() {
        // 0x93/0x94 are curly quotes in windows-1252 and invalid UTF-8
        let raw = b"\x93quoted\x94";
        let decoded = decode_text(raw, None);
        assert_eq!(decoded, "\u{201c}quoted\u{201d}");
    }

    #[test]
    fn test_wrong_declared_charset_falls_back() {
        // Valid UTF-8 bytes declared as UTF-8 decode fine; invalid bytes
        // declared as UTF-8 fall through the chain instead of being mangled.
        let raw = b"caf\xe9"; // "café" in windows-1252
        let decoded = decode_text(raw, Some("utf-8"));
        assert_eq!(decoded, "café");
    }
}

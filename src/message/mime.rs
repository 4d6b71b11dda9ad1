//! Best-effort MIME multipart unwrapping.
//!
//! Extraction is a no-fail transform: any structure this module does not
//! recognize leaves the original body untouched. The edge cases here come
//! from real upstream bugs, notably `Content-Type` headers that arrive as
//! several comma-joined values and boundary parameters whose quoting
//! survived an extra round of escaping.

use tracing::debug;

use super::{split_headers_body, Headers};

/// Replaces a multipart body with its first `text/plain` sub-part, when one
/// can be located. Returns `body` unchanged in every other case.
pub(super) fn extract_text_plain(headers: &Headers, body: String) -> String {
    let Some(content_type) = headers.get("content-type") else {
        return body;
    };

    if !content_type.to_ascii_lowercase().contains("multipart") {
        return body;
    }

    let Some(boundary) = boundary_parameter(content_type) else {
        debug!(content_type, "multipart content-type without usable boundary");
        return body;
    };

    match first_text_plain_part(&body, &boundary) {
        Some(content) => content,
        None => {
            debug!(boundary, "no text/plain sub-part found, keeping raw body");
            body
        }
    }
}

/// Pulls the boundary value out of a `Content-Type` header.
///
/// A malformed header may carry several comma-joined values (a duplicated
/// header merged upstream), so only the first comma-delimited segment is
/// searched. The value may be bare, quoted, or escaped-quoted.
fn boundary_parameter(content_type: &str) -> Option<String> {
    let segment = content_type.split(',').next().unwrap_or(content_type);

    let start = segment.to_ascii_lowercase().find("boundary=")?;
    let raw = segment[start + "boundary=".len()..].trim();
    let raw = raw.split(';').next().unwrap_or(raw).trim();

    // Escaped quotes first: `\"X\"` also fails the plain-quote check.
    let value = raw
        .strip_prefix("\\\"")
        .and_then(|v| v.strip_suffix("\\\""))
        .or_else(|| raw.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
        .unwrap_or(raw);

    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Finds the content of the first sub-part whose own `content-type` names
/// `text/plain`. Returns `None` when the boundary never appears in the body
/// or no sub-part qualifies.
fn first_text_plain_part(body: &str, boundary: &str) -> Option<String> {
    let marker = locate_marker(body, boundary)?;

    for segment in body.split(&marker) {
        let segment = segment.trim_start_matches('\n');
        if segment.is_empty() || segment.trim() == "--" {
            continue;
        }

        let (part_headers, content) = split_headers_body(segment);
        let is_text_plain = part_headers
            .get("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/plain"));

        if is_text_plain {
            return Some(trim_boundary_remnants(&content, boundary));
        }
    }

    None
}

/// Picks the boundary marker form actually present in the body, trying the
/// line-delimited forms before falling back to a bare `--boundary`.
fn locate_marker(body: &str, boundary: &str) -> Option<String> {
    let candidates = [
        format!("\r\n--{boundary}\r\n"),
        format!("\n--{boundary}\n"),
        format!("--{boundary}\r\n"),
        format!("--{boundary}\n"),
        format!("--{boundary}"),
    ];

    candidates.into_iter().find(|marker| body.contains(marker))
}

/// Strips trailing closing-boundary leftovers (`--`, the boundary string,
/// with or without a preceding line break) from a sub-part's content.
fn trim_boundary_remnants(content: &str, boundary: &str) -> String {
    let mut trimmed = content.trim_end();

    loop {
        let before = trimmed;
        trimmed = trimmed
            .trim_end_matches("--")
            .trim_end_matches(boundary)
            .trim_end_matches("--")
            .trim_end();

        if trimmed == before {
            break;
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::message::ParsedMessage;

    fn multipart_raw(content_type: &str) -> Vec<u8> {
        format!(
            "From: a@b.c\n\
             Content-Type: {content_type}\n\
             \n\
             --XYZ\n\
             Content-Type: text/html; charset=\"UTF-8\"\n\
             \n\
             <p>ignored</p>\n\
             --XYZ\n\
             Content-Type: text/plain; charset=\"UTF-8\"\n\
             \n\
             plain content here\n\
             --XYZ--\n"
        )
        .into_bytes()
    }

    #[test]
    fn extracts_first_text_plain_part() {
        let message = ParsedMessage::parse(&multipart_raw("multipart/alternative; boundary=XYZ"));
        assert_eq!(message.body, "plain content here");
    }

    #[test]
    fn quoted_escaped_and_bare_boundaries_agree() {
        let bare = ParsedMessage::parse(&multipart_raw("multipart/alternative; boundary=XYZ"));
        let quoted =
            ParsedMessage::parse(&multipart_raw("multipart/alternative; boundary=\"XYZ\""));
        let escaped =
            ParsedMessage::parse(&multipart_raw("multipart/alternative; boundary=\\\"XYZ\\\""));

        assert_eq!(bare.body, "plain content here");
        assert_eq!(quoted.body, bare.body);
        assert_eq!(escaped.body, bare.body);
    }

    #[test]
    fn comma_joined_content_type_uses_first_segment() {
        let message = ParsedMessage::parse(&multipart_raw(
            "multipart/alternative; boundary=\"XYZ\", text/plain; charset=\"UTF-8\"",
        ));
        assert_eq!(message.body, "plain content here");
    }

    #[test]
    fn missing_boundary_keeps_raw_body() {
        let raw = b"Content-Type: multipart/mixed\n\nnot actually multipart";
        let message = ParsedMessage::parse(raw);
        assert_eq!(message.body, "not actually multipart");
    }

    #[test]
    fn boundary_absent_from_body_keeps_raw_body() {
        let raw = b"Content-Type: multipart/mixed; boundary=NOPE\n\njust a plain body";
        let message = ParsedMessage::parse(raw);
        assert_eq!(message.body, "just a plain body");
    }

    #[test]
    fn no_text_plain_part_keeps_raw_body() {
        let raw = b"Content-Type: multipart/mixed; boundary=B\n\n\
                    --B\n\
                    Content-Type: text/html\n\
                    \n\
                    <p>html only</p>\n\
                    --B--\n";
        let message = ParsedMessage::parse(raw);
        assert!(message.body.contains("<p>html only</p>"));
    }

    #[test]
    fn sub_part_headers_fold_like_top_level_headers() {
        let raw = b"Content-Type: multipart/alternative; boundary=B\n\n\
                    --B\n\
                    Content-Type: text/plain;\n\
                    \tcharset=\"UTF-8\"\n\
                    \n\
                    folded part content\n\
                    --B--\n";
        let message = ParsedMessage::parse(raw);
        assert_eq!(message.body, "folded part content");
    }

    #[test]
    fn non_multipart_content_type_is_untouched() {
        let raw = b"Content-Type: text/plain; boundary=TRAP\n\n--TRAP\nsurprise\n--TRAP--";
        let message = ParsedMessage::parse(raw);
        assert!(message.body.contains("surprise"));
    }
}

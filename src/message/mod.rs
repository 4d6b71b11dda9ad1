//! RFC 5322 message parsing.
//!
//! [`ParsedMessage::parse`] decodes a raw byte stream into an ordered header
//! mapping and a body, unwrapping MIME multipart bodies down to their first
//! `text/plain` sub-part where possible. Parsing never fails: malformed
//! header lines are skipped and unrecognizable multipart structure degrades
//! to the raw body, so a buggy upstream can not cause an accepted message to
//! be dropped on the floor.

mod mime;

use std::fmt::{self, Debug};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::debug;

/// Header names longer than this are treated as line noise, not headers.
const MAX_HEADER_NAME_LEN: usize = 50;

/// An ordered mapping of lower-cased header name to merged value.
///
/// The first occurrence of a name establishes its position; values of
/// repeated headers are joined with `", "` and folded continuation lines
/// with a single space, mirroring how the records are later stored.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Inserts a header, merging into the existing entry if the name is
    /// already present.
    fn insert(&mut self, name: String, value: String) {
        if let Some((_, existing)) = self.0.iter_mut().find(|(n, _)| *n == name) {
            existing.push_str(", ");
            existing.push_str(&value);
        } else {
            self.0.push((name, value));
        }
    }

    /// Appends a folded continuation line to the most recently seen header.
    fn append_continuation(&mut self, text: &str) {
        if let Some((_, value)) = self.0.last_mut() {
            value.push(' ');
            value.push_str(text);
        }
    }

    /// Looks up a header by its lower-cased name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut headers = Self::default();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// A message decoded into headers and a body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedMessage {
    pub headers: Headers,
    pub body: String,
}

impl ParsedMessage {
    /// Parses a raw message into headers and body.
    ///
    /// Line endings are normalized before scanning, so CRLF and LF input
    /// produce identical results. If the merged `content-type` header names
    /// a multipart type, the body is replaced with the first `text/plain`
    /// sub-part's content; when no such sub-part can be located the raw
    /// body is kept as-is.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let text = normalize_line_endings(&String::from_utf8_lossy(raw));
        let (headers, body) = split_headers_body(&text);
        let mut body = mime::extract_text_plain(&headers, body);

        // The line break terminating the final line is not content.
        if body.ends_with('\n') {
            body.pop();
        }

        Self { headers, body }
    }
}

/// Rewrites `\r\n` to `\n`, then any stray `\r` to `\n`, so the scanners
/// below only ever see `\n` and header values never contain raw CR.
fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Splits normalized text at the first blank line into a header mapping and
/// the body (lines after the separator, re-joined with `\n`).
///
/// Also used for MIME sub-parts, which follow the same header/body shape.
fn split_headers_body(text: &str) -> (Headers, String) {
    let mut headers = Headers::default();
    let mut lines = text.split('\n');
    let mut have_header = false;

    for line in lines.by_ref() {
        if line.is_empty() {
            break;
        }

        // A continuation line may itself contain a colon, so it has to be
        // recognized before the header split.
        if line.starts_with(' ') || line.starts_with('\t') {
            if have_header {
                headers.append_continuation(line.trim());
            }
            continue;
        }

        let Some((name, value)) = line.split_once(':') else {
            debug!(line, "skipping header line without a colon");
            continue;
        };

        let name = name.trim().to_lowercase();
        if name.is_empty() || name.contains(' ') || name.len() > MAX_HEADER_NAME_LEN {
            debug!(line, "skipping malformed header name");
            continue;
        }

        headers.insert(name, value.trim().to_string());
        have_header = true;
    }

    let body = lines.collect::<Vec<_>>().join("\n");
    (headers, body)
}

//! SMTP reply parsing and classification.

use thiserror::Error;

/// Errors from parsing a server reply line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseParseError {
    #[error("reply line too short: '{0}'")]
    TooShort(String),

    #[error("invalid status code: '{0}'")]
    InvalidCode(String),

    #[error("invalid separator character: '{0}'")]
    InvalidSeparator(char),
}

/// A complete, possibly multi-line, SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Response {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// The reply text with lines re-joined.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join(" ")
    }

    /// 2xx reply.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// 3xx reply — the go-ahead after DATA.
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code >= 300 && self.code < 400
    }

    /// 5xx reply.
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code >= 500 && self.code < 600
    }
}

/// One parsed reply line: code, whether more lines follow, and the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponseLine {
    pub code: u16,
    pub is_last: bool,
    pub text: String,
}

impl ResponseLine {
    /// Parses a single `NNN[- ]text` reply line.
    pub(crate) fn parse(line: &str) -> Result<Self, ResponseParseError> {
        if line.len() < 3 {
            return Err(ResponseParseError::TooShort(line.to_string()));
        }

        // The server controls these bytes; byte 3 may not be a char
        // boundary, so the prefix has to be sliced fallibly.
        let code = line
            .get(..3)
            .and_then(|digits| digits.parse::<u16>().ok())
            .ok_or_else(|| ResponseParseError::InvalidCode(line.chars().take(3).collect()))?;

        let is_last = match line.as_bytes().get(3) {
            None | Some(b' ') => true,
            Some(b'-') => false,
            Some(&other) => return Err(ResponseParseError::InvalidSeparator(other as char)),
        };

        let text = line.get(4..).unwrap_or("").to_string();

        Ok(Self {
            code,
            is_last,
            text,
        })
    }
}

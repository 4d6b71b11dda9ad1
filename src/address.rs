use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing an email address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The address does not contain exactly one `@`.
    #[error("invalid email address format: {0}")]
    Malformed(String),
}

/// A structurally valid email address: a local part and a domain separated
/// by exactly one `@`.
///
/// This is the shape the outbound path requires before any network activity;
/// the inbound path deliberately works with raw strings, since deciding what
/// to do with a malformed `RCPT TO` address is validation policy, not a
/// parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    local_part: String,
    domain: String,
}

impl Address {
    /// Parses `raw` into an address.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::Malformed`] unless `raw` contains exactly one
    /// `@` with non-empty text on both sides.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let mut parts = raw.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => {
                Ok(Self {
                    local_part: local.to_string(),
                    domain: domain.to_string(),
                })
            }
            _ => Err(AddressError::Malformed(raw.to_string())),
        }
    }

    #[must_use]
    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local_part, self.domain)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

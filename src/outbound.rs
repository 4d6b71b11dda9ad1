//! Outbound message model and per-domain partitioning.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::address::{Address, AddressError};

/// A caller-owned outbound message.
///
/// Deserializes from the JSON shape the sending CLI accepts:
///
/// ```json
/// {
///   "from": "sender@example.com",
///   "to": ["recipient@example.com"],
///   "cc": [],
///   "bcc": [],
///   "subject": "Subject",
///   "body": "Body content",
///   "headers": { "X-Custom-Header": "value" }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundMessage {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

impl OutboundMessage {
    /// Total recipient count across to, cc, and bcc.
    #[must_use]
    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// Narrows this message to the recipients of one domain, preserving
    /// which field each recipient came from so the per-domain sub-message
    /// reconstructs the correct To/Cc/Bcc split.
    #[must_use]
    pub fn for_domain(&self, group: &DomainRecipients) -> Self {
        Self {
            from: self.from.clone(),
            to: group.to.iter().map(ToString::to_string).collect(),
            cc: group.cc.iter().map(ToString::to_string).collect(),
            bcc: group.bcc.iter().map(ToString::to_string).collect(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            headers: self.headers.clone(),
        }
    }

    /// Renders the DATA payload for this message.
    ///
    /// Bcc recipients appear in the SMTP envelope only, never in the
    /// rendered headers.
    #[must_use]
    pub fn to_rfc5322(&self) -> String {
        let mut out = String::with_capacity(256 + self.body.len());

        let _ = write!(out, "From: {}\r\n", self.from);
        if !self.to.is_empty() {
            let _ = write!(out, "To: {}\r\n", self.to.join(", "));
        }
        if !self.cc.is_empty() {
            let _ = write!(out, "Cc: {}\r\n", self.cc.join(", "));
        }
        if !self.subject.is_empty() {
            let _ = write!(out, "Subject: {}\r\n", self.subject);
        }
        for (name, value) in &self.headers {
            let _ = write!(out, "{name}: {value}\r\n");
        }
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        out.push_str("\r\n");
        out.push_str(&self.body);

        out
    }

    /// Partitions all recipients by the domain part of their address,
    /// tagging each with its original field. Group order is first-seen.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] for the first address that does not contain
    /// exactly one `@` — partitioning happens before any network activity,
    /// so a malformed address fails the whole send up front.
    pub fn partition_by_domain(&self) -> Result<Vec<DomainRecipients>, AddressError> {
        let mut groups: Vec<DomainRecipients> = Vec::new();

        let mut place = |raw: &str, field: RecipientField| -> Result<(), AddressError> {
            let address = Address::parse(raw)?;
            let group = match groups.iter_mut().find(|g| g.domain == address.domain()) {
                Some(group) => group,
                None => {
                    groups.push(DomainRecipients::new(address.domain()));
                    groups.last_mut().expect("group just pushed")
                }
            };
            group.push(address, field);
            Ok(())
        };

        for raw in &self.to {
            place(raw, RecipientField::To)?;
        }
        for raw in &self.cc {
            place(raw, RecipientField::Cc)?;
        }
        for raw in &self.bcc {
            place(raw, RecipientField::Bcc)?;
        }

        Ok(groups)
    }
}

/// Which envelope field a recipient originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientField {
    To,
    Cc,
    Bcc,
}

/// The recipients of one domain, split by original field.
///
/// Derived per send and discarded afterwards.
#[derive(Debug, Clone)]
pub struct DomainRecipients {
    pub domain: String,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
}

impl DomainRecipients {
    fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
        }
    }

    fn push(&mut self, address: Address, field: RecipientField) {
        match field {
            RecipientField::To => self.to.push(address),
            RecipientField::Cc => self.cc.push(address),
            RecipientField::Bcc => self.bcc.push(address),
        }
    }

    /// All recipients for this domain in to, cc, bcc order — the order the
    /// SMTP session issues `RCPT TO` commands.
    pub fn all(&self) -> impl Iterator<Item = &Address> {
        self.to.iter().chain(self.cc.iter()).chain(self.bcc.iter())
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }
}

//! Inbound intake pipeline.
//!
//! One accepted SMTP transaction flows through here exactly once: every
//! envelope recipient is checked against the directory, the raw message is
//! parsed a single time, and one storage record is written per accepted
//! recipient. A recipient that does not exist is rejected without touching
//! its siblings; a directory or storage transport failure aborts the whole
//! transaction, because "could not check" must never be silently treated as
//! "does not exist".

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::directory::{DirectoryError, RecipientDirectory, RecipientValidator};
use crate::message::ParsedMessage;
use crate::store::{MessageStore, StoreError, StoredRecord};

/// The SMTP-level sender and recipients for one transaction, as handed over
/// by the protocol layer once a client finishes its transaction.
///
/// Addresses are kept as raw strings: what to do with a malformed
/// `RCPT TO` argument is this pipeline's decision, not the session's.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub mail_from: String,
    pub rcpt_to: Vec<String>,
}

/// Errors that abort an entire inbound transaction.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// The directory could not be consulted; fail closed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// A storage write failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Every recipient was rejected.
    #[error("no valid recipients")]
    NoValidRecipients,
}

/// One stored copy of the message.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub id: String,
    pub recipient: String,
}

/// Outcome of a successful (possibly partial) intake.
#[derive(Debug, Clone)]
pub struct IntakeReceipt {
    /// Recipients whose copy was stored, with the identifier of each copy.
    pub stored: Vec<StoredEntry>,
    /// Recipients rejected by the directory check.
    pub rejected: Vec<String>,
}

impl IntakeReceipt {
    /// `true` when at least one recipient was rejected.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// Orchestrates validation, parsing, and storage for inbound messages.
#[derive(Clone)]
pub struct Intake {
    validator: RecipientValidator,
    store: Arc<dyn MessageStore>,
}

impl Intake {
    pub fn new(directory: Arc<dyn RecipientDirectory>, store: Arc<dyn MessageStore>) -> Self {
        Self {
            validator: RecipientValidator::new(directory),
            store,
        }
    }

    /// Predicate hook for the protocol layer's `RCPT TO` handling.
    ///
    /// # Errors
    ///
    /// Propagates [`DirectoryError`] when the check itself fails.
    pub async fn is_deliverable(&self, address: &str) -> Result<bool, DirectoryError> {
        self.validator.is_deliverable(address).await
    }

    /// Accepts one completed transaction: validates every recipient, parses
    /// `raw` once, and stores one record per accepted recipient.
    ///
    /// # Errors
    ///
    /// - [`IntakeError::Directory`] if any lookup fails (fail-closed; no
    ///   records are written).
    /// - [`IntakeError::NoValidRecipients`] if every recipient was
    ///   rejected.
    /// - [`IntakeError::Store`] if a storage write fails.
    pub async fn accept(&self, envelope: &Envelope, raw: &[u8]) -> Result<IntakeReceipt, IntakeError> {
        let mut accepted = Vec::with_capacity(envelope.rcpt_to.len());
        let mut rejected = Vec::new();

        for recipient in &envelope.rcpt_to {
            if self.validator.is_deliverable(recipient).await? {
                accepted.push(recipient.clone());
            } else {
                warn!(recipient, "rejecting unknown recipient");
                rejected.push(recipient.clone());
            }
        }

        if accepted.is_empty() {
            return Err(IntakeError::NoValidRecipients);
        }

        // Parsed once, shared by every recipient's record.
        let message = ParsedMessage::parse(raw);

        let mut stored = Vec::with_capacity(accepted.len());
        for recipient in accepted {
            let record = StoredRecord {
                recipient: recipient.clone(),
                sender: envelope.mail_from.clone(),
                headers: message.headers.clone(),
                body: message.body.clone(),
            };

            let id = self.store.store(record).await?;
            stored.push(StoredEntry { id, recipient });
        }

        info!(
            sender = envelope.mail_from,
            stored = stored.len(),
            rejected = rejected.len(),
            "accepted inbound message"
        );

        Ok(IntakeReceipt { stored, rejected })
    }
}

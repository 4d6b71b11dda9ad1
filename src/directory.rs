//! Recipient existence checks.
//!
//! The actual "does this user exist" answer lives in an external directory
//! service; this module owns only the policy around it: how a local part is
//! derived from an address, and the distinction between "does not exist"
//! and "could not check".

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the directory collaborator itself.
///
/// These are transport failures, never an answer about a recipient; callers
/// must treat them as "could not check" and fail closed.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory lookup failed: {0}")]
    Lookup(String),
}

/// External directory capability: does a username exist.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Returns whether `local_part` names an existing user.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the lookup itself cannot be
    /// performed; non-existence is `Ok(false)`, never an error.
    async fn exists(&self, local_part: &str) -> Result<bool, DirectoryError>;
}

/// Decides whether an address is locally deliverable.
#[derive(Clone)]
pub struct RecipientValidator {
    directory: Arc<dyn RecipientDirectory>,
}

impl RecipientValidator {
    pub fn new(directory: Arc<dyn RecipientDirectory>) -> Self {
        Self { directory }
    }

    /// Returns whether mail for `address` can be accepted.
    ///
    /// The local part is everything before the first `@`; an address with
    /// no `@` at all is invalid and never deliverable, which is an answer,
    /// not an error.
    ///
    /// # Errors
    ///
    /// Propagates [`DirectoryError`] so the caller can distinguish a
    /// non-existent recipient from a failed check.
    pub async fn is_deliverable(&self, address: &str) -> Result<bool, DirectoryError> {
        let Some((local_part, _)) = address.split_once('@') else {
            return Ok(false);
        };

        self.directory.exists(local_part).await
    }
}

/// A fixed in-memory directory, for tests and the bundled receiver binary.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: HashSet<String>,
}

impl StaticDirectory {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl RecipientDirectory for StaticDirectory {
    async fn exists(&self, local_part: &str) -> Result<bool, DirectoryError> {
        Ok(self.users.contains(local_part))
    }
}

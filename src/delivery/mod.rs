//! Outbound delivery orchestration.
//!
//! [`Courier`] owns one send from end to end: preflight validation,
//! partitioning recipients by domain, and driving each domain's delivery
//! concurrently through the [`driver::DomainDelivery`] failover loop.
//! Domains are independent; one domain failing never aborts another.

pub mod dns;
pub mod driver;

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::address::{Address, AddressError};
use crate::outbound::OutboundMessage;
use crate::smtp::SmtpClientSession;

pub use dns::{HickoryMxLookup, MxCandidate, MxLookup, MxResolver, ResolveError};
pub use driver::{DeliveryAttempt, DeliveryOutcome, DomainDelivery};

/// Errors that fail a send before any network activity.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("'from' field is required")]
    MissingFrom,

    #[error("at least one recipient is required (to, cc, or bcc)")]
    NoRecipients,

    #[error(transparent)]
    Invalid(#[from] AddressError),
}

/// The per-domain results of one send, keyed by domain.
#[derive(Debug, Serialize)]
pub struct SendReport {
    pub outcomes: BTreeMap<String, DeliveryOutcome>,
}

impl SendReport {
    /// True when every domain's group was delivered.
    #[must_use]
    pub fn delivered_all(&self) -> bool {
        self.outcomes.values().all(DeliveryOutcome::is_delivered)
    }

    /// The domains that exhausted all their candidates.
    pub fn failures(&self) -> impl Iterator<Item = (&String, &DeliveryOutcome)> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_delivered())
    }
}

/// Orchestrates one outbound send across all recipient domains.
pub struct Courier {
    session: Arc<dyn SmtpClientSession>,
    lookup: Arc<dyn MxLookup>,
}

impl Courier {
    #[must_use]
    pub fn new(lookup: Arc<dyn MxLookup>, session: Arc<dyn SmtpClientSession>) -> Self {
        Self { session, lookup }
    }

    /// Delivers `message` to every recipient domain, failing over across
    /// each domain's mail exchangers independently.
    ///
    /// # Errors
    ///
    /// Returns [`SendError`] when the message is structurally unsendable:
    /// missing sender, zero recipients, or a malformed address. No DNS query
    /// or connection is made in that case. Per-domain delivery failures are
    /// not errors; they are reported in the [`SendReport`].
    pub async fn send(&self, message: &OutboundMessage) -> Result<SendReport, SendError> {
        if message.from.is_empty() {
            return Err(SendError::MissingFrom);
        }
        Address::parse(&message.from)?;

        let groups = message.partition_by_domain()?;
        if groups.is_empty() {
            return Err(SendError::NoRecipients);
        }

        info!(
            from = message.from,
            recipients = message.recipient_count(),
            domains = groups.len(),
            "starting delivery"
        );

        let deliveries = groups.iter().map(|group| {
            let driver = DomainDelivery::new(
                MxResolver::new(Box::new(SharedLookup(self.lookup.clone()))),
                self.session.clone(),
            );
            async move { (group.domain.clone(), driver.deliver(group, message).await) }
        });

        let outcomes = join_all(deliveries).await.into_iter().collect();

        Ok(SendReport { outcomes })
    }
}

/// Adapter letting one shared lookup back every per-domain resolver.
struct SharedLookup(Arc<dyn MxLookup>);

#[async_trait::async_trait]
impl MxLookup for SharedLookup {
    async fn lookup(&self, domain: &str) -> Result<Vec<MxCandidate>, ResolveError> {
        self.0.lookup(domain).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::smtp::SessionError;

    struct MapLookup(BTreeMap<String, Vec<MxCandidate>>);

    #[async_trait]
    impl MxLookup for MapLookup {
        async fn lookup(&self, domain: &str) -> Result<Vec<MxCandidate>, ResolveError> {
            Ok(self.0.get(domain).cloned().unwrap_or_default())
        }
    }

    struct AcceptAll {
        dialed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SmtpClientSession for AcceptAll {
        async fn deliver(
            &self,
            addr: &str,
            _message: &OutboundMessage,
        ) -> Result<(), SessionError> {
            self.dialed.lock().unwrap().push(addr.to_string());
            Ok(())
        }
    }

    fn message(to: Vec<&str>) -> OutboundMessage {
        OutboundMessage {
            from: "sender@origin.test".to_string(),
            to: to.into_iter().map(String::from).collect(),
            subject: "subject".to_string(),
            body: "body".to_string(),
            ..OutboundMessage::default()
        }
    }

    #[tokio::test]
    async fn rejects_missing_from_without_any_lookup() {
        let courier = Courier::new(
            Arc::new(MapLookup(BTreeMap::new())),
            Arc::new(AcceptAll {
                dialed: Mutex::new(Vec::new()),
            }),
        );

        let mut msg = message(vec!["user@example.com"]);
        msg.from = String::new();

        assert!(matches!(
            courier.send(&msg).await,
            Err(SendError::MissingFrom)
        ));
    }

    #[tokio::test]
    async fn rejects_empty_recipient_set() {
        let courier = Courier::new(
            Arc::new(MapLookup(BTreeMap::new())),
            Arc::new(AcceptAll {
                dialed: Mutex::new(Vec::new()),
            }),
        );

        assert!(matches!(
            courier.send(&message(vec![])).await,
            Err(SendError::NoRecipients)
        ));
    }

    #[tokio::test]
    async fn malformed_recipient_fails_before_network() {
        let session = Arc::new(AcceptAll {
            dialed: Mutex::new(Vec::new()),
        });
        let courier = Courier::new(Arc::new(MapLookup(BTreeMap::new())), session.clone());

        let result = courier
            .send(&message(vec!["good@example.com", "bad-address"]))
            .await;

        assert!(matches!(result, Err(SendError::Invalid(_))));
        assert!(session.dialed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_failed_domain_does_not_abort_the_other() {
        let mut exchangers = BTreeMap::new();
        exchangers.insert(
            "works.test".to_string(),
            vec![MxCandidate::new("mx.works.test".to_string(), 10)],
        );
        // nomail.test has no MX records at all.

        let session = Arc::new(AcceptAll {
            dialed: Mutex::new(Vec::new()),
        });
        let courier = Courier::new(Arc::new(MapLookup(exchangers)), session);

        let report = courier
            .send(&message(vec!["a@nomail.test", "b@works.test"]))
            .await
            .unwrap();

        assert!(!report.delivered_all());
        assert!(report.outcomes["works.test"].is_delivered());
        assert!(!report.outcomes["nomail.test"].is_delivered());
        assert_eq!(report.failures().count(), 1);
    }
}

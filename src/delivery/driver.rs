//! Per-domain delivery: resolve the mail exchangers, then walk them in
//! preference order until one accepts the message.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::dns::MxResolver;
use crate::outbound::{DomainRecipients, OutboundMessage};
use crate::smtp::SmtpClientSession;

/// One failed attempt against one host, kept for the failure report.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAttempt {
    pub host: String,
    pub error: String,
}

/// The terminal result for one recipient domain.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// One exchanger accepted the message for every recipient in the group.
    Delivered { via: String },

    /// Every candidate failed (or resolution did); `attempts` holds them in
    /// the order they were tried.
    Failed {
        domain: String,
        attempts: Vec<DeliveryAttempt>,
    },
}

impl DeliveryOutcome {
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Drives delivery for a single domain's recipient group.
pub struct DomainDelivery {
    resolver: MxResolver,
    session: Arc<dyn SmtpClientSession>,
}

impl DomainDelivery {
    #[must_use]
    pub fn new(resolver: MxResolver, session: Arc<dyn SmtpClientSession>) -> Self {
        Self { resolver, session }
    }

    /// Attempts delivery of `message`, already narrowed to `group`'s
    /// recipients, trying each exchanger in preference order. The first
    /// acceptance wins; later candidates are not contacted.
    pub async fn deliver(
        &self,
        group: &DomainRecipients,
        message: &OutboundMessage,
    ) -> DeliveryOutcome {
        let candidates = match self.resolver.resolve(&group.domain).await {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(domain = group.domain, error = %err, "MX resolution failed");
                // No hosts were ever dialed; record the resolution failure
                // itself so the report is never empty.
                return DeliveryOutcome::Failed {
                    domain: group.domain.clone(),
                    attempts: vec![DeliveryAttempt {
                        host: group.domain.clone(),
                        error: err.to_string(),
                    }],
                };
            }
        };

        let narrowed = message.for_domain(group);
        let mut attempts = Vec::new();

        for candidate in &candidates {
            let addr = candidate.address();
            match self.session.deliver(&addr, &narrowed).await {
                Ok(()) => {
                    info!(
                        domain = group.domain,
                        via = candidate.host,
                        recipients = group.count(),
                        "message delivered"
                    );
                    return DeliveryOutcome::Delivered {
                        via: candidate.host.clone(),
                    };
                }
                Err(err) => {
                    warn!(
                        domain = group.domain,
                        host = candidate.host,
                        error = %err,
                        "delivery attempt failed, trying next exchanger"
                    );
                    attempts.push(DeliveryAttempt {
                        host: candidate.host.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        DeliveryOutcome::Failed {
            domain: group.domain.clone(),
            attempts,
        }
    }
}

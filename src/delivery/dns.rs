//! Mail-exchanger resolution.
//!
//! The DNS question itself is behind the [`MxLookup`] capability; the
//! resolver on top enforces the deliverability contract: a domain with no
//! usable MX records is a hard failure for that domain, and candidates are
//! always handed to the delivery driver in ascending preference order.

use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::ResolverOpts;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Errors from MX resolution, fatal for the affected domain only.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The domain has no mail exchanger at all.
    #[error("no mail exchanger for domain {0}")]
    NoRecords(String),

    /// The DNS query itself failed.
    #[error("MX lookup failed for {domain}: {reason}")]
    Lookup { domain: String, reason: String },
}

/// One candidate mail-exchanger host.
///
/// Lower preference is tried first; candidates sharing a preference keep
/// the order the lookup returned them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MxCandidate {
    pub host: String,
    pub preference: u16,
    /// SMTP port to connect to. 25 everywhere except test setups.
    pub port: u16,
}

impl MxCandidate {
    #[must_use]
    pub const fn new(host: String, preference: u16) -> Self {
        Self {
            host,
            preference,
            port: 25,
        }
    }

    /// The full `host:port` dial target.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// External DNS capability: raw MX host/preference pairs for a domain.
#[async_trait]
pub trait MxLookup: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the query fails; an empty result is
    /// not an error at this layer.
    async fn lookup(&self, domain: &str) -> Result<Vec<MxCandidate>, ResolveError>;
}

/// Resolves and priority-orders the candidate hosts for a domain.
pub struct MxResolver {
    lookup: Box<dyn MxLookup>,
}

impl MxResolver {
    #[must_use]
    pub fn new(lookup: Box<dyn MxLookup>) -> Self {
        Self { lookup }
    }

    /// Returns the candidates for `domain`, sorted ascending by preference.
    /// The sort is stable, so equal-preference candidates keep the order
    /// the lookup returned.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoRecords`] when the domain has zero MX
    /// records, or the underlying lookup error.
    pub async fn resolve(&self, domain: &str) -> Result<Vec<MxCandidate>, ResolveError> {
        let mut candidates = self.lookup.lookup(domain).await?;

        if candidates.is_empty() {
            return Err(ResolveError::NoRecords(domain.to_string()));
        }

        candidates.sort_by_key(|c| c.preference);

        debug!(
            domain,
            count = candidates.len(),
            primary = candidates[0].host,
            "resolved mail exchangers"
        );

        Ok(candidates)
    }
}

/// Production [`MxLookup`] backed by the system resolver.
pub struct HickoryMxLookup {
    resolver: TokioResolver,
}

impl HickoryMxLookup {
    /// Creates a lookup using the system DNS configuration with the given
    /// query timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the system resolver configuration cannot be
    /// loaded.
    pub fn new(timeout: Duration) -> Result<Self, ResolveError> {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;

        let resolver = TokioResolver::builder(TokioConnectionProvider::default())
            .map_err(|e| ResolveError::Lookup {
                domain: String::new(),
                reason: format!("resolver initialization failed: {e}"),
            })?
            .with_options(opts)
            .build();

        Ok(Self { resolver })
    }
}

#[async_trait]
impl MxLookup for HickoryMxLookup {
    async fn lookup(&self, domain: &str) -> Result<Vec<MxCandidate>, ResolveError> {
        match self.resolver.mx_lookup(domain).await {
            Ok(mx_lookup) => Ok(mx_lookup
                .iter()
                .map(|mx| {
                    // MX exchange names come back fully qualified; the
                    // trailing dot is not part of the dial target.
                    let host = mx.exchange().to_utf8();
                    let host = host.trim_end_matches('.').to_string();
                    MxCandidate::new(host, mx.preference())
                })
                .collect()),
            Err(err) if err.is_no_records_found() => Ok(Vec::new()),
            Err(err) => Err(ResolveError::Lookup {
                domain: domain.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLookup(Vec<MxCandidate>);

    #[async_trait]
    impl MxLookup for FixedLookup {
        async fn lookup(&self, _domain: &str) -> Result<Vec<MxCandidate>, ResolveError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn candidates_sorted_ascending_by_preference() {
        let resolver = MxResolver::new(Box::new(FixedLookup(vec![
            MxCandidate::new("mx3.example.com".to_string(), 30),
            MxCandidate::new("mx1.example.com".to_string(), 10),
            MxCandidate::new("mx2.example.com".to_string(), 20),
        ])));

        let candidates = resolver.resolve("example.com").await.unwrap();
        let hosts: Vec<_> = candidates.iter().map(|c| c.host.as_str()).collect();
        assert_eq!(
            hosts,
            vec!["mx1.example.com", "mx2.example.com", "mx3.example.com"]
        );
    }

    #[tokio::test]
    async fn equal_preference_keeps_lookup_order() {
        let resolver = MxResolver::new(Box::new(FixedLookup(vec![
            MxCandidate::new("first.example.com".to_string(), 10),
            MxCandidate::new("second.example.com".to_string(), 10),
        ])));

        let candidates = resolver.resolve("example.com").await.unwrap();
        assert_eq!(candidates[0].host, "first.example.com");
        assert_eq!(candidates[1].host, "second.example.com");
    }

    #[tokio::test]
    async fn zero_records_is_fatal_for_the_domain() {
        let resolver = MxResolver::new(Box::new(FixedLookup(Vec::new())));

        let err = resolver.resolve("example.com").await.unwrap_err();
        assert!(matches!(err, ResolveError::NoRecords(domain) if domain == "example.com"));
    }

    #[test]
    fn dial_target_includes_port() {
        let candidate = MxCandidate::new("mail.example.com".to_string(), 10);
        assert_eq!(candidate.address(), "mail.example.com:25");
    }
}

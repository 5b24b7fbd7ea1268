//! Mail exchanger resolution.
//!
//! A recipient domain is resolved to its MX records, which are tried in
//! ascending preference order. Records with equal preference keep the order
//! the resolver returned them in. There is no A/AAAA fallback: a domain
//! without MX records, or one that does not exist, cannot receive mail
//! here.

use std::future::Future;
use std::time::Duration;

use hickory_resolver::TokioResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;

use crate::error::{Error, Result};

/// One MX record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchanger {
    /// MX preference; lower is tried first.
    pub priority: u16,
    /// Exchanger hostname.
    pub host: String,
}

impl Exchanger {
    /// Creates an exchanger entry.
    #[must_use]
    pub fn new(priority: u16, host: impl Into<String>) -> Self {
        Self {
            priority,
            host: host.into(),
        }
    }
}

/// Source of MX records for a domain.
pub trait ExchangerLookup: Send + Sync {
    /// Returns the MX records of `domain` in any order.
    ///
    /// An empty list means the domain has no MX records.
    fn lookup_exchangers(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<Exchanger>>> + Send;
}

/// [`ExchangerLookup`] backed by the system resolver configuration.
#[derive(Clone)]
pub struct DnsResolver {
    resolver: TokioResolver,
}

impl std::fmt::Debug for DnsResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsResolver").finish_non_exhaustive()
    }
}

impl DnsResolver {
    /// Creates a resolver from the system configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResolverSetup`] if the system configuration cannot
    /// be read.
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;

        let resolver = TokioResolver::builder(TokioConnectionProvider::default())
            .map_err(Error::ResolverSetup)?
            .with_options(opts)
            .build();

        Ok(Self { resolver })
    }

    /// Creates a resolver that queries the given name servers.
    #[must_use]
    pub fn with_config(config: ResolverConfig, timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;

        let resolver =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();

        Self { resolver }
    }
}

impl ExchangerLookup for DnsResolver {
    async fn lookup_exchangers(&self, domain: &str) -> Result<Vec<Exchanger>> {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| Exchanger::new(mx.preference(), mx.exchange().to_utf8()))
                .collect()),
            Err(err) if err.is_no_records_found() || err.is_nx_domain() => Ok(Vec::new()),
            Err(source) => Err(Error::Resolve {
                domain: domain.to_string(),
                source,
            }),
        }
    }
}

/// Sorts exchangers by ascending preference and returns their hostnames.
///
/// The sort is stable. Trailing root dots are removed so the names can be
/// used for TLS server name checks, and a host listed more than once keeps
/// only its best-ranked entry.
#[must_use]
pub fn order_exchangers(mut exchangers: Vec<Exchanger>) -> Vec<String> {
    exchangers.sort_by_key(|mx| mx.priority);

    let mut hosts: Vec<String> = Vec::with_capacity(exchangers.len());
    for mx in exchangers {
        let host = match mx.host.strip_suffix('.') {
            Some(host) => host.to_string(),
            None => mx.host,
        };
        if !hosts.iter().any(|seen| seen.eq_ignore_ascii_case(&host)) {
            hosts.push(host);
        }
    }
    hosts
}

/// Looks up the exchangers of `domain` and returns them in dialing order.
///
/// # Errors
///
/// Returns [`Error::Resolve`] if the query fails and
/// [`Error::NoMxRecords`] if it yields nothing.
pub async fn resolve_exchangers<L>(lookup: &L, domain: &str) -> Result<Vec<String>>
where
    L: ExchangerLookup,
{
    let exchangers = lookup.lookup_exchangers(domain).await?;
    if exchangers.is_empty() {
        tracing::warn!(domain, "no MX records");
        return Err(Error::NoMxRecords {
            domain: domain.to_string(),
        });
    }

    let hosts = order_exchangers(exchangers);
    tracing::debug!(domain, ?hosts, "resolved exchangers");
    Ok(hosts)
}

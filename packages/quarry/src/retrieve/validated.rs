//! SSRF protection for outgoing requests.

use std::collections::HashSet;
use std::net::IpAddr;

use async_trait::async_trait;
use tracing::warn;

use super::{Client, Request};
use crate::error::{RetrieveResult, SecurityError, SecurityResult};

/// Checks URIs against scheme, host and address-range rules before they
/// are fetched.
///
/// The defaults allow only `http`/`https` and block loopback, private and
/// link-local ranges as well as well-known cloud metadata hosts.
#[derive(Debug, Clone)]
pub struct UrlValidator {
    allowed_schemes: HashSet<String>,
    blocked_hosts: HashSet<String>,
    blocked_cidrs: Vec<ipnet::IpNet>,
    /// Hosts that bypass every other check
    allowed_hosts: HashSet<String>,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Address ranges no request may reach.
const BLOCKED_CIDRS: &[&str] = &[
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "169.254.0.0/16", // Link-local / cloud metadata
    "127.0.0.0/8",
    "0.0.0.0/8",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

impl UrlValidator {
    pub fn new() -> Self {
        Self {
            allowed_schemes: ["http", "https"].into_iter().map(String::from).collect(),
            blocked_hosts: [
                "localhost",
                "metadata.google.internal",
                "metadata.gke.internal",
                "instance-data",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            blocked_cidrs: BLOCKED_CIDRS
                .iter()
                .filter_map(|cidr| cidr.parse().ok())
                .collect(),
            allowed_hosts: HashSet::new(),
        }
    }

    pub fn allow_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.allowed_schemes.insert(scheme.into());
        self
    }

    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.insert(host.into().to_ascii_lowercase());
        self
    }

    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.insert(host.into());
        self
    }

    pub fn block_cidr(mut self, cidr: ipnet::IpNet) -> Self {
        self.blocked_cidrs.push(cidr);
        self
    }

    fn check_ip(&self, ip: IpAddr) -> SecurityResult<()> {
        // `::ffff:a.b.c.d` is matched against the v4 ranges
        let ip = ip.to_canonical();
        match self.blocked_cidrs.iter().find(|cidr| cidr.contains(&ip)) {
            Some(_) => Err(SecurityError::BlockedCidr(ip.to_string())),
            None => Ok(()),
        }
    }

    /// Validate a URI without touching the network.
    pub fn validate(&self, uri: &str) -> SecurityResult<()> {
        let parsed = url::Url::parse(uri)?;

        if !self.allowed_schemes.contains(parsed.scheme()) {
            return Err(SecurityError::DisallowedScheme(parsed.scheme().to_string()));
        }

        if let Some(host) = parsed.host_str() {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            if self.allowed_hosts.contains(&host.to_ascii_lowercase()) {
                return Ok(());
            }
        }

        let host = match parsed.host() {
            Some(url::Host::Domain(domain)) => domain.to_ascii_lowercase(),
            Some(url::Host::Ipv4(ip)) => return self.check_ip(IpAddr::V4(ip)),
            Some(url::Host::Ipv6(ip)) => return self.check_ip(IpAddr::V6(ip)),
            None => return Err(SecurityError::NoHost),
        };

        if self.blocked_hosts.contains(&host) {
            return Err(SecurityError::BlockedHost(host));
        }

        Ok(())
    }

    /// Validate a URI, then resolve its host and check every address.
    ///
    /// Catches hostnames that resolve to internal addresses.
    pub async fn validate_with_dns(&self, uri: &str) -> SecurityResult<()> {
        self.validate(uri)?;

        let parsed = url::Url::parse(uri)?;
        let Some(url::Host::Domain(host)) = parsed.host() else {
            return Ok(());
        };
        if self.allowed_hosts.contains(host) {
            return Ok(());
        }

        let port = parsed.port_or_known_default().unwrap_or(80);
        let addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| SecurityError::DnsResolution(e.to_string()))?;

        for addr in addrs {
            self.check_ip(addr.ip()).map_err(|_| {
                SecurityError::BlockedCidr(format!("{host} resolved to blocked address {}", addr.ip()))
            })?;
        }

        Ok(())
    }
}

/// Wraps a client so every request is validated before it is sent.
#[derive(Debug, Clone)]
pub struct ValidatedClient<C> {
    inner: C,
    validator: UrlValidator,
    resolve_dns: bool,
}

impl<C: Client> ValidatedClient<C> {
    /// Wrap `inner` with the default validator.
    pub fn new(inner: C) -> Self {
        Self::with_validator(inner, UrlValidator::new())
    }

    pub fn with_validator(inner: C, validator: UrlValidator) -> Self {
        Self {
            inner,
            validator,
            resolve_dns: false,
        }
    }

    /// Also resolve hostnames and check the resulting addresses.
    pub fn resolve_dns(mut self, resolve: bool) -> Self {
        self.resolve_dns = resolve;
        self
    }

    pub fn validator(&self) -> &UrlValidator {
        &self.validator
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: Client> Client for ValidatedClient<C> {
    async fn fetch(&self, request: &Request) -> RetrieveResult<String> {
        let checked = if self.resolve_dns {
            self.validator.validate_with_dns(&request.uri).await
        } else {
            self.validator.validate(&request.uri)
        };

        if let Err(e) = checked {
            warn!(uri = %request.uri, error = %e, "Request blocked by URL validator");
            return Err(e.into());
        }

        self.inner.fetch(request).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

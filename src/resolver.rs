use std::net::{IpAddr, Ipv4Addr};

use crate::PingError;

/// Forward and reverse name lookups
pub trait Resolver: Send + Sync + 'static {
    /// Resolve `host` to the IPv4 address that will be pinged
    fn resolve(&self, host: &str) -> Result<Ipv4Addr, PingError>;

    /// Look up the host name registered for `addr`
    fn reverse(&self, addr: Ipv4Addr) -> Result<String, PingError>;
}

/// Resolver backed by the operating system
///
/// Lookups go through [`dns_lookup`](dns), i.e. `getaddrinfo` and `getnameinfo`, so they honour
/// the hosts file and the system's resolver configuration.
///
/// [dns]: https://docs.rs/dns-lookup/1.0.0/dns_lookup/
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    /// An IPv4 address in dotted notation is returned as is, without asking the resolver. For
    /// host names the first IPv4 address wins.
    fn resolve(&self, host: &str) -> Result<Ipv4Addr, PingError> {
        use dns_lookup::lookup_host;

        if let Ok(addr) = host.parse::<Ipv4Addr>() {
            return Ok(addr);
        }

        let addrs = lookup_host(host).map_err(|source| PingError::Resolve {
            host: host.to_string(),
            source,
        })?;

        let addr = addrs
            .into_iter()
            .find_map(|addr| match addr {
                IpAddr::V4(addr) => Some(addr),
                IpAddr::V6(_) => None,
            })
            .ok_or_else(|| PingError::NoIpv4Address(host.to_string()))?;

        debug!("Resolved host {} to IP {}", host, addr);

        Ok(addr)
    }

    fn reverse(&self, addr: Ipv4Addr) -> Result<String, PingError> {
        use dns_lookup::lookup_addr;

        let name = lookup_addr(&IpAddr::V4(addr)).map_err(|source| PingError::Resolve {
            host: addr.to_string(),
            source,
        })?;

        debug!("Resolved IP {} to host {}", addr, name);

        Ok(name)
    }
}

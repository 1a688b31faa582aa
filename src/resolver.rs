//! Host name resolution for PAC scripts.
//!
//! The bridge functions here back `dnsResolve`, `dnsResolveEx`, `myIpAddress`
//! and `myIpAddressEx`. None of them fail: a lookup problem becomes `None`
//! (or the loopback address for the local-address functions) so that the
//! script can fall through to its default branch.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs, UdpSocket};

/// Name lookup capability used by the script environment.
pub trait HostResolver: Send + Sync {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;

    /// Addresses of this machine as other hosts would see them.
    fn local_addresses(&self) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs: Vec<IpAddr> = (host, 0).to_socket_addrs()?.map(|a| a.ip()).collect();
        Ok(addrs)
    }

    fn local_addresses(&self) -> io::Result<Vec<IpAddr>> {
        // Connecting a UDP socket sends nothing; it only selects the route.
        let routes = [("0.0.0.0:0", "8.8.8.8:53"), ("[::]:0", "[2001:4860:4860::8888]:53")];

        let addrs: Vec<IpAddr> = routes
            .iter()
            .filter_map(|(bind, target)| {
                let socket = UdpSocket::bind(bind).ok()?;
                socket.connect(target).ok()?;
                socket.local_addr().ok().map(|addr| addr.ip())
            })
            .filter(|ip| !ip.is_unspecified())
            .collect();

        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no routable local address",
            ));
        }
        Ok(addrs)
    }
}

/// Resolver answering from a fixed table.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
    local: Vec<IpAddr>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host<I>(mut self, host: &str, addrs: I) -> Self
    where
        I: IntoIterator<Item = IpAddr>,
    {
        self.hosts
            .insert(host.to_ascii_lowercase(), addrs.into_iter().collect());
        self
    }

    pub fn with_local<I>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = IpAddr>,
    {
        self.local = addrs.into_iter().collect();
        self
    }
}

impl HostResolver for StaticResolver {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.hosts
            .get(&host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown host {host}")))
    }

    fn local_addresses(&self) -> io::Result<Vec<IpAddr>> {
        if self.local.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no local address configured",
            ));
        }
        Ok(self.local.clone())
    }
}

fn lookup_all(resolver: &dyn HostResolver, host: &str) -> Option<Vec<IpAddr>> {
    let host = host.trim();
    if host.is_empty() {
        return None;
    }
    if let Ok(ip) = host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        return Some(vec![ip]);
    }

    match resolver.lookup(host) {
        Ok(addrs) if !addrs.is_empty() => Some(addrs),
        Ok(_) => {
            tracing::debug!(host, "Host resolved to no addresses");
            None
        }
        Err(e) => {
            tracing::debug!(host, error = %e, "Host resolution failed");
            None
        }
    }
}

/// First IPv4 address of `host`, or its first address of any family.
pub fn resolve_host(resolver: &dyn HostResolver, host: &str) -> Option<String> {
    let addrs = lookup_all(resolver, host)?;
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .map(IpAddr::to_string)
}

/// Every address of `host`, IPv4 and IPv6, joined with `;`.
pub fn resolve_host_all(resolver: &dyn HostResolver, host: &str) -> Option<String> {
    let addrs = lookup_all(resolver, host)?;
    Some(join_addrs(&addrs))
}

pub fn my_ip_address(resolver: &dyn HostResolver) -> String {
    local_or_loopback(resolver)
        .into_iter()
        .find(IpAddr::is_ipv4)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .to_string()
}

pub fn my_ip_address_ex(resolver: &dyn HostResolver) -> String {
    join_addrs(&local_or_loopback(resolver))
}

fn local_or_loopback(resolver: &dyn HostResolver) -> Vec<IpAddr> {
    match resolver.local_addresses() {
        Ok(addrs) if !addrs.is_empty() => addrs,
        Ok(_) => vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
        Err(e) => {
            tracing::debug!(error = %e, "Local address lookup failed, using loopback");
            vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]
        }
    }
}

fn join_addrs(addrs: &[IpAddr]) -> String {
    addrs
        .iter()
        .map(IpAddr::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

use ipnet::IpNet;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::debug;
use url::{Host, Url};

use crate::error::{Error, Result};

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

const PRIVATE_RANGES: [&str; 10] = [
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "100.64.0.0/10",
    "0.0.0.0/8",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

pub fn is_private_ip(ip: IpAddr) -> bool {
    let ip = ip.to_canonical();
    PRIVATE_RANGES
        .iter()
        .filter_map(|range| range.parse::<IpNet>().ok())
        .any(|net| net.contains(&ip))
}

/// Returns the offending host when the cluster server resolves into a private range.
pub async fn private_endpoint_host(server: &str) -> Result<Option<String>> {
    let url = Url::parse(server).map_err(|err| {
        Error::configuration_with(format!("invalid cluster server url '{server}'"), err)
    })?;
    let port = url.port_or_known_default().unwrap_or(443);
    let private = match url.host() {
        Some(Host::Ipv4(ip)) => is_private_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_private_ip(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            resolves_private(domain, tokio::net::lookup_host((domain, port)), LOOKUP_TIMEOUT).await
        }
        None => false,
    };
    Ok(private.then(|| url.host_str().unwrap_or_default().to_string()))
}

/// A lookup that fails or outlives `limit` counts as not private.
async fn resolves_private<I>(
    domain: &str,
    lookup: impl Future<Output = io::Result<I>>,
    limit: Duration,
) -> bool
where
    I: Iterator<Item = SocketAddr>,
{
    match tokio::time::timeout(limit, lookup).await {
        Ok(Ok(mut addrs)) => addrs.any(|addr| is_private_ip(addr.ip())),
        Ok(Err(err)) => {
            debug!(%domain, error = %err, "cluster host did not resolve");
            false
        }
        Err(_) => {
            debug!(%domain, "cluster host lookup timed out");
            false
        }
    }
}

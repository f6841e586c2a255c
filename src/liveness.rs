//! Domain liveness: DNS resolution plus a concurrent TCP probe of the
//! mail-retrieval ports.

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const DEFAULT_MAIL_PORTS: [u16; 4] = [110, 143, 993, 995];
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Resolves a domain to the address that should be probed.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, domain: &str) -> Option<IpAddr>;
}

/// System-configured DNS resolver. IPv4 answers are preferred.
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
    lookup_timeout: Duration,
}

impl SystemResolver {
    pub fn from_system_conf(lookup_timeout: Duration) -> anyhow::Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
        Ok(Self {
            resolver,
            lookup_timeout,
        })
    }
}

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, domain: &str) -> Option<IpAddr> {
        match timeout(self.lookup_timeout, self.resolver.lookup_ip(domain)).await {
            Ok(Ok(response)) => {
                let ips: Vec<IpAddr> = response.iter().collect();
                ips.iter()
                    .copied()
                    .find(IpAddr::is_ipv4)
                    .or_else(|| ips.first().copied())
            }
            Ok(Err(e)) => {
                log::debug!("DNS lookup failed for {domain}: {e}");
                None
            }
            Err(_) => {
                log::debug!(
                    "DNS lookup timed out for {domain} after {:?}",
                    self.lookup_timeout
                );
                None
            }
        }
    }
}

/// Probes a fixed set of ports; a host is live when any port accepts.
#[derive(Debug, Clone)]
pub struct LivenessProbe {
    ports: Vec<u16>,
    connect_timeout: Duration,
}

impl Default for LivenessProbe {
    fn default() -> Self {
        Self::new(DEFAULT_MAIL_PORTS.to_vec(), DEFAULT_CONNECT_TIMEOUT)
    }
}

impl LivenessProbe {
    pub fn new(ports: Vec<u16>, connect_timeout: Duration) -> Self {
        Self {
            ports,
            connect_timeout,
        }
    }

    /// One task per port, each owning its result. All tasks finish (or time
    /// out) before the results are combined.
    pub async fn probe(&self, ip: IpAddr) -> bool {
        let handles: Vec<_> = self
            .ports
            .iter()
            .map(|&port| {
                let addr = SocketAddr::new(ip, port);
                tokio::spawn(port_accepts(addr, self.connect_timeout))
            })
            .collect();

        let mut open = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(accepted) => open.push(accepted),
                Err(e) => {
                    log::warn!("Port probe task failed: {e}");
                    open.push(false);
                }
            }
        }

        log::debug!("Probe of {ip} on {:?}: {:?}", self.ports, open);
        open.into_iter().any(|accepted| accepted)
    }
}

async fn port_accepts(addr: SocketAddr, connect_timeout: Duration) -> bool {
    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            log::debug!("Connect to {addr} refused: {e}");
            false
        }
        Err(_) => {
            log::debug!("Connect to {addr} timed out");
            false
        }
    }
}

use super::{Heuristic, MessageEntities};
use crate::error::MessageError;
use crate::liveness::{HostResolver, LivenessProbe};
use crate::reference_data::ReferenceData;
use async_trait::async_trait;
use std::sync::Arc;

/// 1 when the sender domain looks able to receive mail: either a known
/// provider or a host with at least one open mail-retrieval port.
pub struct DomainLivenessScore {
    resolver: Arc<dyn HostResolver>,
    probe: LivenessProbe,
}

impl DomainLivenessScore {
    pub fn new(resolver: Arc<dyn HostResolver>, probe: LivenessProbe) -> Self {
        Self { resolver, probe }
    }
}

#[async_trait]
impl Heuristic for DomainLivenessScore {
    fn name(&self) -> &'static str {
        "domain_liveness_score"
    }

    async fn score(
        &self,
        message: &MessageEntities,
        data: &ReferenceData,
    ) -> Result<f64, MessageError> {
        let Some(domain) = message.sender.domain().filter(|d| !d.is_empty()) else {
            return Ok(0.0);
        };

        if data.mail_providers.contains(domain) {
            return Ok(1.0);
        }

        let Some(ip) = self.resolver.resolve(domain).await else {
            log::debug!("{}: {domain} does not resolve", message.id);
            return Ok(0.0);
        };

        let live = self.probe.probe(ip).await;
        Ok(if live { 1.0 } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::test_support::entities;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;

    /// Resolves everything to localhost and counts lookups.
    #[derive(Default)]
    struct Localhost {
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl HostResolver for Localhost {
        async fn resolve(&self, _domain: &str) -> Option<IpAddr> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        }
    }

    struct Unresolvable;

    #[async_trait]
    impl HostResolver for Unresolvable {
        async fn resolve(&self, _domain: &str) -> Option<IpAddr> {
            None
        }
    }

    #[tokio::test]
    async fn test_known_provider_skips_network() {
        let resolver = Arc::new(Localhost::default());
        let check = DomainLivenessScore::new(resolver.clone(), LivenessProbe::default());

        let mut data = ReferenceData::default();
        data.mail_providers.insert("gmail.com".to_string());

        let message = entities("someone@gmail.com", "c@d.example", "", "body");
        assert_eq!(check.score(&message, &data).await.unwrap(), 1.0);
        assert_eq!(resolver.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unresolvable_domain() {
        let check = DomainLivenessScore::new(Arc::new(Unresolvable), LivenessProbe::default());
        let message = entities("x@nowhere.invalid", "c@d.example", "", "body");
        let score = check
            .score(&message, &ReferenceData::default())
            .await
            .unwrap();
        assert_eq!(score, 0.0);
    }

    #[tokio::test]
    async fn test_open_port_is_live() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = LivenessProbe::new(vec![port], Duration::from_secs(2));

        let check = DomainLivenessScore::new(Arc::new(Localhost::default()), probe);
        let message = entities("x@mail.example", "c@d.example", "", "body");
        let score = check
            .score(&message, &ReferenceData::default())
            .await
            .unwrap();
        assert_eq!(score, 1.0);
    }

    #[tokio::test]
    async fn test_empty_sender() {
        let check = DomainLivenessScore::new(Arc::new(Localhost::default()), LivenessProbe::default());
        let message = entities("undisclosed-recipients:;", "c@d.example", "", "body");
        let score = check
            .score(&message, &ReferenceData::default())
            .await
            .unwrap();
        assert_eq!(score, 0.0);
    }
}

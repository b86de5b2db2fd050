use std::net::IpAddr;

use async_trait::async_trait;

/// External collaborator (§6): resolves a normalized domain to the address
/// set used as adaptive entities for DNS-name-watch (§4.5). Resolution
/// failure is not an error to the caller — C5 treats it as "no update this
/// tick" and retries on the next one.
#[async_trait]
pub trait DomainResolver: Send + Sync {
    async fn resolve(&self, domain: &str) -> Vec<IpAddr>;
}

/// Production resolver backed by the async runtime's DNS lookup. Kept
/// dependency-free beyond tokio: no extra resolver crate is pulled in for
/// what is, from the core's point of view, a black box.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioDomainResolver;

#[async_trait]
impl DomainResolver for TokioDomainResolver {
    async fn resolve(&self, domain: &str) -> Vec<IpAddr> {
        let lookup_target = format!("{domain}:0");
        match tokio::net::lookup_host(lookup_target).await {
            Ok(addrs) => addrs.map(|sa| sa.ip()).collect(),
            Err(error) => {
                tracing::debug!(%domain, %error, "domain resolution failed");
                Vec::new()
            }
        }
    }
}

#[cfg(feature = "test-util")]
pub mod test_util {
    use super::*;
    use mockall::mock;

    mock! {
        pub DomainResolver {}

        #[async_trait]
        impl DomainResolver for DomainResolver {
            async fn resolve(&self, domain: &str) -> Vec<IpAddr>;
        }
    }
}

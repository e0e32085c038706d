use std::time::Duration;

use log::debug;

use crate::config::DnsPodConfig;
use crate::error::DnsPodResult;
use crate::provider::dnspod::DnsPodClient;
use crate::provider::TXT_RECORD_TTL;

/// Fulfils dns-01 challenges with TXT records on DNSPod.
///
/// Every call builds a fresh [`DnsPodClient`], so zone changes made
/// between calls are always picked up.
#[derive(Debug, Clone)]
pub struct Authenticator {
    config: DnsPodConfig,
}

impl Authenticator {
    pub fn new(config: DnsPodConfig) -> Self {
        Self { config }
    }

    /// Publish `validation` as TXT record `validation_name`.
    pub async fn perform(
        &self,
        domain: &str,
        validation_name: &str,
        validation: &str,
    ) -> DnsPodResult<u64> {
        self.client()
            .await?
            .add_txt_record(domain, validation_name, validation, TXT_RECORD_TTL)
            .await
    }

    /// Remove the TXT record published by [`Authenticator::perform`].
    pub async fn cleanup(
        &self,
        domain: &str,
        validation_name: &str,
        validation: &str,
    ) -> DnsPodResult<usize> {
        self.client()
            .await?
            .del_txt_record(domain, validation_name, validation)
            .await
    }

    pub fn propagation_delay(&self) -> Duration {
        self.config.propagation_delay()
    }

    async fn client(&self) -> DnsPodResult<DnsPodClient> {
        debug!("Connecting to DNSPod as {}", self.config.credentials.secret_id);
        let client = DnsPodClient::connect(self.config.credentials.clone(), &self.config.api).await?;
        debug!("DNSPod account has {} zone(s)", client.zones().len());
        Ok(client)
    }
}

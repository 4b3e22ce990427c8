//! Client for the policy service's internal (mTLS, read-only) API.

use std::time::Duration;

use claw_policy_store::models::{IngressPolicy, TagMapping};
use serde::Deserialize;

use crate::config::AgentConfig;
use crate::error::Result;

#[derive(Deserialize)]
struct PoliciesBody {
    policies: Vec<IngressPolicy>,
}

#[derive(Deserialize)]
struct TagsBody {
    tags: Vec<TagMapping>,
}

/// Fetches tagged policies from the policy service's internal API.
pub struct PolicyClient {
    http: reqwest::Client,
    base_url: String,
}

impl PolicyClient {
    /// Builds a client with short dial/request timeouts: a hung policy
    /// service must not block the reconciler past one tick. When
    /// `config` carries a client cert/key and server CA, the connection
    /// presents client identity and pins the server CA, matching the
    /// internal API's documented mTLS-only contract; otherwise it falls
    /// back to the platform's default TLS trust store.
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(5));

        if let (Some(cert_path), Some(key_path)) =
            (&config.client_cert_file, &config.client_key_file)
        {
            let mut pem = std::fs::read(cert_path)?;
            pem.extend(std::fs::read(key_path)?);
            let identity = reqwest::Identity::from_pem(&pem)?;
            builder = builder.identity(identity);
        }

        if let Some(ca_path) = &config.server_ca_cert_file {
            let ca_pem = std::fs::read(ca_path)?;
            let ca = reqwest::Certificate::from_pem(&ca_pem)?;
            builder = builder.add_root_certificate(ca);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.policy_server_url.clone(),
        })
    }

    /// Fetches every currently tagged ingress policy.
    pub async fn fetch_policies(&self) -> Result<Vec<IngressPolicy>> {
        let url = format!("{}/networking/v0/internal/policies", self.base_url);
        let body: PoliciesBody = self.http.get(url).send().await?.error_for_status()?.json().await?;
        Ok(body.policies)
    }

    /// Fetches every currently claimed `{guid, tag}` mapping.
    pub async fn fetch_tags(&self) -> Result<Vec<TagMapping>> {
        let url = format!("{}/networking/v0/internal/tags", self.base_url);
        let body: TagsBody = self.http.get(url).send().await?.error_for_status()?.json().await?;
        Ok(body.tags)
    }
}

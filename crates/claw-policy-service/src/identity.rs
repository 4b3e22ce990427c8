//! The identity provider: an external collaborator (UAA/CC-equivalent)
//! assumed to expose token introspection and app-to-space resolution.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ServiceError;

/// The decoded shape of a bearer token, as returned by the identity
/// provider's introspection endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    /// The authenticated user's display name.
    pub user_name: String,
    /// Scopes granted to the token.
    pub scope: Vec<String>,
}

impl TokenInfo {
    /// Whether this token carries the network-admin scope.
    #[must_use]
    pub fn is_admin(&self, admin_scope: &str) -> bool {
        self.scope.iter().any(|s| s == admin_scope)
    }
}

/// Resolves tokens and application identities against the platform's
/// identity provider. Implementations talk to an external service; the
/// fixed capability set lets tests swap in a canned double.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Introspects a bearer token, returning its user and scopes.
    async fn introspect(&self, token: &str) -> Result<TokenInfo, ServiceError>;

    /// Resolves an application guid to its owning space guid, or `None` if
    /// the app does not exist / is not visible to the caller.
    async fn app_to_space(&self, app_guid: &str) -> Result<Option<String>, ServiceError>;

    /// Reports whether `user_name` is a developer in `space_guid`.
    async fn is_space_developer(
        &self,
        user_name: &str,
        space_guid: &str,
    ) -> Result<bool, ServiceError>;
}

/// Talks to the real identity provider over HTTP.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    uaa_url: String,
    cc_url: String,
    bearer: String,
}

impl HttpIdentityProvider {
    /// Builds a provider pointed at `uaa_url` (token introspection) and
    /// `cc_url` (app/space metadata), authenticating its own calls with
    /// `service_bearer`.
    #[must_use]
    pub fn new(uaa_url: String, cc_url: String, service_bearer: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(3))
                .build()
                .unwrap_or_default(),
            uaa_url,
            cc_url,
            bearer: service_bearer,
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn introspect(&self, token: &str) -> Result<TokenInfo, ServiceError> {
        #[derive(Deserialize)]
        struct Raw {
            user_name: String,
            #[serde(default)]
            scope: Vec<String>,
        }

        let response = self
            .client
            .post(format!("{}/check_token", self.uaa_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ServiceError::Identity(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::Unauthenticated);
        }

        let raw: Raw = response
            .json()
            .await
            .map_err(|e| ServiceError::Identity(e.to_string()))?;

        Ok(TokenInfo {
            user_name: raw.user_name,
            scope: raw.scope,
        })
    }

    async fn app_to_space(&self, app_guid: &str) -> Result<Option<String>, ServiceError> {
        #[derive(Deserialize)]
        struct AppResponse {
            space_guid: Option<String>,
        }

        let response = self
            .client
            .get(format!("{}/v2/apps/{}", self.cc_url, app_guid))
            .bearer_auth(&self.bearer)
            .send()
            .await
            .map_err(|e| ServiceError::Identity(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ServiceError::Identity(format!(
                "cloud controller returned {}",
                response.status()
            )));
        }

        let app: AppResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Identity(e.to_string()))?;
        Ok(app.space_guid)
    }

    async fn is_space_developer(
        &self,
        user_name: &str,
        space_guid: &str,
    ) -> Result<bool, ServiceError> {
        #[derive(Deserialize)]
        struct Developers {
            developers: Vec<String>,
        }

        let response = self
            .client
            .get(format!("{}/v2/spaces/{}/developers", self.cc_url, space_guid))
            .bearer_auth(&self.bearer)
            .send()
            .await
            .map_err(|e| ServiceError::Identity(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let developers: Developers = response
            .json()
            .await
            .map_err(|e| ServiceError::Identity(e.to_string()))?;
        Ok(developers.developers.iter().any(|d| d == user_name))
    }
}

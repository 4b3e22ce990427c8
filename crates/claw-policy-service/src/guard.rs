//! Authorization for policy mutations.
//!
//! A caller may create or delete policies referencing a set of app guids
//! if either their token carries the admin scope, or they are a developer
//! in every space those apps belong to. Any app that cannot be resolved
//! to a space denies the whole request.

use std::sync::Arc;

use claw_policy_store::models::{EgressSource, EgressSourceKind};

use crate::error::ServiceError;
use crate::identity::{IdentityProvider, TokenInfo};

/// Checks whether an authenticated caller may act on a set of app guids.
pub struct PolicyGuard {
    identity: Arc<dyn IdentityProvider>,
    admin_scope: String,
}

impl PolicyGuard {
    /// Builds a guard backed by `identity`, treating `admin_scope` as the
    /// scope string that bypasses per-space developer checks.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, admin_scope: impl Into<String>) -> Self {
        Self {
            identity,
            admin_scope: admin_scope.into(),
        }
    }

    /// Authorizes `token` against every app guid in `app_guids`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthenticated`] for an invalid token and
    /// [`ServiceError::Forbidden`] when the caller lacks admin scope and
    /// is not a developer of every referenced app's space.
    pub async fn authorize(
        &self,
        token: &str,
        app_guids: &[String],
    ) -> Result<TokenInfo, ServiceError> {
        let info = self.identity.introspect(token).await?;

        if info.is_admin(&self.admin_scope) {
            return Ok(info);
        }

        for guid in app_guids {
            let Some(space) = self.identity.app_to_space(guid).await? else {
                return Err(ServiceError::Forbidden);
            };
            if !self.identity.is_space_developer(&info.user_name, &space).await? {
                return Err(ServiceError::Forbidden);
            }
        }

        Ok(info)
    }

    /// Authorizes `token` against every egress source: an `App` source
    /// resolves to its space first, a `Space` source is checked directly.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`PolicyGuard::authorize`].
    pub async fn authorize_sources(
        &self,
        token: &str,
        sources: &[EgressSource],
    ) -> Result<TokenInfo, ServiceError> {
        let info = self.identity.introspect(token).await?;

        if info.is_admin(&self.admin_scope) {
            return Ok(info);
        }

        for source in sources {
            let space = match source.kind {
                EgressSourceKind::Space => source.id.clone(),
                EgressSourceKind::App => {
                    let Some(space) = self.identity.app_to_space(&source.id).await? else {
                        return Err(ServiceError::Forbidden);
                    };
                    space
                }
            };
            if !self.identity.is_space_developer(&info.user_name, &space).await? {
                return Err(ServiceError::Forbidden);
            }
        }

        Ok(info)
    }
}

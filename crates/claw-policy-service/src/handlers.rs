//! External (token-authorized) and internal (mTLS, read-only) HTTP routes.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use claw_policy_store::models::{EgressPolicy, EgressProtocol, IngressPolicy};
use claw_policy_store::InstrumentedStore;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::guard::PolicyGuard;
use crate::metrics::ErrorCounters;

/// Shared handler state.
pub struct AppState {
    /// The policy catalog.
    pub store: InstrumentedStore,
    /// Authorization against the identity provider.
    pub guard: PolicyGuard,
    /// Per-endpoint error counters.
    pub metrics: ErrorCounters,
}

/// Builds the router serving the external (token-authorized) API.
#[must_use]
pub fn external_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/networking/v0/external/policies",
            get(list_policies).post(create_policies).delete(delete_policies),
        )
        .route(
            "/networking/v0/external/egress_policies",
            get(list_egress_policies)
                .post(create_egress_policies)
                .delete(delete_egress_policies),
        )
        .route("/networking/v0/external/whoami", get(whoami))
        .with_state(state)
}

/// Builds the router serving the internal (mTLS, read-only) API.
#[must_use]
pub fn internal_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/networking/v0/internal/policies", get(internal_list_policies))
        .route("/networking/v0/internal/tags", get(internal_tags))
        .with_state(state)
}

#[derive(Deserialize)]
struct IdFilter {
    id: Option<String>,
}

fn parse_ids(filter: &IdFilter) -> Vec<String> {
    filter
        .id
        .as_deref()
        .map(|s| s.split(',').map(str::to_string).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ServiceError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or(ServiceError::Unauthenticated)
}

fn referenced_guids(policies: &[IngressPolicy]) -> Vec<String> {
    let mut guids: Vec<String> = policies
        .iter()
        .flat_map(|p| [p.source.id.clone(), p.destination.id.clone()])
        .collect();
    guids.sort();
    guids.dedup();
    guids
}

fn validate(policies: &[IngressPolicy]) -> Result<(), ServiceError> {
    for policy in policies {
        if policy.source.id.is_empty() {
            return Err(ServiceError::Validation("missing source id".to_string()));
        }
        if policy.destination.id.is_empty() {
            return Err(ServiceError::Validation("missing destination id".to_string()));
        }
        if policy.source.tag.is_some() || policy.destination.tag.is_some() {
            return Err(ServiceError::Validation("tags may not be specified".to_string()));
        }
        if !(1..=65535).contains(&policy.destination.port) {
            return Err(ServiceError::Validation(format!(
                "invalid destination port value: {}",
                policy.destination.port
            )));
        }
    }
    Ok(())
}

fn validate_egress(policies: &[EgressPolicy]) -> Result<(), ServiceError> {
    for policy in policies {
        if policy.source.id.is_empty() {
            return Err(ServiceError::Validation("missing source id".to_string()));
        }
        let dest = &policy.destination;
        let start: std::net::IpAddr = dest
            .ip_range_start
            .parse()
            .map_err(|_| ServiceError::Validation("malformed ip_range_start".to_string()))?;
        let end: std::net::IpAddr = dest
            .ip_range_end
            .parse()
            .map_err(|_| ServiceError::Validation("malformed ip_range_end".to_string()))?;
        if start > end {
            return Err(ServiceError::Validation(
                "ip_range_start must not exceed ip_range_end".to_string(),
            ));
        }
        match dest.protocol {
            EgressProtocol::Tcp | EgressProtocol::Udp => {
                let (Some(port_start), Some(port_end)) = (dest.port_start, dest.port_end) else {
                    return Err(ServiceError::Validation(
                        "tcp/udp destinations require port_start and port_end".to_string(),
                    ));
                };
                if port_start > port_end {
                    return Err(ServiceError::Validation(
                        "port_start must not exceed port_end".to_string(),
                    ));
                }
            }
            EgressProtocol::Icmp => {
                if dest.port_start.is_some() || dest.port_end.is_some() {
                    return Err(ServiceError::Validation(
                        "icmp destinations may not specify ports".to_string(),
                    ));
                }
            }
        }
    }
    Ok(())
}

#[derive(Deserialize, Serialize)]
struct PoliciesBody {
    policies: Vec<IngressPolicy>,
}

#[derive(Deserialize, Serialize)]
struct EgressPoliciesBody {
    policies: Vec<EgressPolicy>,
}

#[derive(Serialize)]
struct Empty {}

async fn list_policies(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(filter): Query<IdFilter>,
) -> Result<Json<PoliciesBody>, ServiceError> {
    let result = run(&state, "ExternalPoliciesIndex", async {
        let token = bearer_token(&headers)?;
        state.guard.authorize(token, &[]).await?;
        let ids = parse_ids(&filter);
        let policies = if ids.is_empty() {
            state.store.all_ingress().await?
        } else {
            state.store.ingress_by_guids(&ids).await?
        };
        Ok(PoliciesBody { policies })
    })
    .await?;
    Ok(Json(result))
}

async fn create_policies(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PoliciesBody>,
) -> Result<Json<Empty>, ServiceError> {
    run(&state, "ExternalPoliciesCreate", async {
        validate(&body.policies)?;
        let token = bearer_token(&headers)?;
        let guids = referenced_guids(&body.policies);
        state.guard.authorize(token, &guids).await?;
        state.store.create_ingress(&body.policies).await?;
        Ok(Empty {})
    })
    .await
    .map(Json)
}

async fn delete_policies(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PoliciesBody>,
) -> Result<Json<Empty>, ServiceError> {
    run(&state, "ExternalPoliciesDelete", async {
        let token = bearer_token(&headers)?;
        let guids = referenced_guids(&body.policies);
        state.guard.authorize(token, &guids).await?;
        state.store.delete_ingress(&body.policies).await?;
        Ok(Empty {})
    })
    .await
    .map(Json)
}

async fn list_egress_policies(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<EgressPoliciesBody>, ServiceError> {
    let result = run(&state, "ExternalEgressPoliciesIndex", async {
        let token = bearer_token(&headers)?;
        state.guard.authorize(token, &[]).await?;
        let policies = state.store.all_egress().await?;
        Ok(EgressPoliciesBody { policies })
    })
    .await?;
    Ok(Json(result))
}

async fn create_egress_policies(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<EgressPoliciesBody>,
) -> Result<Json<Empty>, ServiceError> {
    run(&state, "ExternalEgressPoliciesCreate", async {
        validate_egress(&body.policies)?;
        let token = bearer_token(&headers)?;
        let sources: Vec<_> = body.policies.iter().map(|p| p.source.clone()).collect();
        state.guard.authorize_sources(token, &sources).await?;
        state.store.create_egress(&body.policies).await?;
        Ok(Empty {})
    })
    .await
    .map(Json)
}

async fn delete_egress_policies(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<EgressPoliciesBody>,
) -> Result<Json<Empty>, ServiceError> {
    run(&state, "ExternalEgressPoliciesDelete", async {
        let token = bearer_token(&headers)?;
        let sources: Vec<_> = body.policies.iter().map(|p| p.source.clone()).collect();
        state.guard.authorize_sources(token, &sources).await?;
        state.store.delete_egress(&body.policies).await?;
        Ok(Empty {})
    })
    .await
    .map(Json)
}

#[derive(Serialize)]
struct WhoAmI {
    user_name: String,
}

async fn whoami(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<WhoAmI>, ServiceError> {
    run(&state, "ExternalWhoAmI", async {
        let token = bearer_token(&headers)?;
        let info = state.guard.authorize(token, &[]).await?;
        Ok(WhoAmI {
            user_name: info.user_name,
        })
    })
    .await
    .map(Json)
}

async fn internal_list_policies(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<IdFilter>,
) -> Result<Json<PoliciesBody>, ServiceError> {
    run(&state, "InternalPoliciesIndex", async {
        let ids = parse_ids(&filter);
        let policies = if ids.is_empty() {
            state.store.all_ingress().await?
        } else {
            state.store.ingress_by_guids(&ids).await?
        };
        Ok(PoliciesBody { policies })
    })
    .await
    .map(Json)
}

#[derive(Serialize)]
struct TagsBody {
    tags: Vec<claw_policy_store::models::TagMapping>,
}

async fn internal_tags(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TagsBody>, ServiceError> {
    run(&state, "InternalTagsIndex", async {
        let tags = state.store.tags().await?;
        Ok(TagsBody { tags })
    })
    .await
    .map(Json)
}

async fn run<T>(
    state: &AppState,
    context: &str,
    fut: impl std::future::Future<Output = Result<T, ServiceError>>,
) -> Result<T, ServiceError> {
    fut.await.inspect_err(|err| state.metrics.record(context, err))
}


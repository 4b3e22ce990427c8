//! Clawbernetes policy service binary.

use std::net::SocketAddr;
use std::sync::Arc;

use claw_policy_service::{
    config::ServiceConfig, external_router, internal_router, server_config, AppState,
    ErrorCounters, HttpIdentityProvider, PolicyGuard,
};
use claw_policy_store::{InstrumentedStore, PolicyStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let config = match ServiceConfig::load(std::path::Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let pool = match claw_policy_store::connect(&config.database.to_url(), 10).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "failed to connect to policy store");
            std::process::exit(1);
        }
    };

    let identity = Arc::new(HttpIdentityProvider::new(
        config.uaa_url.clone(),
        config.cc_url.clone(),
        config.uaa_client_secret.clone(),
    ));

    let state = Arc::new(AppState {
        store: InstrumentedStore::new(PolicyStore::new(pool, config.tag_length)),
        guard: PolicyGuard::new(identity, config.admin_scope.clone()),
        metrics: ErrorCounters::new(),
    });

    let external_addr: SocketAddr = format!("{}:{}", config.listen_host, config.listen_port)
        .parse()
        .expect("valid external listen address");
    let internal_addr: SocketAddr = format!("{}:{}", config.listen_host, config.internal_listen_port)
        .parse()
        .expect("valid internal listen address");

    let internal_tls_config = match server_config(&config) {
        Ok(server_config) => axum_server::tls_rustls::RustlsConfig::from_config(Arc::new(server_config)),
        Err(e) => {
            error!(error = %e, "failed to configure internal mTLS listener");
            std::process::exit(1);
        }
    };

    info!(%external_addr, %internal_addr, "starting policy service");

    let external = async {
        let listener = tokio::net::TcpListener::bind(external_addr)
            .await
            .expect("bind external listener");
        axum::serve(listener, external_router(Arc::clone(&state))).await
    };

    // The internal API is mTLS-only: client certificates are verified
    // against `ca_cert_file` at the handshake, so a request never reaches
    // a handler without one.
    let internal = async {
        axum_server::bind_rustls(internal_addr, internal_tls_config)
            .serve(internal_router(Arc::clone(&state)).into_make_service())
            .await
    };

    let (external_result, internal_result) = tokio::join!(external, internal);
    if let Err(e) = external_result {
        error!(error = %e, "external policy API stopped");
    }
    if let Err(e) = internal_result {
        error!(error = %e, "internal policy API stopped");
    }
}

//! Transactional relational store for ingress and egress network policies.
//!
//! A single [`sqlx::AnyPool`] backs both the server-grade (Postgres) and
//! file-embedded (SQLite) dialects; every query after schema setup runs
//! unchanged against either backend.

pub mod egress;
pub mod error;
pub mod groups;
pub mod ingress;
pub mod instrumented;
pub mod models;
pub mod schema;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::info;

pub use egress::EgressStore;
pub use error::{PolicyStoreError, Result};
pub use ingress::IngressStore;
pub use instrumented::InstrumentedStore;

/// Connects a pool and applies the schema, registering the `sqlx::Any`
/// drivers it needs on first use.
///
/// # Errors
///
/// Returns an error if the connection or schema setup fails.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<AnyPool> {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Applies `CREATE TABLE IF NOT EXISTS` schema statements to `pool`.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub async fn migrate(pool: &AnyPool) -> Result<()> {
    let kind = pool.connect_options().kind();
    let ddl = schema::schema_sql(kind);
    for statement in ddl.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(pool).await?;
    }
    info!(?kind, "policy store schema ready");
    Ok(())
}

/// Bundles an [`IngressStore`] and [`EgressStore`] over the same pool, the
/// shape `claw-policy-service` hands to its HTTP handlers.
pub struct PolicyStore {
    /// Ingress (app-to-app) policy CRUD.
    pub ingress: IngressStore,
    /// Egress (app/space-to-IP-range) policy CRUD.
    pub egress: EgressStore,
}

impl PolicyStore {
    /// Builds a combined store over `pool`.
    #[must_use]
    pub fn new(pool: AnyPool, tag_length_bytes: u32) -> Self {
        Self {
            ingress: IngressStore::new(pool.clone(), tag_length_bytes),
            egress: EgressStore::new(pool),
        }
    }
}

//! Transactional CRUD for egress policies.
//!
//! Mirrors [`crate::ingress::IngressStore`]'s structure but keyed through
//! `terminals`: a terminal is an opaque identity shared by the source and
//! destination sides of a policy so that policies referencing the same
//! app/space or the same IP range can be matched structurally instead of
//! by re-deriving equality from their full row contents.

use sqlx::any::AnyKind;
use sqlx::{Any, AnyPool, Transaction};

use crate::error::Result;
use crate::models::{
    EgressDestination, EgressIdCollection, EgressPolicy, EgressSource, EgressSourceKind,
};

/// Store of egress policies over a single connection pool.
pub struct EgressStore {
    pool: AnyPool,
    kind: AnyKind,
}

impl EgressStore {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: AnyPool) -> Self {
        let kind = pool.connect_options().kind();
        Self { pool, kind }
    }

    async fn new_terminal(tx: &mut Transaction<'_, Any>, kind: AnyKind) -> Result<i64> {
        // `terminals` has no natural key, unlike `groups.guid`, so a
        // post-insert SELECT can't disambiguate this row from one a
        // concurrent transaction just committed. RETURNING ties the id to
        // this exact INSERT instead.
        let id: i64 = match kind {
            AnyKind::Sqlite => {
                sqlx::query("INSERT INTO terminals DEFAULT VALUES")
                    .execute(&mut **tx)
                    .await?;
                sqlx::query_scalar("SELECT last_insert_rowid()")
                    .fetch_one(&mut **tx)
                    .await?
            }
            _ => {
                sqlx::query_scalar("INSERT INTO terminals DEFAULT VALUES RETURNING id")
                    .fetch_one(&mut **tx)
                    .await?
            }
        };
        Ok(id)
    }

    async fn source_terminal(
        &self,
        tx: &mut Transaction<'_, Any>,
        source: &EgressSource,
    ) -> Result<i64> {
        let column = match source.kind {
            EgressSourceKind::App => "app_guid",
            EgressSourceKind::Space => "space_guid",
        };
        let table = match source.kind {
            EgressSourceKind::App => "apps",
            EgressSourceKind::Space => "spaces",
        };

        let existing: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT terminal_id FROM {table} WHERE {column} = ?"
        ))
        .bind(&source.id)
        .fetch_optional(&mut **tx)
        .await?;
        if let Some(terminal_id) = existing {
            return Ok(terminal_id);
        }

        let terminal_id = Self::new_terminal(tx, self.kind).await?;
        sqlx::query(&format!(
            "INSERT INTO {table} (terminal_id, {column}) VALUES (?, ?)"
        ))
        .bind(terminal_id)
        .bind(&source.id)
        .execute(&mut **tx)
        .await?;
        Ok(terminal_id)
    }

    async fn destination_terminal(
        &self,
        tx: &mut Transaction<'_, Any>,
        destination: &EgressDestination,
    ) -> Result<i64> {
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT terminal_id FROM ip_ranges
             WHERE protocol = ? AND start_ip = ? AND end_ip = ?
               AND start_port IS ? AND end_port IS ? AND icmp_type IS ? AND icmp_code IS ?",
        )
        .bind(destination.protocol.as_str())
        .bind(&destination.ip_range_start)
        .bind(&destination.ip_range_end)
        .bind(destination.port_start.map(i64::from))
        .bind(destination.port_end.map(i64::from))
        .bind(destination.icmp_type.map(i64::from))
        .bind(destination.icmp_code.map(i64::from))
        .fetch_optional(&mut **tx)
        .await?;
        if let Some(terminal_id) = existing {
            return Ok(terminal_id);
        }

        let terminal_id = Self::new_terminal(tx, self.kind).await?;
        sqlx::query(
            "INSERT INTO ip_ranges
               (protocol, start_ip, end_ip, start_port, end_port, icmp_type, icmp_code, terminal_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(destination.protocol.as_str())
        .bind(&destination.ip_range_start)
        .bind(&destination.ip_range_end)
        .bind(destination.port_start.map(i64::from))
        .bind(destination.port_end.map(i64::from))
        .bind(destination.icmp_type.map(i64::from))
        .bind(destination.icmp_code.map(i64::from))
        .bind(terminal_id)
        .execute(&mut **tx)
        .await?;

        if destination.name.is_some() || destination.description.is_some() {
            sqlx::query(
                "INSERT INTO destination_metadatas (terminal_id, name, description)
                 VALUES (?, ?, ?)",
            )
            .bind(terminal_id)
            .bind(&destination.name)
            .bind(&destination.description)
            .execute(&mut **tx)
            .await?;
        }

        Ok(terminal_id)
    }

    /// Creates every policy in `policies`, provisioning terminals as
    /// needed. Idempotent and all-or-nothing across the batch.
    pub async fn create(&self, policies: &[EgressPolicy]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for policy in policies {
            let source_terminal = self.source_terminal(&mut tx, &policy.source).await?;
            let dest_terminal = self.destination_terminal(&mut tx, &policy.destination).await?;

            sqlx::query(
                "INSERT INTO egress_policies (source_terminal_id, destination_terminal_id)
                 SELECT ?, ?
                 WHERE NOT EXISTS (
                     SELECT 1 FROM egress_policies
                     WHERE source_terminal_id = ? AND destination_terminal_id = ?
                 )",
            )
            .bind(source_terminal)
            .bind(dest_terminal)
            .bind(source_terminal)
            .bind(dest_terminal)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Returns, for each policy shape, every concrete row bundle a delete
    /// would need to remove.
    pub async fn id_collections_by_egress_policy(
        &self,
        policy: &EgressPolicy,
    ) -> Result<Vec<EgressIdCollection>> {
        let (app_col, space_col): (Option<&str>, Option<&str>) = match policy.source.kind {
            EgressSourceKind::App => (Some("apps.app_guid"), None),
            EgressSourceKind::Space => (None, Some("spaces.space_guid")),
        };

        let rows: Vec<(i64, i64, i64, Option<i64>, Option<i64>, i64)> = sqlx::query_as(
            "SELECT ep.id, ep.source_terminal_id, ep.destination_terminal_id,
                    apps.id, spaces.id, ip_ranges.id
             FROM egress_policies ep
             JOIN ip_ranges ON ip_ranges.terminal_id = ep.destination_terminal_id
             LEFT JOIN apps ON apps.terminal_id = ep.source_terminal_id
             LEFT JOIN spaces ON spaces.terminal_id = ep.source_terminal_id
             WHERE (apps.app_guid = ? OR ? IS NULL)
               AND (spaces.space_guid = ? OR ? IS NULL)
               AND ip_ranges.protocol = ?
               AND ip_ranges.start_ip = ?
               AND ip_ranges.end_ip = ?",
        )
        .bind(app_col.map(|_| policy.source.id.clone()))
        .bind(app_col.map(|_| policy.source.id.clone()))
        .bind(space_col.map(|_| policy.source.id.clone()))
        .bind(space_col.map(|_| policy.source.id.clone()))
        .bind(policy.destination.protocol.as_str())
        .bind(&policy.destination.ip_range_start)
        .bind(&policy.destination.ip_range_end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(egress_policy_id, src_terminal_id, dest_terminal_id, src_app_id, src_space_id, ip_range_id)| {
                    EgressIdCollection {
                        egress_policy_id,
                        src_terminal_id,
                        dest_terminal_id,
                        src_app_id,
                        src_space_id,
                        ip_range_id,
                    }
                },
            )
            .collect())
    }

    /// Removes every policy in `policies`, then sweeps terminals left
    /// unreferenced by any remaining policy.
    pub async fn delete(&self, policies: &[EgressPolicy]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for policy in policies {
            let collections = self.id_collections_by_egress_policy(policy).await?;
            for row in collections {
                sqlx::query("DELETE FROM egress_policies WHERE id = ?")
                    .bind(row.egress_policy_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        sqlx::query(
            "DELETE FROM ip_ranges WHERE terminal_id NOT IN (
                 SELECT destination_terminal_id FROM egress_policies
             )",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM destination_metadatas WHERE terminal_id NOT IN (SELECT id FROM terminals)",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM apps WHERE terminal_id NOT IN (
                 SELECT source_terminal_id FROM egress_policies
             )",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM spaces WHERE terminal_id NOT IN (
                 SELECT source_terminal_id FROM egress_policies
             )",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM terminals WHERE id NOT IN (
                 SELECT source_terminal_id FROM egress_policies
                 UNION SELECT destination_terminal_id FROM egress_policies
             )",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Returns every egress policy.
    pub async fn all(&self) -> Result<Vec<EgressPolicy>> {
        let rows: Vec<(
            Option<String>,
            Option<String>,
            String,
            String,
            String,
            Option<i64>,
            Option<i64>,
            Option<i64>,
            Option<i64>,
            Option<String>,
            Option<String>,
        )> = sqlx::query_as(
            "SELECT apps.app_guid, spaces.space_guid,
                    ip_ranges.protocol, ip_ranges.start_ip, ip_ranges.end_ip,
                    ip_ranges.start_port, ip_ranges.end_port,
                    ip_ranges.icmp_type, ip_ranges.icmp_code,
                    destination_metadatas.name, destination_metadatas.description
             FROM egress_policies ep
             JOIN ip_ranges ON ip_ranges.terminal_id = ep.destination_terminal_id
             LEFT JOIN apps ON apps.terminal_id = ep.source_terminal_id
             LEFT JOIN spaces ON spaces.terminal_id = ep.source_terminal_id
             LEFT JOIN destination_metadatas ON destination_metadatas.terminal_id = ep.destination_terminal_id
             ORDER BY ep.id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(app_guid, space_guid, protocol, start_ip, end_ip, start_port, end_port, icmp_type, icmp_code, name, description)| {
                    let (id, kind) = match (app_guid, space_guid) {
                        (Some(guid), _) => (guid, EgressSourceKind::App),
                        (None, Some(guid)) => (guid, EgressSourceKind::Space),
                        (None, None) => (String::new(), EgressSourceKind::App),
                    };
                    EgressPolicy {
                        source: EgressSource { id, kind },
                        destination: EgressDestination {
                            protocol: if protocol == "udp" {
                                crate::models::EgressProtocol::Udp
                            } else if protocol == "icmp" {
                                crate::models::EgressProtocol::Icmp
                            } else {
                                crate::models::EgressProtocol::Tcp
                            },
                            ip_range_start: start_ip,
                            ip_range_end: end_ip,
                            #[allow(clippy::cast_possible_truncation)]
                            port_start: start_port.map(|p| p as u16),
                            #[allow(clippy::cast_possible_truncation)]
                            port_end: end_port.map(|p| p as u16),
                            #[allow(clippy::cast_possible_truncation)]
                            icmp_type: icmp_type.map(|t| t as u8),
                            #[allow(clippy::cast_possible_truncation)]
                            icmp_code: icmp_code.map(|c| c as u8),
                            name,
                            description,
                        },
                    }
                },
            )
            .collect())
    }
}

//! Transactional CRUD for ingress policies.

use sqlx::any::AnyKind;
use sqlx::{Any, AnyPool, Transaction};

use crate::error::Result;
use crate::groups::{capacity_for_tag_length, clear, create, format_tag};
use crate::models::{IngressDestination, IngressEndpoint, IngressPolicy, TagMapping};

/// Store of ingress policies over a single connection pool.
pub struct IngressStore {
    pool: AnyPool,
    kind: AnyKind,
    tag_length_bytes: u32,
}

impl IngressStore {
    /// Wraps an existing pool. `tag_length_bytes` bounds the tag space
    /// (e.g. `2` allows `0x0000..=0xFFFF` groups).
    #[must_use]
    pub fn new(pool: AnyPool, tag_length_bytes: u32) -> Self {
        let kind = pool.connect_options().kind();
        Self {
            pool,
            kind,
            tag_length_bytes,
        }
    }

    fn capacity(&self) -> i64 {
        capacity_for_tag_length(self.tag_length_bytes)
    }

    async fn destination_id(
        tx: &mut Transaction<'_, Any>,
        kind: AnyKind,
        group_id: i64,
        port: u16,
        protocol: &str,
    ) -> Result<i64> {
        sqlx::query(
            "INSERT INTO destinations (group_id, port, protocol)
             SELECT ?, ?, ?
             WHERE NOT EXISTS (
                 SELECT 1 FROM destinations WHERE group_id = ? AND port = ? AND protocol = ?
             )",
        )
        .bind(group_id)
        .bind(i64::from(port))
        .bind(protocol)
        .bind(group_id)
        .bind(i64::from(port))
        .bind(protocol)
        .execute(&mut **tx)
        .await?;

        let id: i64 = match kind {
            AnyKind::Sqlite => {
                let existing: Option<i64> = sqlx::query_scalar(
                    "SELECT id FROM destinations WHERE group_id = ? AND port = ? AND protocol = ?",
                )
                .bind(group_id)
                .bind(i64::from(port))
                .bind(protocol)
                .fetch_optional(&mut **tx)
                .await?;
                existing.expect("just inserted or already present")
            }
            _ => sqlx::query_scalar(
                "SELECT id FROM destinations WHERE group_id = ? AND port = ? AND protocol = ?",
            )
            .bind(group_id)
            .bind(i64::from(port))
            .bind(protocol)
            .fetch_one(&mut **tx)
            .await?,
        };
        Ok(id)
    }

    /// Creates every policy in `policies`, provisioning source/destination
    /// groups and the destination row as needed. Idempotent: re-creating an
    /// already-present policy is a no-op. All-or-nothing across the batch.
    pub async fn create(&self, policies: &[IngressPolicy]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let capacity = self.capacity();

        for policy in policies {
            let source_group_id =
                create(&mut tx, self.kind, &policy.source.id, capacity).await?;
            let dest_group_id =
                create(&mut tx, self.kind, &policy.destination.id, capacity).await?;
            let destination_id = Self::destination_id(
                &mut tx,
                self.kind,
                dest_group_id,
                policy.destination.port,
                policy.destination.protocol.as_str(),
            )
            .await?;

            sqlx::query(
                "INSERT INTO policies (group_id, destination_id)
                 SELECT ?, ?
                 WHERE NOT EXISTS (
                     SELECT 1 FROM policies WHERE group_id = ? AND destination_id = ?
                 )",
            )
            .bind(source_group_id)
            .bind(destination_id)
            .bind(source_group_id)
            .bind(destination_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Removes every policy in `policies`, then sweeps any destination or
    /// group left unreferenced, all within one transaction.
    pub async fn delete(&self, policies: &[IngressPolicy]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for policy in policies {
            sqlx::query(
                "DELETE FROM policies WHERE
                   group_id = (SELECT id FROM groups WHERE guid = ?)
                   AND destination_id = (
                       SELECT destinations.id FROM destinations
                       JOIN groups ON destinations.group_id = groups.id
                       WHERE groups.guid = ? AND destinations.port = ? AND destinations.protocol = ?
                   )",
            )
            .bind(&policy.source.id)
            .bind(&policy.destination.id)
            .bind(i64::from(policy.destination.port))
            .bind(policy.destination.protocol.as_str())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "DELETE FROM destinations WHERE id NOT IN (SELECT destination_id FROM policies)",
        )
        .execute(&mut *tx)
        .await?;

        let orphan_group_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM groups
             WHERE guid IS NOT NULL
               AND id NOT IN (SELECT group_id FROM policies)
               AND id NOT IN (SELECT group_id FROM destinations)",
        )
        .fetch_all(&mut *tx)
        .await?;

        for group_id in orphan_group_ids {
            clear(&mut tx, group_id).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn fetch(&self, where_clause: &str, guids: &[String]) -> Result<Vec<IngressPolicy>> {
        let query = format!(
            "SELECT src_grp.guid, src_grp.id, dst_grp.guid, dst_grp.id,
                    destinations.port, destinations.protocol
             FROM policies
             JOIN groups AS src_grp ON policies.group_id = src_grp.id
             JOIN destinations ON policies.destination_id = destinations.id
             JOIN groups AS dst_grp ON destinations.group_id = dst_grp.id
             {where_clause}
             ORDER BY src_grp.id, dst_grp.id, destinations.protocol, destinations.port"
        );

        let mut q = sqlx::query_as::<_, (String, i64, String, i64, i64, String)>(&query);
        for guid in guids {
            q = q.bind(guid);
        }
        let rows = q.fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(src_guid, src_id, dst_guid, dst_id, port, protocol)| IngressPolicy {
                source: IngressEndpoint {
                    id: src_guid,
                    tag: Some(format_tag(src_id, self.tag_length_bytes)),
                },
                destination: IngressDestination {
                    id: dst_guid,
                    tag: Some(format_tag(dst_id, self.tag_length_bytes)),
                    protocol: if protocol == "udp" {
                        crate::models::IngressProtocol::Udp
                    } else {
                        crate::models::IngressProtocol::Tcp
                    },
                    #[allow(clippy::cast_possible_truncation)]
                    port: port as u16,
                },
            })
            .collect())
    }

    /// Returns every ingress policy, sorted by `(source, destination,
    /// protocol, port)`.
    pub async fn all(&self) -> Result<Vec<IngressPolicy>> {
        self.fetch("", &[]).await
    }

    /// Returns every ingress policy whose source or destination guid is in
    /// `guids`.
    pub async fn by_guids(&self, guids: &[String]) -> Result<Vec<IngressPolicy>> {
        if guids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = std::iter::repeat("?")
            .take(guids.len())
            .collect::<Vec<_>>()
            .join(",");
        let where_clause = format!(
            "WHERE src_grp.guid IN ({placeholders}) OR dst_grp.guid IN ({placeholders})"
        );
        let doubled: Vec<String> = guids.iter().chain(guids.iter()).cloned().collect();
        self.fetch(&where_clause, &doubled).await
    }

    /// Lists every currently claimed `{guid, tag}` pair.
    pub async fn tags(&self) -> Result<Vec<TagMapping>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT guid, id FROM groups WHERE guid IS NOT NULL ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, row_id)| TagMapping {
                id,
                tag: format_tag(row_id, self.tag_length_bytes),
            })
            .collect())
    }
}

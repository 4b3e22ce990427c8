//! Tag-slot allocation.
//!
//! Groups are rows with a nullable `guid`; claiming one means updating the
//! lowest-id row whose `guid` is still `NULL`, mirroring the original
//! store's `UPDATE groups SET guid = ? WHERE ... ORDER BY id LIMIT 1`
//! claim. Unlike that implementation we don't pre-populate every row the
//! tag space could ever need (infeasible once `tag_length` exceeds two
//! bytes); instead a fresh row is grown on demand and the tag space ceiling
//! is enforced against `id < capacity`.

use sqlx::any::AnyKind;
use sqlx::{Any, Transaction};

use crate::error::{PolicyStoreError, Result};

/// The id-space ceiling for a given tag width, in bytes.
#[must_use]
pub fn capacity_for_tag_length(tag_length_bytes: u32) -> i64 {
    1_i64 << (tag_length_bytes * 8).min(62)
}

/// Formats a group's row id as its fixed-width hex tag.
#[must_use]
pub fn format_tag(id: i64, tag_length_bytes: u32) -> String {
    format!("{:0width$X}", id, width = (tag_length_bytes * 2) as usize)
}

/// Claims (or returns the existing) group id for `guid`, growing the table
/// if no reclaimed slot is free, within `tx`.
pub async fn create(
    tx: &mut Transaction<'_, Any>,
    kind: AnyKind,
    guid: &str,
    capacity: i64,
) -> Result<i64> {
    if let Some(id) = find_by_guid(tx, guid).await? {
        return Ok(id);
    }

    if let Some(id) = claim_lowest_free(tx, guid).await? {
        return Ok(id);
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM groups")
        .fetch_one(&mut **tx)
        .await?;
    if count >= capacity {
        return Err(PolicyStoreError::TagSpaceExhausted);
    }

    let id = insert_new_row(tx, kind, guid).await?;
    Ok(id)
}

async fn find_by_guid(tx: &mut Transaction<'_, Any>, guid: &str) -> Result<Option<i64>> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM groups WHERE guid = ?")
        .bind(guid)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(id)
}

async fn claim_lowest_free(tx: &mut Transaction<'_, Any>, guid: &str) -> Result<Option<i64>> {
    let candidate: Option<i64> =
        sqlx::query_scalar("SELECT id FROM groups WHERE guid IS NULL ORDER BY id LIMIT 1")
            .fetch_optional(&mut **tx)
            .await?;
    let Some(candidate) = candidate else {
        return Ok(None);
    };

    let claimed = sqlx::query("UPDATE groups SET guid = ? WHERE id = ? AND guid IS NULL")
        .bind(guid)
        .bind(candidate)
        .execute(&mut **tx)
        .await?;

    if claimed.rows_affected() == 1 {
        Ok(Some(candidate))
    } else {
        // Lost a race for this row within the same transaction scope; the
        // caller falls through to growing the table instead.
        Ok(None)
    }
}

async fn insert_new_row(tx: &mut Transaction<'_, Any>, kind: AnyKind, guid: &str) -> Result<i64> {
    sqlx::query("INSERT INTO groups (guid) VALUES (?)")
        .bind(guid)
        .execute(&mut **tx)
        .await?;

    let id: i64 = match kind {
        AnyKind::Sqlite => sqlx::query_scalar("SELECT last_insert_rowid()")
            .fetch_one(&mut **tx)
            .await?,
        _ => sqlx::query_scalar("SELECT id FROM groups WHERE guid = ?")
            .bind(guid)
            .fetch_one(&mut **tx)
            .await?,
    };
    Ok(id)
}

/// Clears a group's `guid`, freeing the slot for reuse. Called only when
/// no policy or destination still references the group.
pub async fn clear(tx: &mut Transaction<'_, Any>, group_id: i64) -> Result<()> {
    sqlx::query("UPDATE groups SET guid = NULL WHERE id = ?")
        .bind(group_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

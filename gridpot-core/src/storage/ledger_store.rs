use crate::error::{PoolError, Result};
use crate::storage::Storage;
use crate::types::{ActorRole, AuditRecord, LedgerEntry, LedgerEntryType};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::str::FromStr;
use uuid::Uuid;

pub struct LedgerStore<'a> {
    storage: &'a Storage,
}

impl<'a> LedgerStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Append one immutable ledger entry. Entries are never updated
    /// or deleted; corrections are new entries.
    pub async fn append(
        &self,
        player_id: &str,
        pool_id: Option<Uuid>,
        entry_type: LedgerEntryType,
        amount: i64,
        note: Option<&str>,
    ) -> Result<i64> {
        let conn = self.storage.get_connection().await;
        let id = insert_entry(&conn, player_id, pool_id, entry_type, amount, note)?;

        tracing::info!(
            "Ledger: {} {} {} for player {}",
            entry_type,
            amount,
            pool_id.map(|p| p.to_string()).unwrap_or_default(),
            player_id
        );
        Ok(id)
    }

    /// Signed sum of all entries for a player, optionally scoped to a pool.
    pub async fn balance(&self, player_id: &str, pool_id: Option<Uuid>) -> Result<i64> {
        let conn = self.storage.get_connection().await;

        let balance: i64 = match pool_id {
            Some(pool) => conn.query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries
                 WHERE player_id = ?1 AND pool_id = ?2",
                params![player_id, pool.to_string()],
                |r| r.get(0),
            )?,
            None => conn.query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries
                 WHERE player_id = ?1",
                params![player_id],
                |r| r.get(0),
            )?,
        };

        Ok(balance)
    }

    /// Total dollars the player paid into a pool (buy-in entries are
    /// stored negative, so the sum is negated).
    pub async fn buy_in_total(&self, pool_id: Uuid, player_id: &str) -> Result<i64> {
        let conn = self.storage.get_connection().await;

        let total: i64 = conn.query_row(
            "SELECT COALESCE(-SUM(amount), 0) FROM ledger_entries
             WHERE pool_id = ?1 AND player_id = ?2 AND entry_type = 'buy_in'",
            params![pool_id.to_string(), player_id],
            |r| r.get(0),
        )?;

        Ok(total)
    }

    /// Total dollars already refunded to the player for a pool.
    pub async fn refund_total(&self, pool_id: Uuid, player_id: &str) -> Result<i64> {
        let conn = self.storage.get_connection().await;

        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries
             WHERE pool_id = ?1 AND player_id = ?2 AND entry_type = 'refund'",
            params![pool_id.to_string(), player_id],
            |r| r.get(0),
        )?;

        Ok(total)
    }

    pub async fn entries_for_player(&self, player_id: &str) -> Result<Vec<LedgerEntry>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, player_id, pool_id, entry_type, amount, note, created_at
             FROM ledger_entries WHERE player_id = ?1 ORDER BY id",
        )?;

        let entry_iter = stmt.query_map(params![player_id], row_to_entry)?;

        let mut entries = Vec::new();
        for entry in entry_iter {
            entries.push(entry?);
        }

        Ok(entries)
    }

    pub async fn entries_for_pool(&self, pool_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, player_id, pool_id, entry_type, amount, note, created_at
             FROM ledger_entries WHERE pool_id = ?1 ORDER BY id",
        )?;

        let entry_iter = stmt.query_map(params![pool_id.to_string()], row_to_entry)?;

        let mut entries = Vec::new();
        for entry in entry_iter {
            entries.push(entry?);
        }

        Ok(entries)
    }

    /// Append one audit row for a pool-scoped action.
    pub async fn record_audit(
        &self,
        pool_id: Uuid,
        actor_role: ActorRole,
        actor_id: &str,
        action: &str,
        detail: serde_json::Value,
    ) -> Result<()> {
        let conn = self.storage.get_connection().await;
        insert_audit(&conn, pool_id, actor_role, actor_id, action, &detail)?;
        Ok(())
    }

    pub async fn audit_for_pool(&self, pool_id: Uuid) -> Result<Vec<AuditRecord>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, pool_id, actor_role, actor_id, action, detail, created_at
             FROM audit_log WHERE pool_id = ?1 ORDER BY id",
        )?;

        let record_iter = stmt.query_map(params![pool_id.to_string()], |row| {
            let pool_id_str: String = row.get(1)?;
            let role_str: String = row.get(2)?;
            let detail_str: String = row.get(5)?;
            let created_ts: i64 = row.get(6)?;

            let invalid = |idx: usize, name: &str| {
                rusqlite::Error::InvalidColumnType(
                    idx,
                    name.to_string(),
                    rusqlite::types::Type::Text,
                )
            };

            Ok(AuditRecord {
                id: row.get(0)?,
                pool_id: Uuid::parse_str(&pool_id_str).map_err(|_| invalid(1, "pool_id"))?,
                actor_role: ActorRole::from_str(&role_str)
                    .map_err(|_| invalid(2, "actor_role"))?,
                actor_id: row.get(3)?,
                action: row.get(4)?,
                detail: serde_json::from_str(&detail_str).map_err(|_| invalid(5, "detail"))?,
                created_at: DateTime::from_timestamp(created_ts, 0).unwrap_or_else(Utc::now),
            })
        })?;

        let mut records = Vec::new();
        for record in record_iter {
            records.push(record?);
        }

        Ok(records)
    }
}

/// Raw insert shared with multi-row transactions in other stores.
pub(crate) fn insert_entry(
    conn: &Connection,
    player_id: &str,
    pool_id: Option<Uuid>,
    entry_type: LedgerEntryType,
    amount: i64,
    note: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO ledger_entries (player_id, pool_id, entry_type, amount, note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            player_id,
            pool_id.map(|p| p.to_string()),
            entry_type.as_str(),
            amount,
            note,
            Utc::now().timestamp(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Raw audit insert shared with multi-row transactions.
pub(crate) fn insert_audit(
    conn: &Connection,
    pool_id: Uuid,
    actor_role: ActorRole,
    actor_id: &str,
    action: &str,
    detail: &serde_json::Value,
) -> Result<()> {
    conn.execute(
        "INSERT INTO audit_log (pool_id, actor_role, actor_id, action, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            pool_id.to_string(),
            actor_role.as_str(),
            actor_id,
            action,
            serde_json::to_string(detail).map_err(PoolError::Serialization)?,
            Utc::now().timestamp(),
        ],
    )?;
    Ok(())
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let pool_id_str: Option<String> = row.get(2)?;
    let type_str: String = row.get(3)?;
    let created_ts: i64 = row.get(6)?;

    let invalid = |idx: usize, name: &str| {
        rusqlite::Error::InvalidColumnType(idx, name.to_string(), rusqlite::types::Type::Text)
    };

    Ok(LedgerEntry {
        id: row.get(0)?,
        player_id: row.get(1)?,
        pool_id: pool_id_str
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|_| invalid(2, "pool_id"))?,
        entry_type: LedgerEntryType::from_str(&type_str)
            .map_err(|_| invalid(3, "entry_type"))?,
        amount: row.get(4)?,
        note: row.get(5)?,
        created_at: DateTime::from_timestamp(created_ts, 0).unwrap_or_else(Utc::now),
    })
}

use crate::error::{PoolError, Result};
use crate::storage::Storage;
use crate::types::{ClaimStatus, Pool, PoolStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use std::str::FromStr;
use uuid::Uuid;

pub struct PoolStore<'a> {
    storage: &'a Storage,
}

impl<'a> PoolStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Insert the pool row and its 100 squares in one transaction.
    pub async fn create_pool(&self, pool: &Pool) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO pools
             (id, name, sport, denomination, max_per_player, approval_threshold,
              payout_structure, ot_rule, tip_pct, status, col_digits, row_digits,
              external_game_id, created_at, locked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                pool.id.to_string(),
                pool.name,
                pool.sport.to_string(),
                pool.denomination,
                pool.max_per_player,
                pool.approval_threshold,
                pool.payout_structure.as_str(),
                pool.ot_rule.as_str(),
                pool.tip_pct,
                pool.status.as_str(),
                pool.col_digits.as_ref().map(serde_json::to_string).transpose()?,
                pool.row_digits.as_ref().map(serde_json::to_string).transpose()?,
                pool.external_game_id,
                pool.created_at.timestamp(),
                pool.locked_at.map(|t| t.timestamp()),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO squares (pool_id, row_idx, col_idx, claim_status)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in 0u8..10 {
                for col in 0u8..10 {
                    stmt.execute(params![
                        pool.id.to_string(),
                        row,
                        col,
                        ClaimStatus::Available.as_str(),
                    ])?;
                }
            }
        }

        tx.commit()?;

        tracing::info!("Created pool {} ({})", pool.name, pool.id);
        Ok(())
    }

    pub async fn load_pool(&self, pool_id: Uuid) -> Result<Pool> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, name, sport, denomination, max_per_player, approval_threshold,
                    payout_structure, ot_rule, tip_pct, status, col_digits, row_digits,
                    external_game_id, created_at, locked_at
             FROM pools WHERE id = ?1",
        )?;

        let pool = stmt
            .query_row(params![pool_id.to_string()], row_to_pool)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => PoolError::PoolNotFound(pool_id),
                other => PoolError::Storage(other),
            })?;

        Ok(pool)
    }

    pub async fn list_pools(&self) -> Result<Vec<Pool>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, name, sport, denomination, max_per_player, approval_threshold,
                    payout_structure, ot_rule, tip_pct, status, col_digits, row_digits,
                    external_game_id, created_at, locked_at
             FROM pools ORDER BY created_at DESC",
        )?;

        let pool_iter = stmt.query_map([], row_to_pool)?;

        let mut pools = Vec::new();
        for pool in pool_iter {
            pools.push(pool?);
        }

        Ok(pools)
    }

    /// Conditional status write: applies only while the pool is still in
    /// the expected state. Returns false on a lost race, so an absorbing
    /// state (cancelled, suspended) committed concurrently is never
    /// overwritten.
    pub async fn update_status(
        &self,
        pool_id: Uuid,
        expected: PoolStatus,
        next: PoolStatus,
    ) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let changed = conn.execute(
            "UPDATE pools SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![next.as_str(), pool_id.to_string(), expected.as_str()],
        )?;

        if changed == 0 {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM pools WHERE id = ?1",
                params![pool_id.to_string()],
                |r| r.get(0),
            )?;
            if exists == 0 {
                return Err(PoolError::PoolNotFound(pool_id));
            }
            return Ok(false);
        }

        Ok(true)
    }

    /// Persist both digit permutations and flip the pool to locked in one
    /// conditional update. Zero rows changed means the pool was already
    /// locked (or no longer open); the digits are never overwritten.
    pub async fn lock_digits(
        &self,
        pool_id: Uuid,
        col_digits: &[u8],
        row_digits: &[u8],
    ) -> Result<()> {
        let conn = self.storage.get_connection().await;

        let changed = conn.execute(
            "UPDATE pools
             SET col_digits = ?1, row_digits = ?2, status = ?3, locked_at = ?4
             WHERE id = ?5 AND status = 'open'
               AND col_digits IS NULL AND row_digits IS NULL",
            params![
                serde_json::to_string(col_digits)?,
                serde_json::to_string(row_digits)?,
                PoolStatus::Locked.as_str(),
                Utc::now().timestamp(),
                pool_id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(PoolError::AlreadyLocked);
        }

        tracing::info!("Locked digits for pool {}", pool_id);
        Ok(())
    }
}

fn row_to_pool(row: &Row<'_>) -> rusqlite::Result<Pool> {
    let id_str: String = row.get(0)?;
    let sport_str: String = row.get(2)?;
    let structure_str: String = row.get(6)?;
    let ot_str: String = row.get(7)?;
    let status_str: String = row.get(9)?;
    let col_digits_str: Option<String> = row.get(10)?;
    let row_digits_str: Option<String> = row.get(11)?;
    let created_ts: i64 = row.get(13)?;
    let locked_ts: Option<i64> = row.get(14)?;

    let invalid = |idx: usize, name: &str| {
        rusqlite::Error::InvalidColumnType(idx, name.to_string(), rusqlite::types::Type::Text)
    };

    let col_digits: Option<Vec<u8>> = col_digits_str
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|_| invalid(10, "col_digits"))?;
    let row_digits: Option<Vec<u8>> = row_digits_str
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|_| invalid(11, "row_digits"))?;

    Ok(Pool {
        id: Uuid::parse_str(&id_str).map_err(|_| invalid(0, "id"))?,
        name: row.get(1)?,
        sport: FromStr::from_str(&sport_str).map_err(|_| invalid(2, "sport"))?,
        denomination: row.get(3)?,
        max_per_player: row.get(4)?,
        approval_threshold: row.get(5)?,
        payout_structure: FromStr::from_str(&structure_str)
            .map_err(|_| invalid(6, "payout_structure"))?,
        ot_rule: FromStr::from_str(&ot_str).map_err(|_| invalid(7, "ot_rule"))?,
        tip_pct: row.get(8)?,
        status: FromStr::from_str(&status_str).map_err(|_| invalid(9, "status"))?,
        col_digits,
        row_digits,
        external_game_id: row.get(12)?,
        created_at: DateTime::from_timestamp(created_ts, 0).unwrap_or_else(Utc::now),
        locked_at: locked_ts.and_then(|t| DateTime::from_timestamp(t, 0)),
    })
}

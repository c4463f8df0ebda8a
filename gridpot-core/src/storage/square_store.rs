use crate::error::{PoolError, Result};
use crate::storage::Storage;
use crate::types::{ClaimStatus, Square};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use std::str::FromStr;
use uuid::Uuid;

pub struct SquareStore<'a> {
    storage: &'a Storage,
}

impl<'a> SquareStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn get_square(&self, pool_id: Uuid, row: u8, col: u8) -> Result<Square> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT pool_id, row_idx, col_idx, claim_status, owner, is_admin_override,
                    claimed_at, requested_at, released_at
             FROM squares WHERE pool_id = ?1 AND row_idx = ?2 AND col_idx = ?3",
        )?;

        let square = stmt
            .query_row(params![pool_id.to_string(), row, col], row_to_square)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => PoolError::SquareNotFound { row, col },
                other => PoolError::Storage(other),
            })?;

        Ok(square)
    }

    /// All 100 squares in (row, col) order.
    pub async fn grid(&self, pool_id: Uuid) -> Result<Vec<Square>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT pool_id, row_idx, col_idx, claim_status, owner, is_admin_override,
                    claimed_at, requested_at, released_at
             FROM squares WHERE pool_id = ?1 ORDER BY row_idx, col_idx",
        )?;

        let square_iter = stmt.query_map(params![pool_id.to_string()], row_to_square)?;

        let mut squares = Vec::new();
        for square in square_iter {
            squares.push(square?);
        }

        Ok(squares)
    }

    /// Atomic check-and-set from "available" to the claimed/pending state.
    /// Exactly one of two racing claims can win: the status predicate is
    /// part of the UPDATE itself, not a separate read.
    pub async fn claim_available(
        &self,
        pool_id: Uuid,
        row: u8,
        col: u8,
        owner: &str,
        new_status: ClaimStatus,
        admin_override: bool,
    ) -> Result<()> {
        let conn = self.storage.get_connection().await;
        let now = Utc::now().timestamp();

        let changed = match new_status {
            ClaimStatus::Claimed => conn.execute(
                "UPDATE squares
                 SET claim_status = 'claimed', owner = ?1, is_admin_override = ?2,
                     claimed_at = ?3
                 WHERE pool_id = ?4 AND row_idx = ?5 AND col_idx = ?6
                   AND claim_status = 'available'",
                params![owner, admin_override, now, pool_id.to_string(), row, col],
            )?,
            ClaimStatus::Pending => conn.execute(
                "UPDATE squares
                 SET claim_status = 'pending', owner = ?1, is_admin_override = ?2,
                     requested_at = ?3
                 WHERE pool_id = ?4 AND row_idx = ?5 AND col_idx = ?6
                   AND claim_status = 'available'",
                params![owner, admin_override, now, pool_id.to_string(), row, col],
            )?,
            ClaimStatus::Available => {
                return Err(PoolError::internal("claim target cannot be 'available'"))
            }
        };

        if changed == 0 {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM squares
                 WHERE pool_id = ?1 AND row_idx = ?2 AND col_idx = ?3",
                params![pool_id.to_string(), row, col],
                |r| r.get(0),
            )?;
            return if exists == 0 {
                Err(PoolError::SquareNotFound { row, col })
            } else {
                Err(PoolError::SquareUnavailable { row, col })
            };
        }

        Ok(())
    }

    /// Conditional transition from an expected occupied state. Returns
    /// false when the square was not in the expected state (CAS lost).
    pub async fn transition(
        &self,
        pool_id: Uuid,
        row: u8,
        col: u8,
        expected: ClaimStatus,
        new_status: ClaimStatus,
    ) -> Result<bool> {
        let conn = self.storage.get_connection().await;
        let now = Utc::now().timestamp();

        let changed = match new_status {
            // approve: pending -> claimed, owner kept
            ClaimStatus::Claimed => conn.execute(
                "UPDATE squares SET claim_status = 'claimed', claimed_at = ?1
                 WHERE pool_id = ?2 AND row_idx = ?3 AND col_idx = ?4
                   AND claim_status = ?5",
                params![now, pool_id.to_string(), row, col, expected.as_str()],
            )?,
            // release/reject: owner cleared
            ClaimStatus::Available => conn.execute(
                "UPDATE squares
                 SET claim_status = 'available', owner = NULL,
                     is_admin_override = 0, released_at = ?1
                 WHERE pool_id = ?2 AND row_idx = ?3 AND col_idx = ?4
                   AND claim_status = ?5",
                params![now, pool_id.to_string(), row, col, expected.as_str()],
            )?,
            ClaimStatus::Pending => {
                return Err(PoolError::internal("no transition re-enters 'pending'"))
            }
        };

        Ok(changed == 1)
    }

    /// Release-then-claim as one unit: the target player takes the square
    /// whatever its prior state. Runs in a single transaction under one
    /// connection guard, so no other operation observes the intermediate
    /// release. On a capacity failure the release half still applies and
    /// the square ends available.
    pub async fn reassign(
        &self,
        pool_id: Uuid,
        row: u8,
        col: u8,
        new_owner: &str,
        max_per_player: u32,
    ) -> Result<Square> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;
        let now = Utc::now().timestamp();

        let prior = tx
            .query_row(
                "SELECT pool_id, row_idx, col_idx, claim_status, owner, is_admin_override,
                        claimed_at, requested_at, released_at
                 FROM squares WHERE pool_id = ?1 AND row_idx = ?2 AND col_idx = ?3",
                params![pool_id.to_string(), row, col],
                row_to_square,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => PoolError::SquareNotFound { row, col },
                other => PoolError::Storage(other),
            })?;

        if prior.claim_status != ClaimStatus::Available {
            tx.execute(
                "UPDATE squares
                 SET claim_status = 'available', owner = NULL,
                     is_admin_override = 0, released_at = ?1
                 WHERE pool_id = ?2 AND row_idx = ?3 AND col_idx = ?4",
                params![now, pool_id.to_string(), row, col],
            )?;
        }

        let held: u32 = tx.query_row(
            "SELECT COUNT(*) FROM squares
             WHERE pool_id = ?1 AND owner = ?2 AND claim_status != 'available'",
            params![pool_id.to_string(), new_owner],
            |r| r.get(0),
        )?;
        if held >= max_per_player {
            tx.commit()?;
            return Err(PoolError::CapacityExceeded {
                limit: max_per_player,
            });
        }

        tx.execute(
            "UPDATE squares
             SET claim_status = 'claimed', owner = ?1, is_admin_override = 1,
                 claimed_at = ?2
             WHERE pool_id = ?3 AND row_idx = ?4 AND col_idx = ?5",
            params![new_owner, now, pool_id.to_string(), row, col],
        )?;

        tx.commit()?;
        Ok(prior)
    }

    /// Exchange the owners of two squares in one transaction. Either side
    /// may be unowned; both coordinate pairs must exist and differ.
    pub async fn swap(
        &self,
        pool_id: Uuid,
        a: (u8, u8),
        b: (u8, u8),
    ) -> Result<(Square, Square)> {
        if a == b {
            return Err(PoolError::SquareNotFound { row: b.0, col: b.1 });
        }

        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let load = |tx: &rusqlite::Transaction<'_>, (row, col): (u8, u8)| {
            tx.query_row(
                "SELECT pool_id, row_idx, col_idx, claim_status, owner, is_admin_override,
                        claimed_at, requested_at, released_at
                 FROM squares WHERE pool_id = ?1 AND row_idx = ?2 AND col_idx = ?3",
                params![pool_id.to_string(), row, col],
                row_to_square,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => PoolError::SquareNotFound { row, col },
                other => PoolError::Storage(other),
            })
        };

        let square_a = load(&tx, a)?;
        let square_b = load(&tx, b)?;

        let store = |tx: &rusqlite::Transaction<'_>,
                     (row, col): (u8, u8),
                     from: &Square|
         -> Result<()> {
            tx.execute(
                "UPDATE squares
                 SET claim_status = ?1, owner = ?2, is_admin_override = ?3
                 WHERE pool_id = ?4 AND row_idx = ?5 AND col_idx = ?6",
                params![
                    from.claim_status.as_str(),
                    from.owner,
                    from.is_admin_override,
                    pool_id.to_string(),
                    row,
                    col,
                ],
            )?;
            Ok(())
        };

        store(&tx, a, &square_b)?;
        store(&tx, b, &square_a)?;

        tx.commit()?;
        drop(conn);

        tracing::info!(
            "Swapped squares ({},{}) and ({},{}) in pool {}",
            a.0,
            a.1,
            b.0,
            b.1,
            pool_id
        );

        let swapped_a = self.get_square(pool_id, a.0, a.1).await?;
        let swapped_b = self.get_square(pool_id, b.0, b.1).await?;
        Ok((swapped_a, swapped_b))
    }

    /// Claimed + pending squares held by a player in this pool.
    pub async fn player_square_count(&self, pool_id: Uuid, player_id: &str) -> Result<u32> {
        let conn = self.storage.get_connection().await;

        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM squares
             WHERE pool_id = ?1 AND owner = ?2 AND claim_status != 'available'",
            params![pool_id.to_string(), player_id],
            |r| r.get(0),
        )?;

        Ok(count)
    }

    /// Claimed squares only, used by the refund guard.
    pub async fn player_claimed_count(&self, pool_id: Uuid, player_id: &str) -> Result<u32> {
        let conn = self.storage.get_connection().await;

        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM squares
             WHERE pool_id = ?1 AND owner = ?2 AND claim_status = 'claimed'",
            params![pool_id.to_string(), player_id],
            |r| r.get(0),
        )?;

        Ok(count)
    }

    /// Non-available squares in the pool (the approval-threshold input).
    pub async fn filled_count(&self, pool_id: Uuid) -> Result<u32> {
        let conn = self.storage.get_connection().await;

        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM squares
             WHERE pool_id = ?1 AND claim_status != 'available'",
            params![pool_id.to_string()],
            |r| r.get(0),
        )?;

        Ok(count)
    }
}

fn row_to_square(row: &Row<'_>) -> rusqlite::Result<Square> {
    let pool_id_str: String = row.get(0)?;
    let status_str: String = row.get(3)?;
    let claimed_ts: Option<i64> = row.get(6)?;
    let requested_ts: Option<i64> = row.get(7)?;
    let released_ts: Option<i64> = row.get(8)?;

    let invalid = |idx: usize, name: &str| {
        rusqlite::Error::InvalidColumnType(idx, name.to_string(), rusqlite::types::Type::Text)
    };

    Ok(Square {
        pool_id: Uuid::parse_str(&pool_id_str).map_err(|_| invalid(0, "pool_id"))?,
        row: row.get(1)?,
        col: row.get(2)?,
        claim_status: ClaimStatus::from_str(&status_str)
            .map_err(|_| invalid(3, "claim_status"))?,
        owner: row.get(4)?,
        is_admin_override: row.get(5)?,
        claimed_at: claimed_ts.and_then(|t| DateTime::from_timestamp(t, 0)),
        requested_at: requested_ts.and_then(|t| DateTime::from_timestamp(t, 0)),
        released_at: released_ts.and_then(|t| DateTime::from_timestamp(t, 0)),
    })
}

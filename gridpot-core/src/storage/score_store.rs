use crate::error::{PoolError, Result};
use crate::storage::ledger_store::{insert_audit, insert_entry};
use crate::storage::Storage;
use crate::types::{ActorRole, LedgerEntryType, Score, Winner};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use uuid::Uuid;

pub struct ScoreStore<'a> {
    storage: &'a Storage,
}

impl<'a> ScoreStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn get_score(&self, pool_id: Uuid, period_key: &str) -> Result<Option<Score>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT pool_id, period_key, period_label, away_score, home_score,
                    payout_pct, entered_at
             FROM scores WHERE pool_id = ?1 AND period_key = ?2",
        )?;

        match stmt.query_row(params![pool_id.to_string(), period_key], row_to_score) {
            Ok(score) => Ok(Some(score)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PoolError::Storage(e)),
        }
    }

    pub async fn list_scores(&self, pool_id: Uuid) -> Result<Vec<Score>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT pool_id, period_key, period_label, away_score, home_score,
                    payout_pct, entered_at
             FROM scores WHERE pool_id = ?1 ORDER BY entered_at",
        )?;

        let score_iter = stmt.query_map(params![pool_id.to_string()], row_to_score)?;

        let mut scores = Vec::new();
        for score in score_iter {
            scores.push(score?);
        }

        Ok(scores)
    }

    pub async fn get_winner(&self, pool_id: Uuid, period_key: &str) -> Result<Option<Winner>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT pool_id, period_key, player_id, row_idx, col_idx,
                    payout_amount, tip_suggestion, resolved_at
             FROM winners WHERE pool_id = ?1 AND period_key = ?2",
        )?;

        match stmt.query_row(params![pool_id.to_string(), period_key], row_to_winner) {
            Ok(winner) => Ok(Some(winner)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PoolError::Storage(e)),
        }
    }

    pub async fn list_winners(&self, pool_id: Uuid) -> Result<Vec<Winner>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT pool_id, period_key, player_id, row_idx, col_idx,
                    payout_amount, tip_suggestion, resolved_at
             FROM winners WHERE pool_id = ?1 ORDER BY resolved_at",
        )?;

        let winner_iter = stmt.query_map(params![pool_id.to_string()], row_to_winner)?;

        let mut winners = Vec::new();
        for winner in winner_iter {
            winners.push(winner?);
        }

        Ok(winners)
    }

    /// One atomic unit for a score entry: upsert the score, supersede any
    /// prior winner (with a compensating adjustment for its payout), write
    /// the new winner and its payout entry, and append the audit row.
    /// A failure partway leaves none of it behind.
    pub async fn record_resolution(
        &self,
        score: &Score,
        winner: Option<&Winner>,
        actor_role: ActorRole,
        actor_id: &str,
        detail: serde_json::Value,
    ) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO scores
             (pool_id, period_key, period_label, away_score, home_score, payout_pct, entered_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(pool_id, period_key) DO UPDATE SET
                 away_score = excluded.away_score,
                 home_score = excluded.home_score,
                 payout_pct = excluded.payout_pct,
                 entered_at = excluded.entered_at",
            params![
                score.pool_id.to_string(),
                score.period_key,
                score.period_label,
                score.away_score,
                score.home_score,
                score.payout_pct,
                score.entered_at.timestamp(),
            ],
        )?;

        // Supersede a prior resolution for this period: reverse its payout
        // and drop the winner row before writing the replacement.
        let prior = match tx.query_row(
            "SELECT pool_id, period_key, player_id, row_idx, col_idx,
                    payout_amount, tip_suggestion, resolved_at
             FROM winners WHERE pool_id = ?1 AND period_key = ?2",
            params![score.pool_id.to_string(), score.period_key],
            row_to_winner,
        ) {
            Ok(w) => Some(w),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(PoolError::Storage(e)),
        };

        if let Some(prior) = &prior {
            insert_entry(
                &tx,
                &prior.player_id,
                Some(score.pool_id),
                LedgerEntryType::Adjustment,
                -prior.payout_amount,
                Some(&format!("superseded payout for {}", score.period_key)),
            )?;
            tx.execute(
                "DELETE FROM winners WHERE pool_id = ?1 AND period_key = ?2",
                params![score.pool_id.to_string(), score.period_key],
            )?;
        }

        if let Some(winner) = winner {
            tx.execute(
                "INSERT INTO winners
                 (pool_id, period_key, player_id, row_idx, col_idx,
                  payout_amount, tip_suggestion, resolved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    winner.pool_id.to_string(),
                    winner.period_key,
                    winner.player_id,
                    winner.row,
                    winner.col,
                    winner.payout_amount,
                    winner.tip_suggestion,
                    winner.resolved_at.timestamp(),
                ],
            )?;
            insert_entry(
                &tx,
                &winner.player_id,
                Some(score.pool_id),
                LedgerEntryType::Payout,
                winner.payout_amount,
                Some(&format!("payout for {}", score.period_key)),
            )?;
        }

        insert_audit(
            &tx,
            score.pool_id,
            actor_role,
            actor_id,
            "score_entered",
            &detail,
        )?;

        tx.commit()?;
        Ok(())
    }
}

fn row_to_score(row: &Row<'_>) -> rusqlite::Result<Score> {
    let pool_id_str: String = row.get(0)?;
    let entered_ts: i64 = row.get(6)?;

    Ok(Score {
        pool_id: Uuid::parse_str(&pool_id_str).map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                0,
                "pool_id".to_string(),
                rusqlite::types::Type::Text,
            )
        })?,
        period_key: row.get(1)?,
        period_label: row.get(2)?,
        away_score: row.get(3)?,
        home_score: row.get(4)?,
        payout_pct: row.get(5)?,
        entered_at: DateTime::from_timestamp(entered_ts, 0).unwrap_or_else(Utc::now),
    })
}

fn row_to_winner(row: &Row<'_>) -> rusqlite::Result<Winner> {
    let pool_id_str: String = row.get(0)?;
    let resolved_ts: i64 = row.get(7)?;

    Ok(Winner {
        pool_id: Uuid::parse_str(&pool_id_str).map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                0,
                "pool_id".to_string(),
                rusqlite::types::Type::Text,
            )
        })?,
        period_key: row.get(1)?,
        player_id: row.get(2)?,
        row: row.get(3)?,
        col: row.get(4)?,
        payout_amount: row.get(5)?,
        tip_suggestion: row.get(6)?,
        resolved_at: DateTime::from_timestamp(resolved_ts, 0).unwrap_or_else(Utc::now),
    })
}

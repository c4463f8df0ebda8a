//! Winner resolution engine.
//!
//! A period's final score maps through the locked digit permutations to
//! one square; the owner (if any) wins that period's share of the pot.
//! The score upsert, winner supersede, and ledger writes are one atomic
//! unit, so a reader never observes a score without its resolved winner.

use crate::error::{PoolError, Result};
use crate::feed::ScoreFeed;
use crate::notify::{dispatch, NotificationEvent, NotificationSink};
use crate::payout::{payout_amount, percentages_for, tip_amount};
use crate::storage::{PoolStore, ScoreStore, SquareStore, Storage};
use crate::types::{ActorRole, OtRule, Pool, PoolStatus, Score, Winner};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub struct WinnerEngine {
    storage: Arc<Storage>,
    notifier: Arc<dyn NotificationSink>,
}

impl WinnerEngine {
    pub fn new(storage: Arc<Storage>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { storage, notifier }
    }

    /// Enter (or re-enter) a period's final score and resolve the winner.
    /// Returns the resolved winner, or None when the mapped square is
    /// unowned (the money stays with the pool). Re-entering a period
    /// replaces the prior winner and reverses its payout with a
    /// compensating adjustment.
    pub async fn enter_score(
        &self,
        pool_id: Uuid,
        period_key: &str,
        away_score: i64,
        home_score: i64,
        pct_override: Option<i64>,
        actor_id: &str,
        actor_role: ActorRole,
    ) -> Result<Option<Winner>> {
        let pool = PoolStore::new(&self.storage).load_pool(pool_id).await?;

        let col_digits = pool.col_digits.clone().ok_or(PoolError::GridNotLocked)?;
        let row_digits = pool.row_digits.clone().ok_or(PoolError::GridNotLocked)?;

        if !matches!(pool.status, PoolStatus::Locked | PoolStatus::InProgress) {
            return Err(PoolError::validation(format!(
                "pool is not accepting scores (status: {})",
                pool.status
            )));
        }

        let (effective_key, period_label) = self.effective_period(&pool, period_key)?;
        let payout_pct = match pct_override {
            Some(pct) => {
                if !(0..=100).contains(&pct) {
                    return Err(PoolError::validation("payout pct must be 0..=100"));
                }
                pct
            }
            None => self.policy_pct(&pool, &effective_key),
        };

        if away_score < 0 || home_score < 0 {
            return Err(PoolError::validation("scores cannot be negative"));
        }
        let away_digit = (away_score % 10) as u8;
        let home_digit = (home_score % 10) as u8;

        // The permutations are total over 0-9; a missing digit means the
        // stored grid is corrupt and resolution must not guess.
        let col = col_digits
            .iter()
            .position(|&d| d == away_digit)
            .ok_or(PoolError::InvalidDigitMapping {
                axis: "column",
                digit: away_digit,
            })? as u8;
        let row = row_digits
            .iter()
            .position(|&d| d == home_digit)
            .ok_or(PoolError::InvalidDigitMapping {
                axis: "row",
                digit: home_digit,
            })? as u8;

        let square = SquareStore::new(&self.storage)
            .get_square(pool_id, row, col)
            .await?;

        let winner = square.owner.as_ref().map(|owner| {
            let payout = payout_amount(pool.pool_total(), payout_pct);
            Winner {
                pool_id,
                period_key: effective_key.clone(),
                player_id: owner.clone(),
                row,
                col,
                payout_amount: payout,
                tip_suggestion: tip_amount(payout, pool.tip_pct),
                resolved_at: Utc::now(),
            }
        });

        let score = Score {
            pool_id,
            period_key: effective_key.clone(),
            period_label,
            away_score,
            home_score,
            payout_pct,
            entered_at: Utc::now(),
        };

        ScoreStore::new(&self.storage)
            .record_resolution(
                &score,
                winner.as_ref(),
                actor_role,
                actor_id,
                serde_json::json!({
                    "period": effective_key,
                    "away": away_score,
                    "home": home_score,
                    "winner": winner.as_ref().map(|w| w.player_id.clone()),
                    "payout": winner.as_ref().map(|w| w.payout_amount),
                }),
            )
            .await?;

        // First score moves the pool into play. Conditional on the pool
        // still being locked: a cancel or suspend committed since the
        // load above must not be overwritten.
        if pool.status == PoolStatus::Locked {
            PoolStore::new(&self.storage)
                .update_status(pool_id, PoolStatus::Locked, PoolStatus::InProgress)
                .await?;
        }

        match &winner {
            Some(w) => {
                tracing::info!(
                    "Pool {} period {}: square ({},{}) wins {} for {}",
                    pool_id,
                    effective_key,
                    row,
                    col,
                    w.payout_amount,
                    w.player_id
                );
                dispatch(
                    self.notifier.as_ref(),
                    &w.player_id,
                    pool_id,
                    NotificationEvent::WinnerResolved {
                        period_key: effective_key.clone(),
                        payout_amount: w.payout_amount,
                    },
                )
                .await;
            }
            None => {
                tracing::info!(
                    "Pool {} period {}: square ({},{}) unowned, no winner",
                    pool_id,
                    effective_key,
                    row,
                    col
                );
            }
        }

        Ok(winner)
    }

    /// Pull the score for the pool's linked game from an external feed and
    /// enter it. Only final feed scores are accepted.
    pub async fn enter_from_feed(
        &self,
        pool_id: Uuid,
        period_key: &str,
        feed: &dyn ScoreFeed,
        actor_id: &str,
    ) -> Result<Option<Winner>> {
        let pool = PoolStore::new(&self.storage).load_pool(pool_id).await?;
        let game_id = pool
            .external_game_id
            .as_deref()
            .ok_or_else(|| PoolError::validation("pool has no linked external game"))?;

        let feed_score = feed
            .fetch_score(game_id)
            .await
            .map_err(|e| PoolError::internal(format!("score feed error: {}", e)))?;
        if !feed_score.is_final {
            return Err(PoolError::validation("feed score is not final yet"));
        }

        self.enter_score(
            pool_id,
            period_key,
            feed_score.away_score,
            feed_score.home_score,
            None,
            actor_id,
            ActorRole::Admin,
        )
        .await
    }

    /// Map the requested period key through the pool's overtime rule and
    /// validate it against the sport's period list.
    fn effective_period(&self, pool: &Pool, period_key: &str) -> Result<(String, String)> {
        let key = period_key.to_lowercase();

        if key == pool.sport.overtime_key() {
            return match pool.ot_rule {
                OtRule::None => Err(PoolError::validation(
                    "overtime scores are not allowed for this pool",
                )),
                // OT folds into the final period: a standard re-entry.
                OtRule::IncludeFinal => {
                    let final_key = pool.sport.final_period_key();
                    let label = self.label_for(pool, &final_key);
                    Ok((final_key, label))
                }
                OtRule::Separate => Ok(("ot".to_string(), "OT".to_string())),
            };
        }

        if !pool.sport.period_keys().contains(&key) {
            return Err(PoolError::validation(format!(
                "unknown period '{}' for {}",
                period_key, pool.sport
            )));
        }

        let label = self.label_for(pool, &key);
        Ok((key, label))
    }

    fn label_for(&self, pool: &Pool, key: &str) -> String {
        pool.sport
            .period_labels()
            .iter()
            .find(|l| l.to_lowercase() == key)
            .map(|l| l.to_string())
            .unwrap_or_else(|| key.to_uppercase())
    }

    /// Percentage from the pool's payout policy. A separate overtime
    /// period is outside the policy table and defaults to 0 unless the
    /// admin overrides it on entry.
    fn policy_pct(&self, pool: &Pool, period_key: &str) -> i64 {
        let labels = pool.sport.period_labels();
        let pcts = percentages_for(pool.payout_structure, labels);
        pool.sport
            .period_keys()
            .iter()
            .position(|k| k == period_key)
            .and_then(|i| pcts.get(i).copied())
            .unwrap_or(0)
    }
}

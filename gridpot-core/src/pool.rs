use crate::digits;
use crate::error::{PoolError, Result};
use crate::notify::{LogNotifier, NotificationSink};
use crate::storage::{LedgerStore, PoolStore, SquareStore, Storage};
use crate::types::{
    ActorRole, LedgerEntryType, OtRule, PayoutStructure, Pool, PoolStatus, Sport, Square,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Parameters for a new pool. Validated before anything is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    pub sport: Sport,
    pub denomination: i64,
    pub max_per_player: u32,
    pub approval_threshold: u8,
    pub payout_structure: PayoutStructure,
    pub ot_rule: OtRule,
    pub tip_pct: u8,
    pub external_game_id: Option<String>,
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PoolError::validation("pool name cannot be empty"));
        }
        if self.denomination <= 0 {
            return Err(PoolError::validation("denomination must be positive"));
        }
        if self.max_per_player == 0 || self.max_per_player > 100 {
            return Err(PoolError::validation("max_per_player must be 1..=100"));
        }
        if self.approval_threshold > 100 {
            return Err(PoolError::validation("approval_threshold must be 0..=100"));
        }
        if self.tip_pct > 100 {
            return Err(PoolError::validation("tip_pct must be 0..=100"));
        }
        if self.payout_structure == PayoutStructure::Reverse
            && self.sport.period_labels().len() != 4
        {
            tracing::warn!(
                "reverse payouts assume 4 periods; {} has {} and the table will not sum to 100",
                self.sport,
                self.sport.period_labels().len()
            );
        }
        Ok(())
    }
}

/// Entry point for pool lifecycle operations, over shared storage.
pub struct PoolManager {
    storage: Arc<Storage>,
    notifier: Arc<dyn NotificationSink>,
}

impl PoolManager {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join("gridpot.db");
        let storage = Arc::new(Storage::new(&db_path).await?);

        Ok(Self {
            storage,
            notifier: Arc::new(LogNotifier),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn storage(&self) -> Arc<Storage> {
        Arc::clone(&self.storage)
    }

    pub fn notifier(&self) -> Arc<dyn NotificationSink> {
        Arc::clone(&self.notifier)
    }

    /// Create the pool and its 100-square grid in one atomic unit.
    pub async fn create_pool(&self, config: PoolConfig, actor_id: &str) -> Result<Pool> {
        config.validate()?;

        let pool = Pool {
            id: Uuid::new_v4(),
            name: config.name,
            sport: config.sport,
            denomination: config.denomination,
            max_per_player: config.max_per_player,
            approval_threshold: config.approval_threshold,
            payout_structure: config.payout_structure,
            ot_rule: config.ot_rule,
            tip_pct: config.tip_pct,
            status: PoolStatus::Open,
            col_digits: None,
            row_digits: None,
            external_game_id: config.external_game_id,
            created_at: Utc::now(),
            locked_at: None,
        };

        PoolStore::new(&self.storage).create_pool(&pool).await?;

        LedgerStore::new(&self.storage)
            .record_audit(
                pool.id,
                ActorRole::Admin,
                actor_id,
                "pool_created",
                serde_json::json!({ "name": pool.name, "sport": pool.sport.to_string() }),
            )
            .await?;

        Ok(pool)
    }

    pub async fn get_pool(&self, pool_id: Uuid) -> Result<Pool> {
        PoolStore::new(&self.storage).load_pool(pool_id).await
    }

    pub async fn list_pools(&self) -> Result<Vec<Pool>> {
        PoolStore::new(&self.storage).list_pools().await
    }

    pub async fn grid(&self, pool_id: Uuid) -> Result<Vec<Square>> {
        SquareStore::new(&self.storage).grid(pool_id).await
    }

    /// Generate and persist the one-time digit lock, moving the pool to
    /// "locked". A second call fails with `AlreadyLocked` and changes
    /// nothing; the permutations are immutable from here on.
    pub async fn lock_pool(&self, pool_id: Uuid, actor_id: &str) -> Result<Pool> {
        let store = PoolStore::new(&self.storage);
        let pool = store.load_pool(pool_id).await?;

        if pool.is_locked() {
            return Err(PoolError::AlreadyLocked);
        }
        if pool.status != PoolStatus::Open {
            return Err(PoolError::PoolNotOpen {
                status: pool.status.to_string(),
            });
        }

        let (col_digits, row_digits) = digits::generate_pair();
        store.lock_digits(pool_id, &col_digits, &row_digits).await?;

        LedgerStore::new(&self.storage)
            .record_audit(
                pool_id,
                ActorRole::Admin,
                actor_id,
                "pool_locked",
                serde_json::json!({}),
            )
            .await?;

        store.load_pool(pool_id).await
    }

    /// Guarded lifecycle transition (start, finalize, cancel, suspend).
    pub async fn transition(
        &self,
        pool_id: Uuid,
        next: PoolStatus,
        actor_id: &str,
    ) -> Result<Pool> {
        let store = PoolStore::new(&self.storage);
        let pool = store.load_pool(pool_id).await?;

        if next == PoolStatus::Locked {
            // locking also writes the digit permutations
            return Err(PoolError::validation("use lock_pool to lock a pool"));
        }
        if !pool.status.can_transition_to(next) {
            return Err(PoolError::validation(format!(
                "cannot transition pool from {} to {}",
                pool.status, next
            )));
        }

        if !store.update_status(pool_id, pool.status, next).await? {
            let current = store.load_pool(pool_id).await?;
            return Err(PoolError::validation(format!(
                "pool moved to {} before the transition to {} applied",
                current.status, next
            )));
        }

        LedgerStore::new(&self.storage)
            .record_audit(
                pool_id,
                ActorRole::Admin,
                actor_id,
                "pool_status_changed",
                serde_json::json!({ "from": pool.status.to_string(), "to": next.to_string() }),
            )
            .await?;

        tracing::info!("Pool {} moved {} -> {}", pool_id, pool.status, next);
        store.load_pool(pool_id).await
    }

    /// Record that a player paid for `squares` squares. Buy-ins fund the
    /// proportional-refund policy applied on release.
    pub async fn record_buy_in(
        &self,
        pool_id: Uuid,
        player_id: &str,
        squares: u32,
        actor_id: &str,
    ) -> Result<i64> {
        if squares == 0 {
            return Err(PoolError::validation("buy-in must cover at least one square"));
        }

        let pool = self.get_pool(pool_id).await?;
        let amount = -(pool.denomination * squares as i64);

        let entry_id = LedgerStore::new(&self.storage)
            .append(
                player_id,
                Some(pool_id),
                LedgerEntryType::BuyIn,
                amount,
                Some(&format!("{} square(s) at {}", squares, pool.denomination)),
            )
            .await?;

        LedgerStore::new(&self.storage)
            .record_audit(
                pool_id,
                ActorRole::Admin,
                actor_id,
                "buy_in_recorded",
                serde_json::json!({ "player": player_id, "squares": squares, "amount": amount }),
            )
            .await?;

        Ok(entry_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn config() -> PoolConfig {
        PoolConfig {
            name: "lifecycle-pool".to_string(),
            sport: Sport::Hockey,
            denomination: 20,
            max_per_player: 4,
            approval_threshold: 80,
            payout_structure: PayoutStructure::Standard,
            ot_rule: OtRule::Separate,
            tip_pct: 5,
            external_game_id: None,
        }
    }

    async fn setup() -> (TempDir, PoolManager) {
        let dir = tempdir().unwrap();
        let manager = PoolManager::new(dir.path()).await.unwrap();
        (dir, manager)
    }

    #[tokio::test]
    async fn test_config_validation() {
        let (_dir, manager) = setup().await;

        let mut bad = config();
        bad.denomination = 0;
        assert!(matches!(
            manager.create_pool(bad, "admin").await.unwrap_err(),
            PoolError::Validation(_)
        ));

        let mut bad = config();
        bad.max_per_player = 101;
        assert!(manager.create_pool(bad, "admin").await.is_err());

        let mut bad = config();
        bad.name = "  ".to_string();
        assert!(manager.create_pool(bad, "admin").await.is_err());
    }

    #[tokio::test]
    async fn test_lock_generates_permutations_once() {
        let (_dir, manager) = setup().await;
        let pool = manager.create_pool(config(), "admin").await.unwrap();

        let locked = manager.lock_pool(pool.id, "admin").await.unwrap();
        assert_eq!(locked.status, PoolStatus::Locked);

        let cols = locked.col_digits.expect("cols set at lock");
        let rows = locked.row_digits.expect("rows set at lock");
        assert!(digits::is_permutation(&cols));
        assert!(digits::is_permutation(&rows));

        // second lock fails and changes nothing
        let err = manager.lock_pool(pool.id, "admin").await.unwrap_err();
        assert!(matches!(err, PoolError::AlreadyLocked));

        let reloaded = manager.get_pool(pool.id).await.unwrap();
        assert_eq!(reloaded.col_digits.as_deref(), Some(cols.as_slice()));
        assert_eq!(reloaded.row_digits.as_deref(), Some(rows.as_slice()));
    }

    #[tokio::test]
    async fn test_transition_guards() {
        let (_dir, manager) = setup().await;
        let pool = manager.create_pool(config(), "admin").await.unwrap();

        // open cannot jump straight to final
        assert!(manager
            .transition(pool.id, PoolStatus::Final, "admin")
            .await
            .is_err());

        // open -> cancelled is allowed; cancelled is absorbing
        let cancelled = manager
            .transition(pool.id, PoolStatus::Cancelled, "admin")
            .await
            .unwrap();
        assert_eq!(cancelled.status, PoolStatus::Cancelled);
        assert!(manager
            .transition(pool.id, PoolStatus::Suspended, "admin")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let (_dir, manager) = setup().await;
        let pool = manager.create_pool(config(), "admin").await.unwrap();

        manager.lock_pool(pool.id, "admin").await.unwrap();
        let started = manager
            .transition(pool.id, PoolStatus::InProgress, "admin")
            .await
            .unwrap();
        assert_eq!(started.status, PoolStatus::InProgress);
        let done = manager
            .transition(pool.id, PoolStatus::Final, "admin")
            .await
            .unwrap();
        assert_eq!(done.status, PoolStatus::Final);
    }

    #[tokio::test]
    async fn test_stale_status_write_cannot_resurrect_cancelled_pool() {
        let (_dir, manager) = setup().await;
        let pool = manager.create_pool(config(), "admin").await.unwrap();
        manager
            .transition(pool.id, PoolStatus::Cancelled, "admin")
            .await
            .unwrap();

        // a writer that last saw the pool locked loses the race
        let storage = manager.storage();
        let applied = PoolStore::new(&storage)
            .update_status(pool.id, PoolStatus::Locked, PoolStatus::InProgress)
            .await
            .unwrap();
        assert!(!applied);

        let reloaded = manager.get_pool(pool.id).await.unwrap();
        assert_eq!(reloaded.status, PoolStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_buy_in_recorded_negative() {
        let (_dir, manager) = setup().await;
        let pool = manager.create_pool(config(), "admin").await.unwrap();

        manager
            .record_buy_in(pool.id, "alice", 3, "admin")
            .await
            .unwrap();

        let ledger = LedgerStore::new(&manager.storage);
        assert_eq!(ledger.balance("alice", Some(pool.id)).await.unwrap(), -60);
        assert_eq!(ledger.buy_in_total(pool.id, "alice").await.unwrap(), 60);
    }

    #[tokio::test]
    async fn test_missing_pool_is_not_found() {
        let (_dir, manager) = setup().await;
        let err = manager.get_pool(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PoolError::PoolNotFound(_)));
    }
}

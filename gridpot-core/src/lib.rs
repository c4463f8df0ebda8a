//! GRIDPOT - Core engine for squares betting pools
//!
//! A pool is a 10x10 grid of squares tied to one sporting event. Players
//! claim squares, an admin locks the grid with a one-time random digit
//! permutation per axis, and each period's winner is the owner of the
//! square matching the last digit of each team's score.

pub mod claims;
pub mod digits;
pub mod error;
pub mod feed;
pub mod notify;
pub mod payout;
pub mod pool;
pub mod storage;
pub mod types;
pub mod winner;

pub use claims::ClaimEngine;
pub use error::{PoolError, Result};
pub use feed::{FeedScore, ScoreFeed};
pub use notify::{LogNotifier, NotificationEvent, NotificationSink};
pub use pool::{PoolConfig, PoolManager};
pub use types::{
    ActorRole, ClaimOutcome, ClaimStatus, LedgerEntry, LedgerEntryType, OtRule, PayoutStructure,
    Pool, PoolStatus, Score, Sport, Square, Winner,
};
pub use winner::WinnerEngine;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_pool_creation() {
        let temp_dir = tempdir().unwrap();
        let manager = PoolManager::new(temp_dir.path()).await.unwrap();

        let pool = manager
            .create_pool(
                PoolConfig {
                    name: "test-pool".to_string(),
                    sport: Sport::Football,
                    denomination: 10,
                    max_per_player: 5,
                    approval_threshold: 100,
                    payout_structure: PayoutStructure::Standard,
                    ot_rule: OtRule::IncludeFinal,
                    tip_pct: 10,
                    external_game_id: None,
                },
                "admin",
            )
            .await
            .unwrap();

        assert_eq!(pool.status, PoolStatus::Open);
        assert_eq!(pool.pool_total(), 1000);
        assert_eq!(manager.grid(pool.id).await.unwrap().len(), 100);
    }
}

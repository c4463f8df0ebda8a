//! Score feed contract.
//!
//! An optional external collaborator that supplies scores for a linked
//! game id. The engine only consumes final integer scores; polling and
//! transport are the feed's concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedScore {
    pub away_score: i64,
    pub home_score: i64,
    /// True once the feed considers the period/game concluded.
    pub is_final: bool,
}

#[async_trait]
pub trait ScoreFeed: Send + Sync {
    async fn fetch_score(&self, external_game_id: &str) -> anyhow::Result<FeedScore>;
}

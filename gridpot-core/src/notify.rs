//! Notification contract.
//!
//! The engine decides *that* and *what* to notify; delivery (email, SMS,
//! push) is an external collaborator. Dispatch is fire-and-forget: a
//! failed notification never rolls back the state change that caused it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    ClaimPlaced { row: u8, col: u8 },
    ClaimPending { row: u8, col: u8 },
    ClaimApproved { row: u8, col: u8 },
    ClaimRejected { row: u8, col: u8 },
    WinnerResolved { period_key: String, payout_amount: i64 },
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        player_id: &str,
        pool_id: Uuid,
        event: NotificationEvent,
    ) -> anyhow::Result<()>;
}

/// Default sink: logs the event. Stands in until a real delivery
/// channel is wired up by the host application.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(
        &self,
        player_id: &str,
        pool_id: Uuid,
        event: NotificationEvent,
    ) -> anyhow::Result<()> {
        tracing::info!("Notify {} (pool {}): {:?}", player_id, pool_id, event);
        Ok(())
    }
}

/// Best-effort dispatch: failures are logged and swallowed.
pub async fn dispatch(
    sink: &dyn NotificationSink,
    player_id: &str,
    pool_id: Uuid,
    event: NotificationEvent,
) {
    if let Err(e) = sink.notify(player_id, pool_id, event).await {
        tracing::warn!("Notification to {} failed: {}", player_id, e);
    }
}

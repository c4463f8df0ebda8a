pub mod ledger_store;
pub mod pool_store;
pub mod score_store;
pub mod square_store;

pub use ledger_store::LedgerStore;
pub use pool_store::PoolStore;
pub use score_store::ScoreStore;
pub use square_store::SquareStore;

use crate::error::{PoolError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PoolError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Pools table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS pools (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                sport TEXT NOT NULL,
                denomination INTEGER NOT NULL,
                max_per_player INTEGER NOT NULL,
                approval_threshold INTEGER NOT NULL,
                payout_structure TEXT NOT NULL,
                ot_rule TEXT NOT NULL,
                tip_pct INTEGER NOT NULL,
                status TEXT NOT NULL,
                col_digits TEXT,
                row_digits TEXT,
                external_game_id TEXT,
                created_at INTEGER NOT NULL,
                locked_at INTEGER
            )",
            [],
        )?;

        // Squares table: 100 rows per pool, created with the pool,
        // never deleted individually
        conn.execute(
            "CREATE TABLE IF NOT EXISTS squares (
                pool_id TEXT NOT NULL,
                row_idx INTEGER NOT NULL,
                col_idx INTEGER NOT NULL,
                claim_status TEXT NOT NULL,
                owner TEXT,
                is_admin_override INTEGER NOT NULL DEFAULT 0,
                claimed_at INTEGER,
                requested_at INTEGER,
                released_at INTEGER,
                FOREIGN KEY (pool_id) REFERENCES pools(id),
                PRIMARY KEY (pool_id, row_idx, col_idx)
            )",
            [],
        )?;

        // Scores table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS scores (
                pool_id TEXT NOT NULL,
                period_key TEXT NOT NULL,
                period_label TEXT NOT NULL,
                away_score INTEGER NOT NULL,
                home_score INTEGER NOT NULL,
                payout_pct INTEGER NOT NULL,
                entered_at INTEGER NOT NULL,
                FOREIGN KEY (pool_id) REFERENCES pools(id),
                PRIMARY KEY (pool_id, period_key)
            )",
            [],
        )?;

        // Winners table: the unique key backs idempotent re-resolution
        conn.execute(
            "CREATE TABLE IF NOT EXISTS winners (
                pool_id TEXT NOT NULL,
                period_key TEXT NOT NULL,
                player_id TEXT NOT NULL,
                row_idx INTEGER NOT NULL,
                col_idx INTEGER NOT NULL,
                payout_amount INTEGER NOT NULL,
                tip_suggestion INTEGER NOT NULL,
                resolved_at INTEGER NOT NULL,
                FOREIGN KEY (pool_id) REFERENCES pools(id),
                PRIMARY KEY (pool_id, period_key)
            )",
            [],
        )?;

        // Ledger table: append-only
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ledger_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id TEXT NOT NULL,
                pool_id TEXT,
                entry_type TEXT NOT NULL,
                amount INTEGER NOT NULL,
                note TEXT,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Audit trail
        conn.execute(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pool_id TEXT NOT NULL,
                actor_role TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                action TEXT NOT NULL,
                detail TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

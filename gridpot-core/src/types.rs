use crate::error::PoolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Pool lifecycle. Cancelled and Suspended are absorbing states
/// reachable from any active state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Open,
    Locked,
    InProgress,
    Final,
    Cancelled,
    Suspended,
}

impl PoolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolStatus::Open => "open",
            PoolStatus::Locked => "locked",
            PoolStatus::InProgress => "in_progress",
            PoolStatus::Final => "final",
            PoolStatus::Cancelled => "cancelled",
            PoolStatus::Suspended => "suspended",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PoolStatus::Open | PoolStatus::Locked | PoolStatus::InProgress
        )
    }

    /// Valid forward transitions of the lifecycle state machine.
    pub fn can_transition_to(&self, next: PoolStatus) -> bool {
        match (self, next) {
            (PoolStatus::Open, PoolStatus::Locked) => true,
            (PoolStatus::Locked, PoolStatus::InProgress) => true,
            (PoolStatus::InProgress, PoolStatus::Final) => true,
            (from, PoolStatus::Cancelled) | (from, PoolStatus::Suspended) => from.is_active(),
            _ => false,
        }
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PoolStatus {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(PoolStatus::Open),
            "locked" => Ok(PoolStatus::Locked),
            "in_progress" => Ok(PoolStatus::InProgress),
            "final" => Ok(PoolStatus::Final),
            "cancelled" => Ok(PoolStatus::Cancelled),
            "suspended" => Ok(PoolStatus::Suspended),
            other => Err(PoolError::validation(format!(
                "unknown pool status: {}",
                other
            ))),
        }
    }
}

/// Supported sports, each with its own ordered period list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    Football,
    Basketball,
    Hockey,
    Soccer,
}

impl Sport {
    /// Ordered period labels for the sport.
    pub fn period_labels(&self) -> &'static [&'static str] {
        match self {
            Sport::Football | Sport::Basketball => &["Q1", "Q2", "Q3", "Q4"],
            Sport::Hockey => &["P1", "P2", "P3"],
            Sport::Soccer => &["H1", "H2"],
        }
    }

    /// Period keys are the lowercase labels ("q1", "p3", ...).
    pub fn period_keys(&self) -> Vec<String> {
        self.period_labels()
            .iter()
            .map(|l| l.to_lowercase())
            .collect()
    }

    pub fn final_period_key(&self) -> String {
        self.period_keys().last().cloned().unwrap_or_default()
    }

    pub fn overtime_key(&self) -> &'static str {
        "ot"
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sport::Football => write!(f, "football"),
            Sport::Basketball => write!(f, "basketball"),
            Sport::Hockey => write!(f, "hockey"),
            Sport::Soccer => write!(f, "soccer"),
        }
    }
}

impl FromStr for Sport {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "football" => Ok(Sport::Football),
            "basketball" => Ok(Sport::Basketball),
            "hockey" => Ok(Sport::Hockey),
            "soccer" => Ok(Sport::Soccer),
            other => Err(PoolError::validation(format!("unknown sport: {}", other))),
        }
    }
}

/// Policy distributing the pot across scoring periods.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStructure {
    Standard,
    HeavyFinal,
    HalftimeFinal,
    Reverse,
}

impl PayoutStructure {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStructure::Standard => "standard",
            PayoutStructure::HeavyFinal => "heavy_final",
            PayoutStructure::HalftimeFinal => "halftime_final",
            PayoutStructure::Reverse => "reverse",
        }
    }
}

impl fmt::Display for PayoutStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PayoutStructure {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(PayoutStructure::Standard),
            "heavy_final" => Ok(PayoutStructure::HeavyFinal),
            "halftime_final" => Ok(PayoutStructure::HalftimeFinal),
            "reverse" => Ok(PayoutStructure::Reverse),
            other => Err(PoolError::validation(format!(
                "unknown payout structure: {}",
                other
            ))),
        }
    }
}

/// How an overtime score is treated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OtRule {
    /// Overtime points fold into the final period's score.
    IncludeFinal,
    /// Overtime is scored as its own period.
    Separate,
    /// Overtime entries are rejected.
    None,
}

impl OtRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtRule::IncludeFinal => "include_final",
            OtRule::Separate => "separate",
            OtRule::None => "none",
        }
    }
}

impl fmt::Display for OtRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OtRule {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "include_final" => Ok(OtRule::IncludeFinal),
            "separate" => Ok(OtRule::Separate),
            "none" => Ok(OtRule::None),
            other => Err(PoolError::validation(format!("unknown ot rule: {}", other))),
        }
    }
}

/// Occupancy state of one grid square.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Available,
    Pending,
    Claimed,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Available => "available",
            ClaimStatus::Pending => "pending",
            ClaimStatus::Claimed => "claimed",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ClaimStatus::Available),
            "pending" => Ok(ClaimStatus::Pending),
            "claimed" => Ok(ClaimStatus::Claimed),
            other => Err(PoolError::validation(format!(
                "unknown claim status: {}",
                other
            ))),
        }
    }
}

/// Role of the actor performing an operation. Resolved by the caller's
/// auth layer; the core trusts what it is given.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Player,
    Admin,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Player => "player",
            ActorRole::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, ActorRole::Admin)
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player" => Ok(ActorRole::Player),
            "admin" => Ok(ActorRole::Admin),
            other => Err(PoolError::validation(format!("unknown role: {}", other))),
        }
    }
}

/// One squares contest tied to one sporting event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub id: Uuid,
    pub name: String,
    pub sport: Sport,
    /// Dollar cost of one square.
    pub denomination: i64,
    pub max_per_player: u32,
    /// Fill percentage at/above which self-service claims require
    /// admin approval. 100 disables the threshold.
    pub approval_threshold: u8,
    pub payout_structure: PayoutStructure,
    pub ot_rule: OtRule,
    pub tip_pct: u8,
    pub status: PoolStatus,
    /// Both digit sequences are null until lock, then immutable.
    pub col_digits: Option<Vec<u8>>,
    pub row_digits: Option<Vec<u8>>,
    /// Optional link to an external score feed game.
    pub external_game_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
}

impl Pool {
    /// Total pot in dollars: 100 squares at one denomination each.
    pub fn pool_total(&self) -> i64 {
        self.denomination * 100
    }

    pub fn is_locked(&self) -> bool {
        self.col_digits.is_some() && self.row_digits.is_some()
    }
}

/// One of the 100 (row, col) cells in a pool's grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Square {
    pub pool_id: Uuid,
    pub row: u8,
    pub col: u8,
    pub claim_status: ClaimStatus,
    pub owner: Option<String>,
    pub is_admin_override: bool,
    pub claimed_at: Option<DateTime<Utc>>,
    pub requested_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
}

/// Result of a claim, tagged so callers handle both branches
/// (the notification text differs).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    Claimed { row: u8, col: u8 },
    PendingApproval { row: u8, col: u8 },
}

impl ClaimOutcome {
    pub fn status(&self) -> ClaimStatus {
        match self {
            ClaimOutcome::Claimed { .. } => ClaimStatus::Claimed,
            ClaimOutcome::PendingApproval { .. } => ClaimStatus::Pending,
        }
    }
}

/// One period's final score, upserted as the period concludes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub pool_id: Uuid,
    pub period_key: String,
    pub period_label: String,
    pub away_score: i64,
    pub home_score: i64,
    /// Percentage of the pot for this period; admin may override the
    /// policy table per entry.
    pub payout_pct: i64,
    pub entered_at: DateTime<Utc>,
}

/// At most one per (pool, period key); replaced when a score is re-entered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Winner {
    pub pool_id: Uuid,
    pub period_key: String,
    pub player_id: String,
    pub row: u8,
    pub col: u8,
    pub payout_amount: i64,
    pub tip_suggestion: i64,
    pub resolved_at: DateTime<Utc>,
}

/// Money movement types. A player's balance is the signed sum of
/// their entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    BuyIn,
    Payout,
    Tip,
    Refund,
    Adjustment,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::BuyIn => "buy_in",
            LedgerEntryType::Payout => "payout",
            LedgerEntryType::Tip => "tip",
            LedgerEntryType::Refund => "refund",
            LedgerEntryType::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LedgerEntryType {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy_in" => Ok(LedgerEntryType::BuyIn),
            "payout" => Ok(LedgerEntryType::Payout),
            "tip" => Ok(LedgerEntryType::Tip),
            "refund" => Ok(LedgerEntryType::Refund),
            "adjustment" => Ok(LedgerEntryType::Adjustment),
            other => Err(PoolError::validation(format!(
                "unknown ledger entry type: {}",
                other
            ))),
        }
    }
}

/// Immutable append-only money movement record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub player_id: String,
    pub pool_id: Option<Uuid>,
    pub entry_type: LedgerEntryType,
    /// Signed dollars: buy-ins and tips negative, payouts and refunds
    /// positive, adjustments carry their own sign.
    pub amount: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row of the per-pool audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub pool_id: Uuid,
    pub actor_role: ActorRole,
    pub actor_id: String,
    pub action: String,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

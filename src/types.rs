//! Shared types for the DecentralBet engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that ledger, payout, and
//! engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque account identity (typically a wallet address).
pub type AccountId = String;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// The side of a proposition a stake is committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    For,
    Against,
}

impl Side {
    /// The opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::For => Side::Against,
            Side::Against => Side::For,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::For => write!(f, "FOR"),
            Side::Against => write!(f, "AGAINST"),
        }
    }
}

// ---------------------------------------------------------------------------
// Bet status
// ---------------------------------------------------------------------------

/// Lifecycle status of a bet.
///
/// `Open` and `Closed` are non-terminal; the other three are terminal and
/// permit no further transition. Business meaning is always derived from
/// the explicit predicates below, never from ordinal comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BetStatus {
    /// Accepting stakes.
    Open,
    /// Staking window shut; awaiting resolution or cancellation.
    Closed,
    /// Settled in favour of the FOR side.
    ResolvedFor,
    /// Settled in favour of the AGAINST side.
    ResolvedAgainst,
    /// Terminated with full refunds to both sides.
    Cancelled,
}

impl BetStatus {
    /// All statuses (useful for iteration in tests and filters).
    pub const ALL: &'static [BetStatus] = &[
        BetStatus::Open,
        BetStatus::Closed,
        BetStatus::ResolvedFor,
        BetStatus::ResolvedAgainst,
        BetStatus::Cancelled,
    ];

    /// Whether no further transition is permitted from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BetStatus::ResolvedFor | BetStatus::ResolvedAgainst | BetStatus::Cancelled
        )
    }

    /// Whether stakes may still be placed.
    pub fn accepts_stakes(&self) -> bool {
        matches!(self, BetStatus::Open)
    }

    /// The side entitled to the pool, if this is a resolved status.
    pub fn winning_side(&self) -> Option<Side> {
        match self {
            BetStatus::ResolvedFor => Some(Side::For),
            BetStatus::ResolvedAgainst => Some(Side::Against),
            _ => None,
        }
    }

    /// Transition-table lookup: is `next` a legal successor of `self`?
    ///
    /// ```text
    /// Open   --> Closed | Cancelled | ResolvedFor | ResolvedAgainst
    /// Closed --> Cancelled | ResolvedFor | ResolvedAgainst
    /// ```
    pub fn permits(&self, next: BetStatus) -> bool {
        matches!(
            (self, next),
            (BetStatus::Open, BetStatus::Closed)
                | (BetStatus::Open, BetStatus::Cancelled)
                | (BetStatus::Open, BetStatus::ResolvedFor)
                | (BetStatus::Open, BetStatus::ResolvedAgainst)
                | (BetStatus::Closed, BetStatus::Cancelled)
                | (BetStatus::Closed, BetStatus::ResolvedFor)
                | (BetStatus::Closed, BetStatus::ResolvedAgainst)
        )
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetStatus::Open => write!(f, "Open"),
            BetStatus::Closed => write!(f, "Closed"),
            BetStatus::ResolvedFor => write!(f, "Resolved For"),
            BetStatus::ResolvedAgainst => write!(f, "Resolved Against"),
            BetStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Attempt to parse a string into a BetStatus (case-insensitive).
impl std::str::FromStr for BetStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "open" => Ok(BetStatus::Open),
            "closed" => Ok(BetStatus::Closed),
            "resolvedfor" => Ok(BetStatus::ResolvedFor),
            "resolvedagainst" => Ok(BetStatus::ResolvedAgainst),
            "cancelled" | "canceled" => Ok(BetStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Unknown bet status: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Bet
// ---------------------------------------------------------------------------

/// A two-sided proposition with a shared pari-mutuel pool per side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    /// Sequential id assigned by the ledger at creation.
    pub id: u64,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    /// Aggregate of all FOR stakes. Frozen once status leaves `Open`.
    pub total_for: Decimal,
    /// Aggregate of all AGAINST stakes. Frozen once status leaves `Open`.
    pub total_against: Decimal,
    pub status: BetStatus,
    pub creator: AccountId,
    pub created_at: DateTime<Utc>,
}

impl Bet {
    /// Combined pool across both sides.
    pub fn total_pool(&self) -> Decimal {
        self.total_for + self.total_against
    }

    /// The pool total for one side.
    pub fn side_total(&self, side: Side) -> Decimal {
        match side {
            Side::For => self.total_for,
            Side::Against => self.total_against,
        }
    }

    /// Helper to build a test bet with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        Bet {
            id: 0,
            title: "Will it rain in Melbourne on match day?".to_string(),
            description: "Resolves FOR if the BOM records any rainfall.".to_string(),
            image_url: None,
            total_for: Decimal::ZERO,
            total_against: Decimal::ZERO,
            status: BetStatus::Open,
            creator: "0xcreator".to_string(),
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} [{}] (for: {} | against: {} | pool: {})",
            self.id,
            self.title,
            self.status,
            self.total_for,
            self.total_against,
            self.total_pool(),
        )
    }
}

/// Input for creating a new bet. The ledger assigns the id, stamps the
/// creation time, and zeroes the pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetDraft {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub creator: AccountId,
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A user's accumulated stake record against a specific bet.
///
/// Created implicitly on first stake; never deleted. Stake fields are never
/// zeroed on withdrawal — the `withdrawn` flag is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub bet_id: u64,
    pub user: AccountId,
    pub for_amount: Decimal,
    pub against_amount: Decimal,
    pub withdrawn: bool,
}

impl Position {
    /// An empty position for a user who has never staked on this bet.
    pub fn zero(bet_id: u64, user: &str) -> Self {
        Position {
            bet_id,
            user: user.to_string(),
            for_amount: Decimal::ZERO,
            against_amount: Decimal::ZERO,
            withdrawn: false,
        }
    }

    /// The accumulated stake on one side.
    pub fn amount_on(&self, side: Side) -> Decimal {
        match side {
            Side::For => self.for_amount,
            Side::Against => self.against_amount,
        }
    }

    /// Combined stake across both sides.
    pub fn total_stake(&self) -> Decimal {
        self.for_amount + self.against_amount
    }

    /// Whether any stake has ever been placed on this position.
    pub fn has_stake(&self) -> bool {
        self.for_amount > Decimal::ZERO || self.against_amount > Decimal::ZERO
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bet #{} {} (for: {} | against: {}{})",
            self.bet_id,
            self.user,
            self.for_amount,
            self.against_amount,
            if self.withdrawn { " | withdrawn" } else { "" },
        )
    }
}

// ---------------------------------------------------------------------------
// Transfer receipt
// ---------------------------------------------------------------------------

/// Receipt returned by the ledger after a confirmed value transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transfer_id: String,
    pub user: AccountId,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for TransferReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "transfer {} -> {} ({})",
            self.amount, self.user, self.transfer_id,
        )
    }
}

// ---------------------------------------------------------------------------
// Ledger facts
// ---------------------------------------------------------------------------

/// Observable facts published by the ledger after a confirmed mutation.
///
/// Consumers use these to refresh cached projections. They are refresh
/// hints, not a journal — a lagging subscriber must re-read snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    BetCreated {
        bet_id: u64,
        title: String,
        creator: AccountId,
    },
    BetPlaced {
        bet_id: u64,
        bettor: AccountId,
        side: Side,
        amount: Decimal,
    },
    /// Emitted on every status transition (close, cancel, resolve).
    BetResolved { bet_id: u64, status: BetStatus },
    Withdrawal { user: AccountId, amount: Decimal },
    OwnerWithdrawal { amount: Decimal },
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerEvent::BetCreated { bet_id, title, creator } => {
                write!(f, "BetCreated #{bet_id} \"{title}\" by {creator}")
            }
            LedgerEvent::BetPlaced { bet_id, bettor, side, amount } => {
                write!(f, "BetPlaced #{bet_id} {amount} {side} by {bettor}")
            }
            LedgerEvent::BetResolved { bet_id, status } => {
                write!(f, "BetResolved #{bet_id} -> {status}")
            }
            LedgerEvent::Withdrawal { user, amount } => {
                write!(f, "Withdrawal {amount} -> {user}")
            }
            LedgerEvent::OwnerWithdrawal { amount } => {
                write!(f, "OwnerWithdrawal {amount}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// User summary (aggregation view)
// ---------------------------------------------------------------------------

/// One bet a user participates in, paired with their position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participation {
    pub bet: Bet,
    pub position: Position,
}

/// Per-user summary statistics derived by the aggregation view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSummary {
    /// Bets with a non-zero position and non-terminal status.
    pub active: Vec<Participation>,
    /// Bets with a non-zero position and terminal status.
    pub past: Vec<Participation>,
    /// Count of distinct bets the user has staked on.
    pub bets_staked: u64,
    /// Sum of all stakes across both sides of all bets.
    pub total_staked: Decimal,
    /// Sum of pari-mutuel payouts on resolved bets (refunds excluded).
    pub total_winnings: Decimal,
}

impl fmt::Display for UserSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bets | staked {} | winnings {} | active {} | past {}",
            self.bets_staked,
            self.total_staked,
            self.total_winnings,
            self.active.len(),
            self.past.len(),
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failure of the external ledger boundary (transport or consensus).
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The ledger processed the command and refused it.
    #[error("Ledger rejected command: {0}")]
    Rejected(String),

    /// The command may or may not have reached the ledger.
    #[error("Ledger transport failure: {0}")]
    Transport(String),

    /// The ledger has no record for this bet id.
    #[error("Ledger record missing for bet {0}")]
    MissingRecord(u64),
}

/// Domain-specific error types for the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Account {caller} is not authorised to {action}")]
    Authorization { caller: AccountId, action: &'static str },

    #[error("Bet {bet_id} is {status}: cannot {attempted}")]
    InvalidTransition {
        bet_id: u64,
        status: BetStatus,
        attempted: &'static str,
    },

    #[error("Bet not found: {0}")]
    NotFound(u64),

    #[error("Position on bet {bet_id} already withdrawn by {user}")]
    AlreadyWithdrawn { bet_id: u64, user: AccountId },

    #[error("Not eligible to withdraw: {0}")]
    NotEligible(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

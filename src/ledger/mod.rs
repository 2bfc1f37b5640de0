//! Ledger boundary.
//!
//! Defines the `Ledger` trait — the external service holding the canonical
//! Bet and Position records — and provides implementations for:
//! - in-memory (`memory`) — single-process deployments and tests
//! - remote (`remote`) — HTTP client for an external ledger service
//!
//! The ledger serializes all mutating calls against a given bet, so the
//! engine never holds concurrent writers to the same record and performs no
//! locking of its own. Implementations must still refuse stakes on non-open
//! bets and double withdrawals: the engine's pre-checks produce the typed
//! errors on the common path, the ledger's own guards hold the invariants
//! when a concurrent command lands in between.

pub mod memory;
pub mod remote;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use crate::types::{
    Bet, BetDraft, BetStatus, LedgerError, LedgerEvent, Position, Side, TransferReceipt,
};

/// Abstraction over the external wagering ledger.
///
/// Mutating operations return only after the ledger has confirmed the
/// mutation; a returned `LedgerError` means no engine-visible state changed.
/// Facts are published on the broadcast stream after confirmation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Insert a new bet: next sequential id, zero pools, `Open` status,
    /// creation timestamp. Emits `BetCreated`.
    async fn create_bet(&self, draft: BetDraft) -> Result<u64, LedgerError>;

    /// Point-in-time read of one bet. `None` for an unknown id.
    async fn get_bet(&self, bet_id: u64) -> Result<Option<Bet>, LedgerError>;

    /// All bets in id order.
    async fn list_bets(&self) -> Result<Vec<Bet>, LedgerError>;

    /// Number of bets ever created.
    async fn bet_count(&self) -> Result<u64, LedgerError>;

    /// Write a new status. The engine validates the transition; the ledger
    /// only checks the record exists. Emits `BetResolved`.
    async fn set_status(&self, bet_id: u64, status: BetStatus) -> Result<(), LedgerError>;

    /// Atomically add `amount` to one side's pool total and to the matching
    /// field of the (bet, user) position, creating the position if absent.
    /// Refused for bets no longer accepting stakes. Emits `BetPlaced`.
    async fn apply_stake(
        &self,
        bet_id: u64,
        user: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<Position, LedgerError>;

    /// Point-in-time read of a position; a zero position when the user has
    /// never staked on this bet.
    async fn get_position(&self, bet_id: u64, user: &str) -> Result<Position, LedgerError>;

    /// Atomically mark the position withdrawn and transfer `amount` to the
    /// user. Refused if already withdrawn. Emits `Withdrawal`.
    async fn settle_withdrawal(
        &self,
        bet_id: u64,
        user: &str,
        amount: Decimal,
    ) -> Result<TransferReceipt, LedgerError>;

    /// Accrue a platform fee to the owner balance.
    async fn credit_owner(&self, amount: Decimal) -> Result<(), LedgerError>;

    /// Pay out part of the accrued owner balance. Refused if `amount`
    /// exceeds the balance. Emits `OwnerWithdrawal`.
    async fn debit_owner(&self, amount: Decimal) -> Result<TransferReceipt, LedgerError>;

    /// Accrued, not-yet-withdrawn platform fees.
    async fn owner_balance(&self) -> Result<Decimal, LedgerError>;

    /// Total value currently held by the ledger.
    async fn total_balance(&self) -> Result<Decimal, LedgerError>;

    /// Subscribe to confirmed-mutation facts.
    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent>;

    /// Ledger name for logging and identification.
    fn name(&self) -> &str;
}

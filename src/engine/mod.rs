//! Engine — the wagering ledger and settlement engine proper.
//!
//! Components own no state of their own; every record lives in the ledger
//! and all access is by id lookup. `BettingEngine` wires the components
//! over one shared ledger handle and is the single entry point embedders
//! and the dashboard use.

pub mod accounting;
pub mod aggregate;
pub mod registry;
pub mod settlement;
pub mod tracker;

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::ledger::Ledger;
use crate::payout::{Odds, PayoutCalculator};
use crate::types::{
    AccountId, Bet, BetDraft, BetStatus, EngineError, LedgerEvent, Position, Side,
    TransferReceipt, UserSummary,
};

use accounting::PoolAccounting;
use aggregate::AggregationView;
use registry::BetRegistry;
use settlement::SettlementResolver;
use tracker::PositionTracker;

/// Facade over registry, accounting, settlement, tracking and aggregation.
pub struct BettingEngine {
    ledger: Arc<dyn Ledger>,
    owner: AccountId,
    calculator: PayoutCalculator,
    registry: BetRegistry,
    accounting: PoolAccounting,
    settlement: SettlementResolver,
    tracker: PositionTracker,
    aggregate: AggregationView,
}

impl BettingEngine {
    /// Build an engine over a ledger handle. `owner` is the platform owner
    /// account; `fee_pct` the platform fee percentage (0–100).
    pub fn new(
        ledger: Arc<dyn Ledger>,
        owner: &str,
        fee_pct: Decimal,
    ) -> Result<Self, EngineError> {
        let calculator = PayoutCalculator::new(fee_pct)?;
        Ok(Self {
            registry: BetRegistry::new(ledger.clone(), owner),
            accounting: PoolAccounting::new(ledger.clone()),
            settlement: SettlementResolver::new(ledger.clone(), owner, calculator.clone()),
            tracker: PositionTracker::new(ledger.clone(), calculator.clone()),
            aggregate: AggregationView::new(ledger.clone(), calculator.clone()),
            owner: owner.to_string(),
            calculator,
            ledger,
        })
    }

    /// The platform owner account.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The pure payout calculator (odds, projections).
    pub fn calculator(&self) -> &PayoutCalculator {
        &self.calculator
    }

    /// Subscribe to the ledger's confirmed-mutation facts.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.ledger.subscribe()
    }

    /// Name of the ledger backend this engine runs against.
    pub fn ledger_name(&self) -> &str {
        self.ledger.name()
    }

    // -- Registry ---------------------------------------------------------

    pub async fn create_bet(&self, draft: BetDraft) -> Result<u64, EngineError> {
        self.registry.create(draft).await
    }

    pub async fn close_bet(&self, bet_id: u64, caller: &str) -> Result<(), EngineError> {
        self.registry.close(bet_id, caller).await
    }

    pub async fn cancel_bet(&self, bet_id: u64, caller: &str) -> Result<(), EngineError> {
        self.registry.cancel(bet_id, caller).await
    }

    pub async fn get_bet(&self, bet_id: u64) -> Result<Bet, EngineError> {
        self.registry.get(bet_id).await
    }

    pub async fn list_bets(&self) -> Result<Vec<Bet>, EngineError> {
        self.registry.list().await
    }

    // -- Accounting -------------------------------------------------------

    pub async fn place_stake(
        &self,
        bet_id: u64,
        user: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<Position, EngineError> {
        self.accounting.place_stake(bet_id, user, side, amount).await
    }

    // -- Settlement -------------------------------------------------------

    pub async fn resolve_bet(
        &self,
        bet_id: u64,
        caller: &str,
        for_won: bool,
    ) -> Result<BetStatus, EngineError> {
        self.settlement.resolve(bet_id, caller, for_won).await
    }

    pub async fn owner_withdraw(
        &self,
        caller: &str,
        amount: Decimal,
    ) -> Result<TransferReceipt, EngineError> {
        self.settlement.owner_withdraw(caller, amount).await
    }

    // -- Positions & withdrawals ------------------------------------------

    pub async fn get_position(&self, bet_id: u64, user: &str) -> Result<Position, EngineError> {
        // Consistent NotFound for unknown bets, like every other read.
        self.registry.get(bet_id).await?;
        Ok(self.ledger.get_position(bet_id, user).await?)
    }

    pub async fn is_withdrawable(&self, bet_id: u64, user: &str) -> Result<bool, EngineError> {
        self.tracker.is_withdrawable(bet_id, user).await
    }

    pub async fn payout_amount(&self, bet_id: u64, user: &str) -> Result<Decimal, EngineError> {
        self.tracker.payout_amount(bet_id, user).await
    }

    pub async fn withdraw(&self, bet_id: u64, user: &str) -> Result<TransferReceipt, EngineError> {
        self.tracker.withdraw(bet_id, user).await
    }

    // -- Treasury ---------------------------------------------------------

    pub async fn owner_balance(&self) -> Result<Decimal, EngineError> {
        Ok(self.ledger.owner_balance().await?)
    }

    pub async fn total_balance(&self) -> Result<Decimal, EngineError> {
        Ok(self.ledger.total_balance().await?)
    }

    // -- Projections ------------------------------------------------------

    pub async fn odds(&self, bet_id: u64) -> Result<Odds, EngineError> {
        let bet = self.registry.get(bet_id).await?;
        Ok(self.calculator.odds(&bet))
    }

    pub async fn projected_winnings(
        &self,
        bet_id: u64,
        side: Side,
        stake: Decimal,
    ) -> Result<Decimal, EngineError> {
        let bet = self.registry.get(bet_id).await?;
        self.calculator.projected_winnings(&bet, side, stake)
    }

    pub async fn user_summary(&self, user: &str) -> Result<UserSummary, EngineError> {
        self.aggregate.summary(user).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! In-memory ledger.
//!
//! Holds all canonical state behind a single mutex, which is exactly the
//! serialization guarantee the engine expects from a real ledger service.
//! Used for tests and single-process deployments. Supports forced-error
//! injection so callers can exercise `LedgerError` paths deterministically.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use async_trait::async_trait;

use super::Ledger;
use crate::types::{
    AccountId, Bet, BetDraft, BetStatus, LedgerError, LedgerEvent, Position, Side,
    TransferReceipt,
};

/// Capacity of the fact broadcast channel. Slow subscribers observe
/// `Lagged` and must re-read snapshots.
const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct LedgerState {
    /// Bet id doubles as the index — ids are sequential from zero.
    bets: Vec<Bet>,
    positions: HashMap<(u64, AccountId), Position>,
    /// Accrued platform fees, not yet withdrawn by the owner.
    owner_balance: Decimal,
    /// Total value held: stakes in, transfers out.
    vault: Decimal,
    /// Every confirmed outbound transfer.
    receipts: Vec<TransferReceipt>,
    /// Cumulative amount transferred to each account.
    paid: HashMap<AccountId, Decimal>,
}

/// An in-memory `Ledger` implementation.
pub struct InMemoryLedger {
    name: String,
    owner: AccountId,
    state: Mutex<LedgerState>,
    events: broadcast::Sender<LedgerEvent>,
    /// If set, all operations return a transport error.
    force_error: Mutex<Option<String>>,
}

impl InMemoryLedger {
    /// Create an empty ledger. `owner` receives owner-balance withdrawals.
    pub fn new(owner: &str) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            name: "memory".to_string(),
            owner: owner.to_string(),
            state: Mutex::new(LedgerState::default()),
            events,
            force_error: Mutex::new(None),
        }
    }

    /// Force all subsequent operations to fail with a transport error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Clear any forced error.
    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// All transfer receipts recorded so far.
    pub fn receipts(&self) -> Vec<TransferReceipt> {
        self.state.lock().unwrap().receipts.clone()
    }

    /// Cumulative amount transferred to one account.
    pub fn paid_to(&self, user: &str) -> Decimal {
        self.state
            .lock()
            .unwrap()
            .paid
            .get(user)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn check_forced_error(&self) -> Result<(), LedgerError> {
        if let Some(msg) = self.force_error.lock().unwrap().as_ref() {
            return Err(LedgerError::Transport(msg.clone()));
        }
        Ok(())
    }

    fn publish(&self, event: LedgerEvent) {
        debug!(event = %event, ledger = %self.name, "Fact published");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn receipt(user: &str, amount: Decimal) -> TransferReceipt {
        TransferReceipt {
            transfer_id: Uuid::new_v4().to_string(),
            user: user.to_string(),
            amount,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn create_bet(&self, draft: BetDraft) -> Result<u64, LedgerError> {
        self.check_forced_error()?;

        let event;
        let bet_id;
        {
            let mut state = self.state.lock().unwrap();
            bet_id = state.bets.len() as u64;
            state.bets.push(Bet {
                id: bet_id,
                title: draft.title.clone(),
                description: draft.description,
                image_url: draft.image_url,
                total_for: Decimal::ZERO,
                total_against: Decimal::ZERO,
                status: BetStatus::Open,
                creator: draft.creator.clone(),
                created_at: Utc::now(),
            });
            event = LedgerEvent::BetCreated {
                bet_id,
                title: draft.title,
                creator: draft.creator,
            };
        }

        self.publish(event);
        Ok(bet_id)
    }

    async fn get_bet(&self, bet_id: u64) -> Result<Option<Bet>, LedgerError> {
        self.check_forced_error()?;
        Ok(self.state.lock().unwrap().bets.get(bet_id as usize).cloned())
    }

    async fn list_bets(&self) -> Result<Vec<Bet>, LedgerError> {
        self.check_forced_error()?;
        Ok(self.state.lock().unwrap().bets.clone())
    }

    async fn bet_count(&self) -> Result<u64, LedgerError> {
        self.check_forced_error()?;
        Ok(self.state.lock().unwrap().bets.len() as u64)
    }

    async fn set_status(&self, bet_id: u64, status: BetStatus) -> Result<(), LedgerError> {
        self.check_forced_error()?;

        {
            let mut state = self.state.lock().unwrap();
            let bet = state
                .bets
                .get_mut(bet_id as usize)
                .ok_or(LedgerError::MissingRecord(bet_id))?;
            bet.status = status;
        }

        self.publish(LedgerEvent::BetResolved { bet_id, status });
        Ok(())
    }

    async fn apply_stake(
        &self,
        bet_id: u64,
        user: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<Position, LedgerError> {
        self.check_forced_error()?;

        let position;
        {
            let mut state = self.state.lock().unwrap();
            let bet = state
                .bets
                .get_mut(bet_id as usize)
                .ok_or(LedgerError::MissingRecord(bet_id))?;

            // Pools are frozen outside Open even if a stale engine check
            // raced a status transition.
            if !bet.status.accepts_stakes() {
                return Err(LedgerError::Rejected(format!(
                    "bet {bet_id} is {} and no longer accepts stakes",
                    bet.status
                )));
            }

            match side {
                Side::For => bet.total_for += amount,
                Side::Against => bet.total_against += amount,
            }

            let entry = state
                .positions
                .entry((bet_id, user.to_string()))
                .or_insert_with(|| Position::zero(bet_id, user));
            match side {
                Side::For => entry.for_amount += amount,
                Side::Against => entry.against_amount += amount,
            }
            position = entry.clone();

            state.vault += amount;
        }

        self.publish(LedgerEvent::BetPlaced {
            bet_id,
            bettor: user.to_string(),
            side,
            amount,
        });
        Ok(position)
    }

    async fn get_position(&self, bet_id: u64, user: &str) -> Result<Position, LedgerError> {
        self.check_forced_error()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .positions
            .get(&(bet_id, user.to_string()))
            .cloned()
            .unwrap_or_else(|| Position::zero(bet_id, user)))
    }

    async fn settle_withdrawal(
        &self,
        bet_id: u64,
        user: &str,
        amount: Decimal,
    ) -> Result<TransferReceipt, LedgerError> {
        self.check_forced_error()?;

        let receipt;
        {
            let mut state = self.state.lock().unwrap();
            if state.bets.get(bet_id as usize).is_none() {
                return Err(LedgerError::MissingRecord(bet_id));
            }

            let position = state
                .positions
                .get_mut(&(bet_id, user.to_string()))
                .ok_or_else(|| {
                    LedgerError::Rejected(format!("no position for {user} on bet {bet_id}"))
                })?;
            if position.withdrawn {
                return Err(LedgerError::Rejected(format!(
                    "position for {user} on bet {bet_id} already withdrawn"
                )));
            }
            position.withdrawn = true;

            receipt = Self::receipt(user, amount);
            state.vault -= amount;
            state.receipts.push(receipt.clone());
            *state.paid.entry(user.to_string()).or_default() += amount;
        }

        self.publish(LedgerEvent::Withdrawal {
            user: user.to_string(),
            amount,
        });
        Ok(receipt)
    }

    async fn credit_owner(&self, amount: Decimal) -> Result<(), LedgerError> {
        self.check_forced_error()?;
        self.state.lock().unwrap().owner_balance += amount;
        Ok(())
    }

    async fn debit_owner(&self, amount: Decimal) -> Result<TransferReceipt, LedgerError> {
        self.check_forced_error()?;

        let receipt;
        {
            let mut state = self.state.lock().unwrap();
            if amount > state.owner_balance {
                return Err(LedgerError::Rejected(format!(
                    "owner balance {} is less than requested {amount}",
                    state.owner_balance
                )));
            }
            state.owner_balance -= amount;
            state.vault -= amount;

            receipt = Self::receipt(&self.owner, amount);
            state.receipts.push(receipt.clone());
            *state.paid.entry(self.owner.clone()).or_default() += amount;
        }

        self.publish(LedgerEvent::OwnerWithdrawal { amount });
        Ok(receipt)
    }

    async fn owner_balance(&self) -> Result<Decimal, LedgerError> {
        self.check_forced_error()?;
        Ok(self.state.lock().unwrap().owner_balance)
    }

    async fn total_balance(&self) -> Result<Decimal, LedgerError> {
        self.check_forced_error()?;
        Ok(self.state.lock().unwrap().vault)
    }

    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

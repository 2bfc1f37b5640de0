//! Pool accounting — stake placement.
//!
//! The ledger increments the side pool and the user position in one atomic
//! mutation, which is what keeps the core consistency invariant: for every
//! bet, the sum of position amounts per side equals the bet's side total.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::ledger::Ledger;
use crate::types::{EngineError, Position, Side};

pub struct PoolAccounting {
    ledger: Arc<dyn Ledger>,
}

impl PoolAccounting {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Commit a stake on one side of an open bet. Returns the user's
    /// updated position.
    ///
    /// The amount check runs before any ledger read, so a non-positive
    /// amount fails with `Validation` regardless of bet status or
    /// existence.
    pub async fn place_stake(
        &self,
        bet_id: u64,
        user: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<Position, EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "stake amount must be positive, got {amount}"
            )));
        }

        let bet = self
            .ledger
            .get_bet(bet_id)
            .await?
            .ok_or(EngineError::NotFound(bet_id))?;

        if !bet.status.accepts_stakes() {
            return Err(EngineError::InvalidTransition {
                bet_id,
                status: bet.status,
                attempted: "accept a stake",
            });
        }

        let position = self.ledger.apply_stake(bet_id, user, side, amount).await?;
        info!(
            bet_id,
            user,
            side = %side,
            amount = %amount,
            position_total = %position.total_stake(),
            "Stake placed"
        );
        Ok(position)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

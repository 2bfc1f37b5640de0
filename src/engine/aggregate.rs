//! Aggregation view — per-user summary statistics.
//!
//! A read-only projection recomputed from registry and position state on
//! every call: an O(bets) scan with the user's positions fetched
//! concurrently. One bad record is logged and skipped, never aborting the
//! whole projection.

use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::warn;

use crate::ledger::Ledger;
use crate::payout::PayoutCalculator;
use crate::types::{EngineError, Participation, UserSummary};

pub struct AggregationView {
    ledger: Arc<dyn Ledger>,
    calculator: PayoutCalculator,
}

impl AggregationView {
    pub fn new(ledger: Arc<dyn Ledger>, calculator: PayoutCalculator) -> Self {
        Self { ledger, calculator }
    }

    /// Partition the user's bets into active and past, with scalar totals.
    ///
    /// Realized winnings are the true pari-mutuel payouts on resolved bets;
    /// cancellation refunds are returned principal and excluded.
    pub async fn summary(&self, user: &str) -> Result<UserSummary, EngineError> {
        let bets = self.ledger.list_bets().await?;

        let positions = join_all(
            bets.iter()
                .map(|bet| self.ledger.get_position(bet.id, user)),
        )
        .await;

        let mut summary = UserSummary::default();
        for (bet, position) in bets.into_iter().zip(positions) {
            let position = match position {
                Ok(position) => position,
                Err(e) => {
                    warn!(bet_id = bet.id, user, error = %e, "Skipping bet in user summary");
                    continue;
                }
            };

            if !position.has_stake() {
                continue;
            }

            summary.bets_staked += 1;
            summary.total_staked += position.total_stake();

            if bet.status.is_terminal() {
                if bet.status.winning_side().is_some() {
                    match self.calculator.settlement_payout(&position, &bet) {
                        Ok(payout) => summary.total_winnings += payout,
                        Err(e) => {
                            warn!(bet_id = bet.id, user, error = %e, "Skipping payout in user summary");
                        }
                    }
                }
                summary.past.push(Participation { bet, position });
            } else {
                summary.active.push(Participation { bet, position });
            }
        }

        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Pari-mutuel odds and payout computation.
//!
//! Pure functions over frozen pool snapshots — nothing here mutates the
//! ledger. Pre-trade projections are advisory only: later stakes from other
//! users change the side totals before resolution.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;
use tracing::debug;

use crate::types::{Bet, BetStatus, EngineError, Position, Side};

// ---------------------------------------------------------------------------
// Odds
// ---------------------------------------------------------------------------

/// Multiplicative odds per side. `None` when the side has no pool yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Odds {
    pub for_odds: Option<Decimal>,
    pub against_odds: Option<Decimal>,
}

impl fmt::Display for Odds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_side = |o: Option<Decimal>| match o {
            Some(v) => format!("{:.2}x", v),
            None => "-".to_string(),
        };
        write!(
            f,
            "for {} | against {}",
            fmt_side(self.for_odds),
            fmt_side(self.against_odds),
        )
    }
}

// ---------------------------------------------------------------------------
// Payout calculator
// ---------------------------------------------------------------------------

/// Computes odds, pre-trade projections, and settlement payouts for a fixed
/// platform fee percentage (0–100, applied to the losing pool only).
#[derive(Debug, Clone)]
pub struct PayoutCalculator {
    fee_pct: Decimal,
}

impl PayoutCalculator {
    /// Create a calculator. Fails if `fee_pct` is outside 0–100.
    pub fn new(fee_pct: Decimal) -> Result<Self, EngineError> {
        if fee_pct < Decimal::ZERO || fee_pct > dec!(100) {
            return Err(EngineError::Validation(format!(
                "platform fee must be between 0 and 100, got {fee_pct}"
            )));
        }
        Ok(Self { fee_pct })
    }

    /// The configured platform fee percentage.
    pub fn fee_pct(&self) -> Decimal {
        self.fee_pct
    }

    /// Fee as a fraction of one (e.g. 10% -> 0.1).
    fn fee_fraction(&self) -> Decimal {
        self.fee_pct / dec!(100)
    }

    /// Current odds: `total_pool / side_total` per side, undefined for an
    /// empty side.
    pub fn odds(&self, bet: &Bet) -> Odds {
        let pool = bet.total_pool();
        let per_side = |side_total: Decimal| {
            if side_total > Decimal::ZERO {
                Some(pool / side_total)
            } else {
                None
            }
        };
        Odds {
            for_odds: per_side(bet.total_for),
            against_odds: per_side(bet.total_against),
        }
    }

    /// Projected winnings for a hypothetical additional `stake` on `side`,
    /// before it is committed.
    ///
    /// The fee is deducted from the pre-existing pool only, never from the
    /// incoming stake; the bettor's share of the post-fee pot is their
    /// fraction of the new side total:
    ///
    /// ```text
    /// winnings = stake / (side_total + stake) * (pool * (1 - fee) + stake)
    /// ```
    pub fn projected_winnings(
        &self,
        bet: &Bet,
        side: Side,
        stake: Decimal,
    ) -> Result<Decimal, EngineError> {
        if stake <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "projected stake must be positive, got {stake}"
            )));
        }

        let new_side_total = bet.side_total(side) + stake;
        let pot = bet.total_pool() * (Decimal::ONE - self.fee_fraction()) + stake;
        let winnings = stake * pot / new_side_total;

        debug!(
            bet_id = bet.id,
            side = %side,
            stake = %stake,
            pot = %pot,
            winnings = %winnings,
            "Projected winnings"
        );

        Ok(winnings)
    }

    /// Settlement payout for a position against a terminal bet.
    ///
    /// - `Cancelled`: full refund of both stakes, no fee.
    /// - Resolved: the winning-side stake's pro-rata share of the winning
    ///   pool plus the post-fee losing pool; zero for a losing-only
    ///   position.
    /// - Non-terminal status: `InvalidTransitionError`.
    pub fn settlement_payout(
        &self,
        position: &Position,
        bet: &Bet,
    ) -> Result<Decimal, EngineError> {
        let winner = match bet.status {
            BetStatus::Cancelled => return Ok(position.total_stake()),
            status => status.winning_side().ok_or(EngineError::InvalidTransition {
                bet_id: bet.id,
                status,
                attempted: "compute payout",
            })?,
        };

        let staked = position.amount_on(winner);
        let winner_total = bet.side_total(winner);
        if staked == Decimal::ZERO || winner_total == Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }

        let loser_total = bet.side_total(winner.opposite());
        let pot = winner_total + loser_total * (Decimal::ONE - self.fee_fraction());
        // Multiply before dividing so exact inputs give exact shares.
        Ok(staked * pot / winner_total)
    }

    /// The fee the platform retains at settlement: `fee_pct` percent of the
    /// losing pool for resolved bets, nothing for cancellations.
    pub fn retained_fee(&self, bet: &Bet) -> Decimal {
        match bet.status.winning_side() {
            Some(winner) => bet.side_total(winner.opposite()) * self.fee_fraction(),
            None => Decimal::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

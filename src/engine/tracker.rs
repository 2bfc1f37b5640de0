//! Position tracker — withdrawal authorization and payout claims.
//!
//! Guards the exactly-once property: the `withdrawn` flag and the value
//! transfer are one atomic ledger operation, so a failed transfer never
//! leaves the flag set and a re-issued `withdraw` after an unknown-outcome
//! timeout is always safe.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::ledger::Ledger;
use crate::payout::PayoutCalculator;
use crate::types::{Bet, EngineError, Position, TransferReceipt};

pub struct PositionTracker {
    ledger: Arc<dyn Ledger>,
    calculator: PayoutCalculator,
}

impl PositionTracker {
    pub fn new(ledger: Arc<dyn Ledger>, calculator: PayoutCalculator) -> Self {
        Self { ledger, calculator }
    }

    async fn load(&self, bet_id: u64, user: &str) -> Result<(Bet, Position), EngineError> {
        let bet = self
            .ledger
            .get_bet(bet_id)
            .await?
            .ok_or(EngineError::NotFound(bet_id))?;
        let position = self.ledger.get_position(bet_id, user).await?;
        Ok((bet, position))
    }

    /// Whether the user currently has an unclaimed payout on this bet.
    pub async fn is_withdrawable(&self, bet_id: u64, user: &str) -> Result<bool, EngineError> {
        let (bet, position) = self.load(bet_id, user).await?;
        Ok(bet.status.is_terminal() && position.has_stake() && !position.withdrawn)
    }

    /// The amount a withdrawal would transfer right now. Fails with
    /// `InvalidTransition` while the bet is still live.
    pub async fn payout_amount(&self, bet_id: u64, user: &str) -> Result<Decimal, EngineError> {
        let (bet, position) = self.load(bet_id, user).await?;
        self.calculator.settlement_payout(&position, &bet)
    }

    /// Claim the payout: compute the amount, then have the ledger flip the
    /// `withdrawn` flag and transfer in one unit.
    pub async fn withdraw(&self, bet_id: u64, user: &str) -> Result<TransferReceipt, EngineError> {
        let (bet, position) = self.load(bet_id, user).await?;

        if position.withdrawn {
            return Err(EngineError::AlreadyWithdrawn {
                bet_id,
                user: user.to_string(),
            });
        }
        if !bet.status.is_terminal() {
            return Err(EngineError::NotEligible(format!(
                "bet {bet_id} is {} and not yet settled",
                bet.status
            )));
        }
        if !position.has_stake() {
            return Err(EngineError::NotEligible(format!(
                "{user} has no stake on bet {bet_id}"
            )));
        }

        let payout = self.calculator.settlement_payout(&position, &bet)?;
        let receipt = self.ledger.settle_withdrawal(bet_id, user, payout).await?;

        info!(
            bet_id,
            user,
            status = %bet.status,
            payout = %payout,
            transfer_id = %receipt.transfer_id,
            "Payout withdrawn"
        );
        Ok(receipt)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::InMemoryLedger;
    use crate::ledger::MockLedger;
    use crate::types::{BetDraft, BetStatus, LedgerError, Side};
    use rust_decimal_macros::dec;

    const OWNER: &str = "0xowner";

    fn tracker(ledger: Arc<dyn Ledger>) -> PositionTracker {
        PositionTracker::new(ledger, PayoutCalculator::new(dec!(10)).unwrap())
    }

    /// Ledger with one bet: 3 FOR (0xa=2, 0xb=1), 1 AGAINST (0xc=1).
    async fn seeded_ledger() -> (Arc<InMemoryLedger>, u64) {
        let ledger = Arc::new(InMemoryLedger::new(OWNER));
        let bet_id = ledger
            .create_bet(BetDraft {
                title: "Claims".to_string(),
                description: "desc".to_string(),
                image_url: None,
                creator: OWNER.to_string(),
            })
            .await
            .unwrap();
        ledger.apply_stake(bet_id, "0xa", Side::For, dec!(2)).await.unwrap();
        ledger.apply_stake(bet_id, "0xb", Side::For, dec!(1)).await.unwrap();
        ledger.apply_stake(bet_id, "0xc", Side::Against, dec!(1)).await.unwrap();
        (ledger, bet_id)
    }

    #[tokio::test]
    async fn test_withdraw_pays_pro_rata_share() {
        let (ledger, bet_id) = seeded_ledger().await;
        ledger.set_status(bet_id, BetStatus::ResolvedFor).await.unwrap();
        let tracker = tracker(ledger.clone());

        // Pot = 3 + 1*0.9 = 3.9; A gets 2/3, B gets 1/3.
        let a = tracker.withdraw(bet_id, "0xa").await.unwrap();
        let b = tracker.withdraw(bet_id, "0xb").await.unwrap();
        assert_eq!(a.amount, dec!(2.6));
        assert_eq!(b.amount, dec!(1.3));
        assert_eq!(ledger.paid_to("0xa"), dec!(2.6));
        assert_eq!(ledger.paid_to("0xb"), dec!(1.3));
    }

    #[tokio::test]
    async fn test_withdraw_twice_fails_and_pays_once() {
        let (ledger, bet_id) = seeded_ledger().await;
        ledger.set_status(bet_id, BetStatus::ResolvedFor).await.unwrap();
        let tracker = tracker(ledger.clone());

        tracker.withdraw(bet_id, "0xa").await.unwrap();
        let again = tracker.withdraw(bet_id, "0xa").await;
        assert!(matches!(
            again,
            Err(EngineError::AlreadyWithdrawn { .. })
        ));
        assert_eq!(ledger.paid_to("0xa"), dec!(2.6));
        assert_eq!(ledger.receipts().len(), 1);
    }

    #[tokio::test]
    async fn test_withdraw_losing_side_transfers_zero() {
        let (ledger, bet_id) = seeded_ledger().await;
        ledger.set_status(bet_id, BetStatus::ResolvedFor).await.unwrap();
        let tracker = tracker(ledger.clone());

        let receipt = tracker.withdraw(bet_id, "0xc").await.unwrap();
        assert_eq!(receipt.amount, Decimal::ZERO);
        assert!(ledger.get_position(bet_id, "0xc").await.unwrap().withdrawn);
    }

    #[tokio::test]
    async fn test_withdraw_cancelled_refunds_stakes() {
        let (ledger, bet_id) = seeded_ledger().await;
        ledger.set_status(bet_id, BetStatus::Cancelled).await.unwrap();
        let tracker = tracker(ledger.clone());

        assert_eq!(tracker.withdraw(bet_id, "0xa").await.unwrap().amount, dec!(2));
        assert_eq!(tracker.withdraw(bet_id, "0xc").await.unwrap().amount, dec!(1));
    }

    #[tokio::test]
    async fn test_withdraw_guards() {
        let (ledger, bet_id) = seeded_ledger().await;
        let tracker = tracker(ledger.clone());

        // Still open.
        assert!(matches!(
            tracker.withdraw(bet_id, "0xa").await,
            Err(EngineError::NotEligible(_))
        ));

        // Unknown bet.
        assert!(matches!(
            tracker.withdraw(99, "0xa").await,
            Err(EngineError::NotFound(99))
        ));

        // No stake.
        ledger.set_status(bet_id, BetStatus::ResolvedFor).await.unwrap();
        assert!(matches!(
            tracker.withdraw(bet_id, "0xnobody").await,
            Err(EngineError::NotEligible(_))
        ));
    }

    #[tokio::test]
    async fn test_is_withdrawable() {
        let (ledger, bet_id) = seeded_ledger().await;
        let tracker = tracker(ledger.clone());

        // Live bet: not yet.
        assert!(!tracker.is_withdrawable(bet_id, "0xa").await.unwrap());

        ledger.set_status(bet_id, BetStatus::ResolvedFor).await.unwrap();
        assert!(tracker.is_withdrawable(bet_id, "0xa").await.unwrap());
        assert!(tracker.is_withdrawable(bet_id, "0xc").await.unwrap());
        assert!(!tracker.is_withdrawable(bet_id, "0xnobody").await.unwrap());

        tracker.withdraw(bet_id, "0xa").await.unwrap();
        assert!(!tracker.is_withdrawable(bet_id, "0xa").await.unwrap());

        assert!(matches!(
            tracker.is_withdrawable(99, "0xa").await,
            Err(EngineError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_payout_amount() {
        let (ledger, bet_id) = seeded_ledger().await;
        let tracker = tracker(ledger.clone());

        // Live bet: no payout defined yet.
        assert!(matches!(
            tracker.payout_amount(bet_id, "0xa").await,
            Err(EngineError::InvalidTransition { .. })
        ));

        ledger.set_status(bet_id, BetStatus::ResolvedFor).await.unwrap();
        assert_eq!(tracker.payout_amount(bet_id, "0xa").await.unwrap(), dec!(2.6));
        assert_eq!(tracker.payout_amount(bet_id, "0xc").await.unwrap(), Decimal::ZERO);

        assert!(matches!(
            tracker.payout_amount(99, "0xa").await,
            Err(EngineError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_failed_transfer_leaves_flag_unset() {
        // The ledger refuses the settlement; the engine must surface the
        // ledger error and issue exactly one settlement attempt.
        let mut mock = MockLedger::new();
        mock.expect_get_bet().returning(|_| {
            let mut bet = Bet::sample();
            bet.total_for = dec!(3);
            bet.total_against = dec!(1);
            bet.status = BetStatus::ResolvedFor;
            Ok(Some(bet))
        });
        mock.expect_get_position().returning(|bet_id, user| {
            let mut pos = Position::zero(bet_id, user);
            pos.for_amount = dec!(3);
            Ok(pos)
        });
        mock.expect_settle_withdrawal()
            .withf(|_, _, amount| *amount == dec!(3.9))
            .times(1)
            .returning(|_, _, _| Err(LedgerError::Transport("timeout".to_string())));

        let tracker = tracker(Arc::new(mock));
        let result = tracker.withdraw(0, "0xa").await;
        assert!(matches!(
            result,
            Err(EngineError::Ledger(LedgerError::Transport(_)))
        ));
    }
}

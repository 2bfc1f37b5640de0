//! Settlement resolver — terminal transitions and platform fees.
//!
//! Resolution freezes the pools at their current value; that snapshot is
//! the fixed denominator for every later payout claim. The platform fee
//! (a percentage of the losing pool) accrues to the owner balance held by
//! the ledger. Cancellation goes through the registry and retains no fee.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::ledger::Ledger;
use crate::payout::PayoutCalculator;
use crate::types::{AccountId, BetStatus, EngineError, TransferReceipt};

pub struct SettlementResolver {
    ledger: Arc<dyn Ledger>,
    owner: AccountId,
    calculator: PayoutCalculator,
}

impl SettlementResolver {
    pub fn new(ledger: Arc<dyn Ledger>, owner: &str, calculator: PayoutCalculator) -> Self {
        Self {
            ledger,
            owner: owner.to_string(),
            calculator,
        }
    }

    /// Declare the outcome. Owner-only; legal from `Open` or `Closed`.
    /// Returns the terminal status written.
    pub async fn resolve(
        &self,
        bet_id: u64,
        caller: &str,
        for_won: bool,
    ) -> Result<BetStatus, EngineError> {
        let bet = self
            .ledger
            .get_bet(bet_id)
            .await?
            .ok_or(EngineError::NotFound(bet_id))?;

        if caller != self.owner {
            return Err(EngineError::Authorization {
                caller: caller.to_string(),
                action: "resolve",
            });
        }

        let target = if for_won {
            BetStatus::ResolvedFor
        } else {
            BetStatus::ResolvedAgainst
        };
        if !bet.status.permits(target) {
            return Err(EngineError::InvalidTransition {
                bet_id,
                status: bet.status,
                attempted: "resolve",
            });
        }

        self.ledger.set_status(bet_id, target).await?;

        // Fee comes out of the losing pool, frozen as of this resolution.
        let mut settled = bet;
        settled.status = target;
        let fee = self.calculator.retained_fee(&settled);
        if fee > Decimal::ZERO {
            self.ledger.credit_owner(fee).await?;
        }

        info!(
            bet_id,
            outcome = %target,
            total_for = %settled.total_for,
            total_against = %settled.total_against,
            fee = %fee,
            "Bet resolved"
        );
        Ok(target)
    }

    /// Pay out part of the accrued platform fees to the owner.
    pub async fn owner_withdraw(
        &self,
        caller: &str,
        amount: Decimal,
    ) -> Result<TransferReceipt, EngineError> {
        if caller != self.owner {
            return Err(EngineError::Authorization {
                caller: caller.to_string(),
                action: "withdraw platform fees",
            });
        }
        if amount <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "withdrawal amount must be positive, got {amount}"
            )));
        }

        let balance = self.ledger.owner_balance().await?;
        if amount > balance {
            return Err(EngineError::Validation(format!(
                "withdrawal amount {amount} exceeds accrued balance {balance}"
            )));
        }

        let receipt = self.ledger.debit_owner(amount).await?;
        info!(amount = %amount, remaining = %(balance - amount), "Owner fees withdrawn");
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
    use crate::types::{BetDraft, Side};
    use rust_decimal_macros::dec;

    const OWNER: &str = "0xowner";

    async fn setup() -> (Arc<InMemoryLedger>, SettlementResolver, u64) {
        let ledger = Arc::new(InMemoryLedger::new(OWNER));
        let resolver = SettlementResolver::new(
            ledger.clone(),
            OWNER,
            PayoutCalculator::new(dec!(10)).unwrap(),
        );
        let bet_id = ledger
            .create_bet(BetDraft {
                title: "Settle me".to_string(),
                description: "desc".to_string(),
                image_url: None,
                creator: OWNER.to_string(),
            })
            .await
            .unwrap();
        // totals 3 for / 1 against
        ledger.apply_stake(bet_id, "0xa", Side::For, dec!(2)).await.unwrap();
        ledger.apply_stake(bet_id, "0xb", Side::For, dec!(1)).await.unwrap();
        ledger.apply_stake(bet_id, "0xc", Side::Against, dec!(1)).await.unwrap();
        (ledger, resolver, bet_id)
    }

    #[tokio::test]
    async fn test_resolve_for_freezes_pools_and_accrues_fee() {
        let (ledger, resolver, bet_id) = setup().await;

        let status = resolver.resolve(bet_id, OWNER, true).await.unwrap();
        assert_eq!(status, BetStatus::ResolvedFor);

        let bet = ledger.get_bet(bet_id).await.unwrap().unwrap();
        assert_eq!(bet.status, BetStatus::ResolvedFor);
        assert_eq!(bet.total_for, dec!(3));
        assert_eq!(bet.total_against, dec!(1));

        // 10% of the losing (against) pool.
        assert_eq!(ledger.owner_balance().await.unwrap(), dec!(0.1));

        // Frozen: no further stakes land.
        assert!(ledger.apply_stake(bet_id, "0xd", Side::For, dec!(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_against_fee_from_for_pool() {
        let (ledger, resolver, bet_id) = setup().await;
        let status = resolver.resolve(bet_id, OWNER, false).await.unwrap();
        assert_eq!(status, BetStatus::ResolvedAgainst);
        // 10% of the losing (for) pool of 3.
        assert_eq!(ledger.owner_balance().await.unwrap(), dec!(0.3));
    }

    #[tokio::test]
    async fn test_resolve_from_closed() {
        let (ledger, resolver, bet_id) = setup().await;
        ledger.set_status(bet_id, BetStatus::Closed).await.unwrap();
        assert_eq!(
            resolver.resolve(bet_id, OWNER, true).await.unwrap(),
            BetStatus::ResolvedFor
        );
    }

    #[tokio::test]
    async fn test_resolve_requires_owner() {
        let (ledger, resolver, bet_id) = setup().await;
        let result = resolver.resolve(bet_id, "0xmallory", true).await;
        assert!(matches!(result, Err(EngineError::Authorization { .. })));
        assert_eq!(
            ledger.get_bet(bet_id).await.unwrap().unwrap().status,
            BetStatus::Open
        );
    }

    #[tokio::test]
    async fn test_resolve_terminal_bet_fails() {
        let (_ledger, resolver, bet_id) = setup().await;
        resolver.resolve(bet_id, OWNER, true).await.unwrap();
        let result = resolver.resolve(bet_id, OWNER, false).await;
        assert!(matches!(
            result,
            Err(EngineError::InvalidTransition {
                status: BetStatus::ResolvedFor,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_resolve_unknown_bet() {
        let (_ledger, resolver, _) = setup().await;
        assert!(matches!(
            resolver.resolve(99, OWNER, true).await,
            Err(EngineError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_zero_fee_accrues_nothing() {
        let ledger = Arc::new(InMemoryLedger::new(OWNER));
        let resolver = SettlementResolver::new(
            ledger.clone(),
            OWNER,
            PayoutCalculator::new(dec!(0)).unwrap(),
        );
        let bet_id = ledger
            .create_bet(BetDraft {
                title: "No fee".to_string(),
                description: "desc".to_string(),
                image_url: None,
                creator: OWNER.to_string(),
            })
            .await
            .unwrap();
        ledger.apply_stake(bet_id, "0xa", Side::Against, dec!(5)).await.unwrap();

        resolver.resolve(bet_id, OWNER, true).await.unwrap();
        assert_eq!(ledger.owner_balance().await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_owner_withdraw_flow() {
        let (ledger, resolver, bet_id) = setup().await;
        resolver.resolve(bet_id, OWNER, true).await.unwrap();

        let receipt = resolver.owner_withdraw(OWNER, dec!(0.1)).await.unwrap();
        assert_eq!(receipt.amount, dec!(0.1));
        assert_eq!(ledger.owner_balance().await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_owner_withdraw_guards() {
        let (_ledger, resolver, bet_id) = setup().await;
        resolver.resolve(bet_id, OWNER, true).await.unwrap();

        assert!(matches!(
            resolver.owner_withdraw("0xmallory", dec!(0.1)).await,
            Err(EngineError::Authorization { .. })
        ));
        assert!(matches!(
            resolver.owner_withdraw(OWNER, dec!(0)).await,
            Err(EngineError::Validation(_))
        ));
        // More than accrued.
        assert!(matches!(
            resolver.owner_withdraw(OWNER, dec!(5)).await,
            Err(EngineError::Validation(_))
        ));
    }
}

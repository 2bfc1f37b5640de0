//! Bet registry — record lifecycle and the status state machine.
//!
//! Validates every transition against the explicit table on `BetStatus`
//! before instructing the ledger. Owner-only operations check existence,
//! then authority, then the transition.

use std::sync::Arc;
use tracing::info;

use crate::ledger::Ledger;
use crate::types::{AccountId, Bet, BetDraft, BetStatus, EngineError};

pub struct BetRegistry {
    ledger: Arc<dyn Ledger>,
    owner: AccountId,
}

impl BetRegistry {
    pub fn new(ledger: Arc<dyn Ledger>, owner: &str) -> Self {
        Self {
            ledger,
            owner: owner.to_string(),
        }
    }

    /// Create a new bet. Any account may create one; the ledger assigns the
    /// next sequential id and emits `BetCreated`.
    pub async fn create(&self, draft: BetDraft) -> Result<u64, EngineError> {
        if draft.title.trim().is_empty() {
            return Err(EngineError::Validation("bet title must not be empty".into()));
        }
        if draft.description.trim().is_empty() {
            return Err(EngineError::Validation(
                "bet description must not be empty".into(),
            ));
        }

        let title = draft.title.clone();
        let bet_id = self.ledger.create_bet(draft).await?;
        info!(bet_id, title = %title, "Bet created");
        Ok(bet_id)
    }

    /// Shut the staking window. Owner-only; legal only from `Open`.
    pub async fn close(&self, bet_id: u64, caller: &str) -> Result<(), EngineError> {
        self.transition(bet_id, caller, BetStatus::Closed, "close").await
    }

    /// Cancel the bet, entitling every staker to a full refund. Owner-only;
    /// legal from `Open` or `Closed`.
    pub async fn cancel(&self, bet_id: u64, caller: &str) -> Result<(), EngineError> {
        self.transition(bet_id, caller, BetStatus::Cancelled, "cancel").await
    }

    /// Fetch one bet.
    pub async fn get(&self, bet_id: u64) -> Result<Bet, EngineError> {
        self.ledger
            .get_bet(bet_id)
            .await?
            .ok_or(EngineError::NotFound(bet_id))
    }

    /// All bets in id order.
    pub async fn list(&self) -> Result<Vec<Bet>, EngineError> {
        Ok(self.ledger.list_bets().await?)
    }

    /// Shared owner-transition path: existence, authority, transition table,
    /// then the ledger write.
    pub(crate) async fn transition(
        &self,
        bet_id: u64,
        caller: &str,
        next: BetStatus,
        attempted: &'static str,
    ) -> Result<(), EngineError> {
        let bet = self.get(bet_id).await?;

        if caller != self.owner {
            return Err(EngineError::Authorization {
                caller: caller.to_string(),
                action: attempted,
            });
        }

        if !bet.status.permits(next) {
            return Err(EngineError::InvalidTransition {
                bet_id,
                status: bet.status,
                attempted,
            });
        }

        self.ledger.set_status(bet_id, next).await?;
        info!(bet_id, from = %bet.status, to = %next, "Bet status transitioned");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::InMemoryLedger;

    const OWNER: &str = "0xowner";

    fn registry() -> BetRegistry {
        BetRegistry::new(Arc::new(InMemoryLedger::new(OWNER)), OWNER)
    }

    fn draft(title: &str, description: &str) -> BetDraft {
        BetDraft {
            title: title.to_string(),
            description: description.to_string(),
            image_url: None,
            creator: "0xalice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_opens() {
        let registry = registry();
        let first = registry.create(draft("First?", "desc")).await.unwrap();
        let second = registry.create(draft("Second?", "desc")).await.unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 1);

        let bet = registry.get(first).await.unwrap();
        assert_eq!(bet.status, BetStatus::Open);
        assert_eq!(bet.creator, "0xalice");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_title_and_description() {
        let registry = registry();
        assert!(matches!(
            registry.create(draft("", "desc")).await,
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            registry.create(draft("   ", "desc")).await,
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            registry.create(draft("Title?", "")).await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_close_happy_path() {
        let registry = registry();
        let id = registry.create(draft("Close me", "desc")).await.unwrap();
        registry.close(id, OWNER).await.unwrap();
        assert_eq!(registry.get(id).await.unwrap().status, BetStatus::Closed);
    }

    #[tokio::test]
    async fn test_close_requires_owner() {
        let registry = registry();
        let id = registry.create(draft("Guarded", "desc")).await.unwrap();
        let result = registry.close(id, "0xmallory").await;
        assert!(matches!(result, Err(EngineError::Authorization { .. })));
        assert_eq!(registry.get(id).await.unwrap().status, BetStatus::Open);
    }

    #[tokio::test]
    async fn test_close_twice_is_invalid_transition() {
        let registry = registry();
        let id = registry.create(draft("Once", "desc")).await.unwrap();
        registry.close(id, OWNER).await.unwrap();
        let result = registry.close(id, OWNER).await;
        assert!(matches!(
            result,
            Err(EngineError::InvalidTransition {
                status: BetStatus::Closed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_cancel_from_open_and_closed() {
        let registry = registry();

        let open = registry.create(draft("From open", "desc")).await.unwrap();
        registry.cancel(open, OWNER).await.unwrap();
        assert_eq!(registry.get(open).await.unwrap().status, BetStatus::Cancelled);

        let closed = registry.create(draft("From closed", "desc")).await.unwrap();
        registry.close(closed, OWNER).await.unwrap();
        registry.cancel(closed, OWNER).await.unwrap();
        assert_eq!(registry.get(closed).await.unwrap().status, BetStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_terminal_states_reject_all_mutations() {
        let registry = registry();
        let id = registry.create(draft("Terminal", "desc")).await.unwrap();
        registry.cancel(id, OWNER).await.unwrap();

        assert!(matches!(
            registry.close(id, OWNER).await,
            Err(EngineError::InvalidTransition { .. })
        ));
        assert!(matches!(
            registry.cancel(id, OWNER).await,
            Err(EngineError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_unknown_bet() {
        let registry = registry();
        assert!(matches!(
            registry.get(42).await,
            Err(EngineError::NotFound(42))
        ));
        assert!(matches!(
            registry.close(42, OWNER).await,
            Err(EngineError::NotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_list_returns_all_in_order() {
        let registry = registry();
        registry.create(draft("a", "d")).await.unwrap();
        registry.create(draft("b", "d")).await.unwrap();
        let bets = registry.list().await.unwrap();
        assert_eq!(bets.len(), 2);
        assert_eq!(bets[0].title, "a");
        assert_eq!(bets[1].title, "b");
    }
}

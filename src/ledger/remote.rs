//! Remote ledger service integration.
//!
//! HTTP client for an external ledger service exposing the canonical Bet
//! and Position records. Every mutating call returns only after the service
//! confirms the mutation; the confirmed fact comes back in the response
//! body and is republished on the local broadcast stream so subscribers see
//! the same facts regardless of backend.
//!
//! Auth: optional `Authorization: Bearer {token}` for mutating endpoints.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::Ledger;
use crate::types::{
    Bet, BetDraft, BetStatus, LedgerError, LedgerEvent, Position, Side, TransferReceipt,
};

const LEDGER_NAME: &str = "remote";

/// Capacity of the republished fact channel.
const EVENT_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Wire types (ledger service JSON <-> Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct StakeRequest<'a> {
    user: &'a str,
    side: Side,
    amount: Decimal,
}

#[derive(Debug, Serialize)]
struct StatusRequest {
    status: BetStatus,
}

#[derive(Debug, Serialize)]
struct WithdrawalRequest<'a> {
    user: &'a str,
    amount: Decimal,
}

#[derive(Debug, Serialize)]
struct TreasuryRequest {
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    bet_id: u64,
    #[serde(default)]
    event: Option<LedgerEvent>,
}

#[derive(Debug, Deserialize)]
struct StakeResponse {
    position: Position,
    #[serde(default)]
    event: Option<LedgerEvent>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    event: Option<LedgerEvent>,
}

#[derive(Debug, Deserialize)]
struct WithdrawalResponse {
    receipt: TransferReceipt,
    #[serde(default)]
    event: Option<LedgerEvent>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct TreasuryResponse {
    owner_balance: Decimal,
    total_balance: Decimal,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Remote ledger service client.
pub struct RemoteLedger {
    http: Client,
    base_url: String,
    /// Optional bearer token for mutating endpoints.
    auth_token: Option<Secret<String>>,
    events: broadcast::Sender<LedgerEvent>,
}

impl RemoteLedger {
    /// Create a new remote ledger client.
    pub fn new(base_url: &str, auth_token: Option<Secret<String>>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("decentralbet/0.1.0 (wagering-engine)")
            .build()
            .context("Failed to build HTTP client for the remote ledger")?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            events,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }

    fn republish(&self, event: Option<LedgerEvent>) {
        if let Some(event) = event {
            debug!(event = %event, ledger = LEDGER_NAME, "Fact republished");
            let _ = self.events.send(event);
        }
    }

    /// Map an HTTP response to the ledger error taxonomy: 4xx means the
    /// service processed and refused the command, everything else is
    /// transport.
    async fn check(resp: Response) -> Result<Response, LedgerError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(LedgerError::Rejected(format!("{status}: {body}")))
        } else {
            Err(LedgerError::Transport(format!("{status}: {body}")))
        }
    }

    fn transport(e: reqwest::Error) -> LedgerError {
        LedgerError::Transport(e.to_string())
    }

    async fn parse<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, LedgerError> {
        resp.json::<T>()
            .await
            .map_err(|e| LedgerError::Transport(format!("malformed ledger response: {e}")))
    }

    async fn treasury(&self) -> Result<TreasuryResponse, LedgerError> {
        let resp = self
            .http
            .get(self.url("/treasury"))
            .send()
            .await
            .map_err(Self::transport)?;
        Self::parse(Self::check(resp).await?).await
    }
}

#[async_trait]
impl Ledger for RemoteLedger {
    async fn create_bet(&self, draft: BetDraft) -> Result<u64, LedgerError> {
        let resp = self
            .authed(self.http.post(self.url("/bets")).json(&draft))
            .send()
            .await
            .map_err(Self::transport)?;
        let created: CreateResponse = Self::parse(Self::check(resp).await?).await?;
        self.republish(created.event);
        Ok(created.bet_id)
    }

    async fn get_bet(&self, bet_id: u64) -> Result<Option<Bet>, LedgerError> {
        let resp = self
            .http
            .get(self.url(&format!("/bets/{bet_id}")))
            .send()
            .await
            .map_err(Self::transport)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::parse(Self::check(resp).await?).await?))
    }

    async fn list_bets(&self) -> Result<Vec<Bet>, LedgerError> {
        let resp = self
            .http
            .get(self.url("/bets"))
            .send()
            .await
            .map_err(Self::transport)?;
        Self::parse(Self::check(resp).await?).await
    }

    async fn bet_count(&self) -> Result<u64, LedgerError> {
        let resp = self
            .http
            .get(self.url("/bets/count"))
            .send()
            .await
            .map_err(Self::transport)?;
        let count: CountResponse = Self::parse(Self::check(resp).await?).await?;
        Ok(count.count)
    }

    async fn set_status(&self, bet_id: u64, status: BetStatus) -> Result<(), LedgerError> {
        let resp = self
            .authed(
                self.http
                    .post(self.url(&format!("/bets/{bet_id}/status")))
                    .json(&StatusRequest { status }),
            )
            .send()
            .await
            .map_err(Self::transport)?;
        let body: StatusResponse = Self::parse(Self::check(resp).await?).await?;
        self.republish(body.event);
        Ok(())
    }

    async fn apply_stake(
        &self,
        bet_id: u64,
        user: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<Position, LedgerError> {
        let resp = self
            .authed(
                self.http
                    .post(self.url(&format!("/bets/{bet_id}/stakes")))
                    .json(&StakeRequest { user, side, amount }),
            )
            .send()
            .await
            .map_err(Self::transport)?;
        let body: StakeResponse = Self::parse(Self::check(resp).await?).await?;
        self.republish(body.event);
        Ok(body.position)
    }

    async fn get_position(&self, bet_id: u64, user: &str) -> Result<Position, LedgerError> {
        let resp = self
            .http
            .get(self.url(&format!("/bets/{bet_id}/positions/{user}")))
            .send()
            .await
            .map_err(Self::transport)?;
        // The service returns a zero position for users who never staked.
        Self::parse(Self::check(resp).await?).await
    }

    async fn settle_withdrawal(
        &self,
        bet_id: u64,
        user: &str,
        amount: Decimal,
    ) -> Result<TransferReceipt, LedgerError> {
        let resp = self
            .authed(
                self.http
                    .post(self.url(&format!("/bets/{bet_id}/withdrawals")))
                    .json(&WithdrawalRequest { user, amount }),
            )
            .send()
            .await
            .map_err(Self::transport)?;
        let body: WithdrawalResponse = Self::parse(Self::check(resp).await?).await?;
        self.republish(body.event);
        Ok(body.receipt)
    }

    async fn credit_owner(&self, amount: Decimal) -> Result<(), LedgerError> {
        let resp = self
            .authed(
                self.http
                    .post(self.url("/treasury/credit"))
                    .json(&TreasuryRequest { amount }),
            )
            .send()
            .await
            .map_err(Self::transport)?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn debit_owner(&self, amount: Decimal) -> Result<TransferReceipt, LedgerError> {
        let resp = self
            .authed(
                self.http
                    .post(self.url("/treasury/debit"))
                    .json(&TreasuryRequest { amount }),
            )
            .send()
            .await
            .map_err(Self::transport)?;
        let body: WithdrawalResponse = Self::parse(Self::check(resp).await?).await?;
        self.republish(body.event);
        Ok(body.receipt)
    }

    async fn owner_balance(&self) -> Result<Decimal, LedgerError> {
        Ok(self.treasury().await?.owner_balance)
    }

    async fn total_balance(&self) -> Result<Decimal, LedgerError> {
        Ok(self.treasury().await?.total_balance)
    }

    fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    fn name(&self) -> &str {
        LEDGER_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let ledger = RemoteLedger::new("http://ledger.local/", None).unwrap();
        assert_eq!(ledger.url("/bets/3"), "http://ledger.local/bets/3");
    }

    #[test]
    fn test_stake_request_serializes() {
        let req = StakeRequest {
            user: "0xabc",
            side: Side::For,
            amount: dec!(1.5),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("0xabc"));
        assert!(json.contains("For"));
    }

    #[test]
    fn test_create_response_event_optional() {
        let with_event: CreateResponse = serde_json::from_str(
            r#"{"bet_id": 4, "event": {"BetCreated": {"bet_id": 4, "title": "t", "creator": "0xc"}}}"#,
        )
        .unwrap();
        assert_eq!(with_event.bet_id, 4);
        assert!(with_event.event.is_some());

        let without: CreateResponse = serde_json::from_str(r#"{"bet_id": 5}"#).unwrap();
        assert_eq!(without.bet_id, 5);
        assert!(without.event.is_none());
    }

    #[test]
    fn test_treasury_response_deserializes() {
        let resp: TreasuryResponse =
            serde_json::from_str(r#"{"owner_balance": 0.4, "total_balance": 12.5}"#).unwrap();
        assert_eq!(resp.owner_balance, dec!(0.4));
        assert_eq!(resp.total_balance, dec!(12.5));
    }

    #[test]
    fn test_republish_reaches_subscribers() {
        let ledger = RemoteLedger::new("http://ledger.local", None).unwrap();
        let mut events = ledger.subscribe();
        ledger.republish(Some(LedgerEvent::OwnerWithdrawal { amount: dec!(1) }));
        assert_eq!(
            events.try_recv().unwrap(),
            LedgerEvent::OwnerWithdrawal { amount: dec!(1) }
        );
    }
}

//! Dashboard API route handlers.
//!
//! All endpoints return JSON. The engine is shared via `Arc<BettingEngine>`.
//! This layer only translates between HTTP and engine calls — identity is
//! taken from the request body (`caller`), wallet resolution being the
//! front-end's job.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::BettingEngine;
use crate::payout::Odds;
use crate::types::{Bet, BetDraft, EngineError, Position, Side, TransferReceipt, UserSummary};

pub type AppState = Arc<BettingEngine>;

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Engine error wrapped for HTTP: kind drives the status code, the message
/// is surfaced verbatim.
#[derive(Debug)]
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            EngineError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            EngineError::Authorization { .. } => (StatusCode::FORBIDDEN, "authorization"),
            EngineError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            EngineError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            EngineError::AlreadyWithdrawn { .. } => (StatusCode::CONFLICT, "already_withdrawn"),
            EngineError::NotEligible(_) => (StatusCode::UNPROCESSABLE_ENTITY, "not_eligible"),
            EngineError::Ledger(_) => (StatusCode::BAD_GATEWAY, "ledger"),
        };
        let body = ErrorBody {
            error: kind,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn parse_side(s: &str) -> Result<Side, ApiError> {
    match s.to_lowercase().as_str() {
        "for" => Ok(Side::For),
        "against" => Ok(Side::Against),
        other => Err(EngineError::Validation(format!(
            "side must be \"for\" or \"against\", got {other:?}"
        ))
        .into()),
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct BetView {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub total_for: Decimal,
    pub total_against: Decimal,
    pub total_pool: Decimal,
    pub status: String,
    pub creator: String,
    pub created_at: String,
    pub odds_for: Option<Decimal>,
    pub odds_against: Option<Decimal>,
}

impl BetView {
    fn build(bet: Bet, odds: Odds) -> Self {
        Self {
            id: bet.id,
            total_pool: bet.total_pool(),
            status: bet.status.to_string(),
            created_at: bet.created_at.to_rfc3339(),
            odds_for: odds.for_odds,
            odds_against: odds.against_odds,
            title: bet.title,
            description: bet.description,
            image_url: bet.image_url,
            total_for: bet.total_for,
            total_against: bet.total_against,
            creator: bet.creator,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub bet_id: u64,
    pub user: String,
    pub for_amount: Decimal,
    pub against_amount: Decimal,
    pub withdrawn: bool,
}

impl From<Position> for PositionView {
    fn from(p: Position) -> Self {
        Self {
            bet_id: p.bet_id,
            user: p.user,
            for_amount: p.for_amount,
            against_amount: p.against_amount,
            withdrawn: p.withdrawn,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionStatusView {
    #[serde(flatten)]
    pub position: PositionView,
    pub withdrawable: bool,
    /// Payout a withdrawal would transfer; absent while the bet is live.
    pub payout: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptView {
    pub transfer_id: String,
    pub user: String,
    pub amount: Decimal,
    pub timestamp: String,
}

impl From<TransferReceipt> for ReceiptView {
    fn from(r: TransferReceipt) -> Self {
        Self {
            transfer_id: r.transfer_id,
            user: r.user,
            amount: r.amount,
            timestamp: r.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipationView {
    pub bet_id: u64,
    pub title: String,
    pub status: String,
    pub for_amount: Decimal,
    pub against_amount: Decimal,
    pub total_for: Decimal,
    pub total_against: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryView {
    pub bets_staked: u64,
    pub total_staked: Decimal,
    pub total_winnings: Decimal,
    pub active: Vec<ParticipationView>,
    pub past: Vec<ParticipationView>,
}

impl From<UserSummary> for SummaryView {
    fn from(s: UserSummary) -> Self {
        let view = |p: crate::types::Participation| ParticipationView {
            bet_id: p.bet.id,
            title: p.bet.title,
            status: p.bet.status.to_string(),
            for_amount: p.position.for_amount,
            against_amount: p.position.against_amount,
            total_for: p.bet.total_for,
            total_against: p.bet.total_against,
        };
        Self {
            bets_staked: s.bets_staked,
            total_staked: s.total_staked,
            total_winnings: s.total_winnings,
            active: s.active.into_iter().map(view).collect(),
            past: s.past.into_iter().map(view).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TreasuryView {
    pub owner_balance: Decimal,
    pub total_balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectionView {
    pub side: String,
    pub stake: Decimal,
    pub projected_winnings: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedView {
    pub bet_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub status: String,
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateBetRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub caller: String,
}

#[derive(Debug, Deserialize)]
pub struct StakeRequest {
    pub caller: String,
    pub side: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CallerRequest {
    pub caller: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub caller: String,
    pub for_won: bool,
}

#[derive(Debug, Deserialize)]
pub struct OwnerWithdrawRequest {
    pub caller: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectionParams {
    pub side: String,
    pub stake: Decimal,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/bets
pub async fn list_bets(
    State(engine): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<BetView>>, ApiError> {
    let filter = match params.status.as_deref() {
        Some(s) => Some(
            s.parse::<crate::types::BetStatus>()
                .map_err(|e| EngineError::Validation(e.to_string()))?,
        ),
        None => None,
    };

    let bets = engine.list_bets().await?;
    let views = bets
        .into_iter()
        .filter(|bet| filter.map_or(true, |f| bet.status == f))
        .map(|bet| {
            let odds = engine.calculator().odds(&bet);
            BetView::build(bet, odds)
        })
        .collect();
    Ok(Json(views))
}

/// GET /api/bets/:id
pub async fn get_bet(
    State(engine): State<AppState>,
    Path(bet_id): Path<u64>,
) -> Result<Json<BetView>, ApiError> {
    let bet = engine.get_bet(bet_id).await?;
    let odds = engine.calculator().odds(&bet);
    Ok(Json(BetView::build(bet, odds)))
}

/// GET /api/bets/:id/projection?side=for&stake=1.5
pub async fn projection(
    State(engine): State<AppState>,
    Path(bet_id): Path<u64>,
    Query(params): Query<ProjectionParams>,
) -> Result<Json<ProjectionView>, ApiError> {
    let side = parse_side(&params.side)?;
    let winnings = engine.projected_winnings(bet_id, side, params.stake).await?;
    Ok(Json(ProjectionView {
        side: side.to_string(),
        stake: params.stake,
        projected_winnings: winnings,
    }))
}

/// GET /api/bets/:id/positions/:user
pub async fn get_position(
    State(engine): State<AppState>,
    Path((bet_id, user)): Path<(u64, String)>,
) -> Result<Json<PositionStatusView>, ApiError> {
    let position = engine.get_position(bet_id, &user).await?;
    let withdrawable = engine.is_withdrawable(bet_id, &user).await?;
    let payout = match engine.payout_amount(bet_id, &user).await {
        Ok(amount) => Some(amount),
        Err(EngineError::InvalidTransition { .. }) => None,
        Err(e) => return Err(e.into()),
    };
    Ok(Json(PositionStatusView {
        position: position.into(),
        withdrawable,
        payout,
    }))
}

/// GET /api/users/:user/summary
pub async fn user_summary(
    State(engine): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<SummaryView>, ApiError> {
    let summary = engine.user_summary(&user).await?;
    Ok(Json(summary.into()))
}

/// GET /api/treasury
pub async fn treasury(State(engine): State<AppState>) -> Result<Json<TreasuryView>, ApiError> {
    Ok(Json(TreasuryView {
        owner_balance: engine.owner_balance().await?,
        total_balance: engine.total_balance().await?,
    }))
}

/// POST /api/bets
pub async fn create_bet(
    State(engine): State<AppState>,
    Json(req): Json<CreateBetRequest>,
) -> Result<(StatusCode, Json<CreatedView>), ApiError> {
    let bet_id = engine
        .create_bet(BetDraft {
            title: req.title,
            description: req.description,
            image_url: req.image_url,
            creator: req.caller,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedView { bet_id })))
}

/// POST /api/bets/:id/stakes
pub async fn place_stake(
    State(engine): State<AppState>,
    Path(bet_id): Path<u64>,
    Json(req): Json<StakeRequest>,
) -> Result<Json<PositionView>, ApiError> {
    let side = parse_side(&req.side)?;
    let position = engine
        .place_stake(bet_id, &req.caller, side, req.amount)
        .await?;
    Ok(Json(position.into()))
}

/// POST /api/bets/:id/close
pub async fn close_bet(
    State(engine): State<AppState>,
    Path(bet_id): Path<u64>,
    Json(req): Json<CallerRequest>,
) -> Result<Json<StatusView>, ApiError> {
    engine.close_bet(bet_id, &req.caller).await?;
    Ok(Json(StatusView {
        status: crate::types::BetStatus::Closed.to_string(),
    }))
}

/// POST /api/bets/:id/cancel
pub async fn cancel_bet(
    State(engine): State<AppState>,
    Path(bet_id): Path<u64>,
    Json(req): Json<CallerRequest>,
) -> Result<Json<StatusView>, ApiError> {
    engine.cancel_bet(bet_id, &req.caller).await?;
    Ok(Json(StatusView {
        status: crate::types::BetStatus::Cancelled.to_string(),
    }))
}

/// POST /api/bets/:id/resolve
pub async fn resolve_bet(
    State(engine): State<AppState>,
    Path(bet_id): Path<u64>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<StatusView>, ApiError> {
    let status = engine.resolve_bet(bet_id, &req.caller, req.for_won).await?;
    Ok(Json(StatusView {
        status: status.to_string(),
    }))
}

/// POST /api/bets/:id/withdraw
pub async fn withdraw(
    State(engine): State<AppState>,
    Path(bet_id): Path<u64>,
    Json(req): Json<CallerRequest>,
) -> Result<Json<ReceiptView>, ApiError> {
    let receipt = engine.withdraw(bet_id, &req.caller).await?;
    Ok(Json(receipt.into()))
}

/// POST /api/treasury/withdraw
pub async fn owner_withdraw(
    State(engine): State<AppState>,
    Json(req): Json<OwnerWithdrawRequest>,
) -> Result<Json<ReceiptView>, ApiError> {
    let receipt = engine.owner_withdraw(&req.caller, req.amount).await?;
    Ok(Json(receipt.into()))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Notification Endpoints
//!
//! 체인 이벤트 webhook/UI가 호출하는 생애주기 알림 트리거.
//!
//! 모든 핸들러는 전송이 전부 settle된 뒤에만 응답하며, 개별 전송
//! 실패가 있어도 사전 검증만 통과하면 success로 응답함 (best-effort).

use axum::{extract::State, Json};
use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::services::DispatchSummary;
use crate::types::EthAddress;
use crate::{error::ApiError, AppState};

// ============ Request/Response Types ============

/// 인보이스 생성 이벤트
#[derive(Debug, Deserialize)]
pub struct CreatedEvent {
    pub invoice_id: u64,
    pub msme: String,
    pub buyer: String,
    /// wei 단위 십진 문자열
    pub amount: String,
}

/// 투자 접수 이벤트
#[derive(Debug, Deserialize)]
pub struct InvestmentEvent {
    pub invoice_id: u64,
    pub investor: String,
    /// wei 단위 십진 문자열
    pub amount: String,
}

/// terminal 상태 이벤트 (상환/부도)
///
/// 주소는 payload가 아닌 원장 재조회로 확정됨
#[derive(Debug, Deserialize)]
pub struct TerminalEvent {
    pub invoice_id: u64,
}

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub success: bool,
    pub attempted: usize,
    pub delivered: usize,
}

impl From<DispatchSummary> for NotifyResponse {
    fn from(summary: DispatchSummary) -> Self {
        Self {
            success: true,
            attempted: summary.attempted,
            delivered: summary.delivered,
        }
    }
}

// ============ Handlers ============

/// POST /api/notify/created
pub async fn notify_created(
    State(state): State<AppState>,
    Json(event): Json<CreatedEvent>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let msme = EthAddress::new(&event.msme).map_err(ApiError::ValidationError)?;
    let buyer = EthAddress::new(&event.buyer).map_err(ApiError::ValidationError)?;
    let amount = parse_wei(&event.amount)?;

    let summary = state
        .notifier
        .invoice_created(event.invoice_id, &msme, &buyer, amount)
        .await?;

    Ok(Json(summary.into()))
}

/// POST /api/notify/investment
pub async fn notify_investment(
    State(state): State<AppState>,
    Json(event): Json<InvestmentEvent>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let investor = EthAddress::new(&event.investor).map_err(ApiError::ValidationError)?;
    let amount = parse_wei(&event.amount)?;

    let summary = state
        .notifier
        .investment_received(event.invoice_id, &investor, amount)
        .await?;

    Ok(Json(summary.into()))
}

/// POST /api/notify/repaid
///
/// 온체인 상태가 repaid(3)가 아니면 422로 거부하고 아무것도 보내지 않음
pub async fn notify_repaid(
    State(state): State<AppState>,
    Json(event): Json<TerminalEvent>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let summary = state.notifier.invoice_repaid(event.invoice_id).await?;
    Ok(Json(summary.into()))
}

/// POST /api/notify/defaulted
///
/// 온체인 상태가 defaulted(4)가 아니면 422로 거부하고 아무것도 보내지 않음
pub async fn notify_defaulted(
    State(state): State<AppState>,
    Json(event): Json<TerminalEvent>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let summary = state.notifier.invoice_defaulted(event.invoice_id).await?;
    Ok(Json(summary.into()))
}

// ============ Helpers ============

fn parse_wei(amount: &str) -> Result<U256, ApiError> {
    U256::from_dec_str(amount.trim())
        .map_err(|_| ApiError::ValidationError(format!("invalid amount: {}", amount)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wei() {
        assert_eq!(parse_wei("1000").unwrap(), U256::from(1000u64));
        assert_eq!(
            parse_wei("1000000000000000000").unwrap(),
            U256::exp10(18)
        );
        assert!(parse_wei("1.5").is_err());
        assert!(parse_wei("0x10").is_err());
        assert!(parse_wei("").is_err());
    }
}

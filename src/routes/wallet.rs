//! Wallet Binding Endpoint
//!
//! 계정과 지갑 주소를 1:1로 연결. 하나의 주소는 전역적으로 한 계정만
//! 보유할 수 있음 (unique 제약이 권위 있는 방어선, `AccountStore::bind_wallet` 참고).

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::AccountStore;
use crate::types::EthAddress;
use crate::{error::ApiError, AppState};

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct BindWalletRequest {
    pub account_id: Uuid,
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct BindWalletResponse {
    /// 저장된 주소 (lowercase 정규화 후)
    pub address: String,
}

// ============ Handlers ============

/// POST /api/wallet/bind
///
/// # Errors
///
/// - 400: 주소 형식 불량
/// - 404: 계정 없음
/// - 409: 다른 계정이 이미 이 주소를 보유
pub async fn bind_wallet(
    State(state): State<AppState>,
    Json(req): Json<BindWalletRequest>,
) -> Result<Json<BindWalletResponse>, ApiError> {
    let address = EthAddress::new(&req.address).map_err(ApiError::ValidationError)?;

    let stored = state.db.bind_wallet(req.account_id, address.as_str()).await?;

    tracing::info!(account = %req.account_id, wallet = %stored, "wallet bound");

    Ok(Json(BindWalletResponse { address: stored }))
}

//! Trust Score Endpoints
//!
//! 저장된 스냅샷 조회와 원장 기반 전체 재계산

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::db::TrustStats;
use crate::types::EthAddress;
use crate::{error::ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct RecomputeRequest {
    pub wallet_address: String,
}

/// GET /api/trust/:address
///
/// 저장된 신뢰 점수 스냅샷 조회. 재계산된 적 없는 지갑은
/// 중립 0 스냅샷을 반환 (404 아님 - 이력 없음도 유효한 상태)
pub async fn get_trust(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<TrustStats>, ApiError> {
    let address = EthAddress::new(&address).map_err(ApiError::ValidationError)?;

    let stats = state.trust.get(address.as_str()).await?;
    Ok(Json(stats))
}

/// POST /api/trust/recompute
///
/// 원장을 source of truth로 삼아 지갑의 신뢰 점수를 전체 재계산.
/// 멱등 연산이며 재시도에 안전함.
pub async fn recompute_trust(
    State(state): State<AppState>,
    Json(req): Json<RecomputeRequest>,
) -> Result<Json<TrustStats>, ApiError> {
    let address = EthAddress::new(&req.wallet_address).map_err(ApiError::ValidationError)?;

    let stats = state.trust.recompute(address.as_str()).await?;
    Ok(Json(stats))
}

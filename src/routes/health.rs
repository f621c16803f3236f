//! Health Check Endpoint
//!
//! 깊은 헬스체크: 프로세스 생존 여부가 아니라 이 서비스가 실제로
//! 일할 수 있는 상태인지를 보고함.
//!
//! - `database`: 계정/신뢰 점수 저장소 ping + 왕복 지연
//! - `registry_configured`: 인보이스 레지스트리 주소가 zero address가
//!   아닌지 (재계산과 상태 교차 검증은 레지스트리 조회가 전제)
//! - `mail_configured`: 알림 전송 설정 여부 (미설정이면 fan-out은 no-op)
//!
//! DB 불능 시에만 "degraded"로 떨어뜨려 로드밸런서가 트래픽을 차단할
//! 수 있게 함. 레지스트리/메일은 미설정 기동이 허용되는 의존성이므로
//! 상태값에는 영향 없이 필드로만 노출.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Health check 응답
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseStatus,
    pub registry_configured: bool,
    pub mail_configured: bool,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct DatabaseStatus {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// GET /health
pub async fn health_check(
    State(state): State<AppState>,
) -> Json<HealthResponse> {
    let db_start = std::time::Instant::now();
    let database = match state.db.health_check().await {
        Ok(_) => DatabaseStatus {
            connected: true,
            latency_ms: Some(db_start.elapsed().as_millis() as u64),
        },
        Err(_) => DatabaseStatus {
            connected: false,
            latency_ms: None,
        },
    };

    Json(HealthResponse {
        status: if database.connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        registry_configured: registry_configured(&state.config.invoice_registry_address),
        mail_configured: state.config.mail_configured(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// zero address는 "레지스트리 미설정" 기동 기본값
fn registry_configured(address: &str) -> bool {
    !address.is_empty() && address.to_lowercase() != ZERO_ADDRESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_configured_rejects_zero_address() {
        assert!(!registry_configured(ZERO_ADDRESS));
        assert!(!registry_configured("0x0000000000000000000000000000000000000000"));
        assert!(!registry_configured(""));
        assert!(registry_configured("0x5fbdb2315678afecb367f032d93f642f64180aa3"));
        // 대소문자 무관
        assert!(!registry_configured("0X0000000000000000000000000000000000000000"));
    }
}

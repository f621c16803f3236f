//! Database Models
//!
//! Identity records and derived trust-score snapshots.
//! On-chain invoice data is never stored here; the registry contract
//! remains the source of truth and is re-read on every recomputation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// 사용자 계정
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,

    /// 표시 이름
    pub name: String,

    /// 이메일 (전역 유일)
    pub email: String,

    /// salted Keccak256 해시 ("salt$hash" 형식)
    pub password_hash: String,

    /// 역할: msme | investor | bigbuyer
    pub role: String,

    /// 바인딩된 지갑 주소 (lowercase, 계정 간 전역 유일)
    pub wallet_address: Option<String>,

    /// 이메일 인증 여부
    pub email_verified: bool,

    /// 일회용 인증 토큰 (만료 시각과 항상 쌍으로 존재)
    pub verification_token: Option<String>,
    pub verification_expires: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

/// 계정 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Msme,
    Investor,
    Bigbuyer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Msme => "msme",
            Role::Investor => "investor",
            Role::Bigbuyer => "bigbuyer",
        }
    }
}

/// 지갑별 신뢰 점수 스냅샷
///
/// 증분 업데이트 없이 recompute 호출마다 전체가 덮어써짐.
/// 따라서 재계산은 멱등이며 동시 호출은 마지막 스냅샷만 남김.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TrustStats {
    /// 지갑 주소 (lowercase, PK)
    pub wallet_address: String,

    /// 발행한 인보이스 총 개수
    pub total_created: i64,

    /// 상환 완료 개수 (terminal success)
    pub total_repaid: i64,

    /// 부도 개수 (terminal failure)
    pub total_defaulted: i64,

    /// repaid / created, 이력이 없으면 0
    pub trust_score: f64,
}

impl TrustStats {
    /// 이력이 없는 지갑의 중립 스냅샷
    pub fn empty(wallet_address: &str) -> Self {
        Self {
            wallet_address: wallet_address.to_lowercase(),
            total_created: 0,
            total_repaid: 0,
            total_defaulted: 0,
            trust_score: 0.0,
        }
    }
}

/// 알림 수신자 연락처 (계정에서 추출한 최소 정보)
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub name: String,
    pub email: Option<String>,
}

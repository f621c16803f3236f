//! InvoChain API Library
//!
//! # Overview
//!
//! 인보이스 금융(invoice financing) 플랫폼의 백엔드 API.
//! MSME가 토큰화한 인보이스를 투자자가 펀딩하고 구매자가 상환하는
//! 온체인 생애주기를 읽어, 파생/표시 상태만 관리함:
//!
//! - 지갑별 신뢰 점수 재계산 (원장 → 스냅샷 덮어쓰기)
//! - 생애주기 이벤트 이메일 fan-out
//! - 계정-지갑 바인딩 (전역 유일 제약)
//! - 클라이언트 로컬 미확정 트랜잭션 캐시
//!
//! 체인은 절대 변경하지 않음. 인보이스 상태 머신은 외부 레지스트리
//! 컨트랙트의 소유.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         API                              │
//! │                                                          │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐    │
//! │  │ Routes  │  │Services │  │   DB    │  │  Types  │    │
//! │  └────┬────┘  └────┬────┘  └────┬────┘  └────┬────┘    │
//! │       │            │            │            │          │
//! │       └────────────┴────────────┴────────────┘          │
//! │                         │                                │
//! └─────────────────────────┼────────────────────────────────┘
//!                           │ (read-only)
//!                           ▼
//!                  ┌────────────────┐
//!                  │InvoiceRegistry │
//!                  │   (on-chain)   │
//!                  └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 처리
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: 비즈니스 로직 (TrustEngine, Notifier, Ledger, PendingCache)
//! - `db`: 데이터베이스 연동 (계정, 신뢰 점수 스냅샷)
//! - `types`: 공통 타입 정의

use std::sync::Arc;

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod services;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use db::Database;
pub use error::ApiError;
pub use services::{Notifier, TrustEngine};

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub trust: Arc<TrustEngine>,
    pub notifier: Arc<Notifier>,
    pub config: Arc<Config>,
}

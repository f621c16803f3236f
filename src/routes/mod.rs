//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//! - `/health` - 헬스 체크
//! - `/api/account/*` - 가입 / 이메일 인증
//! - `/api/wallet/bind` - 계정-지갑 바인딩
//! - `/api/trust/*` - 신뢰 점수 조회/재계산
//! - `/api/notify/*` - 생애주기 이벤트 알림

pub mod account;
pub mod health;
pub mod notify;
pub mod trust;
pub mod wallet;

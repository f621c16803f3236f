//! Services Module
//!
//! 비즈니스 로직을 담당하는 서비스 레이어
//!
//! # Services
//! - `InvoiceLedger` / `EthLedger`: 온체인 인보이스 레지스트리 읽기
//! - `TrustEngine`: 지갑별 신뢰 점수 재계산
//! - `Notifier`: 생애주기 이벤트 알림 fan-out
//! - `PendingCache`: 클라이언트 로컬 미확정 트랜잭션 캐시

mod ledger;
mod notifier;
mod pending;
mod trust;

pub use ledger::{EthLedger, Invoice, InvoiceLedger, STATUS_DEFAULTED, STATUS_REPAID};
pub use notifier::{DispatchSummary, HttpMailer, MailMessage, Mailer, Notifier};
pub use pending::{FileStore, PendingCache, PendingInvoice, PendingStatus, TextStore};
pub use trust::TrustEngine;

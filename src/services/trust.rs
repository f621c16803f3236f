//! Trust Score Service
//!
//! # Interview Q&A
//!
//! Q: 왜 카운터를 증분 업데이트하지 않고 매번 전체 재계산하는가?
//! A: 정합성 단순화를 위한 의도적 트레이드오프
//!
//!    증분 방식의 문제:
//!    - read-modify-write 레이스 → 트랜잭션/락 필요
//!    - 이벤트 중복 전달 시 이중 카운트
//!
//!    전체 재계산 방식:
//!    - 원장(source of truth)에서 새로 읽어 스냅샷 전체를 덮어씀
//!    - 멱등: 원장이 안 변했으면 몇 번을 불러도 같은 결과
//!    - 동시 호출은 last-writer-wins, 부분 손상 없음
//!
//! Q: 이력이 없는 지갑의 점수는?
//! A: 0 (중립-낮음). undefined(0/0)보다 보수적인 기본값이며
//!    division by zero도 제거됨

use std::sync::Arc;

use crate::db::{TrustStats, TrustStore};
use crate::services::ledger::{Invoice, InvoiceLedger, STATUS_DEFAULTED, STATUS_REPAID};

/// 신뢰 점수 계산 엔진
///
/// 원장에서 읽고 파생 스냅샷을 저장소에 쓰기만 할 뿐,
/// 체인을 변경하지 않음
pub struct TrustEngine {
    ledger: Arc<dyn InvoiceLedger>,
    store: Arc<dyn TrustStore>,
}

/// 인보이스 목록을 terminal 상태별로 분류 (순수 함수)
///
/// 각 인보이스는 정확히 한 번, 최대 하나의 terminal 버킷에 집계됨.
/// terminal이 아닌 상태(생성됨, 펀딩 중 등)는 created에만 포함.
fn classify(invoices: &[Invoice]) -> (i64, i64, i64) {
    let created = invoices.len() as i64;
    let mut repaid = 0i64;
    let mut defaulted = 0i64;

    for invoice in invoices {
        match invoice.status {
            STATUS_REPAID => repaid += 1,
            STATUS_DEFAULTED => defaulted += 1,
            _ => {} // in-flight: 집계하지 않음
        }
    }

    (created, repaid, defaulted)
}

impl TrustEngine {
    pub fn new(ledger: Arc<dyn InvoiceLedger>, store: Arc<dyn TrustStore>) -> Self {
        Self { ledger, store }
    }

    /// 지갑의 신뢰 점수 재계산
    ///
    /// 1. 주소 소문자 정규화
    /// 2. 해당 지갑이 발행한 모든 인보이스를 원장에서 조회
    /// 3. terminal 상태 분류 후 score = repaid / created (이력 없으면 0)
    /// 4. 스냅샷 전체를 단일 upsert로 덮어쓰기
    ///
    /// 저장 실패는 크게 로깅하되 계산된 스냅샷은 그대로 반환함
    /// (계산 자체는 순수하며 마지막 쓰기 전까지 부수효과 없음)
    pub async fn recompute(&self, wallet: &str) -> anyhow::Result<TrustStats> {
        let wallet = wallet.to_lowercase();

        let invoices = self.ledger.list_invoices_by_issuer(&wallet).await?;
        let (created, repaid, defaulted) = classify(&invoices);

        let trust_score = if created == 0 {
            0.0
        } else {
            repaid as f64 / created as f64
        };

        let stats = TrustStats {
            wallet_address: wallet.clone(),
            total_created: created,
            total_repaid: repaid,
            total_defaulted: defaulted,
            trust_score,
        };

        if let Err(err) = self.store.upsert_trust_stats(&stats).await {
            tracing::error!(wallet = %wallet, error = ?err, "failed to persist trust stats");
        } else {
            tracing::info!(
                wallet = %wallet,
                created, repaid, defaulted, trust_score,
                "trust stats recomputed"
            );
        }

        Ok(stats)
    }

    /// 저장된 스냅샷 조회
    ///
    /// 아직 재계산된 적 없는 지갑은 중립 0 스냅샷 반환
    pub async fn get(&self, wallet: &str) -> anyhow::Result<TrustStats> {
        let wallet = wallet.to_lowercase();
        let stored = self.store.get_trust_stats(&wallet).await?;
        Ok(stored.unwrap_or_else(|| TrustStats::empty(&wallet)))
    }
}

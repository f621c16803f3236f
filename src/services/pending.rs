//! Pending Invoice Cache
//!
//! 체인에 제출됐지만 아직 확정되지 않은 인보이스 생성 트랜잭션의
//! 클라이언트 로컬 캐시. 재시작/리로드 후에도 "pending" 항목을 보여주기
//! 위한 UX 캐시이며 서버와 동기화되지 않음.
//!
//! # Design Decision
//!
//! 캐시는 절대 호출자에게 에러를 던지지 않음 (fail-open):
//! - 저장된 내용이 깨졌거나 배열이 아니면 빈 캐시로 취급
//! - 쓰기 실패(디스크 풀 등)는 경고 로그만 남기고 무시
//! - 호출자는 쓰기 성공에 의존하면 안 됨
//!
//! timeout 판정은 캐시의 책임이 아님: 캐시는 들은 상태를 기록할 뿐이고
//! 마감 정책은 호출 측에 있음.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 전체 항목이 직렬화되는 단일 키
const STORAGE_KEY: &str = "pending_invoices";

/// 미확정 트랜잭션의 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    Pending,
    Success,
    Failed,
    Timeout,
}

/// 캐시 항목 (tx hash로 유일하게 식별)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInvoice {
    pub tx_hash: String,
    /// 발행자 주소 (lowercase로 저장됨)
    pub msme: String,
    /// 구매자 주소 (lowercase로 저장됨)
    pub buyer: String,
    /// 표시용 금액 문자열 (파싱하지 않음)
    pub amount: String,
    /// 표시용 만기 문자열
    pub due_date: String,
    /// 제출 시각 (unix millis)
    pub created_at: i64,
    pub status: PendingStatus,
    /// 체인 확정 후 resolve된 인보이스 id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<u64>,
}

/// 로컬 durable 텍스트 저장소
///
/// `get`은 실패를 `None`으로, `set`은 실패를 조용히 삼킴
pub trait TextStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// 파일 기반 TextStore (키당 파일 하나)
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TextStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.dir.join(key)).ok()
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(err) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!(error = ?err, "pending cache directory unavailable");
            return;
        }
        if let Err(err) = std::fs::write(self.dir.join(key), value) {
            tracing::warn!(error = ?err, "pending cache write failed");
        }
    }
}

/// 미확정 인보이스 캐시
pub struct PendingCache<S: TextStore> {
    store: S,
}

impl<S: TextStore> PendingCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// 항목 삽입 또는 병합
    ///
    /// 같은 tx hash가 이미 있으면 설명 필드(주소, 금액, 만기)만 갱신하고
    /// status / invoice_id / created_at은 유지함 (상태 전이는
    /// `set_status` 경유). 주소 두 개는 소문자로 정규화됨.
    pub fn upsert(&self, entry: PendingInvoice) {
        let mut entry = entry;
        entry.msme = entry.msme.to_lowercase();
        entry.buyer = entry.buyer.to_lowercase();

        let mut entries = self.load();
        match entries.iter_mut().find(|e| e.tx_hash == entry.tx_hash) {
            Some(existing) => {
                existing.msme = entry.msme;
                existing.buyer = entry.buyer;
                existing.amount = entry.amount;
                existing.due_date = entry.due_date;
            }
            None => entries.push(entry),
        }
        self.save(&entries);
    }

    /// 발행자 주소로 항목 조회 (대소문자 무시, 저장 순서 유지)
    pub fn list_for_msme(&self, msme: &str) -> Vec<PendingInvoice> {
        let msme = msme.to_lowercase();
        self.load()
            .into_iter()
            .filter(|e| e.msme == msme)
            .collect()
    }

    /// 상태 전이 기록
    ///
    /// 모르는 hash면 no-op. invoice_id는 주어진 경우에만 기록.
    pub fn set_status(&self, tx_hash: &str, status: PendingStatus, invoice_id: Option<u64>) {
        let mut entries = self.load();
        if let Some(entry) = entries.iter_mut().find(|e| e.tx_hash == tx_hash) {
            entry.status = status;
            if invoice_id.is_some() {
                entry.invoice_id = invoice_id;
            }
            self.save(&entries);
        }
    }

    /// 항목 제거 (확정된 인보이스가 권위 있는 목록에 나타난 뒤 호출)
    ///
    /// 없는 hash면 no-op
    pub fn remove(&self, tx_hash: &str) {
        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|e| e.tx_hash != tx_hash);
        if entries.len() != before {
            self.save(&entries);
        }
    }

    /// 저장된 전체 항목 로드
    ///
    /// 깨진 JSON, 배열이 아닌 값 등은 전부 빈 캐시로 취급 (fail-open)
    fn load(&self) -> Vec<PendingInvoice> {
        self.store
            .get(STORAGE_KEY)
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    fn save(&self, entries: &[PendingInvoice]) {
        match serde_json::to_string(entries) {
            Ok(json) => self.store.set(STORAGE_KEY, &json),
            Err(err) => tracing::warn!(error = ?err, "pending cache serialization failed"),
        }
    }
}

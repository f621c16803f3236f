//! Repository Trait Seams
//!
//! # Interview Q&A
//!
//! Q: 왜 Database 구조체가 있는데 trait를 또 두는가?
//! A: 서비스/게이트 로직이 Postgres 없이 단위 테스트 가능해야 하기 때문
//!
//!    - `ContactDirectory`: 지갑 주소 → 연락처 조회 (Notifier가 사용)
//!    - `TrustStore`: 신뢰 점수 스냅샷 읽기/덮어쓰기 (TrustEngine이 사용)
//!    - `AccountStore`: 계정 조회/지갑 바인딩/토큰 소비 (라우트가 사용)
//!
//!    Database가 세 trait를 모두 구현하고, 테스트는 in-memory mock을 주입
//!
//! Q: `AccountStore`만 default method를 가지는 이유는?
//! A: 바인딩 게이트와 토큰 소비는 "순서"가 곧 계약임
//!    (normalize → 멱등 체크 → 충돌 체크 → 쓰기). 이 시퀀스를
//!    저장소 primitive 위의 provided method로 한 군데에 두면
//!    Postgres 구현과 mock이 정확히 같은 의미론을 공유함.

use async_trait::async_trait;
use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use super::models::{Account, Contact, TrustStats};
use crate::error::ApiError;

/// 지갑 주소 → 연락처 resolve
///
/// 주소는 호출 측에서 소문자 정규화되어 들어오며, 매칭되는 계정이
/// 없으면 `None` (알림은 best-effort이므로 에러가 아님)
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn find_by_wallet(&self, wallet: &str) -> Result<Option<Contact>>;
}

/// 신뢰 점수 스냅샷 저장소
///
/// `upsert`는 전체 덮어쓰기 단일 atomic 연산이어야 함
/// (read-modify-write 없음, 동시 호출은 last-writer-wins)
#[async_trait]
pub trait TrustStore: Send + Sync {
    async fn upsert_trust_stats(&self, stats: &TrustStats) -> Result<()>;
    async fn get_trust_stats(&self, wallet: &str) -> Result<Option<TrustStats>>;
}

/// 계정 저장소 primitive + 그 위의 게이트 로직
///
/// 에러 분류(404/409)가 호출자 계약의 일부이므로 `ApiError`를 반환함
#[async_trait]
pub trait AccountStore: Send + Sync {
    // ============ Primitives ============

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, ApiError>;

    async fn find_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<Account>, ApiError>;

    /// 인증 플래그 설정 + 토큰/만료 시각 제거 (단일 원자적 업데이트)
    async fn mark_verified(&self, id: Uuid) -> Result<Account, ApiError>;

    /// `excluding` 이외의 계정 중 이 주소를 보유한 계정
    async fn wallet_holder(
        &self,
        address: &str,
        excluding: Uuid,
    ) -> Result<Option<Uuid>, ApiError>;

    /// 지갑 필드 쓰기
    ///
    /// 구현체는 주소의 전역 유일성을 쓰기 시점에 강제해야 하며
    /// (Postgres: unique 제약), 위반은 Conflict로 표면화됨
    async fn set_wallet(&self, id: Uuid, address: &str) -> Result<(), ApiError>;

    // ============ Gate Logic (provided) ============

    /// 계정에 지갑 주소 바인딩
    ///
    /// # Design Decision
    ///
    /// 사전 충돌 체크와 쓰기는 별개 연산이므로 동시 바인딩 레이스가
    /// 이론상 존재함. 권위 있는 방어선은 `set_wallet` 구현의 유일성
    /// 강제이며, 사전 체크는 일반 경로의 early-exit 최적화.
    ///
    /// 같은 (계정, 주소) 쌍의 재호출은 쓰기 없는 멱등 성공.
    /// 다른 주소로의 rebind는 덮어쓰기 허용 (의도된 동작).
    /// 충돌 시 어느 계정도 변경되지 않음.
    async fn bind_wallet(&self, account_id: Uuid, address: &str) -> Result<String, ApiError> {
        let address = address.to_lowercase();

        let account = self
            .get_account(account_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("account".to_string()))?;

        // 이미 같은 주소가 바인딩된 경우 멱등 no-op
        if account.wallet_address.as_deref() == Some(address.as_str()) {
            return Ok(address);
        }

        // early-exit: 다른 계정이 이미 이 주소를 보유
        if self.wallet_holder(&address, account_id).await?.is_some() {
            return Err(ApiError::Conflict(
                "wallet address already connected to another account".to_string(),
            ));
        }

        self.set_wallet(account_id, &address).await?;
        Ok(address)
    }

    /// 이메일 인증 토큰 소비
    ///
    /// 만료된 토큰은 존재하지 않는 토큰과 동일하게 거부됨.
    /// 성공 시 인증 플래그 설정과 토큰/만료 제거가 `mark_verified`의
    /// 단일 업데이트로 함께 일어남.
    async fn consume_verification_token(&self, token: &str) -> Result<Account, ApiError> {
        let account = self
            .find_by_verification_token(token)
            .await?
            .filter(|a| a.verification_expires.map_or(false, |e| e > Utc::now()))
            .ok_or_else(|| ApiError::NotFound("verification token".to_string()))?;

        self.mark_verified(account.id).await
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::RwLock;

    /// 테스트용 in-memory 연락처 디렉토리
    pub struct MockDirectory {
        contacts: RwLock<HashMap<String, Contact>>,
    }

    impl MockDirectory {
        pub fn new() -> Self {
            Self {
                contacts: RwLock::new(HashMap::new()),
            }
        }

        pub fn insert(&self, wallet: &str, contact: Contact) {
            self.contacts
                .write()
                .unwrap()
                .insert(wallet.to_lowercase(), contact);
        }
    }

    #[async_trait]
    impl ContactDirectory for MockDirectory {
        async fn find_by_wallet(&self, wallet: &str) -> Result<Option<Contact>> {
            let contacts = self.contacts.read().unwrap();
            Ok(contacts.get(&wallet.to_lowercase()).cloned())
        }
    }

    /// 테스트용 in-memory 신뢰 점수 저장소
    pub struct MockTrustStore {
        stats: RwLock<HashMap<String, TrustStats>>,
        /// true면 upsert가 실패 (persist 실패 경로 테스트용)
        pub fail_writes: AtomicBool,
    }

    impl MockTrustStore {
        pub fn new() -> Self {
            Self {
                stats: RwLock::new(HashMap::new()),
                fail_writes: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl TrustStore for MockTrustStore {
        async fn upsert_trust_stats(&self, stats: &TrustStats) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                anyhow::bail!("simulated store failure");
            }
            self.stats
                .write()
                .unwrap()
                .insert(stats.wallet_address.clone(), stats.clone());
            Ok(())
        }

        async fn get_trust_stats(&self, wallet: &str) -> Result<Option<TrustStats>> {
            let stats = self.stats.read().unwrap();
            Ok(stats.get(&wallet.to_lowercase()).cloned())
        }
    }

    /// 테스트용 in-memory 계정 저장소
    ///
    /// `set_wallet`은 Postgres의 unique 제약처럼 쓰기 시점에
    /// 주소 유일성을 강제함
    pub struct MockAccountStore {
        accounts: RwLock<HashMap<Uuid, Account>>,
        /// `set_wallet` 호출 횟수 (멱등 no-op 검증용)
        pub wallet_writes: AtomicUsize,
    }

    impl MockAccountStore {
        pub fn new() -> Self {
            Self {
                accounts: RwLock::new(HashMap::new()),
                wallet_writes: AtomicUsize::new(0),
            }
        }

        pub fn insert(&self, account: Account) {
            self.accounts.write().unwrap().insert(account.id, account);
        }

        pub fn snapshot(&self, id: Uuid) -> Option<Account> {
            self.accounts.read().unwrap().get(&id).cloned()
        }
    }

    #[async_trait]
    impl AccountStore for MockAccountStore {
        async fn get_account(&self, id: Uuid) -> Result<Option<Account>, ApiError> {
            Ok(self.accounts.read().unwrap().get(&id).cloned())
        }

        async fn find_by_verification_token(
            &self,
            token: &str,
        ) -> Result<Option<Account>, ApiError> {
            let accounts = self.accounts.read().unwrap();
            Ok(accounts
                .values()
                .find(|a| a.verification_token.as_deref() == Some(token))
                .cloned())
        }

        async fn mark_verified(&self, id: Uuid) -> Result<Account, ApiError> {
            let mut accounts = self.accounts.write().unwrap();
            let account = accounts
                .get_mut(&id)
                .ok_or_else(|| ApiError::NotFound("account".to_string()))?;
            account.email_verified = true;
            account.verification_token = None;
            account.verification_expires = None;
            Ok(account.clone())
        }

        async fn wallet_holder(
            &self,
            address: &str,
            excluding: Uuid,
        ) -> Result<Option<Uuid>, ApiError> {
            let accounts = self.accounts.read().unwrap();
            Ok(accounts
                .values()
                .find(|a| a.id != excluding && a.wallet_address.as_deref() == Some(address))
                .map(|a| a.id))
        }

        async fn set_wallet(&self, id: Uuid, address: &str) -> Result<(), ApiError> {
            let mut accounts = self.accounts.write().unwrap();

            // unique 제약 에뮬레이션: 쓰기 시점의 권위 있는 방어선
            if accounts
                .values()
                .any(|a| a.id != id && a.wallet_address.as_deref() == Some(address))
            {
                return Err(ApiError::Conflict("resource already exists".to_string()));
            }

            let account = accounts
                .get_mut(&id)
                .ok_or_else(|| ApiError::NotFound("account".to_string()))?;
            account.wallet_address = Some(address.to_string());
            self.wallet_writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

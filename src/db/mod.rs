//! Database Module
//!
//! # Interview Q&A
//!
//! Q: 왜 PostgreSQL을 선택했는가?
//! A: 핀테크 백엔드에 적합한 이유
//!
//!    1. ACID 트랜잭션: 계정/점수 데이터 무결성 보장
//!    2. unique 제약: 지갑 바인딩의 check-then-set 레이스를
//!       저장소 레벨에서 차단 (애플리케이션 체크는 early-exit일 뿐)
//!    3. 인덱싱: 지갑 주소, 토큰 조회 최적화
//!    4. 생태계: SQLx, Diesel 등 Rust 라이브러리 지원
//!
//! Q: 커넥션 풀은 어떻게 관리하는가?
//! A: SQLx의 PgPool 사용
//!    - 최소/최대 커넥션 수 설정
//!    - 커넥션 재사용 (오버헤드 감소)
//!    - 자동 health check
//!    - 타임아웃 처리

mod models;
mod repository;

pub use models::*;
pub use repository::{AccountStore, ContactDirectory, TrustStore};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::error::ApiError;

#[cfg(test)]
pub use repository::mock;

/// 데이터베이스 연결 및 쿼리 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 10 (트래픽에 따라 조정)
    /// - min_connections: 1 (idle 시 최소 유지)
    /// - acquire_timeout: 3초 (커넥션 획득 대기)
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ============ Accounts ============

    /// 계정 생성 (미인증 상태, 지갑 없음)
    ///
    /// 이메일 중복은 사전 체크 후 insert 시 unique 제약으로 한 번 더
    /// 방어됨. 제약 위반은 `From<sqlx::Error>`에서 Conflict로 매핑.
    pub async fn create_account(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: &str,
        verification_token: &str,
        verification_expires: DateTime<Utc>,
    ) -> Result<Account, ApiError> {
        // early-exit: 이미 등록된 이메일
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM accounts WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        if existing.is_some() {
            return Err(ApiError::Conflict("email already registered".to_string()));
        }

        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (
                id, name, email, password_hash, role,
                email_verified, verification_token, verification_expires
            )
            VALUES ($1, $2, $3, $4, $5, FALSE, $6, $7)
            RETURNING
                id, name, email, password_hash, role, wallet_address,
                email_verified, verification_token, verification_expires, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(verification_token)
        .bind(verification_expires)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

}

// ============ Trait Implementations ============

/// 게이트 로직(`bind_wallet`, `consume_verification_token`)은
/// `AccountStore`의 provided method가 담당하고, 여기서는 저장소
/// primitive만 구현함. 지갑 주소 유일성의 권위 있는 방어선은
/// `wallet_address`의 unique 제약이며, 쓰기 시점 위반(23505)은
/// `From<sqlx::Error>`에서 Conflict로 매핑됨.
#[async_trait]
impl AccountStore for Database {
    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, ApiError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT
                id, name, email, password_hash, role, wallet_address,
                email_verified, verification_token, verification_expires, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// 만료 판정은 trait의 provided method 쪽에서 일어나므로
    /// 여기서는 토큰 매칭만 담당
    async fn find_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<Account>, ApiError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT
                id, name, email, password_hash, role, wallet_address,
                email_verified, verification_token, verification_expires, created_at
            FROM accounts
            WHERE verification_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// 인증 플래그 설정과 토큰/만료 시각 제거가 단일 UPDATE로
    /// 원자적으로 일어남
    async fn mark_verified(&self, id: Uuid) -> Result<Account, ApiError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET email_verified = TRUE,
                verification_token = NULL,
                verification_expires = NULL
            WHERE id = $1
            RETURNING
                id, name, email, password_hash, role, wallet_address,
                email_verified, verification_token, verification_expires, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        account.ok_or_else(|| ApiError::NotFound("account".to_string()))
    }

    async fn wallet_holder(
        &self,
        address: &str,
        excluding: Uuid,
    ) -> Result<Option<Uuid>, ApiError> {
        let holder: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM accounts WHERE wallet_address = $1 AND id <> $2",
        )
        .bind(address)
        .bind(excluding)
        .fetch_optional(&self.pool)
        .await?;

        Ok(holder.map(|(id,)| id))
    }

    async fn set_wallet(&self, id: Uuid, address: &str) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE accounts SET wallet_address = $1 WHERE id = $2")
            .bind(address)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("account".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl ContactDirectory for Database {
    async fn find_by_wallet(&self, wallet: &str) -> Result<Option<Contact>> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT name, email FROM accounts WHERE wallet_address = $1",
        )
        .bind(wallet.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(name, email)| Contact {
            name,
            email: Some(email),
        }))
    }
}

#[async_trait]
impl TrustStore for Database {
    /// 신뢰 점수 스냅샷 전체 덮어쓰기 (단일 atomic upsert)
    async fn upsert_trust_stats(&self, stats: &TrustStats) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trust_stats (
                wallet_address, total_created, total_repaid,
                total_defaulted, trust_score, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (wallet_address)
            DO UPDATE SET
                total_created = EXCLUDED.total_created,
                total_repaid = EXCLUDED.total_repaid,
                total_defaulted = EXCLUDED.total_defaulted,
                trust_score = EXCLUDED.trust_score,
                updated_at = NOW()
            "#,
        )
        .bind(&stats.wallet_address)
        .bind(stats.total_created)
        .bind(stats.total_repaid)
        .bind(stats.total_defaulted)
        .bind(stats.trust_score)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_trust_stats(&self, wallet: &str) -> Result<Option<TrustStats>> {
        let stats = sqlx::query_as::<_, TrustStats>(
            r#"
            SELECT
                wallet_address, total_created, total_repaid,
                total_defaulted, trust_score
            FROM trust_stats
            WHERE wallet_address = $1
            "#,
        )
        .bind(wallet.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(stats)
    }
}

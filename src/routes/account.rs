//! Account Endpoints
//!
//! 가입과 이메일 인증. 세션/쿠키 기반 로그인은 이 서비스 범위 밖
//! (프론트 게이트웨이가 담당).

use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::db::{AccountStore, Role};
use crate::{error::ApiError, AppState};

// ============ Request/Response Types ============

/// 가입 요청
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// 가입 응답 (토큰 자체는 이메일로만 전달됨)
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub id: uuid::Uuid,
    pub email: String,
    pub email_verified: bool,
}

/// 이메일 인증 요청
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
    pub email: String,
}

// ============ Handlers ============

/// POST /api/account/signup
///
/// 미인증 계정을 생성하고 24시간 유효한 일회용 인증 토큰을
/// 이메일로 발송 (발송은 best-effort)
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<SignupResponse>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::ValidationError("name must not be empty".to_string()));
    }
    if !req.email.contains('@') {
        return Err(ApiError::ValidationError("invalid email".to_string()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::ValidationError(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let token = generate_token();
    let expires = Utc::now() + Duration::hours(24);

    let account = state
        .db
        .create_account(
            req.name.trim(),
            &req.email.to_lowercase(),
            &hash_password(&req.password),
            req.role.as_str(),
            &token,
            expires,
        )
        .await?;

    // 인증 메일 발송 실패는 가입 자체를 실패시키지 않음
    state
        .notifier
        .send_verification(&account.email, &account.name, &token)
        .await;

    Ok(Json(SignupResponse {
        id: account.id,
        email: account.email,
        email_verified: account.email_verified,
    }))
}

/// POST /api/account/verify
///
/// 토큰을 소비해 계정을 인증함. 토큰과 만료 시각은 단일 UPDATE로
/// 함께 제거됨 (만료/미존재 토큰은 404)
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    if req.token.trim().is_empty() {
        return Err(ApiError::ValidationError("token must not be empty".to_string()));
    }

    let account = state.db.consume_verification_token(req.token.trim()).await?;

    Ok(Json(VerifyResponse {
        verified: account.email_verified,
        email: account.email,
    }))
}

// ============ Helpers ============

/// salted Keccak256 비밀번호 해시 ("salt$hash" 형식)
fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::random();
    let salt_hex = hex::encode(salt);

    let mut hasher = Keccak256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    format!("{}${}", salt_hex, hex::encode(digest))
}

/// 일회용 인증 토큰 (32바이트 난수, hex 인코딩)
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

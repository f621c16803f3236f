//! InvoChain API Server
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Client (Frontend / Webhook)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum Web Server                         │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                      Routes Layer                        ││
//! │  │  /health  /api/account/*  /api/wallet/*                 ││
//! │  │  /api/trust/*  /api/notify/*                            ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Services Layer                        ││
//! │  │  TrustEngine    Notifier    EthLedger                   ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Data Layer                            ││
//! │  │  PostgreSQL (accounts, trust_stats)                     ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//!                              │ (read-only calls)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              InvoiceRegistry Contract (Ethereum)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// 라이브러리에서 가져오기
use invochain_api::{
    routes,
    services::{EthLedger, HttpMailer, Mailer},
    AppState, Config, Database, Notifier, TrustEngine,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    // RUST_LOG=debug,sqlx=warn 형태로 레벨 제어 가능
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "invochain_api=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting InvoChain API Server");

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!("📋 Configuration loaded");

    // 데이터베이스 연결
    let db = Arc::new(Database::connect(&config.database_url).await?);
    tracing::info!("🗄️  Database connected");

    // 마이그레이션 실행
    db.run_migrations().await?;
    tracing::info!("📦 Migrations completed");

    // 인보이스 레지스트리 클라이언트
    let ledger = Arc::new(EthLedger::new(
        &config.eth_rpc_url,
        &config.invoice_registry_address,
    )?);
    tracing::info!("⛓️  Invoice registry client ready");

    // 신뢰 점수 엔진
    let trust = Arc::new(TrustEngine::new(ledger.clone(), db.clone()));

    // 알림 전송 (미설정 시 no-op + 경고)
    let mailer: Option<Arc<dyn Mailer>> = match (&config.mail_api_url, &config.mail_api_key) {
        (Some(url), Some(key)) => {
            tracing::info!("📧 Mail transport configured");
            Some(Arc::new(HttpMailer::new(url, key, &config.mail_from)))
        }
        _ => None,
    };
    let notifier = Arc::new(Notifier::new(db.clone(), ledger, mailer));

    // 앱 상태 구성
    let state = AppState {
        db,
        trust,
        notifier,
        config: Arc::new(config.clone()),
    };

    // 라우터 구성
    let app = create_router(state);

    // 서버 시작
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🌐 Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// 라우터 생성
///
/// # Route Structure
///
/// ```text
/// GET  /health                  - 서버 상태 확인
///
/// POST /api/account/signup      - 계정 생성 (+ 인증 메일)
/// POST /api/account/verify      - 이메일 인증 토큰 소비
///
/// POST /api/wallet/bind         - 계정-지갑 바인딩
///
/// GET  /api/trust/:address      - 신뢰 점수 스냅샷 조회
/// POST /api/trust/recompute     - 원장 기반 전체 재계산
///
/// POST /api/notify/created      - 인보이스 생성 알림
/// POST /api/notify/investment   - 투자 접수 알림
/// POST /api/notify/repaid       - 상환 알림 (상태 교차 검증)
/// POST /api/notify/defaulted    - 부도 알림 (상태 교차 검증)
/// ```
fn create_router(state: AppState) -> Router {
    // CORS 설정
    // 프로덕션에서는 특정 도메인만 허용
    // 개발 환경에서는 localhost 허용
    let cors = if state.config.is_production() {
        // 프로덕션: 특정 도메인만 허용 (환경변수로 설정)
        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "https://invochain.io".to_string());
        let origins: Vec<_> = allowed_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    } else {
        // 개발: localhost 허용
        CorsLayer::new()
            .allow_origin([
                "http://localhost:5173".parse().unwrap(), // Vite dev server
                "http://localhost:3000".parse().unwrap(), // Next.js dev server
                "http://127.0.0.1:5173".parse().unwrap(),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))

        // Accounts
        .route("/api/account/signup", post(routes::account::signup))
        .route("/api/account/verify", post(routes::account::verify_email))

        // Wallet binding
        .route("/api/wallet/bind", post(routes::wallet::bind_wallet))

        // Trust score
        .route("/api/trust/:address", get(routes::trust::get_trust))
        .route("/api/trust/recompute", post(routes::trust::recompute_trust))

        // Lifecycle notifications
        .route("/api/notify/created", post(routes::notify::notify_created))
        .route("/api/notify/investment", post(routes::notify::notify_investment))
        .route("/api/notify/repaid", post(routes::notify::notify_repaid))
        .route("/api/notify/defaulted", post(routes::notify::notify_defaulted))

        // 미들웨어
        .layer(TraceLayer::new_for_http())
        .layer(cors)

        // 상태 주입
        .with_state(state)
}

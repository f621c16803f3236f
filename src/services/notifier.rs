//! Event Notifier Service
//!
//! 온체인 인보이스 생애주기 이벤트(생성/투자/상환/부도)를 관련
//! 당사자들에게 이메일로 fan-out.
//!
//! # Design Decision
//!
//! 알림은 best-effort 계약:
//! - 연락처가 없는 당사자는 조용히 건너뜀 (에러 아님)
//! - 개별 전송 실패는 수신자 단위로 로깅하고 흡수함
//!   (전체 호출은 여전히 성공)
//! - 재시도 큐 없음, 수신자당 최대 1회 시도
//!
//! 단, 상환/부도 경로는 전송 전에 원장에서 인보이스를 다시 읽어
//! 이벤트가 주장하는 terminal 상태를 교차 검증함. 불일치 시 아무것도
//! 보내지 않고 거부 (중복/지연 이벤트 전달 방어). 이 검증 읽기는
//! 호출 자체의 정합성에 필수이므로 실패가 그대로 전파됨.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::U256;
use futures::future::join_all;
use serde::Serialize;

use crate::db::ContactDirectory;
use crate::error::ApiError;
use crate::services::ledger::{Invoice, InvoiceLedger};
use crate::types::{format_token_amount, EthAddress};

/// 단일 알림 메시지
#[derive(Debug, Clone, Serialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// 알림 전송 transport
///
/// 프로덕션 구현은 `HttpMailer`(Mail API), 테스트는 mock 주입
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<()>;
}

/// HTTP Mail API 클라이언트 (Resend/Mailgun 계열)
///
/// `POST {api_url}` with Bearer 인증, JSON body {from, to, subject, body}
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: &str, api_key: &str, from: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        #[derive(Serialize)]
        struct Payload<'a> {
            from: &'a str,
            to: &'a str,
            subject: &'a str,
            body: &'a str,
        }

        self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&Payload {
                from: &self.from,
                to: &message.to,
                subject: &message.subject,
                body: &message.body,
            })
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

/// 한 번의 이벤트 호출에서 시도/성공한 전송 수
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DispatchSummary {
    pub attempted: usize,
    pub delivered: usize,
}

/// 이벤트 알림 서비스
pub struct Notifier {
    directory: Arc<dyn ContactDirectory>,
    ledger: Arc<dyn InvoiceLedger>,
    /// None이면 미설정 환경: 경고 로그 후 no-op (best-effort 계약 유지)
    mailer: Option<Arc<dyn Mailer>>,
}

impl Notifier {
    pub fn new(
        directory: Arc<dyn ContactDirectory>,
        ledger: Arc<dyn InvoiceLedger>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        if mailer.is_none() {
            tracing::warn!("mail transport not configured; notifications will be no-ops");
        }
        Self {
            directory,
            ledger,
            mailer,
        }
    }

    // ============ Lifecycle Events ============

    /// 인보이스 생성 알림: 발행자(MSME) + 구매자
    pub async fn invoice_created(
        &self,
        invoice_id: u64,
        msme: &EthAddress,
        buyer: &EthAddress,
        amount: U256,
    ) -> Result<DispatchSummary, ApiError> {
        let display_amount = format_token_amount(amount);
        let mut messages = Vec::new();

        if let Some((name, email)) = self.resolve(msme.as_str()).await {
            messages.push(MailMessage {
                to: email,
                subject: format!("Invoice #{} created", invoice_id),
                body: format!(
                    "Hi {},\n\nYour invoice #{} for {} tokens (buyer {}) has been \
                     recorded on-chain and is now open for funding.",
                    name, invoice_id, display_amount, buyer
                ),
            });
        }

        if let Some((name, email)) = self.resolve(buyer.as_str()).await {
            messages.push(MailMessage {
                to: email,
                subject: format!("Invoice #{} issued to you", invoice_id),
                body: format!(
                    "Hi {},\n\nInvoice #{} for {} tokens has been issued to you by {}. \
                     It becomes payable at maturity.",
                    name, invoice_id, display_amount, msme
                ),
            });
        }

        Ok(self.dispatch_all(messages).await)
    }

    /// 투자 접수 알림: 발행자 + 투자자
    ///
    /// 발행자 주소는 payload가 아닌 원장에서 resolve (load-bearing 읽기)
    pub async fn investment_received(
        &self,
        invoice_id: u64,
        investor: &EthAddress,
        amount: U256,
    ) -> Result<DispatchSummary, ApiError> {
        let invoice = self.ledger.get_invoice(invoice_id).await?;
        let display_amount = format_token_amount(amount);
        let mut messages = Vec::new();

        if let Some((name, email)) = self.resolve(&invoice.msme).await {
            messages.push(MailMessage {
                to: email,
                subject: format!("Invoice #{} received funding", invoice_id),
                body: format!(
                    "Hi {},\n\nInvestor {} funded {} tokens towards your invoice #{}.",
                    name, investor, display_amount, invoice_id
                ),
            });
        }

        if let Some((name, email)) = self.resolve(investor.as_str()).await {
            messages.push(MailMessage {
                to: email,
                subject: format!("Investment in invoice #{} confirmed", invoice_id),
                body: format!(
                    "Hi {},\n\nYour investment of {} tokens in invoice #{} has been \
                     confirmed on-chain.",
                    name, display_amount, invoice_id
                ),
            });
        }

        Ok(self.dispatch_all(messages).await)
    }

    /// 상환 완료 알림: 발행자 + 구매자 + 전체 투자자
    pub async fn invoice_repaid(&self, invoice_id: u64) -> Result<DispatchSummary, ApiError> {
        let invoice = self.checked_invoice(invoice_id, Invoice::is_repaid, "repaid").await?;
        let display_amount = format_token_amount(invoice.amount);
        let mut messages = Vec::new();

        if let Some((name, email)) = self.resolve(&invoice.msme).await {
            messages.push(MailMessage {
                to: email,
                subject: format!("Invoice #{} repaid", invoice_id),
                body: format!(
                    "Hi {},\n\nInvoice #{} ({} tokens) has been repaid by the buyer. \
                     Your trust score will reflect this settlement.",
                    name, invoice_id, display_amount
                ),
            });
        }

        if let Some((name, email)) = self.resolve(&invoice.buyer).await {
            messages.push(MailMessage {
                to: email,
                subject: format!("Invoice #{} settled", invoice_id),
                body: format!(
                    "Hi {},\n\nYour repayment of invoice #{} ({} tokens) has been \
                     confirmed on-chain.",
                    name, invoice_id, display_amount
                ),
            });
        }

        for investor in self.ledger.get_investors(invoice_id).await? {
            if let Some((name, email)) = self.resolve(&investor).await {
                messages.push(MailMessage {
                    to: email,
                    subject: format!("Invoice #{} repaid - returns settled", invoice_id),
                    body: format!(
                        "Hi {},\n\nInvoice #{} you invested in has been repaid. \
                         Your principal and returns have been distributed.",
                        name, invoice_id
                    ),
                });
            }
        }

        Ok(self.dispatch_all(messages).await)
    }

    /// 부도 알림: 발행자 + 구매자 + 전체 투자자
    pub async fn invoice_defaulted(&self, invoice_id: u64) -> Result<DispatchSummary, ApiError> {
        let invoice = self
            .checked_invoice(invoice_id, Invoice::is_defaulted, "defaulted")
            .await?;
        let display_amount = format_token_amount(invoice.amount);
        let mut messages = Vec::new();

        if let Some((name, email)) = self.resolve(&invoice.msme).await {
            messages.push(MailMessage {
                to: email,
                subject: format!("Invoice #{} marked as defaulted", invoice_id),
                body: format!(
                    "Hi {},\n\nInvoice #{} ({} tokens) was not repaid by its due date \
                     and has been marked as defaulted. This affects your trust score.",
                    name, invoice_id, display_amount
                ),
            });
        }

        if let Some((name, email)) = self.resolve(&invoice.buyer).await {
            messages.push(MailMessage {
                to: email,
                subject: format!("Invoice #{} overdue - defaulted", invoice_id),
                body: format!(
                    "Hi {},\n\nInvoice #{} ({} tokens) issued to you has passed its \
                     due date without repayment and is now in default.",
                    name, invoice_id, display_amount
                ),
            });
        }

        for investor in self.ledger.get_investors(invoice_id).await? {
            if let Some((name, email)) = self.resolve(&investor).await {
                messages.push(MailMessage {
                    to: email,
                    subject: format!("Invoice #{} defaulted", invoice_id),
                    body: format!(
                        "Hi {},\n\nInvoice #{} you invested in has defaulted. \
                         Recovery proceedings will be communicated separately.",
                        name, invoice_id
                    ),
                });
            }
        }

        Ok(self.dispatch_all(messages).await)
    }

    /// 회원가입 인증 메일 (best-effort)
    pub async fn send_verification(&self, email: &str, name: &str, token: &str) {
        let message = MailMessage {
            to: email.to_string(),
            subject: "Verify your InvoChain account".to_string(),
            body: format!(
                "Hi {},\n\nYour verification code is: {}\n\n\
                 The code expires in 24 hours.",
                name, token
            ),
        };
        self.dispatch_all(vec![message]).await;
    }

    // ============ Internals ============

    /// 원장 재조회 + terminal 상태 교차 검증
    ///
    /// 전송 전에 반드시 수행됨 (happens-before): 원장이 뒷받침하지 않는
    /// 상태에 대한 알림은 한 통도 나가지 않음
    async fn checked_invoice(
        &self,
        invoice_id: u64,
        expected: fn(&Invoice) -> bool,
        claimed: &str,
    ) -> Result<Invoice, ApiError> {
        let invoice = self.ledger.get_invoice(invoice_id).await?;

        if !expected(&invoice) {
            return Err(ApiError::StateInconsistency(format!(
                "invoice #{} is not in {} status (on-chain status code: {})",
                invoice_id, claimed, invoice.status
            )));
        }

        Ok(invoice)
    }

    /// 지갑 주소 → (이름, 이메일) resolve
    ///
    /// 연락처가 없거나 조회가 실패한 당사자는 건너뜀 (best-effort)
    async fn resolve(&self, wallet: &str) -> Option<(String, String)> {
        match self.directory.find_by_wallet(&wallet.to_lowercase()).await {
            Ok(Some(contact)) => match contact.email {
                Some(email) => Some((contact.name, email)),
                None => {
                    tracing::debug!(wallet = %wallet, "contact has no email; skipping");
                    None
                }
            },
            Ok(None) => {
                tracing::debug!(wallet = %wallet, "no contact for wallet; skipping");
                None
            }
            Err(err) => {
                tracing::warn!(wallet = %wallet, error = ?err, "contact lookup failed; skipping");
                None
            }
        }
    }

    /// 전체 메시지를 동시 전송하고 모두 settle될 때까지 대기
    ///
    /// 수신자 간 head-of-line blocking 없음. 개별 실패는 로깅 후 흡수.
    async fn dispatch_all(&self, messages: Vec<MailMessage>) -> DispatchSummary {
        let attempted = messages.len();

        let Some(mailer) = &self.mailer else {
            if attempted > 0 {
                tracing::warn!(
                    count = attempted,
                    "mail transport not configured; dropping notifications"
                );
            }
            return DispatchSummary {
                attempted: 0,
                delivered: 0,
            };
        };

        let results = join_all(messages.iter().map(|m| mailer.send(m))).await;

        let mut delivered = 0;
        for (message, result) in messages.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::warn!(to = %message.to, error = ?err, "notification dispatch failed");
                }
            }
        }

        DispatchSummary {
            attempted,
            delivered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MockDirectory;
    use crate::db::Contact;
    use crate::services::ledger::mock::MockLedger;
    use crate::services::ledger::{STATUS_DEFAULTED, STATUS_REPAID};
    use std::collections::HashSet;
    use std::sync::Mutex;

    const MSME: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const BUYER: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const INVESTOR_1: &str = "0x1111111111111111111111111111111111111111";
    const INVESTOR_2: &str = "0x2222222222222222222222222222222222222222";

    /// 전송 기록 + 선택적 실패 주입이 가능한 테스트 transport
    struct RecordingMailer {
        sent: Mutex<Vec<MailMessage>>,
        fail_for: Mutex<HashSet<String>>,
    }

    impl RecordingMailer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail_for: Mutex::new(HashSet::new()),
            })
        }

        fn fail_for(&self, email: &str) {
            self.fail_for.lock().unwrap().insert(email.to_string());
        }

        fn sent_to(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|m| m.to.clone()).collect()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &MailMessage) -> Result<()> {
            if self.fail_for.lock().unwrap().contains(&message.to) {
                anyhow::bail!("simulated transport failure");
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn contact(name: &str, email: &str) -> Contact {
        Contact {
            name: name.to_string(),
            email: Some(email.to_string()),
        }
    }

    fn invoice(id: u64, status: u8) -> Invoice {
        Invoice {
            id,
            msme: MSME.to_string(),
            buyer: BUYER.to_string(),
            amount: ethers::types::U256::from(5_000_000_000_000_000_000u128),
            funded_amount: ethers::types::U256::zero(),
            due_date: 1_900_000_000,
            status,
        }
    }

    fn setup() -> (Arc<MockDirectory>, Arc<MockLedger>, Arc<RecordingMailer>, Notifier) {
        let directory = Arc::new(MockDirectory::new());
        let ledger = Arc::new(MockLedger::new());
        let mailer = RecordingMailer::new();
        let notifier = Notifier::new(
            directory.clone(),
            ledger.clone(),
            Some(mailer.clone() as Arc<dyn Mailer>),
        );
        (directory, ledger, mailer, notifier)
    }

    #[tokio::test]
    async fn test_repaid_rejects_status_mismatch_sends_nothing() {
        let (directory, ledger, mailer, notifier) = setup();
        directory.insert(MSME, contact("Acme", "acme@example.com"));
        // 온체인은 아직 진행 중(status 2)인데 repaid 이벤트가 들어옴
        ledger.insert_invoice(invoice(42, 2));

        let err = notifier.invoice_repaid(42).await.unwrap_err();
        assert!(matches!(err, ApiError::StateInconsistency(_)));
        assert!(mailer.sent_to().is_empty());
    }

    #[tokio::test]
    async fn test_repaid_fan_out_with_partial_failure() {
        let (directory, ledger, mailer, notifier) = setup();
        // 발행자와 투자자 2명은 연락처 있음, 구매자는 없음
        directory.insert(MSME, contact("Acme", "acme@example.com"));
        directory.insert(INVESTOR_1, contact("Ivy", "ivy@example.com"));
        directory.insert(INVESTOR_2, contact("Ian", "ian@example.com"));

        ledger.insert_invoice(invoice(42, STATUS_REPAID));
        ledger.set_investors(42, vec![INVESTOR_1.to_string(), INVESTOR_2.to_string()]);

        // 투자자 한 명의 전송은 실패하지만 호출 전체는 성공해야 함
        mailer.fail_for("ian@example.com");

        let summary = notifier.invoice_repaid(42).await.unwrap();
        assert_eq!(summary.attempted, 3); // issuer + 2 investors (buyer skipped)
        assert_eq!(summary.delivered, 2);

        let sent = mailer.sent_to();
        assert!(sent.contains(&"acme@example.com".to_string()));
        assert!(sent.contains(&"ivy@example.com".to_string()));
    }

    #[tokio::test]
    async fn test_no_resolvable_contacts_is_success_with_zero_sends() {
        let (_directory, ledger, mailer, notifier) = setup();
        ledger.insert_invoice(invoice(7, STATUS_DEFAULTED));
        ledger.set_investors(7, vec![INVESTOR_1.to_string()]);

        let summary = notifier.invoice_defaulted(7).await.unwrap();
        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.delivered, 0);
        assert!(mailer.sent_to().is_empty());
    }

    #[tokio::test]
    async fn test_created_notifies_issuer_and_buyer() {
        let (directory, _ledger, mailer, notifier) = setup();
        directory.insert(MSME, contact("Acme", "acme@example.com"));
        directory.insert(BUYER, contact("BigCo", "bigco@example.com"));

        let msme = EthAddress::new(MSME).unwrap();
        let buyer = EthAddress::new(BUYER).unwrap();
        let summary = notifier
            .invoice_created(1, &msme, &buyer, ethers::types::U256::exp10(18))
            .await
            .unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.delivered, 2);
        let sent = mailer.sent_to();
        assert_eq!(sent.len(), 2);
        assert!(sent.contains(&"acme@example.com".to_string()));
        assert!(sent.contains(&"bigco@example.com".to_string()));
    }

    #[tokio::test]
    async fn test_investment_resolves_issuer_from_ledger() {
        let (directory, ledger, mailer, notifier) = setup();
        directory.insert(MSME, contact("Acme", "acme@example.com"));
        ledger.insert_invoice(invoice(9, 2));

        let investor = EthAddress::new(INVESTOR_1).unwrap();
        let summary = notifier
            .investment_received(9, &investor, ethers::types::U256::from(1_000u64))
            .await
            .unwrap();

        // 투자자는 연락처 없음 → 발행자에게만 전송
        assert_eq!(summary.attempted, 1);
        assert_eq!(mailer.sent_to(), vec!["acme@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_unconfigured_transport_is_noop() {
        let directory = Arc::new(MockDirectory::new());
        directory.insert(MSME, contact("Acme", "acme@example.com"));
        let ledger = Arc::new(MockLedger::new());
        ledger.insert_invoice(invoice(3, STATUS_REPAID));

        let notifier = Notifier::new(directory, ledger, None);

        let summary = notifier.invoice_repaid(3).await.unwrap();
        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.delivered, 0);
    }
}

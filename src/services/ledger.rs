//! Invoice Ledger Service
//!
//! 외부 인보이스 레지스트리 컨트랙트의 읽기 전용 뷰.
//!
//! 인보이스 생애주기 상태 머신은 전적으로 온체인 컨트랙트가 소유하며,
//! 이 서비스는 절대 체인을 변경하지 않음. 상태 코드는 불투명한 정수로
//! 취급하고 알려진 terminal 코드 두 개(3=repaid, 4=defaulted)만 비교함.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::prelude::*;
use futures::future::join_all;

/// Terminal status: 상환 완료
pub const STATUS_REPAID: u8 = 3;
/// Terminal status: 부도
pub const STATUS_DEFAULTED: u8 = 4;

abigen!(
    InvoiceRegistry,
    r#"[
        function invoices(uint256 id) external view returns (uint256, address, address, uint256, uint256, uint256, uint8)
        function getInvoiceIdsByMsme(address msme) external view returns (uint256[] memory)
        function getInvestors(uint256 id) external view returns (address[] memory)
    ]"#
);

/// 온체인 인보이스의 읽기 전용 투영
///
/// 주소 필드는 lowercase hex 문자열로 정규화됨
#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub id: u64,
    pub msme: String,
    pub buyer: String,
    /// 액면가 (wei, 18 decimals)
    pub amount: U256,
    /// 현재까지 투자된 금액 (wei)
    pub funded_amount: U256,
    /// 만기 (unix seconds)
    pub due_date: u64,
    /// 상태 코드 (컨트랙트 소유의 열거형, 여기서는 불투명)
    pub status: u8,
}

impl Invoice {
    pub fn is_repaid(&self) -> bool {
        self.status == STATUS_REPAID
    }

    pub fn is_defaulted(&self) -> bool {
        self.status == STATUS_DEFAULTED
    }
}

/// 외부 원장 조회 인터페이스
///
/// 프로덕션 구현은 `EthLedger`, 테스트는 in-memory mock 주입
#[async_trait]
pub trait InvoiceLedger: Send + Sync {
    async fn get_invoice(&self, id: u64) -> Result<Invoice>;
    async fn get_investors(&self, id: u64) -> Result<Vec<String>>;
    async fn list_invoices_by_issuer(&self, msme: &str) -> Result<Vec<Invoice>>;
}

/// ethers 기반 레지스트리 클라이언트
pub struct EthLedger {
    contract: InvoiceRegistry<Provider<Http>>,
}

impl EthLedger {
    pub fn new(rpc_url: &str, registry_address: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .context("invalid ETH_RPC_URL")?;
        let address: Address = registry_address
            .parse()
            .context("invalid INVOICE_REGISTRY_ADDRESS")?;

        Ok(Self {
            contract: InvoiceRegistry::new(address, Arc::new(provider)),
        })
    }
}

#[async_trait]
impl InvoiceLedger for EthLedger {
    async fn get_invoice(&self, id: u64) -> Result<Invoice> {
        let (chain_id, msme, buyer, amount, funded_amount, due_date, status) = self
            .contract
            .invoices(U256::from(id))
            .call()
            .await
            .with_context(|| format!("failed to fetch invoice #{} from registry", id))?;

        Ok(Invoice {
            id: chain_id.as_u64(),
            msme: format!("{:#x}", msme),
            buyer: format!("{:#x}", buyer),
            amount,
            funded_amount,
            due_date: due_date.as_u64(),
            status,
        })
    }

    async fn get_investors(&self, id: u64) -> Result<Vec<String>> {
        let investors = self
            .contract
            .get_investors(U256::from(id))
            .call()
            .await
            .with_context(|| format!("failed to fetch investors of invoice #{}", id))?;

        Ok(investors.into_iter().map(|a| format!("{:#x}", a)).collect())
    }

    async fn list_invoices_by_issuer(&self, msme: &str) -> Result<Vec<Invoice>> {
        let issuer: Address = msme
            .parse()
            .with_context(|| format!("invalid issuer address: {}", msme))?;

        let ids = self
            .contract
            .get_invoice_ids_by_msme(issuer)
            .call()
            .await
            .context("failed to list invoice ids by issuer")?;

        // id 목록을 받은 뒤 개별 인보이스를 동시 조회
        let fetches = ids.into_iter().map(|id| self.get_invoice(id.as_u64()));
        join_all(fetches).await.into_iter().collect()
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    /// 테스트용 in-memory 원장
    pub struct MockLedger {
        invoices: RwLock<HashMap<u64, Invoice>>,
        investors: RwLock<HashMap<u64, Vec<String>>>,
    }

    impl MockLedger {
        pub fn new() -> Self {
            Self {
                invoices: RwLock::new(HashMap::new()),
                investors: RwLock::new(HashMap::new()),
            }
        }

        pub fn insert_invoice(&self, invoice: Invoice) {
            self.invoices.write().unwrap().insert(invoice.id, invoice);
        }

        pub fn set_investors(&self, id: u64, investors: Vec<String>) {
            self.investors.write().unwrap().insert(id, investors);
        }
    }

    #[async_trait]
    impl InvoiceLedger for MockLedger {
        async fn get_invoice(&self, id: u64) -> Result<Invoice> {
            self.invoices
                .read()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("invoice #{} not found", id))
        }

        async fn get_investors(&self, id: u64) -> Result<Vec<String>> {
            Ok(self
                .investors
                .read()
                .unwrap()
                .get(&id)
                .cloned()
                .unwrap_or_default())
        }

        async fn list_invoices_by_issuer(&self, msme: &str) -> Result<Vec<Invoice>> {
            let msme = msme.to_lowercase();
            let invoices = self.invoices.read().unwrap();
            let mut issued: Vec<Invoice> = invoices
                .values()
                .filter(|inv| inv.msme == msme)
                .cloned()
                .collect();
            issued.sort_by_key(|inv| inv.id);
            Ok(issued)
        }
    }
}

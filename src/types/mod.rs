//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의

use serde::{Deserialize, Deserializer, Serialize};

/// Ethereum 주소 타입
///
/// 생성 시점에 소문자로 정규화됨. 주소 비교는 전부 이 타입을 거치므로
/// 대소문자 혼용(checksum 표기 등)으로 인한 불일치가 발생하지 않음.
/// 역직렬화도 `new`를 통과하므로 검증을 우회하는 생성 경로는 없음.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EthAddress(String);

impl EthAddress {
    pub fn new(addr: &str) -> Result<Self, String> {
        let addr = addr.to_lowercase();
        if addr.starts_with("0x")
            && addr.len() == 42
            && addr[2..].chars().all(|c| c.is_ascii_hexdigit())
        {
            Ok(Self(addr))
        } else {
            Err("Invalid Ethereum address format".to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for EthAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        EthAddress::new(&raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for EthAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// wei(18 decimals) 고정소수점 금액을 사람이 읽을 수 있는
/// 십진 문자열로 변환
///
/// # Examples
///
/// - `1_500_000_000_000_000_000` → `"1.5"`
/// - `1_000_000_000_000_000_000` → `"1"`
/// - `0` → `"0"`
pub fn format_token_amount(wei: ethers::types::U256) -> String {
    let formatted = ethers::utils::format_units(wei, 18)
        .unwrap_or_else(|_| wei.to_string());

    // format_units는 "1.500000000000000000" 형태 → 꼬리 0 제거
    if formatted.contains('.') {
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        trimmed.to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;

    #[test]
    fn test_eth_address_valid() {
        let addr = EthAddress::new("0x1234567890123456789012345678901234567890");
        assert!(addr.is_ok());
    }

    #[test]
    fn test_eth_address_normalizes_case() {
        let addr = EthAddress::new("0xABCDEF1234567890123456789012345678901234").unwrap();
        assert_eq!(addr.as_str(), "0xabcdef1234567890123456789012345678901234");
    }

    #[test]
    fn test_eth_address_invalid() {
        assert!(EthAddress::new("invalid").is_err());
        assert!(EthAddress::new("0x1234").is_err());
        assert!(EthAddress::new("1234567890123456789012345678901234567890ab").is_err());
    }

    #[test]
    fn test_eth_address_deserialize_validates_and_normalizes() {
        let addr: EthAddress =
            serde_json::from_str("\"0xABCDEF1234567890123456789012345678901234\"").unwrap();
        assert_eq!(addr.as_str(), "0xabcdef1234567890123456789012345678901234");

        // 검증 실패 시 역직렬화 자체가 에러
        assert!(serde_json::from_str::<EthAddress>("\"not-an-address\"").is_err());
        assert!(serde_json::from_str::<EthAddress>("\"0x1234\"").is_err());
    }

    #[test]
    fn test_format_token_amount() {
        let one_and_half = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(format_token_amount(one_and_half), "1.5");

        let whole = U256::from(2_000_000_000_000_000_000u128);
        assert_eq!(format_token_amount(whole), "2");

        assert_eq!(format_token_amount(U256::zero()), "0");
    }
}

//! Supported currency codes

pub const USD: &str = "USD";
pub const NGN: &str = "NGN";
pub const GBP: &str = "GBP";
pub const EUR: &str = "EUR";

pub const SUPPORTED: [&str; 4] = [USD, NGN, GBP, EUR];

/// Returns true if the currency code is supported.
pub fn is_supported(currency: &str) -> bool {
    SUPPORTED.contains(&currency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_currencies() {
        for code in SUPPORTED {
            assert!(is_supported(code));
        }
        assert!(!is_supported("BTC"));
        assert!(!is_supported("usd"));
        assert!(!is_supported(""));
    }
}

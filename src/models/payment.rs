use serde::{Deserialize, Serialize};

/// External payment channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Bkash,
    Nagad,
    Rocket,
    Bank,
}

impl PaymentMethod {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "bkash" => Ok(PaymentMethod::Bkash),
            "nagad" => Ok(PaymentMethod::Nagad),
            "rocket" => Ok(PaymentMethod::Rocket),
            "bank" => Ok(PaymentMethod::Bank),
            _ => Err(format!("Invalid payment method: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Bkash => "bkash",
            PaymentMethod::Nagad => "nagad",
            PaymentMethod::Rocket => "rocket",
            PaymentMethod::Bank => "bank",
        }
    }

    /// Mobile wallets are addressed by an 11-digit phone number
    pub fn is_mobile(&self) -> bool {
        !matches!(self, PaymentMethod::Bank)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local mobile number: exactly 11 digits starting with `01`
pub fn is_valid_mobile_number(number: &str) -> bool {
    number.len() == 11 && number.starts_with("01") && number.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mobile_number_rules() {
        assert!(is_valid_mobile_number("01712345678"));
        assert!(!is_valid_mobile_number("0171234567"));
        assert!(!is_valid_mobile_number("017123456789"));
        assert!(!is_valid_mobile_number("02712345678"));
        assert!(!is_valid_mobile_number("01712a45678"));
    }

    #[test]
    fn test_payment_method_conversion() {
        assert_eq!(PaymentMethod::from_str("bKash").unwrap(), PaymentMethod::Bkash);
        assert_eq!(PaymentMethod::Nagad.as_str(), "nagad");
        assert!(PaymentMethod::Rocket.is_mobile());
        assert!(!PaymentMethod::Bank.is_mobile());
        assert!(PaymentMethod::from_str("paypal").is_err());
    }
}

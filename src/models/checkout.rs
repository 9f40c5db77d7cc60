use serde::{Deserialize, Serialize};

use super::Rejection;

#[derive(Clone, Debug, Deserialize)]
pub struct NewCheckout {
    pub price_id: String,
    pub email: String,
}

impl NewCheckout {
    pub fn validate(&self) -> Result<(), Rejection> {
        if self.price_id.trim().is_empty() || self.email.is_empty() {
            return Err(Rejection::invalid("Invalid request parameters"));
        }
        if !is_valid_email(&self.email) {
            return Err(Rejection::invalid("Invalid email format"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Shape check equivalent to `^[^\s@]+@[^\s@]+\.[^\s@]+$`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return false,
    };
    if local.is_empty() {
        return false;
    }

    // Some dot must have text on both sides.
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i < domain.len() - 1)
}

/// Log-safe form of an email: the first three characters then `***`.
pub fn mask_email(email: &str) -> String {
    let prefix: String = email.chars().take(3).collect();
    format!("{}***", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("owner@shop.io"));
        assert!(is_valid_email("a@b.c"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(is_valid_email("a@b.c.d"));

        assert!(!is_valid_email("owner@shop"));
        assert!(!is_valid_email("@shop.io"));
        assert!(!is_valid_email("owner@.io"));
        assert!(!is_valid_email("owner@shop."));
        assert!(!is_valid_email("own er@shop.io"));
        assert!(!is_valid_email("owner@@shop.io"));
        assert!(!is_valid_email("owner"));
    }

    #[test]
    fn checkout_validation() {
        let ok = NewCheckout {
            price_id: "price_123".to_string(),
            email: "owner@shop.io".to_string(),
        };
        assert!(ok.validate().is_ok());

        let missing_price = NewCheckout {
            price_id: "".to_string(),
            email: "owner@shop.io".to_string(),
        };
        assert!(missing_price.validate().is_err());
    }

    #[test]
    fn masking_keeps_three_characters() {
        assert_eq!(mask_email("owner@shop.io"), "own***");
        assert_eq!(mask_email("ab"), "ab***");
    }
}

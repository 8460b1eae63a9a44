use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

const PRICE_FIELD: &str = "price";

/// Monetary amount in cents. Never built from floating point.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriceInCents(u64);

impl PriceInCents {
    pub fn new(value: u64) -> Self {
        PriceInCents(value)
    }

    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PriceInCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_price(*self))
    }
}

/// Parses a decimal-comma price (`"10,99"`, `"10"`) into cents.
pub fn parse_price(text: &str) -> Result<PriceInCents, DomainError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DomainError::validation(PRICE_FIELD, "Price is required"));
    }

    let (whole, fraction) = match text.split_once(',') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text, None),
    };

    if whole.is_empty() || !is_digits(whole) {
        return Err(DomainError::validation(
            PRICE_FIELD,
            format!("'{}' is not a valid price, expected a value like 10,99", text),
        ));
    }

    let cents = match fraction {
        None => 0,
        Some(fraction) => {
            if fraction.is_empty() || !is_digits(fraction) {
                return Err(DomainError::validation(
                    PRICE_FIELD,
                    format!("'{}' is not a valid price, expected a value like 10,99", text),
                ));
            }
            if fraction.len() > 2 {
                return Err(DomainError::validation(
                    PRICE_FIELD,
                    "Price cannot have more than two decimal places",
                ));
            }
            // At most two ASCII digits, so this parse cannot fail.
            let value = fraction.parse::<u64>().unwrap_or_default();
            if fraction.len() == 1 { value * 10 } else { value }
        }
    };

    whole
        .parse::<u64>()
        .ok()
        .and_then(|units| units.checked_mul(100))
        .and_then(|units| units.checked_add(cents))
        .map(PriceInCents::new)
        .ok_or_else(|| DomainError::validation(PRICE_FIELD, "Price is too large"))
}

/// Renders cents back into the decimal-comma form accepted by [`parse_price`].
pub fn format_price(price: PriceInCents) -> String {
    format!("{},{:02}", price.inner() / 100, price.inner() % 100)
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

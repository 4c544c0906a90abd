//! Monetary amounts as stored by Shopify.
//!
//! Shopify stores order totals as a `MoneyBag`: the same amount in shop and
//! presentment currencies, each as a decimal string plus an ISO 4217 code.
//! Only the shop currency is used for analytics.

use serde::{Deserialize, Serialize};

/// An amount in a single currency, exactly as stored.
///
/// The amount stays a string so malformed upstream data survives a
/// round-trip through this type; pipelines coerce it when they read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Decimal-valued string (e.g., "19.99").
    pub amount: String,
    /// ISO 4217 currency code (e.g., "USD").
    pub currency_code: String,
}

/// Shop and presentment representations of one amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneySet {
    /// Amount in the shop's currency.
    pub shop_money: Money,
    /// Amount in the customer's presentment currency, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentment_money: Option<Money>,
}

impl MoneySet {
    /// Build a set that only records the shop currency.
    #[must_use]
    pub const fn shop(shop_money: Money) -> Self {
        Self {
            shop_money,
            presentment_money: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn usd(amount: &str) -> Money {
        Money {
            amount: amount.to_string(),
            currency_code: "USD".to_string(),
        }
    }

    #[test]
    fn test_malformed_amount_survives_round_trip() {
        let set = MoneySet::shop(usd("N/A"));
        let json = serde_json::to_value(&set).unwrap();
        let back: MoneySet = serde_json::from_value(json).unwrap();
        assert_eq!(back.shop_money.amount, "N/A");
    }

    #[test]
    fn test_money_set_serialization_shape() {
        let set = MoneySet::shop(Money {
            amount: "5.00".to_string(),
            currency_code: "CAD".to_string(),
        });
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["shop_money"]["amount"], "5.00");
        assert_eq!(json["shop_money"]["currency_code"], "CAD");
        assert!(json.get("presentment_money").is_none());
    }

    #[test]
    fn test_presentment_money_is_optional() {
        let set: MoneySet = serde_json::from_value(serde_json::json!({
            "shop_money": {"amount": "10.00", "currency_code": "USD"},
            "presentment_money": {"amount": "9.20", "currency_code": "EUR"}
        }))
        .unwrap();
        assert_eq!(set.shop_money, usd("10.00"));
        assert_eq!(set.presentment_money.unwrap().currency_code, "EUR");
    }
}

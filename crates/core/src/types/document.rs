//! Documents stored in the three Shopify collections.
//!
//! These types describe the documents the upstream sync writes. The
//! analytics service never mutates them; it reads them as raw JSON through
//! the record source, so these structs are used to build fixtures and seed
//! data rather than to validate what is stored.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::{CustomerId, OrderId, ProductId};
use super::price::MoneySet;

/// A document collection in the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Customers,
    Orders,
    Products,
}

impl Collection {
    /// All collections, in seeding order.
    pub const ALL: [Self; 3] = [Self::Customers, Self::Orders, Self::Products];

    /// The logical collection name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Customers => "shopifyCustomers",
            Self::Orders => "shopifyOrders",
            Self::Products => "shopifyProducts",
        }
    }

    /// The backing table name, schema-qualified.
    #[must_use]
    pub const fn table_name(&self) -> &'static str {
        match self {
            Self::Customers => "analytics.shopify_customers",
            Self::Orders => "analytics.shopify_orders",
            Self::Products => "analytics.shopify_products",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A customer's default address. Only the locality fields are stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
}

/// A customer document (`shopifyCustomers`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Creation timestamp as stored (usually RFC 3339 with offset).
    pub created_at: String,
    #[serde(default)]
    pub orders_count: i64,
    /// Lifetime spend as a decimal string (e.g., "199.65").
    pub total_spent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_address: Option<Address>,
}

/// An order document (`shopifyOrders`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Order total in shop and presentment currencies.
    pub total_price_set: MoneySet,
    /// Creation timestamp as stored.
    pub created_at: String,
    /// Owning customer; `None` for guest checkouts.
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
}

/// A product document (`shopifyProducts`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    #[serde(default)]
    pub vendor: Option<String>,
    pub created_at: String,
}

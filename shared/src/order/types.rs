//! Order line items and payment records

use serde::{Deserialize, Serialize};

use crate::util::{new_id, now_millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Paid,
}

/// Ord so the method can key the report breakdown maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Voucher,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Voucher => "voucher",
        }
    }
}

/// One line of an order.
///
/// `unit_price` is derived: `original_unit_price` minus the per-unit
/// discount, or zero when waived. It is stored anyway so other
/// terminals can render the ticket without redoing the math.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: f64,
    pub original_unit_price: f64,
    pub quantity: i32,
    /// Units already settled through itemized payments
    #[serde(default)]
    pub paid_quantity: i32,
    /// VAT percent; prices are tax-inclusive
    pub tax_rate_percent: f64,
    /// Per-unit discount amount
    #[serde(default)]
    pub discount_amount: f64,
    #[serde(default)]
    pub is_fully_waived: bool,
    /// Course this line belongs to (1..=5)
    pub course: u8,
    /// Category name at the time the item was added
    pub category: String,
}

impl OrderItem {
    pub fn unpaid_quantity(&self) -> i32 {
        (self.quantity - self.paid_quantity).max(0)
    }
}

/// Append-only payment log entry. Never mutated after recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub method: PaymentMethod,
    pub amount: f64,
    pub timestamp: i64,
}

impl Payment {
    pub fn new(method: PaymentMethod, amount: f64) -> Self {
        Self {
            id: new_id(),
            method,
            amount,
            timestamp: now_millis(),
        }
    }
}

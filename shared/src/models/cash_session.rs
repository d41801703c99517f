//! Cash Session Model
//!
//! One register session from opening float to Z report. At most one
//! session is open at a time; the store enforces that, not the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::order::PaymentMethod;
use crate::util::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Closed,
}

/// One tax-rate line of the Z report. `base` is the ex-tax amount the
/// rate applied to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxLine {
    pub base: f64,
    pub amount: f64,
}

/// Per-product sales line of the Z report, keyed by product name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLine {
    pub qty: i64,
    pub total_with_tax: f64,
    pub total_ex_tax: f64,
    pub tax_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: SessionStatus,
    pub opened_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,
    pub opened_by: String,
    /// Opening cash float
    #[serde(default)]
    pub start_amount: f64,
    #[serde(default)]
    pub total_sales: f64,
    #[serde(default)]
    pub payment_breakdown: BTreeMap<PaymentMethod, f64>,
    /// Keyed by the tax rate rendered as a decimal string ("10", "5.5")
    #[serde(default)]
    pub tax_breakdown: BTreeMap<String, TaxLine>,
    /// Keyed by product name
    #[serde(default)]
    pub product_breakdown: BTreeMap<String, ProductLine>,
}

impl CashSession {
    /// New open session starting now. Unsaved until the store assigns
    /// an id.
    pub fn open(opened_by: String, start_amount: f64) -> Self {
        Self {
            id: None,
            status: SessionStatus::Open,
            opened_at: now_millis(),
            closed_at: None,
            opened_by,
            start_amount,
            total_sales: 0.0,
            payment_breakdown: BTreeMap::new(),
            tax_breakdown: BTreeMap::new(),
            product_breakdown: BTreeMap::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }
}

/// Z preview computed from the paid orders attributed to a session.
/// Pure data; closing the session copies it onto the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub total_sales: f64,
    pub order_count: u64,
    pub payment_breakdown: BTreeMap<PaymentMethod, f64>,
    pub tax_breakdown: BTreeMap<String, TaxLine>,
    pub product_breakdown: BTreeMap<String, ProductLine>,
    pub generated_at: i64,
}

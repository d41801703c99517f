//! Product Model

use serde::{Deserialize, Serialize};

/// Menu product. Prices are tax-inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    /// Category name, used to resolve the preparation destination
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Per-product VAT rate (percent). Falls back to the settings
    /// default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat: Option<f64>,
}

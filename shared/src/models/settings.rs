//! Settings Model

use serde::{Deserialize, Serialize};

/// Fixed document id of the settings singleton
pub const SETTINGS_DOC_ID: &str = "config";

/// Store-wide configuration singleton, maintained by the back office
/// and read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// VAT percent applied when a product has no rate of its own
    pub default_tax_percent: f64,
    pub currency: String,
    pub admin_access_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_phone: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_tax_percent: 10.0,
            currency: "EUR".to_string(),
            admin_access_code: String::new(),
            company_name: None,
            company_address: None,
            company_phone: None,
        }
    }
}

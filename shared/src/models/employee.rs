//! Employee Model

use serde::{Deserialize, Serialize};

/// Staff record. Authentication (PIN lookup) happens outside this
/// core; orders only carry the resolved display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub name: String,
    /// Login code, managed by the back office
    pub code: String,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

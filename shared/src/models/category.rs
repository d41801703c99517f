//! Category Model

use serde::{Deserialize, Serialize};

/// Where items of a category are prepared.
///
/// `None` keeps the item off both preparation screens (e.g. cover
/// charges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Historical records carry no destination; the kitchen view has
    /// always treated those as its own.
    #[default]
    Kitchen,
    Bar,
    None,
}

/// Menu category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Display position in the menu grid
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub destination: Destination,
}

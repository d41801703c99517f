//! Floor Table Model

use serde::{Deserialize, Serialize};

/// Shape used by the floor-plan renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableShape {
    Square,
    Round,
    Rect,
}

/// A physical table on the floor plan.
///
/// Geometry is owned by the floor-plan editor; the order engine only
/// cares about `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub shape: TableShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seats: Option<u32>,
}

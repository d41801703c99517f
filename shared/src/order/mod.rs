//! Order aggregate
//!
//! The order is the unit of persistence: one JSON document per table
//! visit, rewritten in full on every save (last writer wins). Money
//! fields are stored as f64 rounded to two decimals; all arithmetic
//! happens in the engine crate with `rust_decimal`.

pub mod course;
pub mod types;

pub use course::{COURSE_MAX, COURSE_MIN, CourseBoard, CourseState};
pub use types::{OrderItem, OrderStatus, Payment, PaymentMethod};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Assigned by the store on first persist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub table_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    /// Tax-inclusive total of all lines; the amount due
    #[serde(default)]
    pub subtotal: f64,
    /// VAT portion already contained in `subtotal`
    #[serde(default)]
    pub tax_total: f64,
    #[serde(default)]
    pub paid_amount: f64,
    pub status: OrderStatus,
    pub server_name: String,
    /// Cash session that was open when the order started
    pub session_id: String,
    #[serde(default)]
    pub course_status: CourseBoard,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Order {
    /// Fresh in-memory order for a table. Course 1 starts fired so the
    /// first round goes straight to preparation.
    pub fn open(table_id: &str, session_id: &str, server_name: &str) -> Self {
        let mut course_status = CourseBoard::new();
        course_status.set(COURSE_MIN, CourseState::Fired);
        Self {
            id: None,
            table_id: table_id.to_string(),
            customer_ref: None,
            customer_name: None,
            items: Vec::new(),
            payments: Vec::new(),
            subtotal: 0.0,
            tax_total: 0.0,
            paid_amount: 0.0,
            status: OrderStatus::Open,
            server_name: server_name.to_string(),
            session_id: session_id.to_string(),
            course_status,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// The amount due. Quoted prices are tax-inclusive, so this is the
    /// subtotal itself.
    pub fn total(&self) -> f64 {
        self.subtotal
    }

    pub fn remaining_amount(&self) -> f64 {
        (self.total() - self.paid_amount).max(0.0)
    }

    pub fn course_state(&self, course: u8) -> CourseState {
        self.course_status.state(course)
    }

    /// Distinct course numbers that have at least one item, ascending.
    pub fn courses_present(&self) -> Vec<u8> {
        let mut courses: Vec<u8> = self.items.iter().map(|i| i.course).collect();
        courses.sort_unstable();
        courses.dedup();
        courses
    }
}

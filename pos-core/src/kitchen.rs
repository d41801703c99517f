//! Kitchen projection
//!
//! Pure read-side view over orders: no state of its own, recomputed
//! from scratch on every change-feed delivery. Each preparation
//! destination (kitchen or bar) sees only the courses that contain at
//! least one of its items and classifies the whole order:
//!
//! - `Active`: some relevant course is fired and being prepared
//! - `Waiting`: nothing on the fire, but a relevant course is not
//!   served yet
//! - `Done`: every relevant course served, or nothing relevant at all

use std::collections::BTreeSet;

use shared::models::{Category, Destination};
use shared::order::{CourseState, Order};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepBucket {
    Active,
    Waiting,
    Done,
}

/// Destination of a category by name. Unknown categories have always
/// landed on the kitchen screen; keep that.
pub fn destination_of(category: &str, categories: &[Category]) -> Destination {
    categories
        .iter()
        .find(|c| c.name == category)
        .map(|c| c.destination)
        .unwrap_or(Destination::Kitchen)
}

/// Classify one order for one preparation destination.
pub fn classify(order: &Order, destination: Destination, categories: &[Category]) -> PrepBucket {
    let relevant: BTreeSet<u8> = order
        .items
        .iter()
        .filter(|item| destination_of(&item.category, categories) == destination)
        .map(|item| item.course)
        .collect();

    if relevant.is_empty() {
        return PrepBucket::Done;
    }
    if relevant
        .iter()
        .any(|&course| order.course_state(course) == CourseState::Fired)
    {
        return PrepBucket::Active;
    }
    if relevant
        .iter()
        .any(|&course| order.course_state(course) != CourseState::Served)
    {
        return PrepBucket::Waiting;
    }
    PrepBucket::Done
}

/// One preparation screen's worth of orders, bucketed.
#[derive(Debug, Default)]
pub struct KitchenBoard {
    pub active: Vec<Order>,
    pub waiting: Vec<Order>,
    pub done: Vec<Order>,
}

/// Build the board for a destination from the current set of orders.
/// Callers pass whatever their live query delivered; typically the
/// open orders.
pub fn build_board(
    orders: Vec<Order>,
    destination: Destination,
    categories: &[Category],
) -> KitchenBoard {
    let mut board = KitchenBoard::default();
    for order in orders {
        match classify(&order, destination, categories) {
            PrepBucket::Active => board.active.push(order),
            PrepBucket::Waiting => board.waiting.push(order),
            PrepBucket::Done => board.done.push(order),
        }
    }
    board
}

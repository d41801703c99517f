//! Order aggregate operations
//!
//! One service per terminal process. Operations mutate an in-memory
//! [`Order`] and persist it as a whole snapshot; the store's change
//! feed tells every other terminal to re-read. Concurrent writers are
//! resolved last-writer-wins at snapshot granularity.

pub mod courses;
pub mod money;

use thiserror::Error;

use shared::models::{Customer, Product, Settings};
use shared::order::{Order, OrderItem, OrderStatus};
use shared::util::now_millis;

use crate::identity::Actor;
use crate::sessions;
use crate::store::{DataStore, StoreError, collections};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("No cash session is open")]
    NoActiveSession,

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order is no longer open")]
    OrderClosed,

    #[error("Order has recorded payments")]
    OrderHasPayments,

    #[error("No item at index {0}")]
    ItemNotFound(usize),

    #[error("Item at index {0} has settled units")]
    ItemAlreadySettled(usize),

    #[error("Invalid price: {0}")]
    InvalidPrice(f64),

    #[error("Quantity limit reached")]
    QuantityLimit,

    #[error("Discount percent must be between 0 and 100, got {0}")]
    InvalidDiscount(f64),

    #[error("Course number out of range: {0}")]
    InvalidCourse(u8),

    #[error("Course {0} is already served")]
    CourseAlreadyServed(u8),

    #[error("Course {0} has not been fired")]
    CourseNotFired(u8),

    #[error("Course {0} has not been served")]
    CourseNotServed(u8),
}

/// Per-unit discount to apply to one line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiscountMode {
    /// Percentage off the original unit price, 0..=100
    PercentOff(f64),
    /// Item stays on the ticket at price zero
    Waive,
}

/// Recompute derived fields, stamp timestamps, settle the status flag,
/// and write the full snapshot. First persist creates the record and
/// assigns its id.
pub(crate) fn persist_order(store: &DataStore, order: &mut Order) -> Result<(), StoreError> {
    money::recalculate_totals(order);

    if order.is_open()
        && order.total() > 0.0
        && money::is_payment_sufficient(order.paid_amount, order.total())
    {
        order.status = OrderStatus::Paid;
    }

    let now = now_millis();
    if order.created_at.is_none() {
        order.created_at = Some(now);
    }
    order.updated_at = Some(now);

    match order.id.clone() {
        Some(id) => {
            store.put(collections::ORDERS, &id, order)?;
            tracing::debug!(order_id = %id, status = ?order.status, "Order snapshot saved");
        }
        None => {
            let id = store.create(collections::ORDERS, order)?;
            tracing::info!(order_id = %id, table_id = %order.table_id, "Order created");
            order.id = Some(id);
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct OrderService {
    store: DataStore,
}

impl OrderService {
    pub fn new(store: DataStore) -> Self {
        Self { store }
    }

    /// Seat a table: resume its open order if one exists, otherwise
    /// start a fresh one bound to the current cash session. The fresh
    /// order is not persisted until something worth saving happens.
    pub fn open_or_retrieve(&self, table_id: &str, actor: &Actor) -> Result<Order, OrderError> {
        let session =
            sessions::find_open_session(&self.store)?.ok_or(OrderError::NoActiveSession)?;
        let session_id = session.id.as_deref().ok_or(OrderError::NoActiveSession)?;

        let mut existing: Vec<Order> = self.store.query(collections::ORDERS, |o: &Order| {
            o.is_open() && o.table_id == table_id
        })?;
        if let Some(order) = existing.pop() {
            tracing::debug!(table_id, order_id = ?order.id, "Resumed open order");
            return Ok(order);
        }

        Ok(Order::open(table_id, session_id, actor.display_name()))
    }

    /// Load a persisted order by id.
    pub fn load(&self, order_id: &str) -> Result<Order, OrderError> {
        self.store
            .get(collections::ORDERS, order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))
    }

    /// Add one unit of a product to a course. Merges into an existing
    /// undiscounted line of the same product and course.
    pub fn add_item(
        &self,
        order: &mut Order,
        product: &Product,
        course: u8,
        settings: &Settings,
    ) -> Result<(), OrderError> {
        if !order.is_open() {
            return Err(OrderError::OrderClosed);
        }
        courses::validate_course(course)?;
        if !product.price.is_finite() || product.price < 0.0 || product.price > money::MAX_PRICE {
            return Err(OrderError::InvalidPrice(product.price));
        }

        let mergeable = order.items.iter_mut().find(|item| {
            item.product_id == product.id
                && item.course == course
                && item.discount_amount == 0.0
                && !item.is_fully_waived
                && money::money_eq(item.original_unit_price, product.price)
        });

        match mergeable {
            Some(item) => {
                if item.quantity >= money::MAX_QUANTITY {
                    return Err(OrderError::QuantityLimit);
                }
                item.quantity += 1;
            }
            None => order.items.push(OrderItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                unit_price: product.price,
                original_unit_price: product.price,
                quantity: 1,
                paid_quantity: 0,
                tax_rate_percent: product.vat.unwrap_or(settings.default_tax_percent),
                discount_amount: 0.0,
                is_fully_waived: false,
                course,
                category: product.category.clone(),
            }),
        }

        money::recalculate_totals(order);
        Ok(())
    }

    /// Remove one unit from a line; the line disappears at zero. Lines
    /// with settled units cannot shrink.
    pub fn remove_item(&self, order: &mut Order, index: usize) -> Result<(), OrderError> {
        if !order.is_open() {
            return Err(OrderError::OrderClosed);
        }
        let item = order
            .items
            .get_mut(index)
            .ok_or(OrderError::ItemNotFound(index))?;
        if item.paid_quantity > 0 {
            return Err(OrderError::ItemAlreadySettled(index));
        }

        if item.quantity > 1 {
            item.quantity -= 1;
        } else {
            order.items.remove(index);
        }
        money::recalculate_totals(order);
        Ok(())
    }

    /// Set a line's discount. Always derived from the original unit
    /// price, so re-applying the same discount is a no-op and
    /// `PercentOff(0.0)` removes it.
    pub fn apply_discount(
        &self,
        order: &mut Order,
        index: usize,
        mode: DiscountMode,
    ) -> Result<(), OrderError> {
        if !order.is_open() {
            return Err(OrderError::OrderClosed);
        }
        let item = order
            .items
            .get_mut(index)
            .ok_or(OrderError::ItemNotFound(index))?;

        match mode {
            DiscountMode::PercentOff(percent) => {
                if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
                    return Err(OrderError::InvalidDiscount(percent));
                }
                let discount = money::to_decimal(item.original_unit_price)
                    * money::to_decimal(percent)
                    / rust_decimal::Decimal::ONE_HUNDRED;
                item.discount_amount = money::to_f64(discount);
                item.is_fully_waived = false;
            }
            DiscountMode::Waive => {
                item.is_fully_waived = true;
            }
        }

        money::recalculate_totals(order);
        Ok(())
    }

    /// Attach a customer to the order and save.
    pub fn assign_customer(
        &self,
        order: &mut Order,
        customer: &Customer,
    ) -> Result<(), OrderError> {
        if !order.is_open() {
            return Err(OrderError::OrderClosed);
        }
        order.customer_ref = Some(customer.id.clone());
        order.customer_name = Some(customer.name.clone());
        self.persist(order)
    }

    /// Walk away from a table. Only open orders with nothing settled
    /// can be cancelled; the record is deleted outright.
    pub fn cancel_order(&self, order: &Order) -> Result<(), OrderError> {
        if !order.is_open() {
            return Err(OrderError::OrderClosed);
        }
        if order.paid_amount > money::to_f64(money::MONEY_TOLERANCE) {
            return Err(OrderError::OrderHasPayments);
        }

        if let Some(id) = &order.id {
            self.store.delete(collections::ORDERS, id)?;
            tracing::info!(order_id = %id, table_id = %order.table_id, "Order cancelled");
        }
        Ok(())
    }

    /// Save the current snapshot.
    pub fn persist(&self, order: &mut Order) -> Result<(), OrderError> {
        persist_order(&self.store, order)?;
        Ok(())
    }

    // Course operations mutate and save in one step so the kitchen
    // screen sees the transition immediately.

    /// Fire a course. Returns whether anything changed; an already
    /// fired course saves nothing.
    pub fn fire_course(&self, order: &mut Order, course: u8) -> Result<bool, OrderError> {
        if !order.is_open() {
            return Err(OrderError::OrderClosed);
        }
        let changed = courses::fire(order, course)?;
        if changed {
            tracing::info!(order_id = ?order.id, course, "Course fired");
            self.persist(order)?;
        }
        Ok(changed)
    }

    pub fn cancel_course_fire(&self, order: &mut Order, course: u8) -> Result<bool, OrderError> {
        if !order.is_open() {
            return Err(OrderError::OrderClosed);
        }
        let changed = courses::cancel_fire(order, course)?;
        if changed {
            tracing::info!(order_id = ?order.id, course, "Course fire cancelled");
            self.persist(order)?;
        }
        Ok(changed)
    }

    pub fn mark_course_served(&self, order: &mut Order, course: u8) -> Result<(), OrderError> {
        courses::mark_served(order, course)?;
        self.persist(order)
    }

    /// Correction path, only while the tab is still open.
    pub fn reopen_course(&self, order: &mut Order, course: u8) -> Result<(), OrderError> {
        if !order.is_open() {
            return Err(OrderError::OrderClosed);
        }
        courses::reopen(order, course)?;
        tracing::info!(order_id = ?order.id, course, "Served course reopened");
        self.persist(order)
    }

    /// Suggestion for the fire button: the first untouched course.
    pub fn next_course_to_fire(&self, order: &Order) -> Option<u8> {
        courses::next_course_to_fire(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionService;
    use shared::models::{Product, Settings};

    fn fixture() -> (DataStore, OrderService, Order) {
        let store = DataStore::open_in_memory().unwrap();
        let sessions = SessionService::new(store.clone());
        sessions.open_session(&Actor::Admin, 100.0).unwrap();

        let service = OrderService::new(store.clone());
        let order = service.open_or_retrieve("t1", &Actor::Admin).unwrap();
        (store, service, order)
    }

    fn product(id: &str, price: f64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            price,
            category: "Food".into(),
            color: None,
            vat: None,
        }
    }

    #[test]
    fn open_requires_a_session() {
        let store = DataStore::open_in_memory().unwrap();
        let service = OrderService::new(store);
        let err = service.open_or_retrieve("t1", &Actor::Admin).unwrap_err();
        assert!(matches!(err, OrderError::NoActiveSession));
    }

    #[test]
    fn open_resumes_persisted_open_order() {
        let (_store, service, mut order) = fixture();
        service
            .add_item(&mut order, &product("p1", 4.5), 1, &Settings::default())
            .unwrap();
        service.persist(&mut order).unwrap();

        let resumed = service.open_or_retrieve("t1", &Actor::Admin).unwrap();
        assert_eq!(resumed.id, order.id);
        assert_eq!(resumed.items.len(), 1);

        // A different table starts fresh.
        let other = service.open_or_retrieve("t2", &Actor::Admin).unwrap();
        assert!(other.id.is_none());
    }

    #[test]
    fn add_item_merges_same_product_and_course() {
        let (_store, service, mut order) = fixture();
        let settings = Settings::default();
        let p = product("p1", 4.5);

        service.add_item(&mut order, &p, 1, &settings).unwrap();
        service.add_item(&mut order, &p, 1, &settings).unwrap();
        service.add_item(&mut order, &p, 2, &settings).unwrap();

        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.items[1].course, 2);
        assert_eq!(order.subtotal, 13.5);
    }

    #[test]
    fn discounted_lines_never_merge() {
        let (_store, service, mut order) = fixture();
        let settings = Settings::default();
        let p = product("p1", 10.0);

        service.add_item(&mut order, &p, 1, &settings).unwrap();
        service
            .apply_discount(&mut order, 0, DiscountMode::PercentOff(50.0))
            .unwrap();
        service.add_item(&mut order, &p, 1, &settings).unwrap();

        assert_eq!(order.items.len(), 2);
        assert_eq!(order.subtotal, 15.0);
    }

    #[test]
    fn product_vat_overrides_default() {
        let (_store, service, mut order) = fixture();
        let settings = Settings::default();
        let mut p = product("p1", 10.0);
        p.vat = Some(5.5);

        service.add_item(&mut order, &p, 1, &settings).unwrap();
        assert_eq!(order.items[0].tax_rate_percent, 5.5);

        service.add_item(&mut order, &product("p2", 10.0), 1, &settings).unwrap();
        assert_eq!(order.items[1].tax_rate_percent, settings.default_tax_percent);
    }

    #[test]
    fn remove_item_decrements_then_drops() {
        let (_store, service, mut order) = fixture();
        let settings = Settings::default();
        let p = product("p1", 4.0);
        service.add_item(&mut order, &p, 1, &settings).unwrap();
        service.add_item(&mut order, &p, 1, &settings).unwrap();

        service.remove_item(&mut order, 0).unwrap();
        assert_eq!(order.items[0].quantity, 1);
        service.remove_item(&mut order, 0).unwrap();
        assert!(order.items.is_empty());
        assert_eq!(order.subtotal, 0.0);

        assert!(matches!(
            service.remove_item(&mut order, 0),
            Err(OrderError::ItemNotFound(0))
        ));
    }

    #[test]
    fn settled_lines_cannot_shrink() {
        let (_store, service, mut order) = fixture();
        service
            .add_item(&mut order, &product("p1", 4.0), 1, &Settings::default())
            .unwrap();
        order.items[0].paid_quantity = 1;

        assert!(matches!(
            service.remove_item(&mut order, 0),
            Err(OrderError::ItemAlreadySettled(0))
        ));
    }

    #[test]
    fn discount_reapplies_from_original_price() {
        let (_store, service, mut order) = fixture();
        service
            .add_item(&mut order, &product("p1", 20.0), 1, &Settings::default())
            .unwrap();

        service
            .apply_discount(&mut order, 0, DiscountMode::PercentOff(25.0))
            .unwrap();
        assert_eq!(order.items[0].unit_price, 15.0);

        // Same discount again: unchanged, not compounded.
        service
            .apply_discount(&mut order, 0, DiscountMode::PercentOff(25.0))
            .unwrap();
        assert_eq!(order.items[0].unit_price, 15.0);

        service
            .apply_discount(&mut order, 0, DiscountMode::PercentOff(0.0))
            .unwrap();
        assert_eq!(order.items[0].unit_price, 20.0);

        service
            .apply_discount(&mut order, 0, DiscountMode::Waive)
            .unwrap();
        assert_eq!(order.items[0].unit_price, 0.0);
        assert_eq!(order.subtotal, 0.0);

        assert!(matches!(
            service.apply_discount(&mut order, 0, DiscountMode::PercentOff(120.0)),
            Err(OrderError::InvalidDiscount(_))
        ));
    }

    #[test]
    fn persist_assigns_id_and_timestamps_once() {
        let (_store, service, mut order) = fixture();
        service
            .add_item(&mut order, &product("p1", 4.0), 1, &Settings::default())
            .unwrap();

        service.persist(&mut order).unwrap();
        let id = order.id.clone().unwrap();
        let created = order.created_at.unwrap();

        service.persist(&mut order).unwrap();
        assert_eq!(order.id.as_deref(), Some(id.as_str()));
        assert_eq!(order.created_at, Some(created));
    }

    #[test]
    fn empty_order_never_flips_to_paid() {
        let (_store, service, mut order) = fixture();
        service.persist(&mut order).unwrap();
        assert!(order.is_open());
    }

    #[test]
    fn cancel_rejects_settled_orders_and_deletes_unsettled() {
        let (store, service, mut order) = fixture();
        service
            .add_item(&mut order, &product("p1", 10.0), 1, &Settings::default())
            .unwrap();
        service.persist(&mut order).unwrap();
        let id = order.id.clone().unwrap();

        service.cancel_order(&order).unwrap();
        assert!(store.get::<Order>(collections::ORDERS, &id).unwrap().is_none());

        let mut paid = service.open_or_retrieve("t9", &Actor::Admin).unwrap();
        service
            .add_item(&mut paid, &product("p1", 10.0), 1, &Settings::default())
            .unwrap();
        paid.payments.push(shared::order::Payment::new(
            shared::order::PaymentMethod::Cash,
            5.0,
        ));
        service.persist(&mut paid).unwrap();
        assert!(matches!(
            service.cancel_order(&paid),
            Err(OrderError::OrderHasPayments)
        ));
    }

    #[test]
    fn course_operations_persist_transitions() {
        let (store, service, mut order) = fixture();
        service
            .add_item(&mut order, &product("p1", 4.0), 2, &Settings::default())
            .unwrap();

        assert!(service.fire_course(&mut order, 2).unwrap());
        assert!(!service.fire_course(&mut order, 2).unwrap());

        let id = order.id.clone().unwrap();
        let stored: Order = store.get(collections::ORDERS, &id).unwrap().unwrap();
        assert_eq!(stored.course_state(2), shared::order::CourseState::Fired);

        service.mark_course_served(&mut order, 2).unwrap();
        service.reopen_course(&mut order, 2).unwrap();
        let stored: Order = store.get(collections::ORDERS, &id).unwrap().unwrap();
        assert_eq!(stored.course_state(2), shared::order::CourseState::Fired);
    }
}

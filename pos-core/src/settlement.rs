//! Payment settlement
//!
//! Three ways to figure the amount owed: the whole remainder, an
//! equal split across N guests, or a hand-picked selection of items.
//! The amount is computed once when the cashier picks the mode;
//! recording then takes that amount verbatim, so an equal split of
//! 30.00 by three guests is three identical 10.00 payments. Every
//! payment appends to the order's payment log and is judged against
//! the remaining balance with the 0.01 tolerance.

use std::collections::BTreeMap;

use thiserror::Error;

use rust_decimal::Decimal;
use shared::order::{Order, Payment, PaymentMethod};

use crate::orders::{self, money};
use crate::store::{DataStore, StoreError};

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Order is no longer open")]
    OrderClosed,

    #[error("Invalid payment amount: {0}")]
    InvalidAmount(f64),

    #[error("Payment of {amount} exceeds remaining balance {remaining}")]
    Overpayment { amount: f64, remaining: f64 },

    #[error("Split count must be at least 1, got {0}")]
    InvalidSplit(u32),

    #[error("No item at index {0}")]
    ItemNotFound(usize),

    #[error("Selection for item {index} asks for {requested} units, only {available} unpaid")]
    SelectionExceedsUnpaid {
        index: usize,
        requested: i32,
        available: i32,
    },
}

/// Units of one line included in an itemized payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSelection {
    pub index: usize,
    pub quantity: i32,
}

/// How the amount owed is computed. Chosen per payment action, never
/// stored on the order.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementMode {
    /// Whole remaining balance
    Full,
    /// Remaining balance divided by the number of guests
    EqualSplit { parties: u32 },
    /// Exactly the selected units
    Itemized { selections: Vec<ItemSelection> },
}

/// Amount owed under the given mode, from the order's current state.
pub fn amount_due(order: &Order, mode: &SettlementMode) -> Result<f64, SettlementError> {
    match mode {
        SettlementMode::Full => Ok(order.remaining_amount()),
        SettlementMode::EqualSplit { parties } => {
            if *parties == 0 {
                return Err(SettlementError::InvalidSplit(*parties));
            }
            let share = money::to_decimal(order.remaining_amount()) / Decimal::from(*parties);
            Ok(money::to_f64(share))
        }
        SettlementMode::Itemized { selections } => {
            let totals = validate_selections(order, selections)?;
            let mut due = Decimal::ZERO;
            for (index, quantity) in totals {
                due += money::unit_price(&order.items[index]) * Decimal::from(quantity);
            }
            Ok(money::to_f64(due))
        }
    }
}

/// Every line's unpaid remainder, for a full settlement.
pub fn full_selections(order: &Order) -> Vec<ItemSelection> {
    order
        .items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.unpaid_quantity() > 0)
        .map(|(index, item)| ItemSelection {
            index,
            quantity: item.unpaid_quantity(),
        })
        .collect()
}

/// Per-index requested units, after checking every selection against
/// the unpaid remainder. Duplicate indices accumulate.
fn validate_selections(
    order: &Order,
    selections: &[ItemSelection],
) -> Result<BTreeMap<usize, i32>, SettlementError> {
    let mut totals: BTreeMap<usize, i32> = BTreeMap::new();
    for selection in selections {
        if selection.quantity <= 0 {
            return Err(SettlementError::SelectionExceedsUnpaid {
                index: selection.index,
                requested: selection.quantity,
                available: 0,
            });
        }
        *totals.entry(selection.index).or_default() += selection.quantity;
    }

    for (&index, &requested) in &totals {
        let item = order
            .items
            .get(index)
            .ok_or(SettlementError::ItemNotFound(index))?;
        let available = item.unpaid_quantity();
        if requested > available {
            return Err(SettlementError::SelectionExceedsUnpaid {
                index,
                requested,
                available,
            });
        }
    }
    Ok(totals)
}

/// Append a payment to the order in memory.
///
/// Validates the amount against the remaining balance, marks selected
/// units settled, and recomputes the totals. The caller persists.
pub fn apply_payment(
    order: &mut Order,
    amount: f64,
    method: PaymentMethod,
    selections: &[ItemSelection],
) -> Result<Payment, SettlementError> {
    if !order.is_open() {
        return Err(SettlementError::OrderClosed);
    }
    if !amount.is_finite()
        || amount > money::MAX_PAYMENT_AMOUNT
        || money::to_decimal(amount) <= money::MONEY_TOLERANCE
    {
        return Err(SettlementError::InvalidAmount(amount));
    }

    let remaining = order.remaining_amount();
    if money::to_decimal(amount) > money::to_decimal(remaining) + money::MONEY_TOLERANCE {
        return Err(SettlementError::Overpayment { amount, remaining });
    }

    let totals = validate_selections(order, selections)?;
    for (index, quantity) in totals {
        order.items[index].paid_quantity += quantity;
    }

    let payment = Payment::new(method, amount);
    order.payments.push(payment.clone());
    money::recalculate_totals(order);
    Ok(payment)
}

/// Settlement over the shared store.
#[derive(Clone)]
pub struct SettlementEngine {
    store: DataStore,
}

impl SettlementEngine {
    pub fn new(store: DataStore) -> Self {
        Self { store }
    }

    /// Record one payment and persist the order snapshot. A full
    /// settlement marks every unpaid unit; an equal-split share marks
    /// none. On a persist failure the order in memory keeps the
    /// payment so the caller can retry the save.
    pub fn record_payment(
        &self,
        order: &mut Order,
        amount: f64,
        method: PaymentMethod,
        selections: &[ItemSelection],
    ) -> Result<Payment, SettlementError> {
        let payment = apply_payment(order, amount, method, selections)?;
        orders::persist_order(&self.store, order)?;
        tracing::info!(
            order_id = ?order.id,
            amount = payment.amount,
            method = method.as_str(),
            status = ?order.status,
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Convenience for the common case: compute the amount for a mode
    /// and record it in one step.
    pub fn settle(
        &self,
        order: &mut Order,
        mode: &SettlementMode,
        method: PaymentMethod,
    ) -> Result<Payment, SettlementError> {
        let amount = amount_due(order, mode)?;
        let selections = match mode {
            SettlementMode::Full => full_selections(order),
            SettlementMode::EqualSplit { .. } => Vec::new(),
            SettlementMode::Itemized { selections } => selections.clone(),
        };
        self.record_payment(order, amount, method, &selections)
    }
}

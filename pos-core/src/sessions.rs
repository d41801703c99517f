//! Cash session engine
//!
//! One register session at a time, enforced by the store's
//! conditional create. The Z report is computed from the paid orders
//! attributed to the session and copied onto the record at close;
//! back-office revenue aggregates those closed records, never the raw
//! orders.

use std::collections::BTreeMap;

use thiserror::Error;

use rust_decimal::Decimal;
use shared::models::{CashSession, ProductLine, SessionReport, SessionStatus, TaxLine};
use shared::order::{Order, OrderStatus, PaymentMethod};
use shared::util::now_millis;

use crate::identity::Actor;
use crate::orders::money;
use crate::store::{DataStore, StoreError, collections};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("A cash session is already open")]
    SessionAlreadyOpen,

    #[error("Cash session is not open")]
    SessionNotOpen,

    #[error("Cash session has never been persisted")]
    SessionUnsaved,
}

/// The open session, if any. The store guarantees at most one.
pub fn find_open_session(store: &DataStore) -> Result<Option<CashSession>, StoreError> {
    let mut open: Vec<CashSession> =
        store.query(collections::CASH_SESSIONS, |s: &CashSession| s.is_open())?;
    Ok(open.pop())
}

/// An order counts toward a session when it was started under it, or,
/// for records predating session tracking, when it was last touched
/// after the session opened. The fallback can double-count an order
/// into two sessions whose windows overlap; the original reporting
/// accepted that and so does this.
fn is_attributed(order: &Order, session: &CashSession) -> bool {
    if let Some(session_id) = &session.id
        && order.session_id == *session_id
    {
        return true;
    }
    order.updated_at.is_some_and(|t| t >= session.opened_at)
}

#[derive(Clone)]
pub struct SessionService {
    store: DataStore,
}

impl SessionService {
    pub fn new(store: DataStore) -> Self {
        Self { store }
    }

    /// Open the register. Fails with [`SessionError::SessionAlreadyOpen`]
    /// when any open session exists; the check and the insert share one
    /// write transaction, so two racing terminals cannot both win.
    pub fn open_session(
        &self,
        actor: &Actor,
        start_amount: f64,
    ) -> Result<CashSession, SessionError> {
        let mut session = CashSession::open(actor.display_name().to_string(), start_amount);
        let created = self.store.create_unique(
            collections::CASH_SESSIONS,
            &session,
            |existing: &CashSession| existing.is_open(),
        );
        match created {
            Ok(id) => {
                tracing::info!(session_id = %id, opened_by = %session.opened_by, "Cash session opened");
                session.id = Some(id);
                Ok(session)
            }
            Err(StoreError::Conflict(_)) => Err(SessionError::SessionAlreadyOpen),
            Err(error) => Err(error.into()),
        }
    }

    pub fn current_open(&self) -> Result<Option<CashSession>, SessionError> {
        Ok(find_open_session(&self.store)?)
    }

    /// Compute the Z preview for a session without mutating anything.
    /// Safe to call repeatedly while the register is being counted.
    pub fn compute_report(&self, session: &CashSession) -> Result<SessionReport, SessionError> {
        let paid: Vec<Order> = self
            .store
            .query(collections::ORDERS, |o: &Order| o.status == OrderStatus::Paid)?;

        let mut total_sales = Decimal::ZERO;
        let mut order_count = 0u64;
        let mut payments: BTreeMap<PaymentMethod, Decimal> = BTreeMap::new();
        let mut taxes: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
        let mut products: BTreeMap<String, (i64, Decimal, Decimal, Decimal)> = BTreeMap::new();

        for order in paid.iter().filter(|o| is_attributed(o, session)) {
            total_sales += money::to_decimal(order.total());
            order_count += 1;

            for payment in &order.payments {
                *payments.entry(payment.method).or_default() += money::to_decimal(payment.amount);
            }

            for item in &order.items {
                let gross = money::line_total(item);
                let vat = money::tax_portion(gross, money::to_decimal(item.tax_rate_percent));
                let ex_tax = gross - vat;

                let tax_line = taxes.entry(rate_key(item.tax_rate_percent)).or_default();
                tax_line.0 += ex_tax;
                tax_line.1 += vat;

                let product = products.entry(item.name.clone()).or_default();
                product.0 += i64::from(item.quantity);
                product.1 += gross;
                product.2 += ex_tax;
                product.3 += vat;
            }
        }

        Ok(SessionReport {
            total_sales: money::to_f64(total_sales),
            order_count,
            payment_breakdown: payments
                .into_iter()
                .map(|(method, amount)| (method, money::to_f64(amount)))
                .collect(),
            tax_breakdown: taxes
                .into_iter()
                .map(|(rate, (base, amount))| {
                    (
                        rate,
                        TaxLine {
                            base: money::to_f64(base),
                            amount: money::to_f64(amount),
                        },
                    )
                })
                .collect(),
            product_breakdown: products
                .into_iter()
                .map(|(name, (qty, with_tax, ex_tax, tax))| {
                    (
                        name,
                        ProductLine {
                            qty,
                            total_with_tax: money::to_f64(with_tax),
                            total_ex_tax: money::to_f64(ex_tax),
                            tax_amount: money::to_f64(tax),
                        },
                    )
                })
                .collect(),
            generated_at: now_millis(),
        })
    }

    /// Close the register, copying the report onto the record. The
    /// session becomes immutable history.
    pub fn close_session(
        &self,
        session: &mut CashSession,
        report: &SessionReport,
    ) -> Result<(), SessionError> {
        if !session.is_open() {
            return Err(SessionError::SessionNotOpen);
        }
        let id = session.id.clone().ok_or(SessionError::SessionUnsaved)?;

        session.status = SessionStatus::Closed;
        session.closed_at = Some(now_millis());
        session.total_sales = report.total_sales;
        session.payment_breakdown = report.payment_breakdown.clone();
        session.tax_breakdown = report.tax_breakdown.clone();
        session.product_breakdown = report.product_breakdown.clone();

        self.store.put(collections::CASH_SESSIONS, &id, session)?;
        tracing::info!(
            session_id = %id,
            total_sales = session.total_sales,
            "Cash session closed"
        );
        Ok(())
    }

    /// Closed sessions, most recently opened first.
    pub fn closed_sessions(&self) -> Result<Vec<CashSession>, SessionError> {
        let mut sessions: Vec<CashSession> = self
            .store
            .query(collections::CASH_SESSIONS, |s: &CashSession| !s.is_open())?;
        sessions.sort_by_key(|s| std::cmp::Reverse(s.opened_at));
        Ok(sessions)
    }

    /// Back-office revenue: the sum of persisted closed-session
    /// totals. Deleting a session's history record shrinks this by
    /// exactly that session's sales.
    pub fn aggregate_revenue(&self) -> Result<f64, SessionError> {
        let total: Decimal = self
            .closed_sessions()?
            .iter()
            .map(|s| money::to_decimal(s.total_sales))
            .sum();
        Ok(money::to_f64(total))
    }

    /// Drop a session history record.
    pub fn delete_session(&self, session_id: &str) -> Result<(), SessionError> {
        self.store.delete(collections::CASH_SESSIONS, session_id)?;
        tracing::info!(session_id, "Cash session history record deleted");
        Ok(())
    }
}

/// Map key for a tax rate: trimmed decimal string ("10", "5.5").
fn rate_key(rate_percent: f64) -> String {
    format!("{rate_percent}")
}

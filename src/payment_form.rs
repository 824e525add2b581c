use chrono::NaiveDate;
use thiserror::Error;

use crate::allocation::{self, AllocationSummary, ChargeAllocation, TOLERANCE};
use crate::fmt::{money, parse_amount, parse_date};
use crate::models::{Charge, PaymentMethod, PaymentType};

/// One payment-method split. Lives only as long as the payment screen.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDetail {
    pub id: usize,
    pub amount: f64,
    pub method: PaymentMethod,
    pub payment_type: PaymentType,
}

pub enum DetailField {
    Amount(f64),
    Method(PaymentMethod),
    Type(PaymentType),
}

pub enum AllocationField {
    Amount(f64),
    Selected(bool),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentValidationError {
    #[error("Enter a total payment amount greater than zero")]
    NonPositiveTotal,

    #[error("Transaction date is required")]
    MissingDate,

    #[error("Transaction date must be YYYY-MM-DD, got '{0}'")]
    InvalidDate(String),

    #[error("Add at least one payment method")]
    NoPaymentDetails,

    #[error("Payment method #{0} needs an amount greater than zero")]
    NonPositiveDetail(usize),

    #[error("Select at least one charge to apply this payment to")]
    NoAllocationSelected,

    #[error("Selected charge {0} needs an amount greater than zero")]
    NonPositiveAllocation(i64),

    #[error("Allocation of {amount} to charge {charge_id} exceeds its remaining balance of {balance}")]
    ExceedsBalance {
        charge_id: i64,
        amount: String,
        balance: String,
    },

    #[error("Allocated amount ({allocated}) does not match total payment amount ({total})")]
    AllocationMismatch { allocated: String, total: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormMessage {
    pub kind: MessageKind,
    pub text: String,
}

/// Form state after every pre-submit check has passed. Allocations are already
/// narrowed to selected rows with a positive amount.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayment {
    pub lease_id: i64,
    pub total_amount: f64,
    pub transaction_date: NaiveDate,
    pub details: Vec<PaymentDetail>,
    pub allocations: Vec<ChargeAllocation>,
    pub notes: Option<String>,
}

/// State behind the "record payment" screen.
///
/// Payment-method splits are the source of truth for the total: whenever the
/// stored total drifts from the sum of the splits it is overwritten, never the
/// other way round.
pub struct PaymentForm {
    pub lease_id: i64,
    total_amount: String,
    pub transaction_date: String,
    details: Vec<PaymentDetail>,
    next_detail_id: usize,
    charges: Vec<Charge>,
    allocations: Vec<ChargeAllocation>,
    pub notes: String,
    pub message: Option<FormMessage>,
    submitting: bool,
}

impl PaymentForm {
    pub fn new(lease_id: i64, today: NaiveDate) -> Self {
        let mut form = Self {
            lease_id,
            total_amount: String::new(),
            transaction_date: today.format("%Y-%m-%d").to_string(),
            details: Vec::new(),
            next_detail_id: 1,
            charges: Vec::new(),
            allocations: Vec::new(),
            notes: String::new(),
            message: None,
            submitting: false,
        };
        form.add_detail();
        form
    }

    /// Back to the initial empty state. The charge snapshot is kept so the
    /// allocation rows stay one-per-charge.
    pub fn reset(&mut self, today: NaiveDate) {
        let charges = std::mem::take(&mut self.charges);
        *self = Self::new(self.lease_id, today);
        self.set_charges(charges);
    }

    /// Replace the charge snapshot. Allocation rows are regenerated, one per charge.
    pub fn set_charges(&mut self, charges: Vec<Charge>) {
        let charges: Vec<Charge> = charges.into_iter().filter(|c| !c.is_paid()).collect();
        self.allocations = allocation::blank_allocations(&charges);
        self.charges = allocation::oldest_first(&charges);
    }

    pub fn charges(&self) -> &[Charge] {
        &self.charges
    }

    pub fn charge(&self, charge_id: i64) -> Option<&Charge> {
        self.charges.iter().find(|c| c.charge_id == charge_id)
    }

    pub fn details(&self) -> &[PaymentDetail] {
        &self.details
    }

    pub fn allocations(&self) -> &[ChargeAllocation] {
        &self.allocations
    }

    pub fn total_amount(&self) -> &str {
        &self.total_amount
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    // -- payment-method splits ------------------------------------------------

    pub fn add_detail(&mut self) -> usize {
        let id = self.next_detail_id;
        self.next_detail_id += 1;
        self.details.push(PaymentDetail {
            id,
            amount: 0.0,
            method: PaymentMethod::Cash,
            payment_type: PaymentType::Regular,
        });
        self.sync_total();
        id
    }

    /// Removing the last row is allowed; submission is blocked until one is added.
    pub fn remove_detail(&mut self, id: usize) {
        self.details.retain(|d| d.id != id);
        self.sync_total();
    }

    pub fn update_detail(&mut self, id: usize, field: DetailField) {
        if let Some(detail) = self.details.iter_mut().find(|d| d.id == id) {
            match field {
                DetailField::Amount(v) => detail.amount = v,
                DetailField::Method(m) => detail.method = m,
                DetailField::Type(t) => detail.payment_type = t,
            }
        }
        self.sync_total();
    }

    pub fn total_from_details(&self) -> f64 {
        allocation::round_cents(self.details.iter().map(|d| d.amount).sum())
    }

    fn sync_total(&mut self) {
        let derived = self.total_from_details();
        let current = parse_amount(&self.total_amount);
        let diverged = match current {
            Some(v) => (v - derived).abs() > TOLERANCE,
            None => true,
        };
        if diverged {
            self.total_amount = format!("{derived:.2}");
        }
    }

    pub fn total_value(&self) -> f64 {
        parse_amount(&self.total_amount).unwrap_or(0.0)
    }

    // -- allocations ----------------------------------------------------------

    pub fn update_allocation(&mut self, id: usize, field: AllocationField) {
        if let Some(alloc) = self.allocations.iter_mut().find(|a| a.id == id) {
            match field {
                AllocationField::Amount(v) => alloc.amount = v,
                AllocationField::Selected(s) => alloc.selected = s,
            }
        }
    }

    /// Set a row's amount from user input, capped at the charge's remaining
    /// balance. Returns the amount actually stored.
    pub fn set_allocation_amount(&mut self, id: usize, amount: f64) -> f64 {
        let balance = self
            .allocations
            .iter()
            .find(|a| a.id == id)
            .and_then(|a| self.charge(a.charge_id))
            .map(|c| c.balance_remaining);
        let stored = match balance {
            Some(b) => allocation::clamp_to_balance(amount, b),
            None => amount.max(0.0),
        };
        self.update_allocation(id, AllocationField::Amount(stored));
        stored
    }

    /// Toggle a row. Selecting an empty row pre-fills it with the smaller of the
    /// charge balance and what is still unallocated.
    pub fn toggle_allocation(&mut self, id: usize) {
        let remaining = self.summary().remaining.max(0.0);
        let Some(alloc) = self.allocations.iter().find(|a| a.id == id).cloned() else {
            return;
        };
        if alloc.selected {
            self.update_allocation(id, AllocationField::Selected(false));
            return;
        }
        let balance = self
            .charge(alloc.charge_id)
            .map(|c| c.balance_remaining)
            .unwrap_or(0.0);
        if alloc.amount <= 0.0 {
            let prefill = allocation::round_cents(balance.min(remaining));
            self.update_allocation(id, AllocationField::Amount(prefill));
        }
        self.update_allocation(id, AllocationField::Selected(true));
    }

    /// Re-run the oldest-first strategy. No-op while the total is not positive.
    pub fn auto_allocate(&mut self) {
        let total = self.total_value();
        if total <= 0.0 {
            return;
        }
        self.allocations = allocation::auto_allocate(total, &self.charges);
    }

    pub fn clear_allocations(&mut self) {
        allocation::clear_all(&mut self.allocations);
    }

    pub fn summary(&self) -> AllocationSummary {
        allocation::summarize(self.total_value(), &self.allocations)
    }

    /// Gate for the submit control.
    pub fn can_submit(&self) -> bool {
        if self.submitting {
            return false;
        }
        let any_selected = self.allocations.iter().any(|a| a.selected);
        any_selected
            && self.summary().is_fully_allocated()
            && self.allocations.iter().filter(|a| a.selected).all(|a| a.amount > 0.0)
            && allocation::within_balances(&self.allocations, &self.charges)
            && self.details.iter().any(|d| d.amount > 0.0)
    }

    // -- submission -----------------------------------------------------------

    /// Fail-fast pre-submit checks; the first violation is the one reported.
    pub fn validate(&self) -> Result<ValidatedPayment, PaymentValidationError> {
        let total = match parse_amount(&self.total_amount) {
            Some(v) if v > 0.0 => v,
            _ => return Err(PaymentValidationError::NonPositiveTotal),
        };

        let date_input = self.transaction_date.trim();
        if date_input.is_empty() {
            return Err(PaymentValidationError::MissingDate);
        }
        let transaction_date = parse_date(date_input)
            .ok_or_else(|| PaymentValidationError::InvalidDate(date_input.to_string()))?;

        if self.details.is_empty() {
            return Err(PaymentValidationError::NoPaymentDetails);
        }
        if let Some(pos) = self.details.iter().position(|d| d.amount <= 0.0) {
            return Err(PaymentValidationError::NonPositiveDetail(pos + 1));
        }

        let selected: Vec<&ChargeAllocation> =
            self.allocations.iter().filter(|a| a.selected).collect();
        if selected.is_empty() {
            return Err(PaymentValidationError::NoAllocationSelected);
        }
        if let Some(a) = selected.iter().find(|a| a.amount <= 0.0) {
            return Err(PaymentValidationError::NonPositiveAllocation(a.charge_id));
        }
        for a in &selected {
            if let Some(charge) = self.charge(a.charge_id) {
                if a.amount > charge.balance_remaining + TOLERANCE {
                    return Err(PaymentValidationError::ExceedsBalance {
                        charge_id: a.charge_id,
                        amount: money(a.amount),
                        balance: money(charge.balance_remaining),
                    });
                }
            }
        }

        let allocated = allocation::total_selected(&self.allocations);
        if (allocated - total).abs() >= TOLERANCE {
            return Err(PaymentValidationError::AllocationMismatch {
                allocated: money(allocated),
                total: money(total),
            });
        }

        let notes = self.notes.trim();
        Ok(ValidatedPayment {
            lease_id: self.lease_id,
            total_amount: total,
            transaction_date,
            details: self.details.clone(),
            allocations: selected.into_iter().cloned().collect(),
            notes: if notes.is_empty() { None } else { Some(notes.to_string()) },
        })
    }

    /// Claim the single in-flight slot. Returns false if a submission is already running.
    pub fn begin_submit(&mut self) -> bool {
        if self.submitting {
            return false;
        }
        self.submitting = true;
        true
    }

    pub fn end_submit(&mut self) {
        self.submitting = false;
    }

    pub fn set_error(&mut self, text: impl Into<String>) {
        self.message = Some(FormMessage {
            kind: MessageKind::Error,
            text: text.into(),
        });
    }

    pub fn set_success(&mut self, text: impl Into<String>) {
        self.message = Some(FormMessage {
            kind: MessageKind::Success,
            text: text.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChargeCategory;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
    }

    fn charge(id: i64, due: u32, balance: f64) -> Charge {
        Charge {
            charge_id: id,
            category: ChargeCategory::Rent,
            total_due: balance,
            amount_paid: 0.0,
            balance_remaining: balance,
            due_date: day(due),
        }
    }

    fn form_with(amounts: &[f64], charges: Vec<Charge>) -> PaymentForm {
        let mut form = PaymentForm::new(7, day(10));
        let first = form.details()[0].id;
        form.remove_detail(first);
        for amount in amounts {
            let id = form.add_detail();
            form.update_detail(id, DetailField::Amount(*amount));
        }
        form.set_charges(charges);
        form
    }

    #[test]
    fn test_total_follows_details() {
        let mut form = form_with(&[120.0, 30.0], vec![]);
        assert_eq!(form.total_amount(), "150.00");
        let ids: Vec<usize> = form.details().iter().map(|d| d.id).collect();
        form.update_detail(ids[0], DetailField::Amount(150.0));
        form.update_detail(ids[1], DetailField::Amount(0.0));
        assert_eq!(form.total_amount(), "150.00");
        assert_eq!(form.total_value(), 150.0);
    }

    #[test]
    fn test_new_form_has_one_blank_detail() {
        let form = PaymentForm::new(1, day(1));
        assert_eq!(form.details().len(), 1);
        assert_eq!(form.total_amount(), "0.00");
        assert_eq!(form.transaction_date, "2025-02-01");
    }

    #[test]
    fn test_allocations_one_per_charge_and_regenerated() {
        let mut form = form_with(&[10.0], vec![charge(1, 1, 5.0), charge(2, 2, 5.0)]);
        assert_eq!(form.allocations().len(), 2);
        form.set_charges(vec![charge(3, 1, 5.0)]);
        assert_eq!(form.allocations().len(), 1);
        assert_eq!(form.allocations()[0].charge_id, 3);
    }

    #[test]
    fn test_auto_allocate_then_validate() {
        let mut form = form_with(&[500.0], vec![charge(1, 1, 300.0), charge(2, 5, 300.0)]);
        form.auto_allocate();
        let valid = form.validate().unwrap();
        assert_eq!(valid.total_amount, 500.0);
        assert_eq!(valid.allocations.len(), 2);
        assert_eq!(valid.allocations[1].amount, 200.0);
        assert!(form.can_submit());
    }

    #[test]
    fn test_short_allocation_reports_both_figures() {
        let mut form = form_with(&[100.0], vec![charge(1, 1, 50.0)]);
        form.auto_allocate();
        let err = form.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Allocated amount ($50.00) does not match total payment amount ($100.00)"
        );
        assert!(!form.can_submit());
    }

    #[test]
    fn test_no_selection_is_rejected() {
        let form = form_with(&[100.0], vec![charge(1, 1, 200.0)]);
        assert_eq!(
            form.validate().unwrap_err(),
            PaymentValidationError::NoAllocationSelected
        );
    }

    #[test]
    fn test_first_violation_wins() {
        let mut form = form_with(&[], vec![]);
        form.transaction_date.clear();
        assert_eq!(form.validate().unwrap_err(), PaymentValidationError::NonPositiveTotal);

        let mut form = form_with(&[20.0], vec![]);
        form.transaction_date.clear();
        assert_eq!(form.validate().unwrap_err(), PaymentValidationError::MissingDate);

        form.transaction_date = "02/10/2025".into();
        assert!(matches!(
            form.validate().unwrap_err(),
            PaymentValidationError::InvalidDate(_)
        ));
    }

    #[test]
    fn test_zero_detail_row_rejected() {
        let form = form_with(&[20.0, 0.0], vec![charge(1, 1, 50.0)]);
        assert_eq!(
            form.validate().unwrap_err(),
            PaymentValidationError::NonPositiveDetail(2)
        );
    }

    #[test]
    fn test_removing_every_detail_blocks_submit() {
        let mut form = form_with(&[20.0], vec![charge(1, 1, 50.0)]);
        let id = form.details()[0].id;
        form.remove_detail(id);
        assert!(form.details().is_empty());
        assert_eq!(form.validate().unwrap_err(), PaymentValidationError::NonPositiveTotal);
    }

    #[test]
    fn test_selected_zero_amount_rejected() {
        let mut form = form_with(&[20.0], vec![charge(1, 1, 50.0)]);
        let id = form.allocations()[0].id;
        form.update_allocation(id, AllocationField::Selected(true));
        assert_eq!(
            form.validate().unwrap_err(),
            PaymentValidationError::NonPositiveAllocation(1)
        );
    }

    #[test]
    fn test_row_above_balance_rejected_even_when_total_matches() {
        let mut form = form_with(&[80.0], vec![charge(1, 1, 50.0), charge(2, 2, 50.0)]);
        let id = form.allocations()[0].id;
        form.update_allocation(id, AllocationField::Amount(80.0));
        form.update_allocation(id, AllocationField::Selected(true));
        assert!(matches!(
            form.validate().unwrap_err(),
            PaymentValidationError::ExceedsBalance { charge_id: 1, .. }
        ));
    }

    #[test]
    fn test_over_balance_row_blocks_submit() {
        let mut form = form_with(&[80.0], vec![charge(1, 1, 50.0), charge(2, 2, 50.0)]);
        let id = form.allocations()[0].id;
        form.update_allocation(id, AllocationField::Amount(80.0));
        form.update_allocation(id, AllocationField::Selected(true));
        assert!(form.summary().is_fully_allocated());
        assert!(!form.can_submit());

        assert_eq!(form.set_allocation_amount(id, 80.0), 50.0);
        assert_eq!(form.allocations()[0].amount, 50.0);
    }

    #[test]
    fn test_paid_charges_get_no_row() {
        let mut form = PaymentForm::new(7, day(10));
        form.set_charges(vec![charge(1, 1, 0.0), charge(2, 2, 40.0)]);
        assert_eq!(form.charges().len(), 1);
        assert_eq!(form.allocations()[0].charge_id, 2);
    }

    #[test]
    fn test_toggle_prefills_from_remaining() {
        let mut form = form_with(&[70.0], vec![charge(1, 1, 50.0), charge(2, 2, 50.0)]);
        let ids: Vec<usize> = form.allocations().iter().map(|a| a.id).collect();
        form.toggle_allocation(ids[0]);
        form.toggle_allocation(ids[1]);
        assert_eq!(form.allocations()[0].amount, 50.0);
        assert_eq!(form.allocations()[1].amount, 20.0);
        assert!(form.summary().is_fully_allocated());
        form.toggle_allocation(ids[1]);
        assert!(!form.allocations()[1].selected);
    }

    #[test]
    fn test_auto_allocate_noop_without_total() {
        let mut form = form_with(&[], vec![charge(1, 1, 50.0)]);
        let id = form.allocations()[0].id;
        form.update_allocation(id, AllocationField::Amount(12.0));
        form.auto_allocate();
        assert_eq!(form.allocations()[0].amount, 12.0);
    }

    #[test]
    fn test_single_submission_in_flight() {
        let mut form = form_with(&[10.0], vec![]);
        assert!(form.begin_submit());
        assert!(!form.begin_submit());
        assert!(!form.can_submit());
        form.end_submit();
        assert!(form.begin_submit());
    }

    #[test]
    fn test_reset_keeps_charge_rows() {
        let mut form = form_with(&[50.0], vec![charge(1, 1, 50.0)]);
        form.auto_allocate();
        form.notes = "cheque #12".into();
        form.reset(day(11));
        assert_eq!(form.total_amount(), "0.00");
        assert!(form.notes.is_empty());
        assert_eq!(form.allocations().len(), 1);
        assert!(!form.allocations()[0].selected);
        assert_eq!(form.transaction_date, "2025-02-11");
    }
}

//! Matching a payment against outstanding charges.
//!
//! A payment is spread over the lease's unpaid charges as one [`ChargeAllocation`]
//! per charge. [`auto_allocate`] fills the oldest charges first; [`summarize`]
//! tells the payment screen whether the selected amounts account for the whole
//! payment. Nothing here is cached: callers re-derive on every change.

use crate::models::Charge;

/// Currency rounding tolerance used for every "do these amounts match" check.
pub const TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeAllocation {
    pub id: usize,
    pub charge_id: i64,
    pub amount: f64,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStatus {
    Full,
    Partial,
    Over,
}

impl AllocationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AllocationStatus::Full => "Fully allocated",
            AllocationStatus::Partial => "Partially allocated",
            AllocationStatus::Over => "Over-allocated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationSummary {
    pub total: f64,
    pub total_allocated: f64,
    pub remaining: f64,
    pub status: AllocationStatus,
}

impl AllocationSummary {
    pub fn is_fully_allocated(&self) -> bool {
        self.status == AllocationStatus::Full
    }
}

pub fn round_cents(val: f64) -> f64 {
    (val * 100.0).round() / 100.0
}

/// Charges ordered oldest due date first. Equal due dates fall back to charge id
/// ascending so the order never depends on how the rows arrived.
pub fn oldest_first(charges: &[Charge]) -> Vec<Charge> {
    let mut sorted = charges.to_vec();
    sorted.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then(a.charge_id.cmp(&b.charge_id))
    });
    sorted
}

/// One unselected, zero-amount allocation per charge, in oldest-first order.
pub fn blank_allocations(charges: &[Charge]) -> Vec<ChargeAllocation> {
    oldest_first(charges)
        .iter()
        .enumerate()
        .map(|(i, c)| ChargeAllocation {
            id: i + 1,
            charge_id: c.charge_id,
            amount: 0.0,
            selected: false,
        })
        .collect()
}

/// Spread `total` over `charges`, filling each charge's remaining balance before
/// moving on to the next-oldest. Charges reached after the money runs out stay
/// unselected at zero. A non-positive total allocates nothing.
pub fn auto_allocate(total: f64, charges: &[Charge]) -> Vec<ChargeAllocation> {
    let mut allocations = blank_allocations(charges);
    if total <= 0.0 {
        return allocations;
    }

    let sorted = oldest_first(charges);
    let mut remaining = round_cents(total);
    for (alloc, charge) in allocations.iter_mut().zip(sorted.iter()) {
        if remaining <= 0.0 {
            break;
        }
        let amount = round_cents(charge.balance_remaining.min(remaining)).max(0.0);
        alloc.amount = amount;
        alloc.selected = amount > 0.0;
        remaining = round_cents(remaining - amount);
    }
    allocations
}

/// Cap a typed amount at what the charge still owes. Negative input becomes zero.
pub fn clamp_to_balance(amount: f64, balance_remaining: f64) -> f64 {
    round_cents(amount.min(balance_remaining.max(0.0)).max(0.0))
}

/// True when no selected row asks for more than its charge's remaining balance.
/// Rows whose charge is unknown are left to the submit-time checks.
pub fn within_balances(allocations: &[ChargeAllocation], charges: &[Charge]) -> bool {
    allocations.iter().filter(|a| a.selected).all(|a| {
        charges
            .iter()
            .find(|c| c.charge_id == a.charge_id)
            .map_or(true, |c| a.amount <= c.balance_remaining + TOLERANCE)
    })
}

/// Deselect everything and zero every amount.
pub fn clear_all(allocations: &mut [ChargeAllocation]) {
    for alloc in allocations.iter_mut() {
        alloc.selected = false;
        alloc.amount = 0.0;
    }
}

pub fn total_selected(allocations: &[ChargeAllocation]) -> f64 {
    round_cents(
        allocations
            .iter()
            .filter(|a| a.selected)
            .map(|a| a.amount)
            .sum(),
    )
}

pub fn summarize(total: f64, allocations: &[ChargeAllocation]) -> AllocationSummary {
    let total_allocated = total_selected(allocations);
    let remaining = round_cents(total - total_allocated);
    let status = if remaining.abs() < TOLERANCE {
        AllocationStatus::Full
    } else if remaining < 0.0 {
        AllocationStatus::Over
    } else {
        AllocationStatus::Partial
    };
    AllocationSummary {
        total,
        total_allocated,
        remaining,
        status,
    }
}

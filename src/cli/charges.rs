use comfy_table::{Cell, Table};

use crate::allocation::oldest_first;
use crate::cli::{cli_session, finish, today};
use crate::error::{LeaseDeskError, Result};
use crate::fmt::money;
use crate::lease_forms::{self, ChargeForm};
use crate::models::{Charge, ChargeCategory};
use crate::settings::load_settings;

pub(crate) fn charge_table(charges: &[Charge]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Charge", "Category", "Due", "Total", "Paid", "Remaining"]);
    for c in charges {
        table.add_row(vec![
            Cell::new(c.charge_id),
            Cell::new(c.category),
            Cell::new(c.due_date),
            Cell::new(money(c.total_due)),
            Cell::new(money(c.amount_paid)),
            Cell::new(money(c.balance_remaining)),
        ]);
    }
    table
}

pub fn list(lease_id: i64) -> Result<()> {
    let api = load_settings().api()?;
    let charges = oldest_first(&api.get_unpaid_charges_for_lease(lease_id)?);
    if charges.is_empty() {
        println!("Lease #{lease_id} has no unpaid charges.");
        return Ok(());
    }
    let outstanding: f64 = charges.iter().map(|c| c.balance_remaining).sum();
    println!("Unpaid charges for lease #{lease_id}\n{}", charge_table(&charges));
    println!("Outstanding: {}", money(outstanding));
    Ok(())
}

pub fn add(
    user: Option<&str>,
    lease_id: i64,
    amount: &str,
    category: &str,
    due: &str,
    description: Option<&str>,
) -> Result<()> {
    let category = ChargeCategory::parse(category).ok_or_else(|| {
        LeaseDeskError::Other(format!(
            "Unknown category '{category}'. Use one of: rent, utilities, deposit, late_fee, maintenance, other"
        ))
    })?;
    let mut form = ChargeForm::new(lease_id, today());
    form.amount = amount.to_string();
    form.category = category;
    form.due_date = due.to_string();
    form.description = description.unwrap_or_default().to_string();

    let settings = load_settings();
    let session = cli_session(&settings, user);
    session.require_editor()?;
    form.validate(session.username()?)?;
    finish(lease_forms::submit_charge(&settings.api()?, &session, &form))
}

use comfy_table::{Cell, Table};

use crate::cli::{cli_session, finish, today};
use crate::error::{LeaseDeskError, Result};
use crate::fmt::{money, parse_amount};
use crate::models::{PaymentMethod, PaymentType};
use crate::payment_form::{AllocationField, DetailField, PaymentForm};
use crate::settings::load_settings;
use crate::submission::submit_payment;

#[derive(Debug, PartialEq)]
struct Split {
    amount: f64,
    method: PaymentMethod,
    payment_type: PaymentType,
}

/// `AMOUNT:METHOD[:TYPE]`, type defaulting to regular.
fn parse_split(raw: &str) -> Result<Split> {
    let bad = || {
        LeaseDeskError::Other(format!(
            "Invalid --split '{raw}'. Expected AMOUNT:METHOD[:TYPE], e.g. 250:cash or 100:check:deposit"
        ))
    };
    let mut parts = raw.split(':');
    let amount = parts.next().and_then(parse_amount).ok_or_else(bad)?;
    let method = parts.next().and_then(PaymentMethod::parse).ok_or_else(bad)?;
    let payment_type = match parts.next() {
        Some(t) => PaymentType::parse(t).ok_or_else(bad)?,
        None => PaymentType::Regular,
    };
    if parts.next().is_some() {
        return Err(bad());
    }
    Ok(Split {
        amount,
        method,
        payment_type,
    })
}

/// `CHARGE_ID:AMOUNT`.
fn parse_allocation(raw: &str) -> Result<(i64, f64)> {
    let bad = || LeaseDeskError::Other(format!("Invalid --allocate '{raw}'. Expected CHARGE_ID:AMOUNT"));
    let (id, amount) = raw.split_once(':').ok_or_else(bad)?;
    let id: i64 = id.trim().parse().map_err(|_| bad())?;
    let amount = parse_amount(amount).ok_or_else(bad)?;
    Ok((id, amount))
}

fn fill_details(form: &mut PaymentForm, splits: &[Split]) {
    for (i, split) in splits.iter().enumerate() {
        let existing = form.details().get(i).map(|d| d.id);
        let id = existing.unwrap_or_else(|| form.add_detail());
        form.update_detail(id, DetailField::Amount(split.amount));
        form.update_detail(id, DetailField::Method(split.method));
        form.update_detail(id, DetailField::Type(split.payment_type));
    }
}

pub fn record(
    user: Option<&str>,
    lease_id: i64,
    date: &str,
    splits: &[String],
    allocations: &[String],
    auto: bool,
    notes: Option<&str>,
) -> Result<()> {
    let splits = splits.iter().map(|s| parse_split(s)).collect::<Result<Vec<_>>>()?;
    let requested = allocations
        .iter()
        .map(|a| parse_allocation(a))
        .collect::<Result<Vec<_>>>()?;

    let settings = load_settings();
    let session = cli_session(&settings, user);
    session.require_editor()?;

    let today = today();
    let mut form = PaymentForm::new(lease_id, today);
    form.transaction_date = date.to_string();
    form.notes = notes.unwrap_or_default().to_string();
    fill_details(&mut form, &splits);

    if requested.is_empty() && !auto {
        // No charges are loaded yet, so this reports the first local problem.
        form.validate()?;
    }

    let api = settings.api()?;
    form.set_charges(api.get_unpaid_charges_for_lease(lease_id)?);
    if form.charges().is_empty() {
        return Err(LeaseDeskError::Other(format!(
            "Lease #{lease_id} has no unpaid charges to apply a payment to"
        )));
    }

    if auto {
        form.auto_allocate();
    } else {
        for (charge_id, amount) in &requested {
            let row = form
                .allocations()
                .iter()
                .find(|a| a.charge_id == *charge_id)
                .map(|a| a.id)
                .ok_or_else(|| {
                    LeaseDeskError::Other(format!(
                        "Charge {charge_id} is not an unpaid charge of lease #{lease_id}"
                    ))
                })?;
            form.update_allocation(row, AllocationField::Amount(*amount));
            form.update_allocation(row, AllocationField::Selected(true));
        }
    }

    let planned: Vec<(i64, f64)> = form
        .allocations()
        .iter()
        .filter(|a| a.selected && a.amount > 0.0)
        .map(|a| (a.charge_id, a.amount))
        .collect();
    let total = form.total_value();

    finish(submit_payment(&api, &session, &mut form, today))?;

    let mut table = Table::new();
    table.set_header(vec!["Charge", "Applied"]);
    for (charge_id, amount) in &planned {
        table.add_row(vec![Cell::new(charge_id), Cell::new(money(*amount))]);
    }
    println!("{table}");
    println!("Total: {}", money(total));
    Ok(())
}

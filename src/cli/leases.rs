use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{cli_session, finish, today};
use crate::error::{LeaseDeskError, Result};
use crate::fmt::{date_or_dash, money};
use crate::lease_forms::{self, AmendLeaseForm, CreateLeaseForm, TerminateLeaseForm};
use crate::models::{ChargeFrequency, LeaseOverview, LeaseStatus, PaymentStatus};
use crate::rpc::{LeaseApi, RpcTransport};
use crate::settings::load_settings;

pub(crate) fn payment_status_text(status: PaymentStatus) -> String {
    let label = status.as_str();
    match status {
        PaymentStatus::Paid | PaymentStatus::Current => label.green().to_string(),
        PaymentStatus::Partial => label.yellow().to_string(),
        PaymentStatus::Overdue => label.red().bold().to_string(),
    }
}

fn lease_status_text(status: LeaseStatus) -> String {
    let label = status.as_str();
    match status {
        LeaseStatus::Active => label.green().to_string(),
        LeaseStatus::Pending => label.cyan().to_string(),
        LeaseStatus::Expired | LeaseStatus::Terminated => label.dimmed().to_string(),
    }
}

/// The overview row for one lease, or `UnknownLease`.
pub(crate) fn find_lease<T: RpcTransport>(api: &LeaseApi<T>, lease_id: i64) -> Result<LeaseOverview> {
    api.get_leases_overview()?
        .into_iter()
        .find(|l| l.lease_id == lease_id)
        .ok_or(LeaseDeskError::UnknownLease(lease_id))
}

fn lease_table(leases: &[LeaseOverview]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Asset", "Renter", "Start", "End", "Status", "Payment", "Base", "Balance", "Overdue",
    ]);
    for l in leases {
        table.add_row(vec![
            Cell::new(l.lease_id),
            Cell::new(&l.asset_name),
            Cell::new(&l.renter_name),
            Cell::new(l.start_date),
            Cell::new(date_or_dash(l.end_date)),
            Cell::new(lease_status_text(l.lease_status)),
            Cell::new(payment_status_text(l.payment_status)),
            Cell::new(format!("{} {}", money(l.base_charge_amount), l.charge_frequency)),
            Cell::new(money(l.total_balance)),
            Cell::new(if l.overdue_balance > 0.0 {
                money(l.overdue_balance).red().to_string()
            } else {
                money(0.0)
            }),
        ]);
    }
    table
}

pub fn list(status: Option<&str>) -> Result<()> {
    let filter = match status {
        Some(s) => Some(LeaseStatus::parse(s).ok_or_else(|| {
            LeaseDeskError::Other(format!(
                "Unknown lease status '{s}'. Use one of: active, pending, expired, terminated"
            ))
        })?),
        None => None,
    };
    let api = load_settings().api()?;
    let leases: Vec<LeaseOverview> = api
        .get_leases_overview()?
        .into_iter()
        .filter(|l| filter.map_or(true, |f| l.lease_status == f))
        .collect();

    if leases.is_empty() {
        println!("No leases found.");
        return Ok(());
    }
    println!("Leases\n{}", lease_table(&leases));
    Ok(())
}

pub fn show(lease_id: i64) -> Result<()> {
    let api = load_settings().api()?;
    let lease = find_lease(&api, lease_id)?;

    println!("{}", format!("Lease #{}", lease.lease_id).bold());
    println!("Asset:      {} (#{})", lease.asset_name, lease.asset_id);
    println!("Renter:     {} (#{})", lease.renter_name, lease.renter_id);
    println!("Period:     {} to {}", lease.start_date, date_or_dash(lease.end_date));
    println!("Status:     {}", lease_status_text(lease.lease_status));
    println!("Payment:    {}", payment_status_text(lease.payment_status));
    println!("Base:       {} {}", money(lease.base_charge_amount), lease.charge_frequency);
    println!("Balance:    {}", money(lease.total_balance));
    println!("Overdue:    {}", money(lease.overdue_balance));

    if lease.charge_intervals.is_empty() {
        println!("\nNo charge intervals.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["From", "To", "Amount", "Paid"]);
    for interval in &lease.charge_intervals {
        table.add_row(vec![
            Cell::new(interval.start_date),
            Cell::new(interval.end_date),
            Cell::new(money(interval.amount)),
            Cell::new(if interval.is_paid { "yes".green().to_string() } else { "no".yellow().to_string() }),
        ]);
    }
    println!("\nCharge intervals\n{table}");
    Ok(())
}

pub fn create(
    user: Option<&str>,
    asset: &str,
    renter: &str,
    start: &str,
    end: Option<&str>,
    amount: &str,
    frequency: &str,
) -> Result<()> {
    let charge_frequency = ChargeFrequency::parse(frequency).ok_or_else(|| {
        LeaseDeskError::Other(format!(
            "Unknown frequency '{frequency}'. Use one of: monthly, quarterly, yearly, once"
        ))
    })?;
    let form = CreateLeaseForm {
        asset_id: asset.to_string(),
        renter_id: renter.to_string(),
        start_date: start.to_string(),
        end_date: end.unwrap_or_default().to_string(),
        base_charge_amount: amount.to_string(),
        charge_frequency: Some(charge_frequency),
    };
    let settings = load_settings();
    let session = cli_session(&settings, user);
    session.require_editor()?;
    form.validate(session.username()?)?;
    finish(lease_forms::submit_create(&settings.api()?, &session, &form))
}

pub fn amend(user: Option<&str>, lease_id: i64, end: Option<&str>, amount: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let session = cli_session(&settings, user);
    session.require_editor()?;
    if end.is_none() && amount.is_none() {
        return Err(lease_forms::LeaseFormError::NothingToChange.into());
    }
    let api = settings.api()?;
    let lease = find_lease(&api, lease_id)?;
    let mut form = AmendLeaseForm::for_lease(&lease);
    form.new_end_date = end.unwrap_or_default().to_string();
    form.new_base_charge_amount = amount.unwrap_or_default().to_string();
    finish(lease_forms::submit_amend(&api, &session, &form))
}

pub fn terminate(user: Option<&str>, lease_id: i64, date: &str, reason: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let session = cli_session(&settings, user);
    session.require_editor()?;
    let api = settings.api()?;
    let lease = find_lease(&api, lease_id)?;
    let mut form = TerminateLeaseForm::for_lease(&lease, today());
    form.termination_date = date.to_string();
    form.reason = reason.unwrap_or_default().to_string();
    finish(lease_forms::submit_terminate(&api, &session, &form))
}

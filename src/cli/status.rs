use crate::error::Result;
use crate::fmt::money;
use crate::models::{LeaseStatus, PaymentStatus};
use crate::settings::{load_settings, settings_file_exists, settings_path};

pub fn run(user: Option<&str>) -> Result<()> {
    let settings = load_settings();

    println!("Settings:   {}", settings_path().display());
    println!("RPC URL:    {}", if settings.rpc_url.is_empty() { "(not set)" } else { &settings.rpc_url });
    println!("API key:    {}", if settings.api_key.is_empty() { "(not set)" } else { "set" });
    println!("Manager:    {}", if settings.manager_name.is_empty() { "(not set)" } else { &settings.manager_name });
    println!("User:       {}", user.unwrap_or("(not set)"));

    if settings.rpc_url.is_empty() {
        println!();
        if settings_file_exists() {
            println!("No RPC URL configured. Run `leasedesk init --rpc-url <url>`.");
        } else {
            println!("Not set up yet. Run `leasedesk init` to configure.");
        }
        return Ok(());
    }

    let api = settings.api()?;
    let leases = api.get_leases_overview()?;

    let count = |s: LeaseStatus| leases.iter().filter(|l| l.lease_status == s).count();
    let overdue = leases
        .iter()
        .filter(|l| l.payment_status == PaymentStatus::Overdue)
        .count();
    let balance: f64 = leases.iter().map(|l| l.total_balance).sum();
    let overdue_balance: f64 = leases.iter().map(|l| l.overdue_balance).sum();

    println!();
    println!("Leases:        {}", leases.len());
    println!("  Active:      {}", count(LeaseStatus::Active));
    println!("  Pending:     {}", count(LeaseStatus::Pending));
    println!("  Expired:     {}", count(LeaseStatus::Expired));
    println!("  Terminated:  {}", count(LeaseStatus::Terminated));
    println!("Overdue:       {overdue}");
    println!("Outstanding:   {}", money(balance));
    println!("Past due:      {}", money(overdue_balance));
    Ok(())
}

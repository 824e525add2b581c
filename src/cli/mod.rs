pub mod charges;
pub mod dashboard;
pub mod form_screen;
pub mod init;
pub mod leases;
pub mod payment_screen;
pub mod payments;
pub mod status;
pub mod user_manager;
pub mod users;

use std::io::Write;

use clap::{Parser, Subcommand};

use colored::Colorize;

use crate::error::Result;
use crate::session::Session;
use crate::settings::Settings;
use crate::submission::SubmitOutcome;

/// Session for a one-shot command: the manager name from settings and the
/// `--user` name, unverified.
pub(crate) fn cli_session(settings: &Settings, user: Option<&str>) -> Session {
    let mut session = Session::new(&settings.manager_name);
    if let Some(name) = user {
        session.assume_user(name);
    }
    session
}

/// Print a successful outcome in green; anything else becomes the command's error.
pub(crate) fn finish(outcome: SubmitOutcome) -> Result<()> {
    let message = outcome.into_result()?;
    println!("{}", message.green());
    Ok(())
}

pub(crate) fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

pub(crate) fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

#[derive(Parser)]
#[command(
    name = "leasedesk",
    version,
    about = "Lease administration from the terminal: leases, charges, payments and user roles."
)]
pub struct Cli {
    /// Act as this user for changes (not needed for the dashboard, which asks you to sign in)
    #[arg(long, global = true, env = "LEASEDESK_USER")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure the RPC endpoint, API key and manager name.
    Init {
        /// Base URL of the RPC endpoint, e.g. https://db.example.com/rest/v1
        #[arg(long = "rpc-url")]
        rpc_url: Option<String>,
        /// Name recorded as the manager on payments
        #[arg(long)]
        manager: Option<String>,
    },
    /// Show the configured endpoint and a lease summary.
    Status,
    /// List, inspect and change leases.
    Leases {
        #[command(subcommand)]
        command: LeasesCommands,
    },
    /// List unpaid charges or add a charge to a lease.
    Charges {
        #[command(subcommand)]
        command: ChargesCommands,
    },
    /// Record payments against a lease's charges.
    Payments {
        #[command(subcommand)]
        command: PaymentsCommands,
    },
    /// Manage sub-users and their roles.
    Users {
        #[command(subcommand)]
        command: UsersCommands,
    },
    /// Open the interactive lease board.
    Dashboard,
    /// Print shell completions.
    Completions {
        /// Shell to generate for: bash, zsh, fish, powershell, elvish
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum LeasesCommands {
    /// List leases with their balances.
    List {
        /// Only leases with this status: active, pending, expired, terminated
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one lease with its charge intervals.
    Show {
        lease_id: i64,
    },
    /// Create a lease.
    Create {
        /// Asset ID
        #[arg(long)]
        asset: String,
        /// Renter ID
        #[arg(long)]
        renter: String,
        /// Start date: YYYY-MM-DD
        #[arg(long)]
        start: String,
        /// End date: YYYY-MM-DD (open-ended if omitted)
        #[arg(long)]
        end: Option<String>,
        /// Base charge amount
        #[arg(long)]
        amount: String,
        /// Charge frequency: monthly, quarterly, yearly, once
        #[arg(long, default_value = "monthly")]
        frequency: String,
    },
    /// Change a lease's end date and/or base charge.
    Amend {
        lease_id: i64,
        /// New end date: YYYY-MM-DD
        #[arg(long)]
        end: Option<String>,
        /// New base charge amount
        #[arg(long)]
        amount: Option<String>,
    },
    /// Terminate a lease.
    Terminate {
        lease_id: i64,
        /// Termination date: YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// Reason for termination
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ChargesCommands {
    /// List unpaid charges, oldest first.
    List {
        lease_id: i64,
    },
    /// Add a charge to a lease.
    Add {
        lease_id: i64,
        /// Charge amount
        #[arg(long)]
        amount: String,
        /// Category: rent, utilities, deposit, late_fee, maintenance, other
        #[arg(long)]
        category: String,
        /// Due date: YYYY-MM-DD
        #[arg(long)]
        due: String,
        /// Free-text description
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PaymentsCommands {
    /// Record a payment and allocate it to unpaid charges.
    Record {
        lease_id: i64,
        /// Transaction date: YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// Payment split AMOUNT:METHOD[:TYPE], repeatable (e.g. 250:cash 100:check:deposit)
        #[arg(long = "split", required = true, num_args = 1..)]
        splits: Vec<String>,
        /// Allocation CHARGE_ID:AMOUNT, repeatable
        #[arg(long = "allocate", num_args = 1.., conflicts_with = "auto")]
        allocations: Vec<String>,
        /// Allocate oldest charges first
        #[arg(long)]
        auto: bool,
        /// Notes stored with the payment
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum UsersCommands {
    /// Add a sub-user (password prompted).
    Add {
        name: String,
        /// Role: admin, manager, read_only
        #[arg(long = "type")]
        user_type: String,
    },
    /// Delete a sub-user.
    Delete {
        name: String,
    },
    /// Check a user's password and show their role.
    Verify {
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_payment_record_parses_repeated_flags() {
        let cli = Cli::try_parse_from([
            "leasedesk", "--user", "ops", "payments", "record", "7", "--date", "2025-03-01",
            "--split", "250:cash", "100:check", "--allocate", "11:350",
        ])
        .unwrap();
        assert_eq!(cli.user.as_deref(), Some("ops"));
        match cli.command {
            Some(Commands::Payments {
                command: PaymentsCommands::Record { lease_id, splits, allocations, auto, .. },
            }) => {
                assert_eq!(lease_id, 7);
                assert_eq!(splits, vec!["250:cash", "100:check"]);
                assert_eq!(allocations, vec!["11:350"]);
                assert!(!auto);
            }
            _ => panic!("expected payments record"),
        }
    }

    #[test]
    fn test_auto_conflicts_with_manual_allocation() {
        let res = Cli::try_parse_from([
            "leasedesk", "payments", "record", "7", "--date", "2025-03-01", "--split", "10:cash",
            "--allocate", "1:10", "--auto",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["leasedesk"]).unwrap();
        assert!(cli.command.is_none());
    }
}

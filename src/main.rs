mod allocation;
mod cli;
mod error;
mod events;
mod fmt;
mod lease_forms;
mod models;
mod payment_form;
mod remote_error;
mod rpc;
mod session;
mod settings;
mod submission;
mod tui;
mod users;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{ChargesCommands, Cli, Commands, LeasesCommands, PaymentsCommands, UsersCommands};

const LOG_ENV: &str = "LEASEDESK_LOG";

/// Log to stderr. The dashboard owns the terminal, so it only gets a
/// subscriber when logging was asked for explicitly.
fn init_logging(interactive: bool) {
    let explicit = std::env::var_os(LOG_ENV).is_some();
    if interactive && !explicit {
        return;
    }
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let user = cli.user.as_deref();

    let interactive = matches!(cli.command, None | Some(Commands::Dashboard));
    init_logging(interactive);

    let result = match cli.command {
        None | Some(Commands::Dashboard) => cli::dashboard::run(user),
        Some(Commands::Init { rpc_url, manager }) => cli::init::run(rpc_url, manager),
        Some(Commands::Status) => cli::status::run(user),
        Some(Commands::Leases { command }) => match command {
            LeasesCommands::List { status } => cli::leases::list(status.as_deref()),
            LeasesCommands::Show { lease_id } => cli::leases::show(lease_id),
            LeasesCommands::Create {
                asset,
                renter,
                start,
                end,
                amount,
                frequency,
            } => cli::leases::create(user, &asset, &renter, &start, end.as_deref(), &amount, &frequency),
            LeasesCommands::Amend { lease_id, end, amount } => {
                cli::leases::amend(user, lease_id, end.as_deref(), amount.as_deref())
            }
            LeasesCommands::Terminate { lease_id, date, reason } => {
                cli::leases::terminate(user, lease_id, &date, reason.as_deref())
            }
        },
        Some(Commands::Charges { command }) => match command {
            ChargesCommands::List { lease_id } => cli::charges::list(lease_id),
            ChargesCommands::Add {
                lease_id,
                amount,
                category,
                due,
                description,
            } => cli::charges::add(user, lease_id, &amount, &category, &due, description.as_deref()),
        },
        Some(Commands::Payments { command }) => match command {
            PaymentsCommands::Record {
                lease_id,
                date,
                splits,
                allocations,
                auto,
                notes,
            } => cli::payments::record(user, lease_id, &date, &splits, &allocations, auto, notes.as_deref()),
        },
        Some(Commands::Users { command }) => match command {
            UsersCommands::Add { name, user_type } => cli::users::add(user, &name, &user_type),
            UsersCommands::Delete { name } => cli::users::delete(user, &name),
            UsersCommands::Verify { name } => cli::users::verify(&name),
        },
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "leasedesk", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

use zeroize::Zeroize;

use crate::cli::prompt;
use crate::error::Result;
use crate::settings::{load_file_settings, save_settings, settings_path};

/// Write settings. With no flags the endpoint, manager name and API key are
/// asked for interactively; with flags only the given values change.
pub fn run(rpc_url: Option<String>, manager: Option<String>) -> Result<()> {
    let mut settings = load_file_settings();
    let interactive = rpc_url.is_none() && manager.is_none();

    if let Some(url) = rpc_url {
        settings.rpc_url = url.trim().trim_end_matches('/').to_string();
    }
    if let Some(name) = manager {
        settings.manager_name = name.trim().to_string();
    }

    if interactive {
        let current = if settings.rpc_url.is_empty() { "none" } else { settings.rpc_url.as_str() };
        let url = prompt(&format!("RPC URL [{current}]: "))?;
        if !url.is_empty() {
            settings.rpc_url = url.trim_end_matches('/').to_string();
        }

        let name = prompt(&format!("Manager name [{}]: ", settings.manager_name))?;
        if !name.is_empty() {
            settings.manager_name = name;
        }

        let mut key = rpassword::prompt_password("API key (blank keeps current): ")?;
        if !key.trim().is_empty() {
            settings.api_key = key.trim().to_string();
        }
        key.zeroize();
    }

    save_settings(&settings)?;
    tracing::info!(path = %settings_path().display(), "settings saved");

    println!("Saved settings to {}", settings_path().display());
    if settings.rpc_url.is_empty() {
        println!("No RPC URL set yet. Run `leasedesk init --rpc-url <url>`.");
    }
    Ok(())
}

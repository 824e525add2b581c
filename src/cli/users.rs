use colored::Colorize;
use zeroize::Zeroize;

use crate::cli::{cli_session, finish};
use crate::error::{LeaseDeskError, Result};
use crate::models::UserType;
use crate::rpc::{HttpTransport, LeaseApi};
use crate::session::Session;
use crate::settings::load_settings;
use crate::users::{self, NewUserForm};

/// The user panel sits behind the main account password.
fn unlock(api: &LeaseApi<HttpTransport>) -> Result<()> {
    let mut password = rpassword::prompt_password("Account password: ")?;
    let outcome = users::unlock_panel(api, &password);
    password.zeroize();
    outcome.into_result().map(|_| ())
}

fn admin_session(user: Option<&str>) -> Result<(LeaseApi<HttpTransport>, Session)> {
    let settings = load_settings();
    let session = cli_session(&settings, user);
    session.username()?;
    Ok((settings.api()?, session))
}

pub fn add(user: Option<&str>, name: &str, user_type: &str) -> Result<()> {
    let user_type = UserType::parse(user_type).ok_or_else(|| {
        LeaseDeskError::Other(format!(
            "Unknown user type '{user_type}'. Use one of: admin, manager, read_only"
        ))
    })?;
    let (api, session) = admin_session(user)?;
    unlock(&api)?;

    let mut form = NewUserForm::new();
    form.name = name.to_string();
    form.user_type = user_type;
    form.password = rpassword::prompt_password(format!("Password for {name}: "))?;
    form.validate()?;
    let mut confirm = rpassword::prompt_password("Confirm password: ")?;
    let matches = confirm == form.password;
    confirm.zeroize();
    if !matches {
        return Err(LeaseDeskError::Other("Passwords do not match".into()));
    }

    let outcome = users::add_user(&api, &session, &form);
    form.clear();
    finish(outcome)
}

pub fn delete(user: Option<&str>, name: &str) -> Result<()> {
    let (api, session) = admin_session(user)?;
    unlock(&api)?;
    finish(users::delete_user(&api, &session, name))
}

pub fn verify(name: &str) -> Result<()> {
    let settings = load_settings();
    let api = settings.api()?;
    let mut session = Session::new(&settings.manager_name);
    let mut password = rpassword::prompt_password(format!("Password for {name}: "))?;
    let result = session.login(&api, name, &password).map(|u| u.user_type);
    password.zeroize();

    let role = result?;
    println!(
        "{} {}",
        "Verified:".green(),
        match role {
            Some(t) => format!("{name} ({t})"),
            None => name.to_string(),
        }
    );
    Ok(())
}

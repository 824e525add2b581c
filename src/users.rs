//! Sub-user management: the role panel behind the account password.

use zeroize::Zeroize;

use crate::error::LeaseDeskError;
use crate::lease_forms::LeaseFormError;
use crate::models::UserType;
use crate::rpc::{LeaseApi, RpcTransport};
use crate::session::Session;
use crate::submission::{interpret, outcome_parts, SubmitOutcome};

pub const MIN_PASSWORD_LEN: usize = 4;

pub struct NewUserForm {
    pub name: String,
    pub password: String,
    pub user_type: UserType,
}

impl NewUserForm {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            password: String::new(),
            user_type: UserType::Manager,
        }
    }

    pub fn validate(&self) -> Result<(), LeaseFormError> {
        if self.name.trim().is_empty() {
            return Err(LeaseFormError::Required("User name"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(LeaseFormError::TooShort {
                field: "Password",
                min: MIN_PASSWORD_LEN,
            });
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.name.clear();
        self.password.zeroize();
        self.user_type = UserType::Manager;
    }
}

impl Drop for NewUserForm {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

fn require_admin(session: &Session) -> Result<(), LeaseDeskError> {
    session.username()?;
    if session.can_manage_users() {
        Ok(())
    } else {
        Err(LeaseDeskError::Rejected(
            "Only administrators can manage users".into(),
        ))
    }
}

/// Check the main account password before the panel opens.
pub fn unlock_panel<T: RpcTransport>(api: &LeaseApi<T>, password: &str) -> SubmitOutcome {
    if password.is_empty() {
        return SubmitOutcome::Blocked(LeaseFormError::Required("Account password").into());
    }
    interpret(
        api.validate_rm_account_password(password).map(outcome_parts),
        "Account verified",
    )
}

pub fn add_user<T: RpcTransport>(api: &LeaseApi<T>, session: &Session, form: &NewUserForm) -> SubmitOutcome {
    if let Err(e) = require_admin(session) {
        return SubmitOutcome::Blocked(e);
    }
    if let Err(e) = form.validate() {
        return SubmitOutcome::Blocked(e.into());
    }
    let name = form.name.trim();
    let outcome = interpret(
        api.add_rm_sub_user(name, &form.password, form.user_type)
            .map(outcome_parts),
        "User added",
    );
    tracing::info!(user = name, role = %form.user_type, ok = outcome.is_success(), "add sub user");
    outcome
}

pub fn delete_user<T: RpcTransport>(api: &LeaseApi<T>, session: &Session, name: &str) -> SubmitOutcome {
    if let Err(e) = require_admin(session) {
        return SubmitOutcome::Blocked(e);
    }
    let name = name.trim();
    if name.is_empty() {
        return SubmitOutcome::Blocked(LeaseFormError::Required("User name").into());
    }
    if session.current_user().map(|u| u.name.as_str()) == Some(name) {
        return SubmitOutcome::Blocked(LeaseDeskError::Rejected(
            "You cannot delete the user you are signed in as".into(),
        ));
    }
    let outcome = interpret(api.delete_rm_sub_user(name).map(outcome_parts), "User deleted");
    tracing::info!(user = name, ok = outcome.is_success(), "delete sub user");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::fake::FakeTransport;
    use serde_json::json;

    fn admin() -> Session {
        let mut s = Session::new("");
        s.assume_user("owner");
        s
    }

    #[test]
    fn test_short_password_rejected_locally() {
        let api = LeaseApi::new(FakeTransport::new());
        let mut form = NewUserForm::new();
        form.name = "sam".into();
        form.password = "abc".into();
        let outcome = add_user(&api, &admin(), &form);
        assert_eq!(outcome.message(), "Password must be at least 4 characters");
        assert!(api.transport().calls().is_empty());
    }

    #[test]
    fn test_add_user_sends_role() {
        let api = LeaseApi::new(
            FakeTransport::new().respond("add_rm_sub_user", Ok(json!([{"success": true, "message": "User sam added"}]))),
        );
        let mut form = NewUserForm::new();
        form.name = " sam ".into();
        form.password = "secret".into();
        form.user_type = UserType::ReadOnly;
        let outcome = add_user(&api, &admin(), &form);
        assert_eq!(outcome.message(), "User sam added");
        assert_eq!(
            api.transport().calls_to("add_rm_sub_user")[0],
            json!({"name": "sam", "password": "secret", "user_type": "read_only"})
        );
        form.clear();
        assert!(form.password.is_empty());
    }

    #[test]
    fn test_cannot_delete_self() {
        let api = LeaseApi::new(FakeTransport::new());
        let outcome = delete_user(&api, &admin(), "owner");
        assert!(matches!(outcome, SubmitOutcome::Blocked(_)));
        assert!(api.transport().calls().is_empty());
    }

    #[test]
    fn test_manager_cannot_manage_users() {
        let api = LeaseApi::new(FakeTransport::new().respond(
            "validate_rm_local_user",
            Ok(json!({"success": true, "user_type": "manager"})),
        ));
        let mut session = Session::new("");
        session.login(&api, "mia", "pw12").unwrap();
        let outcome = delete_user(&api, &session, "sam");
        assert_eq!(outcome.message(), "Only administrators can manage users");
    }

    #[test]
    fn test_unlock_panel() {
        let api = LeaseApi::new(FakeTransport::new().respond(
            "validate_rm_account_password",
            Ok(json!([{"success": false, "message": "Incorrect password"}])),
        ));
        assert_eq!(unlock_panel(&api, "nope").message(), "Incorrect password");
        assert!(matches!(unlock_panel(&api, ""), SubmitOutcome::Blocked(_)));
    }
}

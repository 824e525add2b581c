use crate::error::{LeaseDeskError, Result};
use crate::events::EventBus;
use crate::models::UserType;
use crate::rpc::{LeaseApi, RpcTransport};

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub name: String,
    /// `None` when the name came from `--user` and was never checked remotely.
    pub user_type: Option<UserType>,
}

/// Application state for one process: who is acting, under which manager name,
/// and the bus screens use to tell each other that lease data moved.
pub struct Session {
    user: Option<CurrentUser>,
    manager_name: String,
    bus: EventBus,
}

impl Session {
    pub fn new(manager_name: &str) -> Self {
        Self {
            user: None,
            manager_name: manager_name.to_string(),
            bus: EventBus::new(),
        }
    }

    /// Act as `name` without a password check. The remote side still authorizes
    /// every call made under this name.
    pub fn assume_user(&mut self, name: &str) {
        let name = name.trim();
        self.user = if name.is_empty() {
            None
        } else {
            Some(CurrentUser {
                name: name.to_string(),
                user_type: None,
            })
        };
    }

    pub fn login<T: RpcTransport>(
        &mut self,
        api: &LeaseApi<T>,
        name: &str,
        password: &str,
    ) -> Result<&CurrentUser> {
        let name = name.trim();
        if name.is_empty() || password.is_empty() {
            return Err(LeaseDeskError::Rejected(
                "Enter a user name and password".into(),
            ));
        }
        let outcome = api.validate_rm_local_user(name, password)?;
        if !outcome.success {
            tracing::info!(user = name, "login rejected");
            let msg = if outcome.message.is_empty() {
                "Invalid user name or password".to_string()
            } else {
                outcome.message
            };
            return Err(LeaseDeskError::Rejected(msg));
        }
        tracing::info!(user = name, role = ?outcome.user_type, "login ok");
        Ok(&*self.user.insert(CurrentUser {
            name: name.to_string(),
            user_type: outcome.user_type,
        }))
    }

    pub fn logout(&mut self) {
        self.user = None;
    }

    pub fn current_user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }

    pub fn username(&self) -> Result<&str> {
        self.user
            .as_ref()
            .map(|u| u.name.as_str())
            .ok_or(LeaseDeskError::NoUser)
    }

    /// Username for a mutating call. Read-only users are stopped here, before
    /// any request is built.
    pub fn require_editor(&self) -> Result<&str> {
        let user = self.user.as_ref().ok_or(LeaseDeskError::NoUser)?;
        match user.user_type {
            Some(t) if !t.can_edit() => Err(LeaseDeskError::ReadOnly(user.name.clone())),
            _ => Ok(&user.name),
        }
    }

    /// Untyped users (CLI `--user`, the main account) are not restricted here;
    /// the remote side still checks.
    pub fn can_manage_users(&self) -> bool {
        self.user
            .as_ref()
            .and_then(|u| u.user_type)
            .map_or(true, |t| t.can_manage_users())
    }

    pub fn manager_name(&self) -> &str {
        if self.manager_name.is_empty() {
            self.user.as_ref().map(|u| u.name.as_str()).unwrap_or("")
        } else {
            &self.manager_name
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

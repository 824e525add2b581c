use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::rpc::RpcError;

/// Failure categories shown to the operator. Upstream wording is matched once,
/// here, so screens and commands only ever see a kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteErrorKind {
    #[error("The record was not found. It may have been removed; refresh and try again.")]
    NotFound,

    #[error("One of the selected charges no longer exists. Reload the charges and re-allocate.")]
    ChargeNotFound,

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("The amount was rejected. Check that it is positive and within the charge balance.")]
    InvalidAmount,

    #[error("The date was rejected. Use YYYY-MM-DD and keep it within the lease period.")]
    InvalidDate,

    #[error("Unable to complete the request. Please try again.")]
    Unavailable,

    #[error("{0}")]
    NotConfigured(String),

    #[error("{0}")]
    Generic(String),
}

struct Patterns {
    charge_not_found: Regex,
    not_found: Regex,
    permission: Regex,
    amount: Regex,
    date: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        charge_not_found: Regex::new(r"(?i)charge\b.*\b(not found|does not exist|no longer exists)")
            .expect("valid regex"),
        not_found: Regex::new(r"(?i)not found|does not exist|no rows").expect("valid regex"),
        permission: Regex::new(r"(?i)permission denied|not authori[sz]ed|unauthori[sz]ed|forbidden|jwt")
            .expect("valid regex"),
        amount: Regex::new(r"(?i)(invalid|negative|must be positive|exceeds?).*amount|amount.*(invalid|negative|must be|exceeds?)")
            .expect("valid regex"),
        date: Regex::new(r"(?i)(invalid|out of range).*date|date.*(invalid|out of range|before|after)")
            .expect("valid regex"),
    })
}

/// Map a raw remote message onto a kind. Charge-not-found is tested before the
/// generic not-found pattern since the latter also matches it.
pub fn classify_message(raw: &str) -> RemoteErrorKind {
    let p = patterns();
    if p.charge_not_found.is_match(raw) {
        RemoteErrorKind::ChargeNotFound
    } else if p.not_found.is_match(raw) {
        RemoteErrorKind::NotFound
    } else if p.permission.is_match(raw) {
        RemoteErrorKind::PermissionDenied
    } else if p.amount.is_match(raw) {
        RemoteErrorKind::InvalidAmount
    } else if p.date.is_match(raw) {
        RemoteErrorKind::InvalidDate
    } else {
        RemoteErrorKind::Generic(raw.to_string())
    }
}

pub fn classify(err: &RpcError) -> RemoteErrorKind {
    match err {
        RpcError::NotConfigured => RemoteErrorKind::NotConfigured(err.to_string()),
        RpcError::Remote { status, message, .. } => {
            let kind = classify_message(message);
            match (kind, *status) {
                (RemoteErrorKind::Generic(_), 401 | 403) => RemoteErrorKind::PermissionDenied,
                (RemoteErrorKind::Generic(_), 404) => RemoteErrorKind::NotFound,
                (RemoteErrorKind::Generic(_), 502..=504) => RemoteErrorKind::Unavailable,
                (kind, _) => kind,
            }
        }
        RpcError::Http(e) if e.is_timeout() || e.is_connect() => RemoteErrorKind::Unavailable,
        RpcError::EmptyResult { .. } => RemoteErrorKind::Unavailable,
        other => classify_message(&other.to_string()),
    }
}

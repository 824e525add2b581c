use thiserror::Error;

use crate::lease_forms::LeaseFormError;
use crate::payment_form::PaymentValidationError;
use crate::remote_error::{classify, RemoteErrorKind};
use crate::rpc::RpcError;

#[derive(Error, Debug)]
pub enum LeaseDeskError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Remote(RemoteErrorKind),

    #[error("{0}")]
    Payment(#[from] PaymentValidationError),

    #[error("{0}")]
    Form(#[from] LeaseFormError),

    #[error("{0}")]
    Rejected(String),

    #[error("Not signed in. Pass --user or set LEASEDESK_USER")]
    NoUser,

    #[error("User '{0}' has read-only access")]
    ReadOnly(String),

    #[error("Unknown lease: {0}")]
    UnknownLease(i64),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl From<RpcError> for LeaseDeskError {
    fn from(err: RpcError) -> Self {
        LeaseDeskError::Remote(classify(&err))
    }
}

pub type Result<T> = std::result::Result<T, LeaseDeskError>;

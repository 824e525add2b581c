//! Turning validated form state into a remote call and its answer into
//! something a screen can show.
//!
//! Three ways a submission ends badly, none of them retried:
//! blocked locally before any request, rejected by a business rule
//! (`success: false`, message shown verbatim), or failed in transport
//! (classified into a [`RemoteErrorKind`]).

use std::time::Duration;

use chrono::NaiveDate;

use crate::error::{LeaseDeskError, Result};
use crate::events::ChangeReason;
use crate::models::ProcedureOutcome;
use crate::payment_form::{PaymentForm, ValidatedPayment};
use crate::remote_error::{classify, RemoteErrorKind};
use crate::rpc::{AllocationParam, LeaseApi, PaymentSplitParam, RecordPaymentParams, RpcError, RpcTransport};
use crate::session::Session;

/// How long a dialog keeps its success message up before closing itself.
pub const SUCCESS_CLOSE_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug)]
pub enum SubmitOutcome {
    Succeeded(String),
    Blocked(LeaseDeskError),
    Rejected(String),
    Failed(RemoteErrorKind),
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Succeeded(_))
    }

    pub fn message(&self) -> String {
        match self {
            SubmitOutcome::Succeeded(m) | SubmitOutcome::Rejected(m) => m.clone(),
            SubmitOutcome::Blocked(e) => e.to_string(),
            SubmitOutcome::Failed(kind) => kind.to_string(),
        }
    }

    pub fn into_result(self) -> Result<String> {
        match self {
            SubmitOutcome::Succeeded(m) => Ok(m),
            SubmitOutcome::Blocked(e) => Err(e),
            SubmitOutcome::Rejected(m) => Err(LeaseDeskError::Rejected(m)),
            SubmitOutcome::Failed(kind) => Err(LeaseDeskError::Remote(kind)),
        }
    }
}

/// Read a `{success, message}` answer. `fallback` is shown when a successful
/// answer carries no message of its own.
pub fn interpret(result: std::result::Result<(bool, String), RpcError>, fallback: &str) -> SubmitOutcome {
    match result {
        Ok((true, message)) => {
            SubmitOutcome::Succeeded(if message.is_empty() { fallback.to_string() } else { message })
        }
        Ok((false, message)) => SubmitOutcome::Rejected(if message.is_empty() {
            "The request was rejected.".to_string()
        } else {
            message
        }),
        Err(e) => SubmitOutcome::Failed(classify(&e)),
    }
}

pub fn outcome_parts(outcome: ProcedureOutcome) -> (bool, String) {
    (outcome.success, outcome.message)
}

/// Payload for `record_and_allocate_payment`. Allocations in a validated payment
/// are already limited to selected rows with a positive amount.
pub fn payment_params(valid: &ValidatedPayment, manager_name: &str, username: &str) -> RecordPaymentParams {
    RecordPaymentParams {
        lease_id: valid.lease_id,
        total_amount: valid.total_amount,
        transaction_date: valid.transaction_date,
        manager_name: manager_name.to_string(),
        username: username.to_string(),
        payment_details: valid
            .details
            .iter()
            .map(|d| PaymentSplitParam {
                amount: d.amount,
                method: d.method,
                payment_type: d.payment_type,
            })
            .collect(),
        allocations: valid
            .allocations
            .iter()
            .filter(|a| a.selected && a.amount > 0.0)
            .map(|a| AllocationParam {
                charge_id: a.charge_id,
                amount: a.amount,
            })
            .collect(),
        notes: valid.notes.clone(),
    }
}

/// Validate, send, and fold the answer back into the form.
///
/// On success the form is reset, the success message is left on it, and every
/// subscriber is told the lease changed. Any other outcome leaves the user's
/// input in place with a single error message.
pub fn submit_payment<T: RpcTransport>(
    api: &LeaseApi<T>,
    session: &Session,
    form: &mut PaymentForm,
    today: NaiveDate,
) -> SubmitOutcome {
    let username = match session.require_editor() {
        Ok(name) => name.to_string(),
        Err(e) => {
            form.set_error(e.to_string());
            return SubmitOutcome::Blocked(e);
        }
    };

    let valid = match form.validate() {
        Ok(v) => v,
        Err(e) => {
            form.set_error(e.to_string());
            return SubmitOutcome::Blocked(e.into());
        }
    };

    if !form.begin_submit() {
        return SubmitOutcome::Blocked(LeaseDeskError::Other(
            "A payment is already being recorded".into(),
        ));
    }

    let params = payment_params(&valid, session.manager_name(), &username);
    let result = api.record_and_allocate_payment(&params).map(outcome_parts);
    form.end_submit();

    let outcome = interpret(result, "Payment recorded");
    match &outcome {
        SubmitOutcome::Succeeded(msg) => {
            tracing::info!(
                lease_id = valid.lease_id,
                total = valid.total_amount,
                allocations = params.allocations.len(),
                "payment recorded"
            );
            form.reset(today);
            form.set_success(msg.clone());
            session
                .bus()
                .leases_changed(Some(valid.lease_id), ChangeReason::PaymentRecorded);
        }
        other => {
            tracing::warn!(lease_id = valid.lease_id, outcome = ?other, "payment not recorded");
            form.set_error(other.message());
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Charge, ChargeCategory};
    use crate::payment_form::{DetailField, MessageKind};
    use crate::rpc::fake::FakeTransport;
    use serde_json::json;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn charges() -> Vec<Charge> {
        vec![
            Charge {
                charge_id: 11,
                category: ChargeCategory::Rent,
                total_due: 300.0,
                amount_paid: 0.0,
                balance_remaining: 300.0,
                due_date: date(1),
            },
            Charge {
                charge_id: 12,
                category: ChargeCategory::Utilities,
                total_due: 300.0,
                amount_paid: 0.0,
                balance_remaining: 300.0,
                due_date: date(5),
            },
        ]
    }

    fn form(amount: f64) -> PaymentForm {
        let mut form = PaymentForm::new(5, date(10));
        let id = form.details()[0].id;
        form.update_detail(id, DetailField::Amount(amount));
        form.set_charges(charges());
        form
    }

    fn session() -> Session {
        let mut s = Session::new("Front Office");
        s.assume_user("ops");
        s
    }

    #[test]
    fn test_success_resets_form_and_broadcasts() {
        let api = LeaseApi::new(FakeTransport::new().respond(
            "record_and_allocate_payment",
            Ok(json!([{"success": true, "message": "Payment of $500.00 recorded"}])),
        ));
        let session = session();
        let sub = session.bus().subscribe();
        let mut form = form(500.0);
        form.auto_allocate();
        form.notes = "  March rent  ".into();

        let outcome = submit_payment(&api, &session, &mut form, date(10));
        assert!(outcome.is_success());
        assert_eq!(form.total_amount(), "0.00");
        assert_eq!(form.message.as_ref().unwrap().kind, MessageKind::Success);
        assert_eq!(sub.drain().len(), 1);

        let sent = &api.transport().calls_to("record_and_allocate_payment")[0];
        assert_eq!(sent["lease_id"], json!(5));
        assert_eq!(sent["manager_name"], json!("Front Office"));
        assert_eq!(sent["username"], json!("ops"));
        assert_eq!(sent["transaction_date"], json!("2025-04-10"));
        assert_eq!(sent["notes"], json!("March rent"));
        assert_eq!(
            sent["allocations"],
            json!([{"charge_id": 11, "amount": 300.0}, {"charge_id": 12, "amount": 200.0}])
        );
        assert_eq!(
            sent["payment_details"],
            json!([{"amount": 500.0, "method": "cash", "type": "regular"}])
        );
    }

    #[test]
    fn test_validation_failure_makes_no_call() {
        let api = LeaseApi::new(FakeTransport::new());
        let session = session();
        let mut form = form(100.0);

        let outcome = submit_payment(&api, &session, &mut form, date(10));
        assert!(matches!(outcome, SubmitOutcome::Blocked(_)));
        assert_eq!(
            form.message.as_ref().unwrap().text,
            "Select at least one charge to apply this payment to"
        );
        assert!(api.transport().calls().is_empty());
    }

    #[test]
    fn test_business_rejection_shown_verbatim() {
        let api = LeaseApi::new(FakeTransport::new().respond(
            "record_and_allocate_payment",
            Ok(json!([{"success": false, "message": "Charge 11 is already paid"}])),
        ));
        let session = session();
        let sub = session.bus().subscribe();
        let mut form = form(300.0);
        form.auto_allocate();

        let outcome = submit_payment(&api, &session, &mut form, date(10));
        assert!(matches!(outcome, SubmitOutcome::Rejected(_)));
        assert_eq!(form.message.as_ref().unwrap().text, "Charge 11 is already paid");
        assert_eq!(form.total_amount(), "300.00");
        assert!(sub.drain().is_empty());
        assert!(!form.is_submitting());
    }

    #[test]
    fn test_transport_failure_is_classified() {
        let api = LeaseApi::new(FakeTransport::new().respond(
            "record_and_allocate_payment",
            Err(RpcError::Remote {
                procedure: "record_and_allocate_payment".into(),
                status: 400,
                message: "charge 12 does not exist".into(),
            }),
        ));
        let session = session();
        let mut form = form(300.0);
        form.auto_allocate();

        let outcome = submit_payment(&api, &session, &mut form, date(10));
        assert!(matches!(outcome, SubmitOutcome::Failed(RemoteErrorKind::ChargeNotFound)));
        assert_eq!(
            form.message.as_ref().unwrap().text,
            RemoteErrorKind::ChargeNotFound.to_string()
        );
    }

    #[test]
    fn test_read_only_user_blocked() {
        let api = LeaseApi::new(FakeTransport::new().respond(
            "validate_rm_local_user",
            Ok(json!({"success": true, "user_type": "read_only"})),
        ));
        let mut session = Session::new("");
        session.login(&api, "viewer", "pw").unwrap();
        let mut form = form(300.0);
        form.auto_allocate();

        let outcome = submit_payment(&api, &session, &mut form, date(10));
        assert!(matches!(outcome, SubmitOutcome::Blocked(LeaseDeskError::ReadOnly(_))));
        assert!(api.transport().calls_to("record_and_allocate_payment").is_empty());
    }

    #[test]
    fn test_interpret_fallbacks() {
        assert_eq!(interpret(Ok((true, String::new())), "Saved").message(), "Saved");
        assert_eq!(
            interpret(Ok((false, String::new())), "Saved").message(),
            "The request was rejected."
        );
        let err = interpret(
            Err(RpcError::EmptyResult {
                procedure: "generate_charge".into(),
            }),
            "Saved",
        );
        assert!(matches!(err, SubmitOutcome::Failed(RemoteErrorKind::Unavailable)));
        assert!(err.into_result().is_err());
    }
}

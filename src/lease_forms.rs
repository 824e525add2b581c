//! The smaller lease dialogs: create, amend terms, terminate, and add a charge.
//!
//! Each form keeps the raw text the operator typed and turns it into procedure
//! parameters in `validate`, stopping at the first problem.

use chrono::NaiveDate;
use thiserror::Error;

use crate::events::ChangeReason;
use crate::fmt::{parse_amount, parse_date};
use crate::models::{ChargeCategory, ChargeFrequency, LeaseOverview};
use crate::rpc::{
    AmendLeaseParams, CreateLeaseParams, GenerateChargeParams, LeaseApi, RpcError, RpcTransport,
    TerminateLeaseParams,
};
use crate::session::Session;
use crate::submission::{interpret, outcome_parts, SubmitOutcome};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LeaseFormError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{field} must be a number, got '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),

    #[error("{field} must be YYYY-MM-DD, got '{value}'")]
    InvalidDate { field: &'static str, value: String },

    #[error("{field} cannot be before the lease start date ({start})")]
    BeforeStart { field: &'static str, start: NaiveDate },

    #[error("Enter a new end date or a new base charge amount")]
    NothingToChange,

    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
}

fn required_date(field: &'static str, input: &str) -> Result<NaiveDate, LeaseFormError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(LeaseFormError::Required(field));
    }
    parse_date(input).ok_or_else(|| LeaseFormError::InvalidDate {
        field,
        value: input.to_string(),
    })
}

fn optional_date(field: &'static str, input: &str) -> Result<Option<NaiveDate>, LeaseFormError> {
    if input.trim().is_empty() {
        Ok(None)
    } else {
        required_date(field, input).map(Some)
    }
}

fn positive_amount(field: &'static str, input: &str) -> Result<f64, LeaseFormError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(LeaseFormError::Required(field));
    }
    let value = parse_amount(input).ok_or_else(|| LeaseFormError::InvalidNumber {
        field,
        value: input.to_string(),
    })?;
    if value <= 0.0 {
        return Err(LeaseFormError::NonPositive(field));
    }
    Ok(value)
}

fn positive_id(field: &'static str, input: &str) -> Result<i64, LeaseFormError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(LeaseFormError::Required(field));
    }
    let id: i64 = input.parse().map_err(|_| LeaseFormError::InvalidNumber {
        field,
        value: input.to_string(),
    })?;
    if id <= 0 {
        return Err(LeaseFormError::NonPositive(field));
    }
    Ok(id)
}

fn not_before(field: &'static str, date: NaiveDate, start: NaiveDate) -> Result<(), LeaseFormError> {
    if date < start {
        Err(LeaseFormError::BeforeStart { field, start })
    } else {
        Ok(())
    }
}

fn optional_text(input: &str) -> Option<String> {
    let t = input.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

// ---------------------------------------------------------------------------
// Forms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CreateLeaseForm {
    pub asset_id: String,
    pub renter_id: String,
    pub start_date: String,
    pub end_date: String,
    pub base_charge_amount: String,
    pub charge_frequency: Option<ChargeFrequency>,
}

impl CreateLeaseForm {
    pub fn validate(&self, username: &str) -> Result<CreateLeaseParams, LeaseFormError> {
        let asset_id = positive_id("Asset ID", &self.asset_id)?;
        let renter_id = positive_id("Renter ID", &self.renter_id)?;
        let start_date = required_date("Start date", &self.start_date)?;
        let end_date = optional_date("End date", &self.end_date)?;
        if let Some(end) = end_date {
            not_before("End date", end, start_date)?;
        }
        let base_charge_amount = positive_amount("Base charge amount", &self.base_charge_amount)?;
        Ok(CreateLeaseParams {
            asset_id,
            renter_id,
            start_date,
            end_date,
            base_charge_amount,
            charge_frequency: self.charge_frequency.unwrap_or(ChargeFrequency::Monthly),
            username: username.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AmendLeaseForm {
    pub lease_id: i64,
    pub lease_start: NaiveDate,
    pub new_end_date: String,
    pub new_base_charge_amount: String,
}

impl AmendLeaseForm {
    pub fn for_lease(lease: &LeaseOverview) -> Self {
        Self {
            lease_id: lease.lease_id,
            lease_start: lease.start_date,
            new_end_date: String::new(),
            new_base_charge_amount: String::new(),
        }
    }

    pub fn validate(&self, username: &str) -> Result<AmendLeaseParams, LeaseFormError> {
        if self.new_end_date.trim().is_empty() && self.new_base_charge_amount.trim().is_empty() {
            return Err(LeaseFormError::NothingToChange);
        }
        let new_end_date = optional_date("New end date", &self.new_end_date)?;
        if let Some(end) = new_end_date {
            not_before("New end date", end, self.lease_start)?;
        }
        let new_base_charge_amount = if self.new_base_charge_amount.trim().is_empty() {
            None
        } else {
            Some(positive_amount("New base charge", &self.new_base_charge_amount)?)
        };
        Ok(AmendLeaseParams {
            lease_id: self.lease_id,
            new_end_date,
            new_base_charge_amount,
            username: username.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct TerminateLeaseForm {
    pub lease_id: i64,
    pub lease_start: NaiveDate,
    pub termination_date: String,
    pub reason: String,
}

impl TerminateLeaseForm {
    pub fn for_lease(lease: &LeaseOverview, today: NaiveDate) -> Self {
        Self {
            lease_id: lease.lease_id,
            lease_start: lease.start_date,
            termination_date: today.format("%Y-%m-%d").to_string(),
            reason: String::new(),
        }
    }

    pub fn validate(&self, username: &str) -> Result<TerminateLeaseParams, LeaseFormError> {
        let termination_date = required_date("Termination date", &self.termination_date)?;
        not_before("Termination date", termination_date, self.lease_start)?;
        Ok(TerminateLeaseParams {
            lease_id: self.lease_id,
            termination_date,
            reason: optional_text(&self.reason),
            username: username.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChargeForm {
    pub lease_id: i64,
    pub amount: String,
    pub category: ChargeCategory,
    pub due_date: String,
    pub description: String,
}

impl ChargeForm {
    pub fn new(lease_id: i64, today: NaiveDate) -> Self {
        Self {
            lease_id,
            amount: String::new(),
            category: ChargeCategory::Rent,
            due_date: today.format("%Y-%m-%d").to_string(),
            description: String::new(),
        }
    }

    pub fn validate(&self, username: &str) -> Result<GenerateChargeParams, LeaseFormError> {
        let amount = positive_amount("Amount", &self.amount)?;
        let due_date = required_date("Due date", &self.due_date)?;
        Ok(GenerateChargeParams {
            lease_id: self.lease_id,
            amount,
            category: self.category,
            due_date,
            username: username.to_string(),
            description: optional_text(&self.description),
        })
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Shared bridge for the lease dialogs: check the user, validate, send once,
/// and broadcast on success.
fn submit<P>(
    session: &Session,
    lease_id: Option<i64>,
    reason: ChangeReason,
    fallback: &str,
    build: impl FnOnce(&str) -> Result<P, LeaseFormError>,
    send: impl FnOnce(&P) -> Result<(bool, String), RpcError>,
) -> SubmitOutcome {
    let username = match session.require_editor() {
        Ok(name) => name.to_string(),
        Err(e) => return SubmitOutcome::Blocked(e),
    };
    let params = match build(&username) {
        Ok(p) => p,
        Err(e) => return SubmitOutcome::Blocked(e.into()),
    };
    let outcome = interpret(send(&params), fallback);
    if outcome.is_success() {
        tracing::info!(?lease_id, ?reason, "lease change accepted");
        session.bus().leases_changed(lease_id, reason);
    } else {
        tracing::warn!(?lease_id, ?reason, outcome = ?outcome, "lease change not applied");
    }
    outcome
}

pub fn submit_create<T: RpcTransport>(api: &LeaseApi<T>, session: &Session, form: &CreateLeaseForm) -> SubmitOutcome {
    let mut created = None;
    let outcome = submit(
        session,
        None,
        ChangeReason::Created,
        "Lease created",
        |user| form.validate(user),
        |p| {
            api.create_lease(p).map(|o| {
                created = o.lease_id;
                (o.success, o.message)
            })
        },
    );
    match (outcome, created) {
        (SubmitOutcome::Succeeded(msg), Some(id)) if msg == "Lease created" => {
            SubmitOutcome::Succeeded(format!("Lease #{id} created"))
        }
        (outcome, _) => outcome,
    }
}

pub fn submit_amend<T: RpcTransport>(api: &LeaseApi<T>, session: &Session, form: &AmendLeaseForm) -> SubmitOutcome {
    submit(
        session,
        Some(form.lease_id),
        ChangeReason::Amended,
        "Lease terms updated",
        |user| form.validate(user),
        |p| api.amend_lease_terms(p).map(outcome_parts),
    )
}

pub fn submit_terminate<T: RpcTransport>(
    api: &LeaseApi<T>,
    session: &Session,
    form: &TerminateLeaseForm,
) -> SubmitOutcome {
    submit(
        session,
        Some(form.lease_id),
        ChangeReason::Terminated,
        "Lease terminated",
        |user| form.validate(user),
        |p| api.terminate_lease(p).map(outcome_parts),
    )
}

pub fn submit_charge<T: RpcTransport>(api: &LeaseApi<T>, session: &Session, form: &ChargeForm) -> SubmitOutcome {
    submit(
        session,
        Some(form.lease_id),
        ChangeReason::Charged,
        "Charge created",
        |user| form.validate(user),
        |p| {
            api.generate_charge(p).map(|o| {
                let message = match (o.message.is_empty(), o.charge_id) {
                    (true, Some(id)) if o.success => format!("Charge #{id} created"),
                    _ => o.message,
                };
                (o.success, message)
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeaseStatus, PaymentStatus};
    use crate::remote_error::RemoteErrorKind;
    use crate::rpc::fake::FakeTransport;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn lease() -> LeaseOverview {
        LeaseOverview {
            lease_id: 21,
            asset_id: 2,
            asset_name: "Unit 2".into(),
            renter_id: 8,
            renter_name: "Lee Park".into(),
            start_date: d(2025, 1, 1),
            end_date: Some(d(2025, 12, 31)),
            lease_status: LeaseStatus::Active,
            payment_status: PaymentStatus::Current,
            base_charge_amount: 1000.0,
            charge_frequency: ChargeFrequency::Monthly,
            total_balance: 0.0,
            overdue_balance: 0.0,
            charge_intervals: vec![],
        }
    }

    fn session() -> Session {
        let mut s = Session::new("");
        s.assume_user("ops");
        s
    }

    #[test]
    fn test_create_validation_order() {
        let mut form = CreateLeaseForm::default();
        assert_eq!(form.validate("u").unwrap_err(), LeaseFormError::Required("Asset ID"));
        form.asset_id = "3".into();
        form.renter_id = "x".into();
        assert!(matches!(
            form.validate("u").unwrap_err(),
            LeaseFormError::InvalidNumber { field: "Renter ID", .. }
        ));
        form.renter_id = "4".into();
        form.start_date = "2025-05-01".into();
        form.end_date = "2025-04-01".into();
        assert!(matches!(
            form.validate("u").unwrap_err(),
            LeaseFormError::BeforeStart { field: "End date", .. }
        ));
        form.end_date.clear();
        form.base_charge_amount = "0".into();
        assert_eq!(
            form.validate("u").unwrap_err(),
            LeaseFormError::NonPositive("Base charge amount")
        );
        form.base_charge_amount = "$1,250".into();
        let params = form.validate("u").unwrap();
        assert_eq!(params.base_charge_amount, 1250.0);
        assert_eq!(params.charge_frequency, ChargeFrequency::Monthly);
        assert!(params.end_date.is_none());
    }

    #[test]
    fn test_amend_needs_a_change() {
        let mut form = AmendLeaseForm::for_lease(&lease());
        assert_eq!(form.validate("u").unwrap_err(), LeaseFormError::NothingToChange);
        form.new_end_date = "2024-12-01".into();
        assert!(matches!(form.validate("u").unwrap_err(), LeaseFormError::BeforeStart { .. }));
        form.new_end_date = "2026-06-30".into();
        let params = form.validate("u").unwrap();
        assert_eq!(params.new_end_date, Some(d(2026, 6, 30)));
        assert_eq!(params.new_base_charge_amount, None);
    }

    #[test]
    fn test_terminate_defaults_to_today() {
        let form = TerminateLeaseForm::for_lease(&lease(), d(2025, 6, 15));
        let params = form.validate("u").unwrap();
        assert_eq!(params.termination_date, d(2025, 6, 15));
        assert!(params.reason.is_none());
    }

    #[test]
    fn test_charge_success_broadcasts_and_names_charge() {
        let api = LeaseApi::new(FakeTransport::new().respond(
            "generate_charge",
            Ok(json!([{"success": true, "message": "", "charge_id": 77}])),
        ));
        let session = session();
        let sub = session.bus().subscribe();
        let mut form = ChargeForm::new(21, d(2025, 6, 1));
        form.amount = "45".into();
        form.category = ChargeCategory::LateFee;
        form.description = "Late fee for May".into();

        let outcome = submit_charge(&api, &session, &form);
        assert_eq!(outcome.message(), "Charge #77 created");
        assert_eq!(sub.drain().len(), 1);
        let sent = &api.transport().calls_to("generate_charge")[0];
        assert_eq!(sent["category"], json!("late_fee"));
        assert_eq!(sent["username"], json!("ops"));
        assert_eq!(sent["description"], json!("Late fee for May"));
    }

    #[test]
    fn test_invalid_form_never_calls_remote() {
        let api = LeaseApi::new(FakeTransport::new());
        let session = session();
        let form = ChargeForm::new(21, d(2025, 6, 1));
        let outcome = submit_charge(&api, &session, &form);
        assert_eq!(outcome.message(), "Amount is required");
        assert!(api.transport().calls().is_empty());
    }

    #[test]
    fn test_amend_rejection_is_verbatim_and_silent() {
        let api = LeaseApi::new(FakeTransport::new().respond(
            "amend_lease_terms",
            Ok(json!([{"success": false, "message": "Lease is terminated"}])),
        ));
        let session = session();
        let sub = session.bus().subscribe();
        let mut form = AmendLeaseForm::for_lease(&lease());
        form.new_base_charge_amount = "1100".into();
        let outcome = submit_amend(&api, &session, &form);
        assert!(matches!(outcome, SubmitOutcome::Rejected(ref m) if m == "Lease is terminated"));
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn test_create_reports_new_lease_id() {
        let api = LeaseApi::new(FakeTransport::new().respond(
            "create_lease",
            Ok(json!({"success": true, "lease_id": 40})),
        ));
        let form = CreateLeaseForm {
            asset_id: "1".into(),
            renter_id: "2".into(),
            start_date: "2025-07-01".into(),
            end_date: String::new(),
            base_charge_amount: "900".into(),
            charge_frequency: Some(ChargeFrequency::Quarterly),
        };
        let outcome = submit_create(&api, &session(), &form);
        assert_eq!(outcome.message(), "Lease #40 created");
    }

    #[test]
    fn test_terminate_transport_failure() {
        let api = LeaseApi::new(FakeTransport::new().respond(
            "terminate_lease",
            Err(RpcError::Remote {
                procedure: "terminate_lease".into(),
                status: 401,
                message: "JWT expired".into(),
            }),
        ));
        let form = TerminateLeaseForm::for_lease(&lease(), d(2025, 6, 15));
        let outcome = submit_terminate(&api, &session(), &form);
        assert!(matches!(outcome, SubmitOutcome::Failed(RemoteErrorKind::PermissionDenied)));
    }
}

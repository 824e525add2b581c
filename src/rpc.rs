//! Remote procedure boundary.
//!
//! Every business rule (balances, allocation bookkeeping, authentication) lives
//! in stored procedures behind a PostgREST-style endpoint. This module is the only
//! place that speaks JSON to it: parameters go out as typed structs and rows come
//! back decoded into the entity model, so nothing above this layer touches an
//! untyped payload.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{
    Charge, ChargeCategory, ChargeFrequency, ChargeOutcome, LeaseOutcome, LeaseOverview,
    LoginOutcome, PaymentMethod, PaymentType, ProcedureOutcome, UserType,
};

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("RPC endpoint is not configured. Run `leasedesk init --rpc-url <url>`")]
    NotConfigured,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{procedure} failed (HTTP {status}): {message}")]
    Remote {
        procedure: String,
        status: u16,
        message: String,
    },

    #[error("could not encode parameters for {procedure}: {reason}")]
    Encode { procedure: String, reason: String },

    #[error("unexpected response from {procedure}: {reason}")]
    Decode { procedure: String, reason: String },

    #[error("{procedure} returned no result")]
    EmptyResult { procedure: String },
}

/// Something that can invoke a named remote procedure with JSON parameters.
pub trait RpcTransport {
    fn call(&self, procedure: &str, params: Value) -> Result<Value, RpcError>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, RpcError> {
        if base_url.trim().is_empty() {
            return Err(RpcError::NotConfigured);
        }
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }
}

impl RpcTransport for HttpTransport {
    fn call(&self, procedure: &str, params: Value) -> Result<Value, RpcError> {
        let url = format!("{}/rpc/{procedure}", self.base_url);
        let mut request = self.client.post(&url).json(&params);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(RpcError::Remote {
                procedure: procedure.to_string(),
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| RpcError::Decode {
            procedure: procedure.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Pull a human-readable message out of an error body. PostgREST sends
/// `{"message": .., "hint": .., "code": ..}`; anything else is passed through raw.
fn extract_error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "hint", "details"] {
            if let Some(Value::String(msg)) = map.get(key) {
                if !msg.is_empty() {
                    return msg.clone();
                }
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// Procedure parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateLeaseParams {
    pub asset_id: i64,
    pub renter_id: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub base_charge_amount: f64,
    pub charge_frequency: ChargeFrequency,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmendLeaseParams {
    pub lease_id: i64,
    pub new_end_date: Option<NaiveDate>,
    pub new_base_charge_amount: Option<f64>,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminateLeaseParams {
    pub lease_id: i64,
    pub termination_date: NaiveDate,
    pub reason: Option<String>,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateChargeParams {
    pub lease_id: i64,
    pub amount: f64,
    pub category: ChargeCategory,
    pub due_date: NaiveDate,
    pub username: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentSplitParam {
    pub amount: f64,
    pub method: PaymentMethod,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationParam {
    pub charge_id: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordPaymentParams {
    pub lease_id: i64,
    pub total_amount: f64,
    pub transaction_date: NaiveDate,
    pub manager_name: String,
    pub username: String,
    pub payment_details: Vec<PaymentSplitParam>,
    pub allocations: Vec<AllocationParam>,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Typed client
// ---------------------------------------------------------------------------

pub struct LeaseApi<T: RpcTransport> {
    transport: T,
}

impl<T: RpcTransport> LeaseApi<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn invoke(&self, procedure: &str, params: Value) -> Result<Value, RpcError> {
        let started = Instant::now();
        let result = self.transport.call(procedure, params);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::debug!(procedure, elapsed_ms, "rpc ok"),
            Err(e) => tracing::warn!(procedure, elapsed_ms, error = %e, "rpc failed"),
        }
        result
    }

    fn rows<R: DeserializeOwned>(&self, procedure: &str, params: Value) -> Result<Vec<R>, RpcError> {
        let value = self.invoke(procedure, params)?;
        let decode = |v: Value| {
            serde_json::from_value::<R>(v).map_err(|e| RpcError::Decode {
                procedure: procedure.to_string(),
                reason: e.to_string(),
            })
        };
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items.into_iter().map(decode).collect(),
            other => Ok(vec![decode(other)?]),
        }
    }

    /// Single-result procedures: only the first row is inspected, and no row at
    /// all is an error rather than an implicit success.
    fn first<R: DeserializeOwned>(&self, procedure: &str, params: Value) -> Result<R, RpcError> {
        self.rows(procedure, params)?
            .into_iter()
            .next()
            .ok_or_else(|| RpcError::EmptyResult {
                procedure: procedure.to_string(),
            })
    }

    fn encode<P: Serialize>(procedure: &str, params: &P) -> Result<Value, RpcError> {
        serde_json::to_value(params).map_err(|e| RpcError::Encode {
            procedure: procedure.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn get_leases_overview(&self) -> Result<Vec<LeaseOverview>, RpcError> {
        self.rows("get_leases_overview", json!({}))
    }

    pub fn get_unpaid_charges_for_lease(&self, lease_id: i64) -> Result<Vec<Charge>, RpcError> {
        self.rows("get_unpaid_charges_for_lease", json!({ "lease_id": lease_id }))
    }

    pub fn create_lease(&self, params: &CreateLeaseParams) -> Result<LeaseOutcome, RpcError> {
        let procedure = "create_lease";
        self.first(procedure, Self::encode(procedure, params)?)
    }

    pub fn amend_lease_terms(&self, params: &AmendLeaseParams) -> Result<ProcedureOutcome, RpcError> {
        let procedure = "amend_lease_terms";
        self.first(procedure, Self::encode(procedure, params)?)
    }

    pub fn terminate_lease(&self, params: &TerminateLeaseParams) -> Result<ProcedureOutcome, RpcError> {
        let procedure = "terminate_lease";
        self.first(procedure, Self::encode(procedure, params)?)
    }

    pub fn generate_charge(&self, params: &GenerateChargeParams) -> Result<ChargeOutcome, RpcError> {
        let procedure = "generate_charge";
        self.first(procedure, Self::encode(procedure, params)?)
    }

    pub fn record_and_allocate_payment(
        &self,
        params: &RecordPaymentParams,
    ) -> Result<ProcedureOutcome, RpcError> {
        let procedure = "record_and_allocate_payment";
        self.first(procedure, Self::encode(procedure, params)?)
    }

    pub fn add_rm_sub_user(
        &self,
        name: &str,
        password: &str,
        user_type: UserType,
    ) -> Result<ProcedureOutcome, RpcError> {
        self.first(
            "add_rm_sub_user",
            json!({ "name": name, "password": password, "user_type": user_type }),
        )
    }

    pub fn delete_rm_sub_user(&self, name: &str) -> Result<ProcedureOutcome, RpcError> {
        self.first("delete_rm_sub_user", json!({ "name": name }))
    }

    pub fn validate_rm_account_password(&self, password: &str) -> Result<ProcedureOutcome, RpcError> {
        self.first("validate_rm_account_password", json!({ "password": password }))
    }

    pub fn validate_rm_local_user(
        &self,
        login_name: &str,
        login_password: &str,
    ) -> Result<LoginOutcome, RpcError> {
        self.first(
            "validate_rm_local_user",
            json!({ "login_name": login_name, "login_password": login_password }),
        )
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeTransport;
    use super::*;

    #[test]
    fn test_error_message_from_postgrest_body() {
        let body = r#"{"code":"P0001","message":"Charge 12 is already paid","hint":null}"#;
        assert_eq!(extract_error_message(body), "Charge 12 is already paid");
        assert_eq!(extract_error_message("  gateway timeout "), "gateway timeout");
        assert_eq!(extract_error_message(""), "no response body");
    }

    #[test]
    fn test_unconfigured_endpoint() {
        let err = HttpTransport::new("  ", None, Duration::from_secs(1)).err().unwrap();
        assert!(matches!(err, RpcError::NotConfigured));
    }

    #[test]
    fn test_rows_accept_array_object_and_null() {
        let charge = json!({
            "charge_id": 4, "category": "rent", "total_due": 500.0, "amount_paid": 100.0,
            "balance_remaining": 400.0, "due_date": "2025-03-01"
        });
        let api = LeaseApi::new(
            FakeTransport::new()
                .respond("get_unpaid_charges_for_lease", Ok(json!([charge.clone()])))
                .respond("get_unpaid_charges_for_lease", Ok(charge))
                .respond("get_unpaid_charges_for_lease", Ok(Value::Null)),
        );
        assert_eq!(api.get_unpaid_charges_for_lease(9).unwrap().len(), 1);
        assert_eq!(api.get_unpaid_charges_for_lease(9).unwrap()[0].charge_id, 4);
        assert!(api.get_unpaid_charges_for_lease(9).unwrap().is_empty());
        assert_eq!(
            api.transport().calls_to("get_unpaid_charges_for_lease")[0],
            json!({ "lease_id": 9 })
        );
    }

    #[test]
    fn test_single_result_inspects_first_row() {
        let api = LeaseApi::new(FakeTransport::new().respond(
            "delete_rm_sub_user",
            Ok(json!([
                {"success": false, "message": "User not found"},
                {"success": true, "message": "ignored"}
            ])),
        ));
        let outcome = api.delete_rm_sub_user("sam").unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "User not found");
    }

    #[test]
    fn test_empty_single_result_is_error() {
        let api = LeaseApi::new(FakeTransport::new().respond("amend_lease_terms", Ok(json!([]))));
        let params = AmendLeaseParams {
            lease_id: 1,
            new_end_date: None,
            new_base_charge_amount: Some(900.0),
            username: "ops".into(),
        };
        let err = api.amend_lease_terms(&params).unwrap_err();
        assert!(matches!(err, RpcError::EmptyResult { .. }));
    }

    #[test]
    fn test_decode_failure_names_procedure() {
        let api = LeaseApi::new(
            FakeTransport::new().respond("get_leases_overview", Ok(json!([{"lease_id": "x"}]))),
        );
        match api.get_leases_overview() {
            Err(RpcError::Decode { procedure, .. }) => assert_eq!(procedure, "get_leases_overview"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_payment_split_serializes_type_key() {
        let split = PaymentSplitParam {
            amount: 50.0,
            method: PaymentMethod::BankTransfer,
            payment_type: PaymentType::Regular,
        };
        assert_eq!(
            serde_json::to_value(&split).unwrap(),
            json!({"amount": 50.0, "method": "bank_transfer", "type": "regular"})
        );
    }
}

//! Inbound gateway callbacks (browser return and relayed confirmation).

use serde::Serialize;
use std::collections::HashMap;

use crate::domain::aggregates::PaymentOutcome;
use crate::domain::value_objects::{from_gateway_minor_units, ExternalRef};
use crate::payment::responses::{failure_message, success_message, SUCCESS_CODE};
use crate::{EcommerceError, Result};

pub const REFERENCE_FIELD: &str = "vnp_TxnRef";
pub const RESPONSE_CODE_FIELD: &str = "vnp_ResponseCode";
pub const TRANSACTION_STATUS_FIELD: &str = "vnp_TransactionStatus";
pub const AMOUNT_FIELD: &str = "vnp_Amount";
pub const BANK_CODE_FIELD: &str = "vnp_BankCode";
pub const TRANSACTION_NO_FIELD: &str = "vnp_TransactionNo";
pub const PAY_DATE_FIELD: &str = "vnp_PayDate";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCallback {
    pub reference: String,
    pub response_code: String,
    pub transaction_status: Option<String>,
    /// Amount in the gateway's minor unit, as sent.
    pub amount: Option<i64>,
    pub bank_code: Option<String>,
    pub transaction_no: Option<String>,
    pub pay_date: Option<String>,
}

fn field(params: &HashMap<String, String>, name: &str) -> Option<String> {
    params.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

impl GatewayCallback {
    /// Extracts the callback fields. Call only after the signature checked out.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let reference = field(params, REFERENCE_FIELD).ok_or_else(|| EcommerceError::InvalidReference(String::new()))?;
        let response_code = field(params, RESPONSE_CODE_FIELD)
            .ok_or_else(|| EcommerceError::Validation(format!("{RESPONSE_CODE_FIELD} is required")))?;
        Ok(Self {
            reference,
            response_code,
            transaction_status: field(params, TRANSACTION_STATUS_FIELD),
            amount: field(params, AMOUNT_FIELD).and_then(|v| v.parse().ok()),
            bank_code: field(params, BANK_CODE_FIELD),
            transaction_no: field(params, TRANSACTION_NO_FIELD),
            pay_date: field(params, PAY_DATE_FIELD),
        })
    }

    pub fn order_id(&self) -> Result<i64> {
        ExternalRef::order_id(&self.reference).map_err(|_| EcommerceError::InvalidReference(self.reference.clone()))
    }

    /// Both codes must report success; a missing transaction status defers to the response code.
    pub fn is_success(&self) -> bool {
        self.response_code == SUCCESS_CODE && self.transaction_status.as_deref().map_or(true, |s| s == SUCCESS_CODE)
    }

    /// The code that explains a failure: the response code, unless it claims success.
    pub fn failure_code(&self) -> &str {
        if self.response_code != SUCCESS_CODE { return &self.response_code; }
        self.transaction_status.as_deref().unwrap_or(&self.response_code)
    }

    pub fn outcome(&self, order_total: i64) -> PaymentOutcome {
        if self.is_success() {
            PaymentOutcome::Succeeded { transaction_no: self.transaction_no.clone(), message: success_message(order_total) }
        } else {
            let code = self.failure_code().to_string();
            PaymentOutcome::Failed { message: failure_message(&code), response_code: code }
        }
    }

    /// Amount in major units, for display.
    pub fn display_amount(&self) -> i64 { self.amount.map(from_gateway_minor_units).unwrap_or(0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_success_requires_both_codes() {
        let cb = GatewayCallback::from_params(&params(&[(REFERENCE_FIELD, "5-1"), (RESPONSE_CODE_FIELD, "00"), (TRANSACTION_STATUS_FIELD, "02")])).unwrap();
        assert!(!cb.is_success());
        assert_eq!(cb.failure_code(), "02");
        let cb = GatewayCallback::from_params(&params(&[(REFERENCE_FIELD, "5-1"), (RESPONSE_CODE_FIELD, "00"), (TRANSACTION_STATUS_FIELD, "00")])).unwrap();
        assert!(cb.is_success());
    }

    #[test]
    fn test_cancelled_outcome() {
        let cb = GatewayCallback::from_params(&params(&[(REFERENCE_FIELD, "5-1"), (RESPONSE_CODE_FIELD, "24"), (AMOUNT_FIELD, "15000000")])).unwrap();
        assert_eq!(cb.display_amount(), 150_000);
        assert_matches!(cb.outcome(150_000), PaymentOutcome::Failed { response_code, message } if response_code == "24" && message.contains("cancelled"));
    }

    #[test]
    fn test_missing_fields() {
        assert_matches!(GatewayCallback::from_params(&params(&[(RESPONSE_CODE_FIELD, "00")])), Err(EcommerceError::InvalidReference(_)));
        assert_matches!(GatewayCallback::from_params(&params(&[(REFERENCE_FIELD, "5-1")])), Err(EcommerceError::Validation(_)));
        let cb = GatewayCallback::from_params(&params(&[(REFERENCE_FIELD, "abc-123"), (RESPONSE_CODE_FIELD, "00")])).unwrap();
        assert_matches!(cb.order_id(), Err(EcommerceError::InvalidReference(r)) if r == "abc-123");
    }
}

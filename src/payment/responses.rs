//! Gateway response codes and the customer-facing messages derived from them.

pub const SUCCESS_CODE: &str = "00";
pub const UNKNOWN_ERROR_CODE: &str = "99";

const RESPONSE_MESSAGES: &[(&str, &str)] = &[
    ("07", "Amount debited, but the transaction was flagged as suspicious"),
    ("09", "Card or account is not registered for internet banking"),
    ("10", "Card or account verification failed more than 3 times"),
    ("11", "Payment window expired, please try again"),
    ("12", "Card or account is locked"),
    ("13", "Incorrect one-time password (OTP)"),
    ("24", "Transaction cancelled by the customer"),
    ("51", "Insufficient account balance"),
    ("65", "Account exceeded its daily transaction limit"),
    ("75", "Paying bank is under maintenance"),
    ("79", "Payment password entered incorrectly too many times"),
    ("99", "Unknown error"),
];

/// Message for a non-successful response code. Unknown codes keep the raw code.
pub fn failure_message(code: &str) -> String {
    RESPONSE_MESSAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, message)| (*message).to_string())
        .unwrap_or_else(|| format!("Payment failed. Error code: {code}"))
}

pub fn success_message(total_amount: i64) -> String {
    format!("Payment of {total_amount} received via VNPay")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_codes() {
        assert_eq!(failure_message("24"), "Transaction cancelled by the customer");
        assert_eq!(failure_message("51"), "Insufficient account balance");
        assert_eq!(failure_message("42"), "Payment failed. Error code: 42");
    }
}

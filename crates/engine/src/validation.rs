//! The one definition of what a valid transaction looks like.
//!
//! Manual entries, extracted candidates and merged patches all go through
//! [`validate`] before anything is written. Field names in errors are the
//! wire names the client sent (`type`, `paymentMethod`, ...).

use api_types::transaction::TransactionDraft;
use serde_json::Value;

use crate::{FieldError, PaymentMethod, TransactionKind};

/// Fields of a draft that passed [`validate`], in their stored form.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidTransaction {
    pub kind: TransactionKind,
    pub amount: f64,
    /// Trimmed and lowercase.
    pub category: String,
    pub description: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

/// Checks a record-shaped value, stopping at the first bad field.
///
/// Order: `type`, `amount`, `category`, `paymentMethod`, `description`,
/// `confidence`. A missing `confidence` is accepted.
pub fn validate(draft: &TransactionDraft) -> Result<ValidTransaction, FieldError> {
    let kind = validate_kind(draft.kind.as_ref())?;
    let amount = validate_amount(draft.amount.as_ref())?;
    let category = validate_category(draft.category.as_ref())?;
    let payment_method = validate_payment_method(draft.payment_method.as_ref())?;
    let description = validate_description(draft.description.as_ref())?;
    validate_confidence(draft.confidence.as_ref())?;

    Ok(ValidTransaction {
        kind,
        amount,
        category,
        description,
        payment_method,
    })
}

fn validate_kind(value: Option<&Value>) -> Result<TransactionKind, FieldError> {
    match value {
        None | Some(Value::Null) => Err(FieldError::new("type", "is required")),
        Some(Value::String(kind)) => kind.parse().map_err(|_| {
            FieldError::new(
                "type",
                format!(
                    "must be one of {}, got '{kind}'",
                    allowed(TransactionKind::ALL.map(TransactionKind::as_str))
                ),
            )
        }),
        Some(_) => Err(FieldError::new("type", "must be a string")),
    }
}

fn validate_amount(value: Option<&Value>) -> Result<f64, FieldError> {
    let amount = match value {
        None | Some(Value::Null) => return Err(FieldError::new("amount", "is required")),
        Some(Value::Number(number)) => number
            .as_f64()
            .ok_or_else(|| FieldError::new("amount", "must be a finite number"))?,
        Some(_) => return Err(FieldError::new("amount", "must be a number")),
    };
    if !amount.is_finite() {
        return Err(FieldError::new("amount", "must be a finite number"));
    }
    if amount <= 0.0 {
        return Err(FieldError::new("amount", "must be greater than 0"));
    }
    Ok(amount)
}

fn validate_category(value: Option<&Value>) -> Result<String, FieldError> {
    match value {
        None | Some(Value::Null) => Err(FieldError::new("category", "is required")),
        Some(Value::String(category)) => {
            let category = canonical_category(category);
            if category.is_empty() {
                return Err(FieldError::new("category", "must not be empty"));
            }
            Ok(category)
        }
        Some(_) => Err(FieldError::new("category", "must be a string")),
    }
}

fn validate_payment_method(value: Option<&Value>) -> Result<Option<PaymentMethod>, FieldError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(method)) => method.parse().map(Some).map_err(|_| {
            FieldError::new(
                "paymentMethod",
                format!(
                    "must be one of {} or null, got '{method}'",
                    allowed(PaymentMethod::ALL.map(PaymentMethod::as_str))
                ),
            )
        }),
        Some(_) => Err(FieldError::new("paymentMethod", "must be a string or null")),
    }
}

fn validate_description(value: Option<&Value>) -> Result<Option<String>, FieldError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(description)) => Ok(Some(description.trim())
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)),
        Some(_) => Err(FieldError::new("description", "must be a string")),
    }
}

fn validate_confidence(value: Option<&Value>) -> Result<(), FieldError> {
    match value {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Number(number)) => match number.as_f64() {
            Some(c) if (0.0..=1.0).contains(&c) => Ok(()),
            _ => Err(FieldError::new("confidence", "must be between 0 and 1")),
        },
        Some(_) => Err(FieldError::new("confidence", "must be a number")),
    }
}

/// Category labels are stored trimmed and lowercase.
pub(crate) fn canonical_category(category: &str) -> String {
    category.trim().to_lowercase()
}

fn allowed<const N: usize>(values: [&str; N]) -> String {
    values.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(value: Value) -> TransactionDraft {
        serde_json::from_value(value).unwrap()
    }

    fn rejected_field(value: Value) -> &'static str {
        validate(&draft(value)).unwrap_err().field
    }

    #[test]
    fn accepts_minimal_and_full_records() {
        let minimal = validate(&draft(json!({
            "type": "income", "amount": 1000, "category": "Salary"
        })))
        .unwrap();
        assert_eq!(minimal.kind, TransactionKind::Income);
        assert_eq!(minimal.amount, 1000.0);
        assert_eq!(minimal.category, "salary");
        assert_eq!(minimal.description, None);
        assert_eq!(minimal.payment_method, None);

        let full = validate(&draft(json!({
            "type": "expense",
            "amount": 12.5,
            "category": " Food ",
            "description": "Ate pizza",
            "paymentMethod": "upi",
            "confidence": 0.94
        })))
        .unwrap();
        assert_eq!(full.category, "food");
        assert_eq!(full.description.as_deref(), Some("Ate pizza"));
        assert_eq!(full.payment_method, Some(PaymentMethod::Upi));
    }

    #[test]
    fn accepts_every_kind_and_payment_method() {
        for kind in TransactionKind::ALL {
            for method in PaymentMethod::ALL.map(|m| json!(m.as_str())).into_iter().chain([Value::Null]) {
                let value = json!({
                    "type": kind.as_str(), "amount": 1, "category": "x", "paymentMethod": method
                });
                assert!(validate(&draft(value)).is_ok());
            }
        }
    }

    #[test]
    fn rejects_bad_kind() {
        assert_eq!(rejected_field(json!({"amount": 1, "category": "x"})), "type");
        for kind in [json!("refund"), json!("Income"), json!(""), json!(1)] {
            assert_eq!(
                rejected_field(json!({"type": kind, "amount": 1, "category": "x"})),
                "type"
            );
        }
    }

    #[test]
    fn rejects_bad_amount() {
        assert_eq!(rejected_field(json!({"type": "expense", "category": "x"})), "amount");
        for amount in [json!(-5), json!(0), json!(0.0), json!("12"), json!(true), json!([1])] {
            assert_eq!(
                rejected_field(json!({"type": "expense", "amount": amount, "category": "x"})),
                "amount"
            );
        }
    }

    #[test]
    fn rejects_bad_category() {
        for category in [json!(""), json!("   "), json!(3), json!(null)] {
            assert_eq!(
                rejected_field(json!({"type": "expense", "amount": 1, "category": category})),
                "category"
            );
        }
    }

    #[test]
    fn rejects_unknown_payment_method() {
        for method in [json!("Card"), json!("paypal"), json!(1)] {
            assert_eq!(
                rejected_field(json!({
                    "type": "expense", "amount": 1, "category": "x", "paymentMethod": method
                })),
                "paymentMethod"
            );
        }
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        for confidence in [json!(1.5), json!(-0.1), json!("high")] {
            assert_eq!(
                rejected_field(json!({
                    "type": "expense", "amount": 1, "category": "x", "confidence": confidence
                })),
                "confidence"
            );
        }
    }

    #[test]
    fn stops_at_first_failing_field() {
        let error = validate(&draft(json!({"type": "gift", "amount": -1, "category": ""})))
            .unwrap_err();
        assert_eq!(error.field, "type");

        let error =
            validate(&draft(json!({"type": "income", "amount": -1, "category": ""}))).unwrap_err();
        assert_eq!(error.field, "amount");
    }
}

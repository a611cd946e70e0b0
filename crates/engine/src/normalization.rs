//! Canonicalization of extracted candidates.
//!
//! [`normalize`] never fails and never drops a candidate: anything it cannot
//! fix is left in place for [`validate`](crate::validate) to reject with a
//! precise field error.

use api_types::transaction::TransactionDraft;
use serde_json::{Number, Value};

use crate::validation::canonical_category;

/// Canonicalize one candidate. Idempotent.
///
/// - `category`: trimmed and lowercased when it is a string.
/// - `description`: trimmed when it is a string, dropped when empty.
/// - `paymentMethod`: kept as is; absent or null stays null.
/// - `confidence`: clamped to `[0, 1]` when numeric, otherwise dropped.
pub fn normalize(mut candidate: TransactionDraft) -> TransactionDraft {
    if let Some(Value::String(category)) = &candidate.category {
        candidate.category = Some(Value::String(canonical_category(category)));
    }

    candidate.description = match candidate.description {
        Some(Value::String(description)) => Some(description.trim())
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string())),
        Some(Value::Null) => None,
        other => other,
    };

    if matches!(candidate.payment_method, Some(Value::Null)) {
        candidate.payment_method = None;
    }

    candidate.confidence = match candidate.confidence {
        Some(Value::Number(confidence)) => confidence
            .as_f64()
            .map(|c| c.clamp(0.0, 1.0))
            .and_then(Number::from_f64)
            .map(Value::Number),
        _ => None,
    };

    candidate
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a string does not name a member of one of the closed sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl std::fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

/// Kind of a ledger record.
///
/// This is the single definition of the closed set: the engine validator and
/// every request/response type use it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub const ALL: [Self; 2] = [Self::Income, Self::Expense];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = UnknownVariant;

    /// Exact, case-sensitive match.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownVariant(value.to_string()))
    }
}

/// How a transaction was paid. `None` on a record means "not stated".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
    Bank,
    Others,
}

impl PaymentMethod {
    pub const ALL: [Self; 5] = [Self::Cash, Self::Card, Self::Upi, Self::Bank, Self::Others];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Upi => "upi",
            Self::Bank => "bank",
            Self::Others => "others",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = UnknownVariant;

    /// Exact, case-sensitive match.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == value)
            .ok_or_else(|| UnknownVariant(value.to_string()))
    }
}

pub mod user {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SignUp {
        pub name: String,
        pub email: String,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LogIn {
        pub email: String,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserView {
        pub id: Uuid,
        pub name: String,
        pub email: String,
    }

    /// Returned by both sign-up and log-in.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuthResponse {
        pub user: UserView,
        /// Bearer token for the `Authorization` header.
        pub token: String,
    }
}

pub mod ai {
    use super::*;
    use crate::transaction::TransactionDraft;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ParseText {
        pub text: String,
    }

    /// Normalized candidates extracted from a text, not yet persisted.
    ///
    /// Submit the accepted ones to `/transactions/bulk`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ParseResponse {
        pub transactions: Vec<TransactionDraft>,
    }
}

pub mod transaction {
    use super::*;
    use serde_json::Value;

    /// A record-shaped value as submitted by a client or proposed by the
    /// extractor.
    ///
    /// Every field is kept as raw JSON so that validation can name the exact
    /// field that is wrong (a string `"12"` amount, an unknown kind, ...)
    /// instead of failing the whole body at deserialization time.
    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransactionDraft {
        #[serde(rename = "type", alias = "kind", default)]
        pub kind: Option<Value>,
        #[serde(default)]
        pub amount: Option<Value>,
        #[serde(default)]
        pub category: Option<Value>,
        #[serde(default)]
        pub description: Option<Value>,
        #[serde(default)]
        pub payment_method: Option<Value>,
        /// Extractor self-reported certainty in `[0, 1]`.
        #[serde(default)]
        pub confidence: Option<Value>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransactionView {
        pub id: Uuid,
        pub owner_id: Uuid,
        #[serde(rename = "type")]
        pub kind: TransactionKind,
        pub amount: f64,
        pub category: String,
        pub description: Option<String>,
        pub payment_method: Option<PaymentMethod>,
        pub occurred_at: DateTime<Utc>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub transactions: Vec<TransactionView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BulkInsert {
        pub transactions: Vec<TransactionDraft>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BulkInserted {
        pub transactions: Vec<TransactionView>,
        pub count: usize,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FieldErrorView {
        pub field: String,
        pub reason: String,
    }

    /// Outcome of one element of a per-record bulk insert.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct BulkOutcome {
        pub index: usize,
        pub transaction: Option<TransactionView>,
        pub error: Option<FieldErrorView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BulkPartialResponse {
        pub results: Vec<BulkOutcome>,
        /// Number of records actually stored.
        pub committed: usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transaction::TransactionDraft;

    #[test]
    fn closed_sets_are_case_sensitive() {
        assert_eq!("income".parse::<TransactionKind>(), Ok(TransactionKind::Income));
        assert!("Income".parse::<TransactionKind>().is_err());
        assert!("transfer".parse::<TransactionKind>().is_err());
        assert_eq!("upi".parse::<PaymentMethod>(), Ok(PaymentMethod::Upi));
        assert_eq!("others".parse::<PaymentMethod>(), Ok(PaymentMethod::Others));
        assert!("Card".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn draft_accepts_type_or_kind_and_keeps_raw_values() {
        let draft: TransactionDraft = serde_json::from_str(
            r#"{"type":"expense","amount":"12","category":"Food","paymentMethod":null}"#,
        )
        .unwrap();
        assert_eq!(draft.kind, Some(serde_json::json!("expense")));
        assert_eq!(draft.amount, Some(serde_json::json!("12")));
        assert_eq!(draft.payment_method, None);

        let draft: TransactionDraft =
            serde_json::from_str(r#"{"kind":"income","amount":5}"#).unwrap();
        assert_eq!(draft.kind, Some(serde_json::json!("income")));
    }
}

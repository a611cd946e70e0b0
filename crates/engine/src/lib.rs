//! Ledger engine: credential checks, extraction of transactions from free
//! text, and validated ingestion into the record store.

pub use api_types::transaction::TransactionDraft;
pub use api_types::{PaymentMethod, TransactionKind};
pub use error::{EngineError, FieldError};
pub use extraction::{OpenAiCompatible, OpenAiConfig, TextGenerator, build_prompt};
pub use identity::{CredentialVerifier, Identity, JwtGate};
pub use normalization::normalize;
pub use ops::{Account, Engine, EngineBuilder, Session};
pub use parsing::parse_extraction;
pub use transactions::TransactionRecord;
pub use validation::{ValidTransaction, validate};

mod error;
mod extraction;
mod identity;
mod ingestion_keys;
mod normalization;
mod ops;
mod parsing;
mod transactions;
mod users;
mod validation;

pub type ResultEngine<T> = Result<T, EngineError>;

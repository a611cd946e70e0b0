//! Raw model output to candidate list.
//!
//! The parser is strict: the prompt asks for bare JSON, so
//! markdown fences, trailing commentary or truncated output are reported
//! instead of being repaired. The raw text always travels with the error.

use api_types::transaction::TransactionDraft;
use serde_json::Value;

use crate::{EngineError, ResultEngine};

/// Parse `raw` as exactly one `{"transactions": [...]}` object.
///
/// - not JSON at all: [`EngineError::InvalidJson`]
/// - JSON of the wrong shape: [`EngineError::MalformedExtraction`]
pub fn parse_extraction(raw: &str) -> ResultEngine<Vec<TransactionDraft>> {
    let value: Value = serde_json::from_str(raw).map_err(|err| {
        tracing::debug!("model output is not JSON: {err}");
        EngineError::InvalidJson {
            raw: raw.to_string(),
        }
    })?;

    let malformed = |reason: String| EngineError::MalformedExtraction {
        raw: raw.to_string(),
        reason,
    };

    let Value::Object(mut object) = value else {
        return Err(malformed("expected a JSON object".to_string()));
    };
    let Some(Value::Array(items)) = object.remove("transactions") else {
        return Err(malformed(
            "missing array-typed \"transactions\" field".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(_) => serde_json::from_value::<TransactionDraft>(item)
                .map_err(|err| malformed(format!("transactions[{index}]: {err}"))),
            _ => Err(malformed(format!("transactions[{index}] is not an object"))),
        })
        .collect()
}

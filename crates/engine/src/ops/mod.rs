use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    EngineError, FieldError, JwtGate, ResultEngine, TextGenerator,
};

mod accounts;
mod extraction;
mod ingestion;
mod records;

pub use accounts::{Account, Session};

const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Entry point of every ledger operation.
///
/// Stateless apart from the connection pool, the text generator and the
/// credential gate; safe to share behind an `Arc`.
pub struct Engine {
    database: DatabaseConnection,
    generator: Arc<dyn TextGenerator>,
    gate: JwtGate,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// Trim a client-supplied idempotency key; blank keys count as absent.
fn normalize_idempotency_key(key: Option<&str>) -> ResultEngine<Option<String>> {
    let Some(key) = key.map(str::trim).filter(|key| !key.is_empty()) else {
        return Ok(None);
    };
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(FieldError::new(
            "idempotencyKey",
            format!("must be at most {MAX_IDEMPOTENCY_KEY_LEN} bytes"),
        )
        .into());
    }
    Ok(Some(key.to_string()))
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    generator: Option<Arc<dyn TextGenerator>>,
    gate: Option<JwtGate>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Pass the text generation service used for extraction
    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> EngineBuilder {
        self.generator = Some(generator);
        self
    }

    /// Pass the gate issuing and verifying credentials
    pub fn gate(mut self, gate: JwtGate) -> EngineBuilder {
        self.gate = Some(gate);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let generator = self.generator.ok_or_else(|| {
            EngineError::ExtractionService("no text generator configured".to_string())
        })?;
        let gate = self
            .gate
            .ok_or_else(|| EngineError::Credential("no credential gate configured".to_string()))?;

        Ok(Engine {
            database: self.database,
            generator,
            gate,
        })
    }
}

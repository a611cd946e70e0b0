//! Transactions API endpoints

use api_types::transaction::{
    BulkInsert, BulkInserted, BulkOutcome, BulkPartialResponse, FieldErrorView,
    TransactionDraft, TransactionListResponse, TransactionView,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderName, HeaderValue, StatusCode},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as HeaderError, Header},
};
use engine::{Identity, TransactionRecord};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

static IDEMPOTENCY_KEY_HEADER: HeaderName = HeaderName::from_static("idempotency-key");

/// `TypedHeader` for the client-chosen `Idempotency-Key`.
///
/// A retried request carrying the same key replays the first result.
#[derive(Debug)]
pub struct IdempotencyKey(String);

impl Header for IdempotencyKey {
    fn name() -> &'static HeaderName {
        &IDEMPOTENCY_KEY_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, HeaderError>
    where
        Self: Sized,
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(HeaderError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(HeaderError::invalid());
        };

        Ok(IdempotencyKey(value.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        match HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode idempotency-key header"),
        }
    }
}

fn idempotency_key(header: &Option<TypedHeader<IdempotencyKey>>) -> Option<&str> {
    header.as_ref().map(|TypedHeader(key)| key.0.as_str())
}

fn view(record: TransactionRecord) -> TransactionView {
    TransactionView {
        id: record.id,
        owner_id: record.owner_id,
        kind: record.kind,
        amount: record.amount,
        category: record.category,
        description: record.description,
        payment_method: record.payment_method,
        occurred_at: record.occurred_at,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

pub async fn list(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
) -> Result<Json<TransactionListResponse>, ServerError> {
    let transactions = state
        .engine
        .list_transactions(&identity)
        .await?
        .into_iter()
        .map(view)
        .collect();
    Ok(Json(TransactionListResponse { transactions }))
}

pub async fn create(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    key: Option<TypedHeader<IdempotencyKey>>,
    Json(payload): Json<TransactionDraft>,
) -> Result<(StatusCode, Json<TransactionView>), ServerError> {
    let record = state
        .engine
        .ingest_one(&identity, &payload, idempotency_key(&key))
        .await?;
    Ok((StatusCode::CREATED, Json(view(record))))
}

/// All-or-nothing insert of a reviewed batch.
pub async fn bulk(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    key: Option<TypedHeader<IdempotencyKey>>,
    Json(payload): Json<BulkInsert>,
) -> Result<(StatusCode, Json<BulkInserted>), ServerError> {
    let transactions: Vec<TransactionView> = state
        .engine
        .ingest_batch(&identity, &payload.transactions, idempotency_key(&key))
        .await?
        .into_iter()
        .map(view)
        .collect();
    Ok((
        StatusCode::CREATED,
        Json(BulkInserted {
            count: transactions.len(),
            transactions,
        }),
    ))
}

/// Insert the valid elements of a batch and report the rejected ones.
pub async fn bulk_partial(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Json(payload): Json<BulkInsert>,
) -> Result<Json<BulkPartialResponse>, ServerError> {
    let outcomes = state
        .engine
        .ingest_each(&identity, &payload.transactions)
        .await?;

    let committed = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let results = outcomes
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| match outcome {
            Ok(record) => BulkOutcome {
                index,
                transaction: Some(view(record)),
                error: None,
            },
            Err(err) => BulkOutcome {
                index,
                transaction: None,
                error: Some(FieldErrorView {
                    field: err.field.to_string(),
                    reason: err.reason,
                }),
            },
        })
        .collect();

    Ok(Json(BulkPartialResponse { results, committed }))
}

pub async fn update(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransactionDraft>,
) -> Result<Json<TransactionView>, ServerError> {
    let record = state
        .engine
        .update_transaction(&identity, id, &payload)
        .await?;
    Ok(Json(view(record)))
}

pub async fn remove(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionView>, ServerError> {
    let record = state.engine.delete_transaction(&identity, id).await?;
    Ok(Json(view(record)))
}

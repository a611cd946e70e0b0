use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    EngineError, FieldError, Identity, ResultEngine, TransactionDraft, TransactionRecord,
    ValidTransaction, ingestion_keys, transactions, validate,
};

use super::{Engine, normalize_idempotency_key, with_tx};

impl Engine {
    /// Validate and store one record owned by `identity`.
    ///
    /// `occurred_at` is the ingestion time. On a validation error nothing is
    /// written. With an idempotency key already used by this owner, the
    /// previously stored record is returned instead. A key that was used for
    /// a batch of several records is rejected.
    pub async fn ingest_one(
        &self,
        identity: &Identity,
        draft: &TransactionDraft,
        idempotency_key: Option<&str>,
    ) -> ResultEngine<TransactionRecord> {
        let fields = validate(draft)?;
        let key = normalize_idempotency_key(idempotency_key)?;

        let mut records = self.commit(identity, vec![fields], key.as_deref()).await?;
        match records.len() {
            0 => Err(EngineError::KeyNotFound("transaction".to_string())),
            1 => Ok(records.swap_remove(0)),
            _ => Err(FieldError::new("idempotencyKey", "already used for a batch").into()),
        }
    }

    /// Validate and store a non-empty batch, all or nothing.
    ///
    /// Every record shares one owner and one `occurred_at`. The first invalid
    /// element aborts the whole batch with [`EngineError::BatchValidation`].
    pub async fn ingest_batch(
        &self,
        identity: &Identity,
        drafts: &[TransactionDraft],
        idempotency_key: Option<&str>,
    ) -> ResultEngine<Vec<TransactionRecord>> {
        ensure_not_empty(drafts)?;
        let key = normalize_idempotency_key(idempotency_key)?;

        let fields = drafts
            .iter()
            .enumerate()
            .map(|(index, draft)| {
                validate(draft).map_err(|error| EngineError::BatchValidation { index, error })
            })
            .collect::<ResultEngine<Vec<_>>>()?;

        self.commit(identity, fields, key.as_deref()).await
    }

    /// Validate a non-empty batch record by record.
    ///
    /// Valid elements are stored together in one database transaction;
    /// invalid ones are reported at their position and skipped.
    pub async fn ingest_each(
        &self,
        identity: &Identity,
        drafts: &[TransactionDraft],
    ) -> ResultEngine<Vec<Result<TransactionRecord, FieldError>>> {
        ensure_not_empty(drafts)?;

        let now = Utc::now();
        let outcomes: Vec<Result<TransactionRecord, FieldError>> = drafts
            .iter()
            .map(|draft| {
                validate(draft)
                    .map(|fields| TransactionRecord::new(identity.user_id(), fields, now))
            })
            .collect();

        let accepted: Vec<&TransactionRecord> =
            outcomes.iter().filter_map(|outcome| outcome.as_ref().ok()).collect();
        if !accepted.is_empty() {
            with_tx!(self, |db_tx| {
                insert_records(&db_tx, accepted.iter().copied(), None).await?;
                ResultEngine::Ok(())
            })?;
        }

        tracing::info!(
            owner = %identity.user_id(),
            committed = accepted.len(),
            rejected = drafts.len() - accepted.len(),
            "ingested transactions record by record"
        );
        Ok(outcomes)
    }

    async fn commit(
        &self,
        identity: &Identity,
        fields: Vec<ValidTransaction>,
        idempotency_key: Option<&str>,
    ) -> ResultEngine<Vec<TransactionRecord>> {
        let owner_id = identity.user_id();
        let now = Utc::now();
        let records: Vec<TransactionRecord> = fields
            .into_iter()
            .map(|fields| TransactionRecord::new(owner_id, fields, now))
            .collect();

        let stored = with_tx!(self, |db_tx| {
            let stored = match idempotency_key {
                Some(key) => {
                    if let Some(previous) = replay(&db_tx, owner_id, key).await? {
                        tracing::info!(owner = %owner_id, key, "replayed idempotent ingestion");
                        previous
                    } else if let Some(previous) = claim_key(&db_tx, owner_id, key, now).await? {
                        previous
                    } else {
                        insert_records(&db_tx, records.iter(), Some(key)).await?;
                        records
                    }
                }
                None => {
                    insert_records(&db_tx, records.iter(), None).await?;
                    records
                }
            };
            ResultEngine::Ok(stored)
        })?;

        tracing::info!(owner = %owner_id, count = stored.len(), "ingested transactions");
        Ok(stored)
    }
}

fn ensure_not_empty(drafts: &[TransactionDraft]) -> ResultEngine<()> {
    if drafts.is_empty() {
        return Err(
            FieldError::new("transactions", "must contain at least one transaction").into(),
        );
    }
    Ok(())
}

async fn insert_records<'a>(
    db_tx: &DatabaseTransaction,
    records: impl Iterator<Item = &'a TransactionRecord>,
    idempotency_key: Option<&str>,
) -> ResultEngine<()> {
    let models: Vec<transactions::ActiveModel> = records
        .map(|record| transactions::ActiveModel::from_record(record, idempotency_key))
        .collect();
    if models.is_empty() {
        return Ok(());
    }
    transactions::Entity::insert_many(models)
        .exec_without_returning(db_tx)
        .await?;
    Ok(())
}

/// Records previously committed by `owner_id` under `key`, if the key was used,
/// ordered by creation time then id.
async fn replay(
    db_tx: &DatabaseTransaction,
    owner_id: Uuid,
    key: &str,
) -> ResultEngine<Option<Vec<TransactionRecord>>> {
    let claimed = ingestion_keys::Entity::find_by_id((owner_id.to_string(), key.to_string()))
        .one(db_tx)
        .await?;
    if claimed.is_none() {
        return Ok(None);
    }

    let records = transactions::Entity::find()
        .filter(transactions::Column::OwnerId.eq(owner_id.to_string()))
        .filter(transactions::Column::IdempotencyKey.eq(key.to_string()))
        .order_by_asc(transactions::Column::CreatedAt)
        .order_by_asc(transactions::Column::Id)
        .all(db_tx)
        .await?
        .into_iter()
        .map(TransactionRecord::try_from)
        .collect::<ResultEngine<Vec<_>>>()?;
    Ok(Some(records))
}

/// Insert the key row. If a concurrent request claimed it first, return
/// that request's records instead.
async fn claim_key(
    db_tx: &DatabaseTransaction,
    owner_id: Uuid,
    key: &str,
    now: DateTime<Utc>,
) -> ResultEngine<Option<Vec<TransactionRecord>>> {
    let row = ingestion_keys::ActiveModel {
        owner_id: ActiveValue::Set(owner_id.to_string()),
        key: ActiveValue::Set(key.to_string()),
        created_at: ActiveValue::Set(now),
    };
    let inserted = ingestion_keys::Entity::insert(row)
        .exec_without_returning(db_tx)
        .await;
    if let Err(err) = inserted {
        if let Some(previous) = replay(db_tx, owner_id, key).await? {
            return Ok(Some(previous));
        }
        return Err(err.into());
    }
    Ok(None)
}

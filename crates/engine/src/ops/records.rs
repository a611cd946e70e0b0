use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::{
    EngineError, Identity, ResultEngine, TransactionDraft, TransactionRecord, transactions,
    validate,
};

use super::{Engine, with_tx};

impl Engine {
    /// All records owned by `identity`, newest first.
    pub async fn list_transactions(
        &self,
        identity: &Identity,
    ) -> ResultEngine<Vec<TransactionRecord>> {
        transactions::Entity::find()
            .filter(transactions::Column::OwnerId.eq(identity.user_id().to_string()))
            .order_by_desc(transactions::Column::OccurredAt)
            .order_by_desc(transactions::Column::CreatedAt)
            .order_by_asc(transactions::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(TransactionRecord::try_from)
            .collect()
    }

    /// Apply a field-level patch to one of the caller's records.
    ///
    /// Fields present in `patch` replace the stored ones; the merged record
    /// is validated again before it is written. Owner and `occurred_at`
    /// never change.
    pub async fn update_transaction(
        &self,
        identity: &Identity,
        transaction_id: Uuid,
        patch: &TransactionDraft,
    ) -> ResultEngine<TransactionRecord> {
        with_tx!(self, |db_tx| {
            let current = owned_record(&db_tx, identity, transaction_id).await?;
            let fields = validate(&merge_patch(&current, patch))?;

            let now = Utc::now();
            let active = transactions::ActiveModel {
                id: ActiveValue::Set(current.id.to_string()),
                kind: ActiveValue::Set(fields.kind.as_str().to_string()),
                amount: ActiveValue::Set(fields.amount),
                category: ActiveValue::Set(fields.category.clone()),
                description: ActiveValue::Set(fields.description.clone()),
                payment_method: ActiveValue::Set(
                    fields.payment_method.map(|method| method.as_str().to_string()),
                ),
                updated_at: ActiveValue::Set(now),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            tracing::info!(owner = %identity.user_id(), id = %transaction_id, "updated transaction");
            ResultEngine::Ok(TransactionRecord {
                kind: fields.kind,
                amount: fields.amount,
                category: fields.category,
                description: fields.description,
                payment_method: fields.payment_method,
                updated_at: now,
                ..current
            })
        })
    }

    /// Remove one of the caller's records and return it.
    pub async fn delete_transaction(
        &self,
        identity: &Identity,
        transaction_id: Uuid,
    ) -> ResultEngine<TransactionRecord> {
        with_tx!(self, |db_tx| {
            let current = owned_record(&db_tx, identity, transaction_id).await?;
            transactions::Entity::delete_by_id(current.id.to_string())
                .exec(&db_tx)
                .await?;

            tracing::info!(owner = %identity.user_id(), id = %transaction_id, "deleted transaction");
            ResultEngine::Ok(current)
        })
    }
}

/// Load a record, treating another owner's record exactly like a missing one.
async fn owned_record(
    db_tx: &DatabaseTransaction,
    identity: &Identity,
    transaction_id: Uuid,
) -> ResultEngine<TransactionRecord> {
    transactions::Entity::find_by_id(transaction_id.to_string())
        .filter(transactions::Column::OwnerId.eq(identity.user_id().to_string()))
        .one(db_tx)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound("transaction".to_string()))?
        .try_into()
}

/// Overlay the fields present in `patch` on the stored record.
fn merge_patch(current: &TransactionRecord, patch: &TransactionDraft) -> TransactionDraft {
    let text = |value: &str| Value::String(value.to_string());
    TransactionDraft {
        kind: patch
            .kind
            .clone()
            .or_else(|| Some(text(current.kind.as_str()))),
        amount: patch
            .amount
            .clone()
            .or_else(|| Number::from_f64(current.amount).map(Value::Number)),
        category: patch
            .category
            .clone()
            .or_else(|| Some(text(&current.category))),
        description: patch
            .description
            .clone()
            .or_else(|| current.description.as_deref().map(text)),
        payment_method: patch
            .payment_method
            .clone()
            .or_else(|| current.payment_method.map(|method| text(method.as_str()))),
        confidence: patch.confidence.clone(),
    }
}

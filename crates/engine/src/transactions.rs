//! Transaction records.
//!
//! A `TransactionRecord` is a single income or expense owned by one user.
//! The owner is stamped once at creation and never rewritten.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, PaymentMethod, ResultEngine, TransactionKind, ValidTransaction};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: TransactionKind,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Build a new record from validated fields; all timestamps are `now`.
    pub(crate) fn new(owner_id: Uuid, fields: ValidTransaction, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            kind: fields.kind,
            amount: fields.amount,
            category: fields.category,
            description: fields.description,
            payment_method: fields.payment_method,
            occurred_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_id: String,
    pub kind: String,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub payment_method: Option<String>,
    pub occurred_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub idempotency_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id"
    )]
    Owner,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn from_record(record: &TransactionRecord, idempotency_key: Option<&str>) -> Self {
        Self {
            id: ActiveValue::Set(record.id.to_string()),
            owner_id: ActiveValue::Set(record.owner_id.to_string()),
            kind: ActiveValue::Set(record.kind.as_str().to_string()),
            amount: ActiveValue::Set(record.amount),
            category: ActiveValue::Set(record.category.clone()),
            description: ActiveValue::Set(record.description.clone()),
            payment_method: ActiveValue::Set(
                record.payment_method.map(|method| method.as_str().to_string()),
            ),
            occurred_at: ActiveValue::Set(record.occurred_at),
            created_at: ActiveValue::Set(record.created_at),
            updated_at: ActiveValue::Set(record.updated_at),
            idempotency_key: ActiveValue::Set(idempotency_key.map(ToString::to_string)),
        }
    }
}

impl TryFrom<Model> for TransactionRecord {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let corrupt = |what: &str| EngineError::Database(DbErr::Custom(format!(
            "transaction {}: invalid stored {what}",
            model.id
        )));

        Ok(Self {
            id: Uuid::parse_str(&model.id).map_err(|_| corrupt("id"))?,
            owner_id: Uuid::parse_str(&model.owner_id).map_err(|_| corrupt("owner_id"))?,
            kind: model.kind.parse().map_err(|_| corrupt("kind"))?,
            amount: model.amount,
            category: model.category.clone(),
            description: model.description.clone(),
            payment_method: model
                .payment_method
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(|_| corrupt("payment_method"))?,
            occurred_at: model.occurred_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

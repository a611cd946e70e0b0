use api_types::ai::{ParseResponse, ParseText};
use axum::{Extension, Json, extract::State};
use engine::Identity;

use crate::{ServerError, server::ServerState};

/// Extract candidate transactions from free text. Nothing is stored.
pub async fn parse(
    Extension(identity): Extension<Identity>,
    State(state): State<ServerState>,
    Json(payload): Json<ParseText>,
) -> Result<Json<ParseResponse>, ServerError> {
    let transactions = state
        .engine
        .extract_candidates(&identity, &payload.text)
        .await?;
    Ok(Json(ParseResponse { transactions }))
}

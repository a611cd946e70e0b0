//! Sign-up and log-in endpoints, the only routes without a bearer token.

use api_types::user::{AuthResponse, LogIn, SignUp, UserView};
use axum::{Json, extract::State, http::StatusCode};
use engine::Session;

use crate::{ServerError, server::ServerState};

fn auth_response(session: Session) -> AuthResponse {
    AuthResponse {
        user: UserView {
            id: session.account.id,
            name: session.account.name,
            email: session.account.email,
        },
        token: session.token,
    }
}

pub async fn sign_up(
    State(state): State<ServerState>,
    Json(payload): Json<SignUp>,
) -> Result<(StatusCode, Json<AuthResponse>), ServerError> {
    let session = state
        .engine
        .sign_up(&payload.name, &payload.email, &payload.password)
        .await?;
    Ok((StatusCode::CREATED, Json(auth_response(session))))
}

pub async fn log_in(
    State(state): State<ServerState>,
    Json(payload): Json<LogIn>,
) -> Result<Json<AuthResponse>, ServerError> {
    let session = state
        .engine
        .log_in(&payload.email, &payload.password)
        .await?;
    Ok(Json(auth_response(session)))
}

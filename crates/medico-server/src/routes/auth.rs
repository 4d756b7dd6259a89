//! Token login and the middleware that checks tokens.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::extract::JsonBody;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// `POST /login`: exchange credentials for the user's token.
///
/// Missing or non-string fields get the same answer as a wrong password.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Json<LoginResponse>> {
    let field = |name: &str| body.get(name).and_then(Value::as_str);
    let (Some(username), Some(password)) = (field("username"), field("password")) else {
        return Err(ApiError::InvalidCredentials);
    };

    let db = state.db()?;
    match db.authenticate(username, password)? {
        Some(token) => {
            info!(username = %username, "login succeeded");
            Ok(Json(LoginResponse { token }))
        }
        None => Err(ApiError::InvalidCredentials),
    }
}

/// Reject requests without a valid `Authorization: Token <key>` header.
pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.require_auth() {
        return Ok(next.run(request).await);
    }

    let key = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Token "))
        .map(|key| key.trim().to_string())
        .ok_or_else(|| {
            ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
        })?;

    let user = {
        let db = state.db()?;
        db.user_for_token(&key)?
    };
    let Some(user) = user else {
        return Err(ApiError::Unauthorized("Invalid token.".to_string()));
    };

    debug!(user_id = user.id, method = %request.method(), uri = %request.uri(), "authenticated");
    Ok(next.run(request).await)
}

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use catalog_core::format_update_time;
use serde::Serialize;
use serde_json::json;
use time::format_description::well_known::Rfc3339;

use crate::{error::ApiError, server::AppState};

const JSON_UTF8: &str = "application/json; charset=utf-8";

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Ready once a snapshot is present. Reports when it was fetched.
pub async fn readyz(State(state): State<AppState>) -> Response {
    match state.query.current_snapshot().await {
        Ok(snapshot) => {
            let fetched_at = snapshot.fetched_at().format(&Rfc3339).unwrap_or_default();
            let body = json!({
                "status": "ready",
                "fetchedAt": fetched_at,
                "strategy": state.query.strategy().to_string(),
                "refreshing": state.refresh.is_refreshing(),
            });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            let body = json!({ "status": "unavailable", "error": e.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}

/// `GET /data`: the current catalog, without contacting the upstream.
pub async fn data(State(state): State<AppState>) -> Result<Response, ApiError> {
    let payload = state.query.current_payload().await.map_err(ApiError::Query)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8))],
        payload,
    )
        .into_response())
}

/// `POST /update`: run one refresh and report when the data was fetched.
pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(expected) = state.trigger_token.as_deref() {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if !presented.is_some_and(|token| tokens_match(token, expected)) {
            return Err(ApiError::Unauthorized);
        }
    }

    let fetched_at = state.refresh.refresh().await.map_err(ApiError::Refresh)?;
    Ok(Json(json!({ "updTm": format_update_time(fetched_at) })))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Constant-time comparison of an operator token. Only the length leaks.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3creT", "s3cret"));
        assert!(!tokens_match("s3cre", "s3cret"));
        assert!(!tokens_match("", "s3cret"));
    }
}

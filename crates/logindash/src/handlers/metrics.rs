use axum::{extract::State, http::StatusCode, Json};

use crate::app::AppState;
use crate::report;
use logindash_models::LoginSummary;

/// GET /api/metrics/login-summary
pub async fn login_summary(
    State(state): State<AppState>,
) -> Result<Json<LoginSummary>, (StatusCode, Json<serde_json::Value>)> {
    match report::login_summary(state.source.as_ref(), &state.excluded_users, state.now()).await {
        Ok(summary) => Ok(Json(summary)),
        Err(e) => {
            tracing::error!(source = state.source.name(), error = %e, "login events fetch failed");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": "Unexpected upstream response"})),
            ))
        }
    }
}

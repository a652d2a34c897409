use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;

use crate::{error::AppResult, AppState};

/// Restock every eligible product according to its priority.
pub async fn restock_all(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let summary = state.inventory.restock_all().await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Restock completed",
            "restocked_products": summary.restocked_products,
            "total_restocked": summary.total_restocked,
            "skipped_products": summary.skipped_products,
            "malformed_products": summary.malformed_products,
        })),
    ))
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::{
    error::AppResult,
    models::{NewProduct, PurchaseRequest},
    AppState,
};

// ── Create ────────────────────────────────────────────────────────────────────

pub async fn add_product(
    State(state): State<AppState>,
    Json(payload): Json<NewProduct>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let added = state.inventory.add_product(payload).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Product added successfully",
            "product": added.product,
            "inventory_count": added.inventory_count,
        })),
    ))
}

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list_products(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let views = state.inventory.list_statuses().await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "count": views.len(),
            "data": views,
        })),
    ))
}

// ── Get status ────────────────────────────────────────────────────────────────

pub async fn get_product_status(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let view = state.inventory.product_status(&product_id).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "product_id": view.product_id,
            "stock_quantity": view.stock_quantity,
            "status": view.status,
            "priority": view.priority,
        })),
    ))
}

// ── Purchase ──────────────────────────────────────────────────────────────────

pub async fn purchase_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(purchase): Json<PurchaseRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let receipt = state
        .inventory
        .purchase(&product_id, purchase.quantity)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Purchase successful",
            "product_id": receipt.product_id,
            "purchased_quantity": receipt.purchased_quantity,
            "remaining_stock": receipt.remaining_stock,
            "new_status": receipt.new_status,
        })),
    ))
}

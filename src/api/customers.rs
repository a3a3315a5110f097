// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    error::ApiError,
    models::{Customer, CustomerQuery, CustomerStatus},
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/customers",
    params(CustomerQuery),
    tag = "Customers",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = [Customer]),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Role not permitted")
    )
)]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(params): Query<CustomerQuery>,
) -> Json<Vec<Customer>> {
    let status = params.status.as_deref().and_then(CustomerStatus::from_filter);
    let store = state.store.read().await;
    Json(store.list_customers(status))
}

#[utoipa::path(
    get,
    path = "/customers/{customer_id}",
    params(
        ("customer_id" = String, Path, description = "Customer identifier")
    ),
    tag = "Customers",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = Customer),
        (status = 403, description = "Role not permitted or customer not owned by caller"),
        (status = 404, description = "Customer not found")
    )
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    let store = state.store.read().await;
    Ok(Json(store.customer(&customer_id)?))
}

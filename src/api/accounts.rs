// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::{
    auth::AuthenticatedCaller,
    error::ApiError,
    models::{NewAccountRequest, NewAccountResponse, TransactionRequest, TransactionResponse},
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/customers/{customer_id}/account",
    params(
        ("customer_id" = String, Path, description = "Customer opening the account")
    ),
    request_body = NewAccountRequest,
    tag = "Accounts",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, body = NewAccountResponse),
        (status = 403, description = "Role not permitted or customer not owned by caller"),
        (status = 404, description = "Customer not found"),
        (status = 422, description = "Deposit below minimum or unknown account type")
    )
)]
pub async fn open_account(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    caller: Option<Extension<AuthenticatedCaller>>,
    Json(request): Json<NewAccountRequest>,
) -> Result<(StatusCode, Json<NewAccountResponse>), ApiError> {
    let mut store = state.store.write().await;
    let response = store.open_account(&customer_id, request)?;
    tracing::info!(
        %customer_id,
        account_id = %response.account_id,
        role = caller.as_ref().map(|Extension(c)| c.role.as_str()).unwrap_or("-"),
        "account opened"
    );
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/customers/{customer_id}/account/{account_id}",
    params(
        ("customer_id" = String, Path, description = "Customer owning the account"),
        ("account_id" = String, Path, description = "Account to credit or debit")
    ),
    request_body = TransactionRequest,
    tag = "Accounts",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, body = TransactionResponse),
        (status = 403, description = "Role not permitted or customer not owned by caller"),
        (status = 404, description = "Account not found for this customer"),
        (status = 422, description = "Invalid amount, type, or insufficient balance")
    )
)]
pub async fn make_transaction(
    State(state): State<AppState>,
    Path((customer_id, account_id)): Path<(String, String)>,
    Json(request): Json<TransactionRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    let mut store = state.store.write().await;
    let response = store.make_transaction(&customer_id, &account_id, request)?;
    Ok((StatusCode::CREATED, Json(response)))
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{models::PermissionsResponse, state::AppState};

/// Every operation granted to at least one role.
#[utoipa::path(
    get,
    path = "/permissions",
    tag = "Permissions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = PermissionsResponse),
        (status = 403, description = "Role not permitted")
    )
)]
pub async fn get_role_permissions(State(state): State<AppState>) -> Json<PermissionsResponse> {
    Json(PermissionsResponse {
        permissions: state.policy().all_permissions().into_iter().collect(),
    })
}

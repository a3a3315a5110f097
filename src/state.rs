// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::auth::{AuthClient, AuthService, AuthorizationState, PermissionPolicy};
use crate::store::InMemoryStore;

/// State of the main API process.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<InMemoryStore>>,
    pub authz: AuthorizationState,
}

impl AppState {
    pub fn new(store: InMemoryStore, client: AuthClient, policy: PermissionPolicy) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            authz: AuthorizationState::new(client, policy),
        }
    }

    pub fn auth_client(&self) -> &AuthClient {
        &self.authz.client
    }

    pub fn policy(&self) -> &PermissionPolicy {
        &self.authz.policy
    }
}

/// State of the auth service process.
#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<AuthService>,
}

impl AuthState {
    pub fn new(service: Arc<AuthService>) -> Self {
        Self { service }
    }
}

#[cfg(test)]
impl AppState {
    /// Demo data with an in-process auth service and no users.
    pub(crate) fn for_tests() -> Self {
        use crate::auth::{InMemoryCredentialStore, TokenService};

        let tokens = TokenService::new("state-test-secret", chrono::Duration::hours(1), chrono::Duration::days(7))
            .expect("valid token settings");
        let policy = PermissionPolicy::default();
        let service = AuthService::new(tokens, policy.clone(), Arc::new(InMemoryCredentialStore::new()));
        Self::new(InMemoryStore::with_demo_data(), AuthClient::Local(Arc::new(service)), policy)
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Token issuance, verification and role/ownership authorization for the
//! customer/account API.
//!
//! ## Auth Flow
//!
//! 1. Client posts credentials to `/auth/login` and receives an access token
//!    plus a revocable refresh token
//! 2. Client sends `Authorization: Bearer <access token>` to the main API
//! 3. The main API's middleware asks the auth service for a verdict on the
//!    token, the route's operation name and the route parameters
//!    (in-process or over HTTP)
//! 4. The verdict's role is re-checked against the local permission policy
//!    before the handler runs
//!
//! ## Security
//!
//! - Tokens are HS256 only; other algorithms are rejected
//! - Expiry is checked without leeway
//! - Refresh tokens are stored by digest and can be revoked
//! - Credential failures never reveal whether the username exists

pub mod claims;
pub mod client;
pub mod database;
pub mod error;
pub mod middleware;
pub mod ownership;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod service;
pub mod store;
pub mod token;

pub use claims::{AccessClaims, RefreshClaims, UserIdentity, Verdict};
pub use client::{AuthClient, RemoteAuthClient};
pub use database::CredentialDatabase;
pub use error::AuthError;
pub use middleware::{authorize, protect, AuthenticatedCaller, AuthorizationState};
pub use permissions::PermissionPolicy;
pub use roles::{Operation, Role};
pub use service::{AuthService, LoginRequest, LoginResponse, RefreshResponse};
pub use store::{CredentialStore, InMemoryCredentialStore, NewUser, StoreError};
pub use token::{IssuedRefreshToken, TokenError, TokenService};

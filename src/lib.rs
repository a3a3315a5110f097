// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bank Gateway - customer/account API with a companion auth service
//!
//! Two cooperating HTTP servers share one authorization domain: the auth
//! service issues and verifies tokens, the main API guards every route by
//! asking it for a verdict.
//!
//! ## Modules
//!
//! - `api` - HTTP routers and handlers (Axum)
//! - `auth` - tokens, credentials, permissions and the authorization middleware
//! - `config` - environment configuration
//! - `server` - startup barrier and graceful shutdown of both servers
//! - `store` - in-memory customers, accounts and transactions

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod state;
pub mod store;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process lifecycle.
//!
//! With `SERVER_ROLE=all` the auth server is started first and the main API
//! only once the auth server answers `/health`. On SIGINT/SIGTERM the main
//! API is drained before the auth server so in-flight verifications can
//! still complete.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::Handle;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{auth_router, main_router};
use crate::auth::client::ClientBuildError;
use crate::auth::database::CredentialDbError;
use crate::auth::{
    AuthClient, AuthService, CredentialDatabase, CredentialStore, PermissionPolicy, RemoteAuthClient,
    StoreError, TokenError, TokenService,
};
use crate::config::{Config, ServerRole, VerificationMode};
use crate::state::{AppState, AuthState};
use crate::store::InMemoryStore;

/// Health probes made before giving up on the auth server.
const STARTUP_PROBES: u32 = 50;
const STARTUP_PROBE_INTERVAL: Duration = Duration::from_millis(100);
const STARTUP_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
/// How often expired refresh records are swept; the first sweep runs at startup.
const REFRESH_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot resolve {name} address {addr}")]
    Address { name: &'static str, addr: String },

    #[error("invalid token settings: {0}")]
    Token(#[from] TokenError),

    #[error("credential database: {0}")]
    Database(#[from] CredentialDbError),

    #[error("seeding user {username}: {source}")]
    Seed { username: String, source: StoreError },

    #[error("auth client: {0}")]
    Client(#[from] ClientBuildError),

    #[error("{0} server failed to bind")]
    NotListening(&'static str),

    #[error("auth server at {0} did not become healthy")]
    AuthNotReady(SocketAddr),

    #[error("{name} server failed: {source}")]
    Serve {
        name: &'static str,
        source: std::io::Error,
    },

    #[error("{name} server task: {source}")]
    Join {
        name: &'static str,
        source: tokio::task::JoinError,
    },
}

/// Token service, policy and credential database for the auth side.
pub async fn build_auth_service(config: &Config) -> Result<Arc<AuthService>, ServerError> {
    let tokens = TokenService::new(
        &config.jwt_secret,
        chrono::Duration::hours(config.access_token_ttl_hours),
        chrono::Duration::days(config.refresh_token_ttl_days),
    )?;
    let policy = PermissionPolicy::with_defaults(config.admin_bypass);
    let db = CredentialDatabase::open(&config.credentials_db_path)?;

    for user in config.seed_users.iter().cloned() {
        let username = user.username.clone();
        db.upsert_user(user)
            .await
            .map_err(|source| ServerError::Seed {
                username: username.clone(),
                source,
            })?;
        tracing::info!(%username, "seeded user");
    }

    tracing::info!(
        path = %config.credentials_db_path.display(),
        access_ttl_hours = tokens.access_ttl().num_hours(),
        refresh_ttl_days = tokens.refresh_ttl().num_days(),
        admin_bypass = policy.admin_bypass(),
        "auth service ready"
    );
    Ok(Arc::new(AuthService::new(tokens, policy, Arc::new(db))))
}

/// Purge expired refresh records now and then every `every`.
fn spawn_refresh_sweeper(service: Arc<AuthService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = service.purge_expired().await {
                tracing::warn!(error = %e, "refresh token sweep failed");
            }
        }
    })
}

async fn resolve(name: &'static str, addr: String) -> Result<SocketAddr, ServerError> {
    let resolved = tokio::net::lookup_host(addr.as_str())
        .await
        .ok()
        .and_then(|mut addrs| addrs.next());
    resolved.ok_or(ServerError::Address { name, addr })
}

struct RunningServer {
    name: &'static str,
    handle: Handle<SocketAddr>,
    task: JoinHandle<std::io::Result<()>>,
    addr: SocketAddr,
}

impl RunningServer {
    async fn start(
        name: &'static str,
        addr: SocketAddr,
        app: Router,
        exited: mpsc::UnboundedSender<&'static str>,
    ) -> Result<Self, ServerError> {
        let handle: Handle<SocketAddr> = Handle::new();
        let server = axum_server::bind(addr).handle(handle.clone());
        let task = tokio::spawn(async move {
            let result = server.serve(app.into_make_service()).await;
            let _ = exited.send(name);
            result
        });

        let Some(addr) = handle.listening().await else {
            return match task.await {
                Ok(Err(source)) => Err(ServerError::Serve { name, source }),
                Err(source) => Err(ServerError::Join { name, source }),
                Ok(Ok(())) => Err(ServerError::NotListening(name)),
            };
        };
        tracing::info!(server = name, %addr, "listening");
        Ok(Self {
            name,
            handle,
            task,
            addr,
        })
    }

    async fn stop(self, grace: Duration) -> Result<(), ServerError> {
        let name = self.name;
        tracing::info!(server = name, grace_secs = grace.as_secs(), "draining");
        self.handle.graceful_shutdown(Some(grace));
        match self.task.await {
            Ok(Ok(())) => {
                tracing::info!(server = name, "stopped");
                Ok(())
            }
            Ok(Err(source)) => Err(ServerError::Serve { name, source }),
            Err(source) => Err(ServerError::Join { name, source }),
        }
    }
}

/// Poll the auth server's `/health` until it answers.
async fn wait_for_auth(mut addr: SocketAddr) -> Result<(), ServerError> {
    if addr.ip().is_unspecified() {
        addr.set_ip(Ipv4Addr::LOCALHOST.into());
    }
    let probe = RemoteAuthClient::new(&format!("http://{addr}"), STARTUP_PROBE_TIMEOUT)?;
    for attempt in 1..=STARTUP_PROBES {
        if probe.ping().await {
            tracing::debug!(attempt, "auth server healthy");
            return Ok(());
        }
        tokio::time::sleep(STARTUP_PROBE_INTERVAL).await;
    }
    Err(ServerError::AuthNotReady(addr))
}

/// Servers started for the configured role, in shutdown order.
pub struct Servers {
    running: Vec<RunningServer>,
    exited: mpsc::UnboundedReceiver<&'static str>,
    grace: Duration,
    sweeper: Option<JoinHandle<()>>,
}

impl Servers {
    pub async fn start(config: &Config) -> Result<Self, ServerError> {
        let (exited_tx, exited) = mpsc::unbounded_channel();
        let mut running = Vec::new();

        let needs_service = config.server_role != ServerRole::Main
            || config.verification_mode == VerificationMode::Local;
        let service = if needs_service {
            Some(build_auth_service(config).await?)
        } else {
            None
        };
        let sweeper = service
            .as_ref()
            .map(|service| spawn_refresh_sweeper(service.clone(), REFRESH_PURGE_INTERVAL));

        if config.server_role != ServerRole::Main {
            if let Some(service) = &service {
                let addr = resolve("auth", config.auth_addr()).await?;
                let app = auth_router(AuthState::new(service.clone()));
                let auth = RunningServer::start("auth", addr, app, exited_tx.clone()).await?;
                wait_for_auth(auth.addr).await?;
                running.push(auth);
            }
        }

        if config.server_role != ServerRole::Auth {
            let client = match (&service, config.verification_mode) {
                (Some(service), VerificationMode::Local) => AuthClient::Local(service.clone()),
                _ => AuthClient::Remote(RemoteAuthClient::new(
                    &config.auth_service_url,
                    config.verify_timeout,
                )?),
            };
            tracing::info!(mode = client.mode(), auth_service_url = %config.auth_service_url, "token verification");

            let policy = PermissionPolicy::with_defaults(config.admin_bypass);
            let state = AppState::new(InMemoryStore::with_demo_data(), client, policy);
            let addr = resolve("main", config.main_addr()).await?;
            let main = RunningServer::start("main", addr, main_router(state), exited_tx).await?;
            tracing::info!(addr = %main.addr, "docs at /docs");
            // Main stops first.
            running.insert(0, main);
        }

        Ok(Self {
            running,
            exited,
            grace: config.shutdown_grace,
            sweeper,
        })
    }

    /// Bound address of the named server (`main` or `auth`).
    pub fn addr(&self, name: &str) -> Option<SocketAddr> {
        self.running
            .iter()
            .find(|server| server.name == name)
            .map(|server| server.addr)
    }

    /// Resolve when any server stops on its own.
    pub async fn exited(&mut self) -> Option<&'static str> {
        self.exited.recv().await
    }

    /// Drain every server in order, each for at most the grace period.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        if let Some(sweeper) = &self.sweeper {
            sweeper.abort();
        }
        let mut first_error = None;
        for server in self.running {
            if let Err(e) = server.stop(self.grace).await {
                tracing::error!(error = %e, "shutdown error");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Run until SIGINT/SIGTERM or until a server exits.
pub async fn run(config: Config) -> Result<(), ServerError> {
    tracing::info!(role = ?config.server_role, "starting");
    let mut servers = Servers::start(&config).await?;

    tokio::select! {
        _ = shutdown_signal() => {}
        name = servers.exited() => {
            tracing::error!(server = name.unwrap_or("unknown"), "server exited unexpectedly");
        }
    }

    servers.shutdown().await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

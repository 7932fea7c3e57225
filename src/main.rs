// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use niuniu_market_server::{
    api::router, config::AppConfig, expiry_sweeper::ExpirySweeper, market::accounts::ensure_admin,
    state::AppState, telemetry,
};

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_logging();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let state = match AppState::open(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, data_dir = %config.data_dir.display(), "Failed to open data directory");
            return ExitCode::FAILURE;
        }
    };

    if let Some(seed) = &config.seed_admin {
        match ensure_admin(&state.db, &state.rng, &seed.phone, &seed.password, Utc::now()) {
            Ok(true) => tracing::info!(phone = %seed.phone, "Created bootstrap admin"),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(error = %e, "Failed to create bootstrap admin");
                return ExitCode::FAILURE;
            }
        }
    }

    let shutdown = CancellationToken::new();
    let sweeper = ExpirySweeper::new(state.db.clone(), state.files.clone(), config.sweep_interval);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    let app = router(state);
    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.bind_addr, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(addr = %config.bind_addr, "Niuniu Market listening (docs at /docs)");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    shutdown.cancel();
    let _ = sweeper_handle.await;

    match served {
        Ok(()) => {
            tracing::info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

/// Resolve on ctrl-c or SIGTERM, cancelling background tasks.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for ctrl-c");
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
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

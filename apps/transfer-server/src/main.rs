// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use banque_transfer_server::{
    api::router,
    challenge::{ChallengeStore, ChallengeSweeper, InMemoryChallengeStore},
    config::{LogFormat, ServerConfig},
    notifier::{LogNotifier, Notifier, WebhookNotifier},
    state::{AppState, AuthConfig},
    storage::{FileStorage, Ledger, LedgerSeed, StoragePaths},
    transfer::TransferService,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(config.log_format);

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let mut storage = FileStorage::new(StoragePaths::new(&config.data_dir));
    storage
        .initialize()
        .expect("Failed to initialize data directory");

    let ledger = Ledger::open(&storage.paths().ledger_db()).expect("Failed to open ledger");
    if let Some(seed_file) = &config.ledger_seed_file {
        let seed = LedgerSeed::from_file(seed_file).expect("Failed to read ledger seed file");
        let report = ledger.seed(&seed).expect("Failed to seed ledger");
        info!(
            clients_added = report.clients_added,
            accounts_added = report.accounts_added,
            "Ledger seeded"
        );
    }

    let notifier: Arc<dyn Notifier> = match &config.notifier_webhook_url {
        Some(url) => Arc::new(
            WebhookNotifier::new(url, config.notifier_webhook_secret.as_deref())
                .expect("Failed to configure webhook notifier"),
        ),
        None => {
            warn!("NOTIFIER_WEBHOOK_URL not set; one-time codes are only logged");
            Arc::new(LogNotifier)
        }
    };

    let challenges: Arc<dyn ChallengeStore> = Arc::new(InMemoryChallengeStore::new());
    let shutdown = CancellationToken::new();
    tokio::spawn(
        ChallengeSweeper::new(challenges.clone())
            .with_interval(config.sweep_interval)
            .run(shutdown.clone()),
    );

    let transfers = TransferService::new(
        Arc::new(ledger),
        Arc::new(storage),
        challenges,
        notifier,
    )
    .with_otp_ttl(config.otp_ttl);

    let auth_config = match &config.jwt_secret {
        Some(secret) => AuthConfig::hs256(secret, config.jwt_issuer.clone()),
        None => {
            warn!("JWT_SECRET not set; DEV MODE accepts unverified tokens");
            AuthConfig::default()
        }
    };

    let app = router(AppState::new(transfers, auth_config));

    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .expect("Failed to parse bind address");

    let handle = Handle::<SocketAddr>::new();
    tokio::spawn(shutdown_on_signal(handle.clone(), shutdown));

    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    match &config.tls {
        Some((cert, key)) => {
            let tls_config = RustlsConfig::from_pem_file(cert, key)
                .await
                .expect("Failed to load TLS certificate and key");
            info!(%addr, "Transfer server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(service)
                .await
                .expect("HTTPS server failed");
        }
        None => {
            info!(%addr, "Transfer server listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(service)
                .await
                .expect("HTTP server failed");
        }
    }
}

async fn shutdown_on_signal(handle: Handle<SocketAddr>, shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
    shutdown.cancel();
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}

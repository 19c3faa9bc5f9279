// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bigstats::export::ExportDispatcher;
use bigstats::export::kafka::KafkaPublisher;
use bigstats::icontrol::IcontrolClient;
use bigstats::ports::ConfigStore;
use bigstats::scheduler::{IntervalTaskScheduler, Scheduler};
use bigstats::server::{self, ControlState};
use bigstats::store::FileConfigStore;
use clap::Parser;
use log::{LevelFilter, debug, error, info, warn};
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};

#[derive(Parser, Debug)]
#[command(name = "bigstatsd")]
#[command(about = "Collects load balancer statistics and exports them")]
#[command(version)]
struct Args {
    /// Address of the HTTP control surface.
    #[arg(long, env = "BIGSTATS_LISTEN", default_value = "127.0.0.1:8100")]
    listen: SocketAddr,

    /// Base URL of the management REST API.
    #[arg(long, env = "BIGSTATS_MANAGEMENT_URL", default_value = "https://localhost")]
    management_url: String,

    #[arg(long, env = "BIGSTATS_CONFIG_FILE", default_value = "/etc/bigstats/config.yaml")]
    config_file: PathBuf,

    #[arg(long, env = "BIGSTATS_LOG_LEVEL", default_value = "info")]
    log_level: LevelFilter,

    /// Also append log lines to this file.
    #[arg(long, env = "BIGSTATS_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Verify TLS certificates of the management API and HTTPS destinations.
    #[arg(long, env = "BIGSTATS_TLS_VERIFY")]
    tls_verify: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    bigstats_log::init("bigstats", args.log_level, args.log_file.as_deref())
        .context("Failed to initialize logging")?;
    info!("bigstatsd starting (version {})", env!("CARGO_PKG_VERSION"));
    debug!("{args:?}");

    let source = Arc::new(
        IcontrolClient::new(&args.management_url, args.tls_verify)
            .context("Failed to create management API client")?,
    );
    let store: Arc<dyn ConfigStore> = Arc::new(FileConfigStore::new(&args.config_file));
    let (timer, mut ticks) = IntervalTaskScheduler::new();
    let timer = Arc::new(timer);
    let dispatcher = ExportDispatcher::new(args.tls_verify, Arc::new(KafkaPublisher::new()))
        .context("Failed to create export client")?;
    let scheduler = Arc::new(Scheduler::new(
        source,
        Arc::clone(&store),
        timer.clone(),
        dispatcher,
    ));

    if let Err(e) = scheduler.activate().await {
        warn!("activation failed, the next tick will retry registration: {e}");
    }

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!("listening on {}", listener.local_addr()?);
    let state = Arc::new(ControlState {
        scheduler: Arc::clone(&scheduler),
        store,
    });
    let server = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state).await {
            error!("control server stopped: {e}");
        }
    });

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    loop {
        tokio::select! {
            Some(request) = ticks.recv() => {
                debug!("timer fired for {} ({})", request.name, request.task);
                scheduler.on_tick();
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                break;
            }
        }
    }

    timer.shutdown();
    server.abort();
    info!("bigstatsd stopped");
    Ok(())
}

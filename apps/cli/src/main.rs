// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC Ingest CLI - parse and validate IFC files through the remote parsing
//! service, falling back to the native parser.
//!
//! Configuration comes from `IFC_*` environment variables (see
//! [`IngestConfig`]); the flags below override them. Results are printed as
//! pretty JSON on stdout, logs go to stderr.
//!
//! # Commands
//!
//! - `ifc-ingest parse <FILE>` - entity counts and metadata
//! - `ifc-ingest validate <FILE>` - validation report (exit code 2 when invalid)
//! - `ifc-ingest health` - remote service health
//! - `ifc-ingest status` - breaker state, flags and remote availability

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use ifc_ingest_service::{IfcService, IngestConfig, IngestError, TracingLogger};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "ifc-ingest")]
#[command(about = "Resilient IFC ingestion: remote parsing service with native fallback")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Skip the remote parsing service
    #[arg(long, global = true)]
    no_service: bool,

    /// Disable the native fallback parser
    #[arg(long, global = true)]
    no_fallback: bool,

    /// Remote service base URL (overrides IFC_SERVICE_URL)
    #[arg(long, global = true, value_name = "URL")]
    service_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse an IFC file and print entity counts
    Parse {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Validate an IFC file
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Query the remote service health endpoint
    Health,
    /// Print orchestrator status
    Status,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.json);

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        let cancel = CancellationToken::new();

        let shutdown_signal = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => cancel.cancel(),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to install CTRL+C handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            result = run(args, cancel.clone()) => result,
            _ = shutdown_signal => {
                eprintln!("\nReceived CTRL+C, cancelling...");
                Err(IngestError::Cancelled.into())
            }
        }
    });

    match result {
        Ok(code) => process::exit(code),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            if let Some(ingest) = error.downcast_ref::<IngestError>() {
                eprintln!("Code: {} ({})", ingest.code(), ingest.component());
            }
            process::exit(1);
        }
    }
}

fn init_tracing(json: bool) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,ifc_ingest=debug".into());
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .pretty()
            .init();
    }
}

/// Run one command; returns the process exit code.
async fn run(args: Args, cancel: CancellationToken) -> Result<i32> {
    let mut config = IngestConfig::from_env();
    if args.no_service {
        config.service_enabled = false;
    }
    if args.no_fallback {
        config.fallback_enabled = false;
    }
    if let Some(url) = args.service_url {
        config.service_url = url;
    }

    tracing::debug!(
        service_enabled = config.service_enabled,
        fallback_enabled = config.fallback_enabled,
        service_url = %config.service_url,
        max_file_size = config.max_file_size,
        cache_enabled = config.cache_enabled,
        "Loaded ingestion config"
    );

    let service = IfcService::from_config(&config, TracingLogger::shared())
        .await
        .context("Failed to initialise IFC service")?;

    match args.command {
        Command::Parse { file } => {
            let data = read_input(&file).await?;
            let result = service
                .parse_ifc(data, &cancel)
                .await
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            print_json(&result)?;
            Ok(0)
        }
        Command::Validate { file } => {
            let data = read_input(&file).await?;
            let result = service
                .validate_ifc(data, &cancel)
                .await
                .with_context(|| format!("Failed to validate {}", file.display()))?;
            print_json(&result)?;
            Ok(if result.valid { 0 } else { 2 })
        }
        Command::Health => {
            let health = service
                .health(&cancel)
                .await
                .context("Remote IFC service health check failed")?;
            print_json(&health)?;
            Ok(0)
        }
        Command::Status => {
            print_json(&service.status(&cancel).await)?;
            Ok(0)
        }
    }
}

async fn read_input(path: &Path) -> Result<Bytes> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Bytes::from(data))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

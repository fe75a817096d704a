//! imperva-events: binary entrypoint
//! Loads settings, wires feeds and sinks, and polls until Ctrl-C.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use imperva_events::metrics::Metrics;
use imperva_events::{build_poller, Settings};

/// `RUST_LOG` wins; otherwise info, or debug with `--debug`.
fn init_tracing(debug: bool, json: bool) {
    let fallback = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact().with_ansi(false)).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let settings = Settings::parse();
    init_tracing(settings.debug, settings.log_json);

    let poller = match build_poller(&settings) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Some(addr) = settings.metrics_addr {
        let started = match Metrics::init() {
            Ok(m) => m.serve(addr).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            tracing::error!(error = ?e, "metrics endpoint unavailable");
            return ExitCode::FAILURE;
        }
    }

    poller
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "signal handler failed");
                std::future::pending::<()>().await;
            }
        })
        .await;

    ExitCode::SUCCESS
}

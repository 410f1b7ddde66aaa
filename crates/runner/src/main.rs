use anyhow::{Context, Result};
use apiwatch_config::load_cfg;
use axum::Router;
use clap::Parser;
use o11y::logging::LogFormat;
use rest_api::{AppState, router};
use runner::{build_monitor, shutdown, spawn_scheduler};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "apiwatch", version, about = "Watch JSON APIs for schema drift")]
struct Args {
    /// Config file or directory of YAML fragments.
    #[arg(short, long, env = "APIWATCH_CONFIG")]
    config: String,
    #[arg(long, default_value = "0.0.0.0:8080")]
    api_addr: String,
    /// Run a single monitoring cycle, print the report and exit.
    #[arg(long)]
    once: bool,
    /// `pretty` or `json`.
    #[arg(long, env = "APIWATCH_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
    /// EnvFilter directive; `RUST_LOG` takes precedence.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let o11y_cfg = o11y::O11yConfig {
        logging: o11y::logging::Config {
            level: args.log_level.clone(),
            format: args.log_format,
            with_targets: false,
        },
        metrics: o11y::aw_metrics::Config {
            enable: !args.once,
            http_listener: None,
        },
        install_panic_hook: true,
    };

    if let Err(e) = o11y::init_all(&o11y_cfg) {
        eprintln!("observability setup failed: {e}");
    }

    let cfg = load_cfg(&args.config)
        .with_context(|| format!("load config from {}", args.config))?;
    info!(endpoints = cfg.endpoints.len(), base_url = %cfg.api.base_url, "config loaded");
    debug!(config = ?cfg, "effective config");

    let monitor = build_monitor(&cfg).await?;

    if args.once {
        monitor.run_cycle().await;
        let report = monitor.report();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return shutdown(&monitor, None).await;
    }

    let scheduler = spawn_scheduler(&cfg, &monitor);

    let app: Router = router(AppState {
        controller: monitor.clone(),
    });
    let app = app.merge(o11y::aw_metrics::router_with_metrics());

    let addr: SocketAddr = args
        .api_addr
        .parse()
        .with_context(|| format!("api_addr must be host:port, got {}", args.api_addr))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "api listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(monitor.cancel_token()))
        .await;
    if let Err(ref e) = served {
        error!(error = %e, "api server exited with error");
    }

    shutdown(&monitor, scheduler).await?;
    served.context("serve api")
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            match res {
                Ok(()) => info!("shutdown requested"),
                Err(e) => {
                    error!(error = %e, "failed to listen for ctrl-c");
                    cancel.cancelled().await;
                }
            }
        }
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();
}

//! `serve` command implementation: config loading, tracing setup, the
//! health-prober background task, and graceful shutdown.

use crate::api::{create_router, AppState};
use crate::cli::ServeArgs;
use crate::config::{GatewayConfig, LogFormat};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration with CLI overrides (file < env < CLI, CLI wins).
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    let mut config = if args.config.exists() {
        GatewayConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("config file not found, using defaults");
        GatewayConfig::default()
    };

    config = config.with_env_overrides();

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

/// Initialize `tracing` based on configuration.
pub fn init_tracing(
    config: &crate::config::LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    if config.enable_content_logging {
        eprintln!(
            "WARNING: content logging is enabled. Request/response message content will be logged."
        );
        eprintln!("         This may include sensitive data. Use only for debugging.");
    }

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Waits for SIGINT or SIGTERM, then cancels `cancel_token`.
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received SIGINT, shutting down");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }

    cancel_token.cancel();
}

/// Main `serve` command handler.
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    init_tracing(&config.logging)?;

    tracing::info!("starting gateway server");
    tracing::debug!(?config, "loaded configuration");

    let config = Arc::new(config);
    let app_state = Arc::new(AppState::new(Arc::clone(&config))?);
    let app = create_router(Arc::clone(&app_state));

    let cancel_token = CancellationToken::new();
    let prober_handle = Arc::clone(&app_state.prober).start(
        Arc::clone(&app_state.registry),
        cancel_token.clone(),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(%addr, "gateway listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
        .await?;

    tracing::info!("waiting for health prober to stop");
    prober_handle.await?;

    tracing::info!("gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[tokio::test]
    async fn test_serve_config_loading() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server]\nport = 8080").unwrap();

        let args = ServeArgs {
            config: temp.path().to_path_buf(),
            port: None,
            host: None,
            log_level: None,
        };

        let config = load_config_with_overrides(&args).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[tokio::test]
    async fn test_serve_cli_overrides_config() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server]\nport = 8080").unwrap();

        let args = ServeArgs {
            config: temp.path().to_path_buf(),
            port: Some(9000),
            host: None,
            log_level: None,
        };

        let config = load_config_with_overrides(&args).unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[tokio::test]
    async fn test_serve_works_without_config_file() {
        let args = ServeArgs {
            config: PathBuf::from("nonexistent.toml"),
            port: None,
            host: None,
            log_level: None,
        };

        let config = load_config_with_overrides(&args).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[tokio::test]
    async fn test_cli_overrides_host_and_log_level() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server]\nhost = \"0.0.0.0\"\nport = 8000").unwrap();

        let args = ServeArgs {
            config: temp.path().to_path_buf(),
            port: None,
            host: Some("127.0.0.1".to_string()),
            log_level: Some("debug".to_string()),
        };

        let config = load_config_with_overrides(&args).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.level, "debug");
    }

    #[tokio::test]
    async fn test_shutdown_signal_triggers_cancel() {
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel_clone.cancel();
        });

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_secs(5)) => {
                panic!("shutdown didn't trigger");
            }
        }

        handle.await.unwrap();
    }
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{info, warn};
use whatsmeow_gateway::{
    router, AppState, GatewayConfig, LocalConnector, SessionController, WebhookNotifier,
};

/// REST gateway for a single WhatsApp device session.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Value every request must carry in `x-access-token`.
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Endpoint receiving event notifications. Unset disables webhooks.
    #[arg(long, env = "WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Directory holding the device credentials.
    #[arg(long, env = "SESSION_PATH", default_value = "./sessions")]
    session_path: PathBuf,

    #[arg(long, env = "MAX_RECONNECT_ATTEMPTS", default_value_t = 5)]
    max_reconnect_attempts: u32,

    /// How long `start` waits for a pairing code or an open connection.
    #[arg(long, env = "QR_TIMEOUT_MS", default_value_t = 60_000)]
    qr_timeout_ms: u64,

    #[arg(long, env = "WEBHOOK_TIMEOUT_MS", default_value_t = 10_000)]
    webhook_timeout_ms: u64,

    /// Don't render pairing codes in the terminal.
    #[arg(long)]
    no_terminal_qr: bool,

    /// Local backend: complete pairing this many seconds after the first code.
    #[arg(long)]
    auto_pair_after_secs: Option<u64>,

    /// Local backend: deliver every sent message back as an inbound one.
    #[arg(long)]
    echo: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = GatewayConfig::default()
        .with_session_path(cli.session_path)
        .with_max_reconnect_attempts(cli.max_reconnect_attempts)
        .with_qr_timeout(Duration::from_millis(cli.qr_timeout_ms))
        .with_print_qr_in_terminal(!cli.no_terminal_qr);

    let notifier = WebhookNotifier::http(
        cli.webhook_url,
        Duration::from_millis(cli.webhook_timeout_ms),
    );
    if !notifier.is_enabled() {
        warn!("WEBHOOK_URL not set, webhook notifications disabled");
    }

    let mut connector = LocalConnector::new().with_echo(cli.echo);
    if let Some(secs) = cli.auto_pair_after_secs {
        connector = connector.with_auto_pair(Duration::from_secs(secs));
    }

    let controller = SessionController::new(config, Arc::new(connector), notifier);
    let app = router(AppState::new(controller, cli.access_token));

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

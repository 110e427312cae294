use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use yarrboard_client::{ClientConfig, ConnectionState, LoggingHandler, YarrboardClient};

#[derive(Parser, Debug)]
#[command(name = "yarrboard-client")]
#[command(about = "Connect to a Yarrboard and log what it says", long_about = None)]
struct Args {
    /// Board hostname
    #[arg(long, default_value = "yarrboard.local")]
    host: String,

    #[arg(short, long, default_value = "admin")]
    user: String,

    #[arg(short, long, default_value = "admin")]
    pass: String,

    /// Skip the login command
    #[arg(long)]
    no_login: bool,

    /// Connect with wss://
    #[arg(long)]
    ssl: bool,

    /// Reconnect attempts before giving up (0 = forever)
    #[arg(long, default_value_t = 0)]
    max_retries: u32,

    /// Log message rates every N seconds
    #[arg(long)]
    stats: Option<u64>,

    /// Toggle this channel once connected
    #[arg(long)]
    toggle: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let config = ClientConfig {
        hostname: args.host,
        username: args.user,
        password: args.pass,
        require_login: !args.no_login,
        use_ssl: args.ssl,
        max_connection_retries: args.max_retries,
        stats_interval: args.stats.map(Duration::from_secs),
        ..Default::default()
    };

    let client = YarrboardClient::spawn(config, LoggingHandler)?;
    info!("Yarrboard client starting: {}", client.config().uri());

    let mut pending_toggle = args.toggle;
    let mut status = client.subscribe_status();
    client.start().await?;

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    warn!("Connection task exited");
                    break;
                }
                let state = *status.borrow_and_update();
                info!("Status: {}", state);

                if let Some(id) = toggle_due(state, &mut pending_toggle) {
                    let outcome = client.toggle_channel(id).await?;
                    info!("Toggle channel {}: {:?}", id, outcome);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    client.shutdown().await?;
    Ok(())
}

/// The channel to toggle on the first connect; later reconnects leave it alone
fn toggle_due(state: ConnectionState, pending: &mut Option<u32>) -> Option<u32> {
    if state == ConnectionState::Connected {
        pending.take()
    } else {
        None
    }
}

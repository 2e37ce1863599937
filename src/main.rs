use clap::{Args, Parser, Subcommand};
use eventwire::reconnect::{Backoff, run_with_reconnect};
use eventwire::{
    ClientConfig, ConfigError, ConnectionState, Event, EventBus, EventKind, Named, SocketError, WebSocketClient, relay,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Socket(#[from] SocketError),
}

#[derive(Parser, Debug)]
#[command(name = "eventwire", about = "WebSocket notification listener")]
struct Cli {
    /// Endpoint to dial; falls back to EVENTWIRE_URL.
    #[arg(long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log every inbound message as a notification.
    Listen(ListenArgs),
    /// Send messages, then close.
    Send(SendArgs),
}

#[derive(Args, Debug)]
struct ListenArgs {
    /// Re-dial after the connection ends.
    #[arg(long, default_value_t = false)]
    reconnect: bool,

    /// Stop after this many dials (with --reconnect).
    #[arg(long)]
    max_attempts: Option<usize>,

    /// Print each event as JSON on stdout.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Messages to send, in order.
    #[arg(required = true)]
    messages: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match cli.url {
        Some(url) => ClientConfig::new(url)?.with_env_overrides()?,
        None => ClientConfig::from_env()?,
    };

    match cli.command {
        Command::Listen(args) => run_listen(config, args).await,
        Command::Send(args) => run_send(config, args).await,
    }
}

async fn run_listen(config: ClientConfig, args: ListenArgs) -> Result<(), CliError> {
    let backoff = Backoff::new(config.reconnect_min, config.reconnect_max);
    let client = WebSocketClient::new(config);
    let bus = EventBus::new();
    let conn_id = Uuid::new_v4();

    bus.subscribe(Some(EventKind::Notify), show_toast);
    bus.subscribe(Some(EventKind::Connection), log_connection);
    if args.json {
        bus.subscribe_all(print_json);
    }
    relay::attach(&client, &bus, conn_id);
    info!(%conn_id, url = %client.config().url, "eventwire listening");

    if args.reconnect {
        run_with_reconnect(&client, backoff, args.max_attempts).await?;
    } else {
        client.connect().await?;
        client.closed().await;
    }
    Ok(())
}

async fn run_send(config: ClientConfig, args: SendArgs) -> Result<(), CliError> {
    let client = WebSocketClient::new(config);
    client.connect().await?;

    for message in args.messages {
        client.send(message)?;
    }
    client.close()?;

    // Bounded by EVENTWIRE_CLOSE_TIMEOUT_SECS.
    client.closed().await;
    Ok(())
}

fn show_toast(event: &Event) {
    let Event::Notify(notify) = event else {
        return;
    };
    let message = notify.message().unwrap_or_default();
    if notify.notify() {
        info!(target_ref = %notify.target(), %message, "toast");
    } else {
        debug!(target_ref = %notify.target(), "silent update");
    }
}

fn log_connection(event: &Event) {
    let Event::Connection(conn) = event else {
        return;
    };
    match (conn.state(), conn.detail()) {
        (ConnectionState::Closed, Some(detail)) => info!(state = %conn.state(), %detail, "connection"),
        (_, Some(detail)) => warn!(state = %conn.state(), %detail, "connection"),
        (_, None) => info!(state = %conn.state(), "connection"),
    }
}

fn print_json(event: &Event) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(name = event.name(), error = %e, "event not serializable"),
    }
}

//! Terminal client for Selah rooms.
//!
//! Connects to a sync server, joins (or creates) a room and shows chat,
//! participants and notifications. Preferences and known rooms are kept in a
//! SQLite file when `--db` is given.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin selah-client -- --name Sam
//! cargo run --bin selah-client -- --room abc123 --db ~/.selah.db
//! ```

use std::path::PathBuf;

use clap::Parser;

use selah_client::{
    AppFlavor, ClientConfig, cli::run_session, config::DEFAULT_URL, connect, store::Action,
};
use selah_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "selah-client")]
#[command(about = "Terminal client for synchronized Selah rooms", long_about = None)]
struct Args {
    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = DEFAULT_URL)]
    url: String,

    /// Room to join (a new room is created when omitted)
    #[arg(short = 'r', long)]
    room: Option<String>,

    /// Display name shown to other participants
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// SQLite file for preferences and known rooms (in-memory when omitted)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Talk to a Singit deployment
    #[arg(long)]
    singit: bool,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    if let Err(e) = setup_logger(env!("CARGO_BIN_NAME"), &args.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let mut config = ClientConfig::new(args.url);
    config.db_path = args.db;
    if args.singit {
        config.flavor = AppFlavor::Singit;
    }

    let client = match connect(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to start client: {}", e);
            std::process::exit(1);
        }
    };

    let handle = client.handle();
    let mut result = Ok(());
    if let Some(name) = args.name {
        result = handle.dispatch(Action::ClientName(name)).await;
    }
    if result.is_ok() {
        result = run_session(handle, args.room).await;
    }

    let shutdown = client.shutdown().await;
    let errors: Vec<_> = [result.err(), shutdown.err()].into_iter().flatten().collect();
    for e in &errors {
        tracing::error!("Client error: {}", e);
    }
    if !errors.is_empty() {
        std::process::exit(1);
    }
}

//! Headless host loop.
//!
//! Demonstrates:
//! - Building a SyncClient against a sync server
//! - Connecting with a session token
//! - Draining events on the poll interval like a host timer would
//! - Printing status and color changes until Ctrl+C
//!
//! Usage:
//!   cargo run --example headless_host -- beam://A1B2C3
//!   cargo run --example headless_host -- A1B2C3 --url wss://tokenbeam.dev
//!   cargo run --example headless_host -- A1B2C3 --keepalive --debug

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use token_beam::{DEFAULT_SERVER_URL, HostState, Result, SyncClient};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    token: Option<String>,
    url: String,
    keepalive: bool,
    debug: bool,
}

impl Args {
    /// Parse command-line arguments.
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut parsed = Self {
            token: None,
            url: DEFAULT_SERVER_URL.to_string(),
            keepalive: false,
            debug: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--url" => {
                    if let Some(url) = args.next() {
                        parsed.url = url;
                    }
                }
                "--keepalive" => parsed.keepalive = true,
                "--debug" => parsed.debug = true,
                _ => parsed.token = Some(arg),
            }
        }

        parsed
    }
}

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug { "token_beam=debug" } else { "token_beam=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Token Beam: Headless Host ===\n");

    let Some(token) = args.token else {
        println!("Enter a session token");
        return Ok(());
    };

    let mut builder = SyncClient::builder().server_url(args.url.as_str()).client_type("headless");
    if args.keepalive {
        builder = builder.keepalive_interval(KEEPALIVE_INTERVAL);
    }
    let client = builder.build()?;

    println!("[Connect] {} -> {}", token, args.url);
    client.connect(&token)?;

    let mut state = HostState::default();
    let mut ticker = tokio::time::interval(client.poll_interval());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let before = state.clone();
                if client.tick(&mut state) == 0 {
                    continue;
                }
                report(&before, &state);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n[Exit] Disconnecting...");
                client.disconnect();
                client.tick(&mut state);
                println!("        {}", state.status);
                return Ok(());
            }
        }
    }
}

/// Prints what changed between two snapshots.
fn report(before: &HostState, after: &HostState) {
    if before.status != after.status {
        println!("[Status] {}", after.status);
    }

    if before.connected != after.connected {
        println!("[Paired] {}", if after.connected { "yes" } else { "no" });
    }

    if let Some(id) = &after.client_id
        && before.client_id.as_ref() != Some(id)
    {
        println!("[Client] {id}");
    }

    if before.colors != after.colors {
        println!("[Colors] {} tokens", after.colors.len());
        for color in &after.colors {
            println!("         {:<32} {} ({})", color.label(), color.to_hex(), color.mode);
        }
    }
}

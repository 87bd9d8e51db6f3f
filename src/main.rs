//! Image gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                    IMAGE GATEWAY                      │
//!                      │                                                       │
//!   Invocation event   │  ┌───────────┐   ┌────────────┐   ┌──────────────┐   │
//!   ───────────────────┼─▶│invocation │──▶│ supervisor │──▶│    proxy     │   │
//!                      │  │  handler  │   │health probe│   │rewrite+prefix│   │
//!                      │  └───────────┘   └─────┬──────┘   └──────┬───────┘   │
//!                      │                        │ spawn           │ GET       │
//!                      │                        ▼                 ▼           │
//!                      │                 ┌──────────────────────────────┐     │
//!                      │                 │  image worker (Unix socket)  │     │
//!                      │                 └──────────────┬───────────────┘     │
//!                      │                                │                     │
//!   Response envelope  │  ┌───────────┐   ┌─────────────▼──┐                  │
//!   ◀──────────────────┼──│ envelope  │◀──│  transformer   │──▶ blob store    │
//!                      │  └───────────┘   └────────────────┘                  │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use image_gateway::config;
use image_gateway::http::GatewayServer;
use image_gateway::invocation::InvocationEvent;
use image_gateway::lifecycle::{build_engine, build_handler, init_observability, shutdown_signal, Shutdown};
use image_gateway::proxy::UrlSigner;

#[derive(Parser)]
#[command(name = "image-gateway")]
#[command(about = "Supervising gateway in front of a local image service", long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(short, long, global = true, env = "IMAGE_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve invocations over HTTP
    Serve {
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
        /// Directory the image engine serves files from
        #[arg(short, long)]
        images: PathBuf,
    },
    /// Run one invocation from a JSON event and print the envelope
    Invoke {
        /// Event file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        event: String,
        #[arg(short, long)]
        images: PathBuf,
    },
    /// Print the signed form of an image path
    Sign {
        path: String,
        /// Defaults to the configured security key
        #[arg(short, long, env = "SECURITY_KEY")]
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    init_observability(&config.observability)?;

    match cli.command {
        Commands::Serve { bind, images } => {
            tracing::info!(
                socket = %config.server.socket_path.display(),
                probe_attempts = config.server.probe_attempts,
                cors = config.features.enable_cors,
                "Configuration loaded"
            );
            let engine = build_engine(&config, &images)?;
            let handler = build_handler(config, Arc::new(engine));

            let listener = TcpListener::bind(bind).await?;
            let shutdown = Shutdown::new();
            shutdown.trigger_on(shutdown_signal());

            GatewayServer::new(handler).run(listener, shutdown.token()).await?;
            tracing::info!("Shutdown complete");
        }
        Commands::Invoke { event, images } => {
            let raw = if event == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&event)?
            };
            let event: InvocationEvent = serde_json::from_str(&raw)?;

            let engine = build_engine(&config, &images)?;
            let handler = build_handler(config, Arc::new(engine));
            let envelope = handler.handle(event).await;
            handler.shutdown();

            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        Commands::Sign { path, key } => {
            let Some(key) = key.or(config.security.security_key) else {
                return Err("no security key configured".into());
            };
            let signer = UrlSigner::new(key).map_err(|_| "invalid security key")?;
            println!("{}", signer.signed_path(&path));
        }
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use std::{
    fs::File,
    io::{self, BufReader},
    path::PathBuf,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::{api, orderbook::OrderBook, server, simulate, state::AppState, utils};

/// Limit order matching engine: price-time priority, one instrument.
#[derive(Parser)]
#[command(name = "matching-engine", version)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "ENGINE_LOG", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Accept `SIDE QTY@PRICE` lines over TCP (and optionally JSON over HTTP)
    Serve {
        /// Address for the line protocol
        #[arg(long, env = "ENGINE_LISTEN", default_value = "127.0.0.1:7878")]
        listen: String,

        /// Address for the HTTP API; disabled when absent
        #[arg(long, env = "ENGINE_HTTP")]
        http: Option<String>,
    },
    /// Push random orders through a fresh book and report throughput
    Bench {
        /// Number of orders to generate
        #[arg(long, default_value_t = 100_000)]
        orders: usize,

        /// Seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Process an order file and print the trades and the final book
    Replay {
        /// File with one `SIDE QTY@PRICE` per line
        path: PathBuf,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { listen, http } => serve(&listen, http.as_deref()).await,
        Commands::Bench { orders, seed } => {
            let report = simulate::run_benchmark(orders, seed)?;
            println!("{}", report);
            Ok(())
        }
        Commands::Replay { path } => {
            let file = File::open(&path)?;
            let mut book = OrderBook::new();
            let stdout = io::stdout();
            let summary = simulate::replay(BufReader::new(file), &mut book, &mut stdout.lock())?;
            info!(
                accepted = summary.accepted,
                rejected = summary.rejected,
                trades = summary.trades,
                "replay finished"
            );
            Ok(())
        }
    }
}

async fn serve(listen: &str, http: Option<&str>) -> anyhow::Result<()> {
    let state = AppState::new();
    let token = utils::shutdown_token();

    let lines = TcpListener::bind(listen).await?;
    let line_server = server::serve_lines(lines, state.clone(), token.clone());

    match http {
        Some(addr) => {
            let listener = TcpListener::bind(addr).await?;
            tokio::try_join!(line_server, api::serve_http(listener, state, token))?;
        }
        None => line_server.await?,
    }
    Ok(())
}

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use digitsd::config::{Config, DEFAULT_PORT};
use digitsd::server::Server;
use digitsd::wait::WaitPolicy;

#[derive(Parser, Debug)]
#[command(about = "Nine-digit ingestion server with a deduplicated journal")]
struct Args {
    /// TCP port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory for numbers.log (defaults to the OS temp dir)
    #[arg(long)]
    journal_dir: Option<PathBuf>,

    /// Idle policy for the journal consumer
    #[arg(long, value_enum, default_value_t = WaitPolicy::Block)]
    wait_strategy: WaitPolicy,

    /// Serve connections one at a time on the acceptor thread
    #[arg(long)]
    single_threaded: bool,
}

fn main() -> ExitCode {
    // stdout carries statistics lines only; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config {
        port: args.port,
        journal_dir: args.journal_dir.unwrap_or_else(std::env::temp_dir),
        wait: args.wait_strategy,
        single_threaded: args.single_threaded,
    };

    match Server::start(config) {
        Ok(server) => {
            server.wait();
            info!("server stopped");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(%error, "unable to start server");
            ExitCode::FAILURE
        }
    }
}

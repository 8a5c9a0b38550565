use std::net::SocketAddr;

use anyhow::Result;
use casetrends::config::Config;
use casetrends::source::{CachedSource, CsvSource};
use casetrends::CaseTrends;
use clap::{Args, Parser, Subcommand};
use enum_dispatch::enum_dispatch;
use log::info;

use crate::server;

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    async fn run(&self, config: Config) -> Result<()>;
}

/// The `serve` command launches the HTTP server for the visualization.
#[derive(Args, Debug)]
pub struct ServeCommand {
    #[arg(
        short = 'a',
        long,
        default_value = "127.0.0.1:8000",
        help = "Address to bind the server"
    )]
    addr: SocketAddr,
    #[arg(short = 'd', long, help = "Override the dataset path from the config")]
    dataset: Option<String>,
}

impl RunCommand for ServeCommand {
    async fn run(&self, mut config: Config) -> Result<()> {
        info!("Running `serve` subcommand");
        if let Some(dataset) = &self.dataset {
            config.dataset_path = dataset.clone();
        }
        let source = CachedSource::new(CsvSource::new(config.dataset_path.clone()));
        let app = CaseTrends::with_source(source, config);
        server::run(self.addr, app).await
    }
}

#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// Serve the interactive chart over HTTP
    Serve(ServeCommand),
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

//! `walkgraph` CLI entry point: installs logging, parses arguments, and
//! delegates to the library.

use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    cli::Cli::parse().run()
}

//! mirror-op CLI entry point
//!
//! Mirrors public container images into a private Aliyun container registry
//! by way of Git-tracked Dockerfiles and the registry's auto-build rules.

use clap::Parser;
use mirror_op::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Name(args) => mirror_op::cli::name::execute(args).await,
        Commands::Copy(args) => mirror_op::cli::copy::execute(args).await,
        Commands::Build(args) => mirror_op::cli::build::execute(args).await,
        Commands::Check(args) => mirror_op::cli::check::execute(args).await,
        Commands::Clear(args) => mirror_op::cli::clear::execute(args).await,
    }
}

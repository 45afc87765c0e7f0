//! vutils command-line entry point

use clap::Parser;
use color_eyre::{eyre::Context as _, Report, Result};

use vutils::cli::{self, Cli};

/// Install and configure the tracing/logging system.
///
/// Logs go to stderr, leaving stdout for the result envelope. Filtered by
/// the RUST_LOG environment variable, defaulting to 'info'.
fn install_tracing() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
}

fn main() -> Result<(), Report> {
    install_tracing();
    color_eyre::install()?;

    let cli = Cli::parse();
    let envelope = cli::run(cli)?;
    let json = serde_json::to_string_pretty(&envelope).context("Serializing result")?;
    println!("{}", json);

    tracing::debug!("exiting");
    std::process::exit(if envelope.success { 0 } else { 2 })
}

use std::process::ExitCode;

use genebank::config::{Command, ConfigError};
use genebank::driver;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    // Diagnostics go to stderr; stdout carries query results only.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genebank=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::from_args(&args) {
        Ok(command) => command,
        Err(ConfigError::Usage(usage)) => {
            eprintln!("usage: {usage}");
            return ExitCode::from(2);
        }
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(2);
        }
    };

    let result = match command {
        Command::Create(config) => driver::build_index(&config).map(|summary| {
            tracing::info!(
                tree = %summary.tree_path.display(),
                keys = summary.counts.keys_inserted,
                "index created"
            );
            if let Some(dump) = &summary.dump_path {
                tracing::info!(dump = %dump.display(), "in-order dump written");
            }
        }),
        Command::Search(config) => driver::search_index(&config).map(|_| ()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

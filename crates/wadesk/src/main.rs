// SPDX-FileCopyrightText: 2026 wadesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! wadesk - live sync for WhatsApp support consoles.
//!
//! This is the binary entry point: `serve` runs the gateway, `watch` runs a
//! sync client against it.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;
mod status;
mod watch;

use clap::{Parser, Subcommand};
use wadesk_config::model::WadeskConfig;

/// wadesk - live sync for WhatsApp support consoles.
#[derive(Parser, Debug)]
#[command(name = "wadesk", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the gateway: event stream, webhook, and listing API.
    Serve,
    /// Follow a gateway's event stream and keep a local store in sync.
    Watch,
    /// Print the effective configuration (secrets redacted).
    Config,
    /// Query a running gateway's health endpoint.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match wadesk_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            wadesk_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => {
            init_tracing(&config.logging.level);
            serve::run_serve(config).await
        }
        Some(Commands::Watch) => {
            init_tracing(&config.logging.level);
            watch::run_watch(config).await
        }
        Some(Commands::Config) => print_config(&config),
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        None => {
            println!("wadesk: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wadesk={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

fn redacted(config: &WadeskConfig) -> WadeskConfig {
    const REDACTED: &str = "[redacted]";
    let mut config = config.clone();
    if config.server.bearer_token.is_some() {
        config.server.bearer_token = Some(REDACTED.to_string());
    }
    if config.client.bearer_token.is_some() {
        config.client.bearer_token = Some(REDACTED.to_string());
    }
    if config.provider.auth_token.is_some() {
        config.provider.auth_token = Some(REDACTED.to_string());
    }
    config
}

fn print_config(config: &WadeskConfig) -> Result<(), wadesk_core::WadeskError> {
    let rendered = toml::to_string_pretty(&redacted(config))
        .map_err(|e| wadesk_core::WadeskError::Config(format!("cannot render config: {e}")))?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn default_config_is_valid() {
        let config = wadesk_config::load_and_validate_str("").expect("defaults should be valid");
        assert_eq!(config.server.port, 8787);
    }

    #[test]
    fn printed_config_hides_secrets() {
        let mut config = WadeskConfig::default();
        config.server.bearer_token = Some("s3cret".into());
        config.provider.auth_token = Some("tw1l1o".into());
        let rendered = toml::to_string_pretty(&redacted(&config)).unwrap();
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("tw1l1o"));
        assert!(rendered.contains("[redacted]"));
        assert!(rendered.contains("max_connections = 500"));
    }

    #[test]
    fn cli_parses_status_flags() {
        let cli = Cli::try_parse_from(["wadesk", "status", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Status {
                json: true,
                plain: false
            })
        ));
    }
}

//! EPP toolkit CLI
//!
//! Single binary for talking to EPP registries over legacy TLS:
//! - One-shot commands (info, send, hello, probe)
//! - Interactive shell over one logged-in session
//! - Local relay tunnel for plaintext clients
//! - Stub EPP server for staging and tests

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epp_protocol::{ResultCode, ResultPolicy};
use epp_toolkit::commands;
use epp_toolkit::output::{print_error, OutputOptions};
use epp_toolkit::settings::{Overrides, Settings};
use epp_tunnel::StubConfig;

#[derive(Parser)]
#[command(name = "epp")]
#[command(author, version, about = "EPP client toolkit for legacy TLS registries")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// EPP server host name (overrides config)
    #[arg(long, global = true)]
    server: Option<String>,

    /// EPP server port (overrides config)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Client certificate PEM, or combined certificate and key bundle
    #[arg(long, global = true)]
    cert: Option<PathBuf>,

    /// Client private key PEM when separate from the certificate
    #[arg(long, global = true)]
    key: Option<PathBuf>,

    /// Registrar client id
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// Registrar password (falls back to config, then EPP_PASSWORD)
    #[arg(long, global = true)]
    password: Option<String>,

    /// Connect and handshake timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Result classification: leading-digit (2xxx is success with info) or rfc5730
    #[arg(long, global = true)]
    policy: Option<ResultPolicy>,

    /// Send over plain TCP through a running local tunnel at this address
    #[arg(long, global = true)]
    via: Option<String>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Also print raw response XML
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, look up domains with <domain:info>, log out
    Info {
        /// Domain names to look up
        #[arg(required = true)]
        domains: Vec<String>,
    },

    /// Log in, send command XML from files, log out
    Send {
        /// Files holding one complete <epp> command each
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Send <hello/> without logging in and show the greeting
    Hello,

    /// Open the channel and show the negotiated TLS parameters and greeting
    Probe,

    /// Log in and read commands interactively
    Shell,

    /// Relay local plaintext connections to the server over TLS
    Tunnel {
        /// Local listen address (overrides config)
        #[arg(short, long)]
        listen: Option<String>,
        /// Dial the server over plain TCP instead of TLS
        #[arg(long)]
        plain: bool,
    },

    /// Run a stub EPP server answering every command with fixed codes
    StubServer {
        /// Listen address
        #[arg(short, long, default_value = "127.0.0.1:8888")]
        listen: String,
        /// Server id announced in the greeting
        #[arg(long, default_value = "TEST EPP Server")]
        server_id: String,
        /// Result code for <login>
        #[arg(long, default_value_t = 1000)]
        login_code: u16,
        /// Result code for other commands
        #[arg(long, default_value_t = 1000)]
        command_code: u16,
        /// Hang up right after the greeting
        #[arg(long)]
        close_after_greeting: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show config file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let out = OutputOptions {
        json: cli.json,
        raw: cli.raw,
    };
    let overrides = Overrides {
        server: cli.server,
        port: cli.port,
        cert: cli.cert,
        key: cli.key,
        client_id: cli.client_id,
        password: cli.password,
        timeout_secs: cli.timeout,
        result_policy: cli.policy,
        via: cli.via,
    };
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path),
            ConfigAction::Path => {
                println!("{}", commands::resolve_path(config_path).display());
                Ok(())
            }
            ConfigAction::Init { force } => commands::config_init(config_path, force),
        },

        Commands::StubServer {
            listen,
            server_id,
            login_code,
            command_code,
            close_after_greeting,
        } => {
            let config = StubConfig {
                server_id,
                login_code: ResultCode(login_code),
                command_code: ResultCode(command_code),
                close_after_greeting,
            };
            commands::stub_server_command(&listen, config).await
        }

        Commands::Tunnel { listen, plain } => {
            let settings = Settings::load(config_path, overrides)?;
            commands::tunnel_command(&settings, listen, plain).await
        }

        Commands::Info { domains } => {
            let settings = load_settings(config_path, overrides)?;
            commands::info_command(&settings, &domains, out).await
        }

        Commands::Send { files } => {
            let settings = load_settings(config_path, overrides)?;
            commands::send_command(&settings, &files, out).await
        }

        Commands::Hello => {
            let settings = load_settings(config_path, overrides)?;
            commands::hello_command(&settings, out).await
        }

        Commands::Probe => {
            let settings = load_settings(config_path, overrides)?;
            commands::probe_command(&settings, out).await
        }

        Commands::Shell => {
            let settings = load_settings(config_path, overrides)?;
            commands::shell_command(&settings, out).await
        }
    }
}

/// Settings for commands that open a session
fn load_settings(config_path: Option<&Path>, overrides: Overrides) -> Result<Settings> {
    let settings = Settings::load(config_path, overrides)?;
    settings.validate()?;
    tracing::debug!("Destination {}", settings.destination());
    Ok(settings)
}

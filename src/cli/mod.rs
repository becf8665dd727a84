use clap::{Parser, Subcommand};
use lotus::auth::MultiFileCredentialStore;
use lotus::socket::{SessionController, WebSocketTransport};
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod logout;
pub mod pair;
pub mod run;
pub mod send;
pub mod status;
pub mod version;

use config::LotusConfig;

/// Session type every networked command drives
pub type Session = SessionController<WebSocketTransport, MultiFileCredentialStore>;

#[derive(Parser)]
#[command(name = "lotus")]
#[command(author = "Lotus Project")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Always-on chat client", long_about = None)]
pub struct Cli {
    /// Path to config file (default: next to the auth folder, ~/.local/share/lotus/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Folder holding paired credentials (overrides the config file)
    #[arg(long, global = true)]
    pub auth_folder: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pair this device by scanning a QR code with the phone app
    Pair {
        /// Seconds to wait for the scan before giving up
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },

    /// Stay connected and print incoming messages and delivery updates
    Run {
        /// Reply to every incoming text with the same text
        #[arg(long)]
        echo: bool,
    },

    /// Send one text message
    Send {
        /// Recipient: full identity (user@s.whatsapp.net, id@g.us) or phone number
        #[arg(long)]
        to: String,

        /// Message text
        #[arg(long)]
        text: String,
    },

    /// Unpair this device and forget its credentials
    Logout,

    /// Show the stored pairing state
    Status,

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::Version = cli.command {
        version::execute();
        return Ok(());
    }

    let (config, config_path) =
        config::load_or_create(cli.config.as_deref(), cli.auth_folder.as_deref())?;
    init_logging(&config.logging.level);
    tracing::debug!(config = %config_path.display(), "configuration loaded");

    match cli.command {
        Commands::Pair { timeout_secs } => pair::execute(&config, timeout_secs).await,
        Commands::Run { echo } => run::execute(&config, echo).await,
        Commands::Send { to, text } => send::execute(&config, &to, &text).await,
        Commands::Logout => logout::execute(&config).await,
        Commands::Status => status::execute(&config, &config_path).await,
        Commands::Version => Ok(()),
    }
}

/// Install the stderr log subscriber; `RUST_LOG` overrides `level`
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Already installed when a command runs twice in one process
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Build a session over the configured WebSocket endpoint and auth folder
pub async fn open_session(config: &LotusConfig) -> Result<Session, Box<dyn std::error::Error>> {
    let store = MultiFileCredentialStore::open(&config.auth.folder).await?;
    let session_config = config.session_config();
    let transport = WebSocketTransport::new(
        config.connection.url.as_str(),
        config.connection.origin.as_str(),
        &session_config.browser,
    );
    Ok(SessionController::new(session_config, transport, store).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_pair_defaults() {
        let cli = Cli::parse_from(["lotus", "pair"]);

        assert!(cli.config.is_none());
        assert!(cli.auth_folder.is_none());
        match cli.command {
            Commands::Pair { timeout_secs } => assert_eq!(timeout_secs, 120),
            _ => panic!("Expected Pair command"),
        }
    }

    #[test]
    fn test_cli_parse_run_with_echo() {
        let cli = Cli::parse_from(["lotus", "run", "--echo", "--config", "/etc/lotus.toml"]);

        assert_eq!(cli.config, Some("/etc/lotus.toml".to_string()));
        match cli.command {
            Commands::Run { echo } => assert!(echo),
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_run_defaults() {
        let cli = Cli::parse_from(["lotus", "run"]);

        match cli.command {
            Commands::Run { echo } => assert!(!echo),
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_send() {
        let cli = Cli::parse_from([
            "lotus",
            "--auth-folder",
            "/tmp/auth",
            "send",
            "--to",
            "+1 555 010 0000",
            "--text",
            "hello",
        ]);

        assert_eq!(cli.auth_folder, Some("/tmp/auth".to_string()));
        match cli.command {
            Commands::Send { to, text } => {
                assert_eq!(to, "+1 555 010 0000");
                assert_eq!(text, "hello");
            }
            _ => panic!("Expected Send command"),
        }
    }

    #[test]
    fn test_cli_parse_send_requires_text() {
        assert!(Cli::try_parse_from(["lotus", "send", "--to", "15550100000"]).is_err());
    }

    #[test]
    fn test_cli_parse_simple_commands() {
        assert!(matches!(
            Cli::parse_from(["lotus", "logout"]).command,
            Commands::Logout
        ));
        assert!(matches!(
            Cli::parse_from(["lotus", "status"]).command,
            Commands::Status
        ));
        assert!(matches!(
            Cli::parse_from(["lotus", "version"]).command,
            Commands::Version
        ));
    }
}

//! `roster`: command-line access to the recipient registry.
//!
//! Every command prints its result as JSON on stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use roster_client::{logging, DirectoryRequest, DisplayMode, Registry, RosterConfig};
use roster_shared::{AddressKind, RecipientId};
use tracing::info;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Recipient registry and contact directory")]
struct Cli {
    /// Database file (defaults to the platform data directory)
    #[arg(long, env = "ROSTER_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the id for an address, creating the recipient if needed
    Resolve {
        /// phone, email or group
        kind: AddressKind,
        address: String,
    },
    /// Print the settings of a recipient
    Show { id: RecipientId },
    Block { id: RecipientId },
    Unblock { id: RecipientId },
    /// Run a directory search
    Search {
        /// push, sms, groups, all, or a combination such as push|sms
        mode: DisplayMode,
        #[arg(default_value = "")]
        filter: String,
        /// Include recent conversations (unfiltered searches only)
        #[arg(long)]
        recents: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let cli = Cli::parse();

    let mut config = RosterConfig::from_env();
    if let Some(path) = cli.db {
        config.database_path = Some(path);
    }
    info!(?config, "Loaded configuration");

    let registry = Registry::open(config)?;

    let output = match cli.command {
        Command::Resolve { kind, address } => {
            let id = registry.resolve(kind, &address).await?;
            serde_json::json!({ "id": id })
        }
        Command::Show { id } => serde_json::to_value(&*registry.settings(id)?)?,
        Command::Block { id } => {
            registry.set_blocked(id, true)?;
            serde_json::to_value(&*registry.settings(id)?)?
        }
        Command::Unblock { id } => {
            registry.set_blocked(id, false)?;
            serde_json::to_value(&*registry.settings(id)?)?
        }
        Command::Search {
            mode,
            filter,
            recents,
        } => {
            let request = DirectoryRequest::new(mode, filter).with_recents(recents);
            serde_json::to_value(registry.search(&request)?)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

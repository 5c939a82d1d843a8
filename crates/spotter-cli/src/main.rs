//! # spotter
//!
//! Command-line front end for the spotter gym-partner app: set up a
//! profile, swipe through the feed, and chat with matches. Every command
//! runs as the user given with `--as` against a local SQLite directory.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use spotter_client::{ClientConfig, MatchStrategy, Session};
use spotter_shared::UserId;
use spotter_store::{Database, DirectoryStore};

#[derive(Parser)]
#[command(name = "spotter")]
#[command(about = "Find a gym partner and chat with your matches", long_about = None)]
#[command(version)]
struct Cli {
    /// Database file (defaults to the per-user data directory)
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    /// User to act as
    #[arg(long = "as", value_name = "USER", env = "SPOTTER_USER", global = true)]
    user: Option<String>,

    /// Match creation strategy: deterministic or query
    #[arg(long, value_name = "STRATEGY", global = true)]
    strategy: Option<MatchStrategy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update your profile
    ProfileSet {
        #[arg(long)]
        name: String,

        #[arg(long)]
        gym: String,

        /// e.g. Weightlifting, Cardio, CrossFit
        #[arg(long)]
        workout: String,

        /// e.g. Morning, Evening
        #[arg(long)]
        timing: String,

        #[arg(long)]
        photo: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },

    /// Show a profile (yours by default)
    ProfileShow {
        #[arg(value_name = "USER")]
        user: Option<String>,
    },

    /// List everyone you can swipe on
    Feed,

    /// Swipe right on a user
    Like {
        #[arg(value_name = "USER")]
        user: String,
    },

    /// Swipe left on a user
    Pass {
        #[arg(value_name = "USER")]
        user: String,
    },

    /// List your matches
    Matches,

    /// List your chats, most recent first
    Chats,

    /// Send a message to a match
    Send {
        #[arg(value_name = "USER")]
        user: String,

        #[arg(value_name = "TEXT", num_args = 1.., trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Print the conversation with a match
    History {
        #[arg(value_name = "USER")]
        user: String,
    },

    /// Stay online and print new matches and chat activity until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,spotter_client=debug,spotter_store=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env();
    if let Some(path) = cli.db {
        config.database_path = Some(path);
    }
    if let Some(strategy) = cli.strategy {
        config.match_strategy = strategy;
    }
    info!(?config, "Loaded configuration");

    let database = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    info!(path = ?database.path(), "Database opened");
    let store: Arc<dyn DirectoryStore> = Arc::new(database);

    let user = cli
        .user
        .ok_or_else(|| anyhow::anyhow!("no user given; pass --as USER or set SPOTTER_USER"))?;
    let me = UserId::parse(user)?;
    let mut session = Session::new(store, me, config);

    match cli.command {
        Commands::ProfileSet {
            name,
            gym,
            workout,
            timing,
            photo,
            email,
        } => {
            if let Some(email) = email {
                session = session.with_email(email);
            }
            let draft = spotter_client::ProfileDraft {
                name,
                gym_name: gym,
                workout_type: workout,
                timing,
                photo_url: photo,
            };
            commands::profile_set(&session, &draft).await?;
        }
        Commands::ProfileShow { user } => {
            let user = match user {
                Some(user) => UserId::parse(user)?,
                None => session.me().clone(),
            };
            commands::profile_show(&session, &user).await?;
        }
        Commands::Feed => commands::feed(&session).await?,
        Commands::Like { user } => commands::like(&session, &UserId::parse(user)?).await?,
        Commands::Pass { user } => {
            let user = UserId::parse(user)?;
            session.swipe_left(&user);
            println!("Passed on {user}.");
        }
        Commands::Matches => commands::matches(&session).await?,
        Commands::Chats => commands::chats(&session).await?,
        Commands::Send { user, text } => {
            commands::send(&session, &UserId::parse(user)?, &text.join(" ")).await?;
        }
        Commands::History { user } => {
            commands::history(&session, &UserId::parse(user)?).await?;
        }
        Commands::Watch => commands::watch(&session).await?,
    }

    session.sign_out();
    Ok(())
}

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use quizlens_core::backend::{HttpAiBackend, HttpSearchBackend};
use quizlens_core::config::{self, ConfigFile, SearchConfig, ServerConfig};
use quizlens_core::{
    AiFollowupController, AskOutcome, PersistentStore, SearchSession, StatsAggregator,
    SubmitOutcome,
};

mod output;

use output::ColorMode;

const DEFAULT_SERVER: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Photo question lookup - search a question library by image
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the question library with an image
    Search {
        /// Path to the question photo (jpg, png, bmp, gif, webp)
        image: PathBuf,

        /// College filter, e.g. "计算机学院"
        #[arg(long)]
        college: Option<String>,

        /// Do not let the backend include an inline AI match
        #[arg(long)]
        no_ai: bool,

        /// Ask the AI service for an answer after the search completes
        #[arg(long)]
        ask: bool,

        /// Base URL of the search service
        #[arg(long)]
        server: Option<String>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Show or edit search history
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },

    /// Show or edit favorites
    Favorites {
        #[command(subcommand)]
        action: Option<FavoritesAction>,
    },

    /// Show usage counters
    Stats,

    /// Show or update the config file
    Config {
        /// Set the search service base URL
        #[arg(long)]
        set_server: Option<String>,

        /// Set the default college filter
        #[arg(long)]
        set_college: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List history entries, newest first (default)
    List,
    /// Delete one entry by id
    Delete { id: u64 },
    /// Clear all history
    Clear,
}

#[derive(Subcommand, Debug)]
enum FavoritesAction {
    /// List favorites (default)
    List,
    /// Remove one favorite by question id
    Remove { question_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_config();

    match cli.command {
        Command::Search {
            image,
            college,
            no_ai,
            ask,
            server,
            no_color,
        } => search(&config, image, college, no_ai, ask, server, no_color).await,
        Command::History { action } => history(&config, action),
        Command::Favorites { action } => favorites(&config, action),
        Command::Stats => stats(&config),
        Command::Config {
            set_server,
            set_college,
        } => edit_config(config, set_server, set_college),
    }
}

async fn search(
    config: &ConfigFile,
    image: PathBuf,
    college: Option<String>,
    no_ai: bool,
    ask: bool,
    server: Option<String>,
    no_color: bool,
) -> anyhow::Result<()> {
    // Resolve configuration: CLI flags > env vars > config file > defaults
    let base_url = server
        .or_else(|| std::env::var("QUIZLENS_SERVER").ok())
        .or_else(|| config.server.as_ref().and_then(|s| s.base_url.clone()))
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let timeout_secs = config
        .server
        .as_ref()
        .and_then(|s| s.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let timeout = Duration::from_secs(timeout_secs);
    let college = college
        .or_else(|| config.search.as_ref().and_then(|s| s.default_college.clone()))
        .unwrap_or_default();
    let enable_ai = !no_ai
        && config
            .search
            .as_ref()
            .and_then(|s| s.enable_ai)
            .unwrap_or(true);

    let color = ColorMode(!no_color);
    let mut out = std::io::stdout();

    let bytes = std::fs::read(&image)?;
    let file_name = image
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.img")
        .to_string();
    let media_type = media_type_for(&image);

    let search_backend = Arc::new(HttpSearchBackend::new(&base_url, timeout));
    let session = Arc::new(SearchSession::new(search_backend, open_store(config)));
    session.set_use_ai(enable_ai);
    session.set_college(&college);
    session.select_file(bytes, &file_name, media_type)?;

    writeln!(
        out,
        "Searching with {} ({})...",
        file_name,
        output::format_file_size(std::fs::metadata(&image)?.len())
    )?;

    let outcome = match session.submit().await? {
        SubmitOutcome::Completed(outcome) => outcome,
        SubmitOutcome::AlreadyInFlight => unreachable!("single submission per invocation"),
    };
    output::print_search_outcome(&mut out, &outcome, color)?;

    if ask || (enable_ai && outcome.results.is_empty()) {
        let ai_backend = Arc::new(HttpAiBackend::new(&base_url, timeout));
        let controller = AiFollowupController::new(ai_backend, session);
        match controller.ask().await? {
            AskOutcome::Delivered(delivered) => {
                output::print_ai_answer(&mut out, &delivered, color)?;
            }
            AskOutcome::AlreadyRequesting => unreachable!("single ask per invocation"),
        }
    }

    Ok(())
}

fn history(config: &ConfigFile, action: Option<HistoryAction>) -> anyhow::Result<()> {
    let store = open_store(config);
    let mut out = std::io::stdout();
    match action.unwrap_or(HistoryAction::List) {
        HistoryAction::List => output::print_history(&mut out, &store.history())?,
        HistoryAction::Delete { id } => {
            if store.delete_history(id)? {
                writeln!(out, "Deleted entry {}", id)?;
            } else {
                writeln!(out, "No entry with id {}", id)?;
            }
        }
        HistoryAction::Clear => {
            store.clear_history()?;
            writeln!(out, "History cleared")?;
        }
    }
    Ok(())
}

fn favorites(config: &ConfigFile, action: Option<FavoritesAction>) -> anyhow::Result<()> {
    let store = open_store(config);
    let mut out = std::io::stdout();
    match action.unwrap_or(FavoritesAction::List) {
        FavoritesAction::List => output::print_favorites(&mut out, &store.favorites())?,
        FavoritesAction::Remove { question_id } => {
            if store.remove_favorite(&question_id)? {
                writeln!(out, "Removed {}", question_id)?;
            } else {
                writeln!(out, "No favorite with id {}", question_id)?;
            }
        }
    }
    Ok(())
}

fn stats(config: &ConfigFile) -> anyhow::Result<()> {
    let aggregator = StatsAggregator::new(open_store(config));
    output::print_stats(&mut std::io::stdout(), &aggregator.snapshot())?;
    Ok(())
}

fn edit_config(
    current: ConfigFile,
    set_server: Option<String>,
    set_college: Option<String>,
) -> anyhow::Result<()> {
    let mut out = std::io::stdout();

    if set_server.is_none() && set_college.is_none() {
        let path = config::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        writeln!(out, "config file: {}", path)?;
        writeln!(out, "{}", toml::to_string_pretty(&current)?)?;
        return Ok(());
    }

    let overlay = ConfigFile {
        server: set_server.map(|base_url| ServerConfig {
            base_url: Some(base_url),
            ..Default::default()
        }),
        search: set_college.map(|college| SearchConfig {
            default_college: Some(college),
            ..Default::default()
        }),
        ..Default::default()
    };
    let merged = config::merge(current, overlay);
    let path = config::save_config(&merged).map_err(|e| anyhow::anyhow!(e))?;
    writeln!(out, "Saved {}", path.display())?;
    Ok(())
}

fn open_store(config: &ConfigFile) -> PersistentStore {
    let dir = config
        .storage
        .as_ref()
        .and_then(|s| s.data_dir.clone())
        .map(PathBuf::from)
        .or_else(config::default_data_dir)
        .unwrap_or_else(|| PathBuf::from(".quizlens-data"));
    PersistentStore::new(dir)
}

/// Map a file extension to its declared media type. Unknown extensions get
/// a type the session will reject with a clear error.
fn media_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("bmp") => "image/bmp",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

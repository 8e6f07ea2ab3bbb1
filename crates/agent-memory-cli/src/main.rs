//! amem - inspect and edit agent memory snapshots
//!
//! Every command loads `<dir>/memory.json`, runs one memory operation, and
//! (for mutating commands) writes the snapshot back. Results are printed to
//! stdout as JSON; logs go to stderr.
//!
//! ## Commands
//!
//! - `init`: create an empty snapshot
//! - `add` / `delete` / `pop` / `clear`: mutate the log
//! - `count` / `recent` / `role` / `search` / `action` / `news`: query
//! - `stats` / `actions`: summarize the log and the registry

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use agent_memory::{
    telemetry, ActionDescriptor, ActionRegistry, ActionTag, FsSnapshotStore, MemoryConfig,
    MemoryStore, Message, MessageRecord, SessionSpan, SnapshotStore,
};

#[derive(Parser)]
#[command(name = "amem")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and edit agent memory snapshots", long_about = None)]
struct Cli {
    /// Storage directory holding memory.json (overrides config and env)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, global = true, env = "AGENT_MEMORY_CONFIG")]
    config: Option<PathBuf>,

    /// Register an extra action tag before loading (repeatable)
    #[arg(long = "register", global = true, value_name = "TAG")]
    register: Vec<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty snapshot (fails if one exists unless --force)
    Init {
        #[arg(long)]
        force: bool,
    },

    /// Append a message (no-op if an equal message is stored)
    Add {
        #[arg(short, long)]
        role: String,

        #[arg(short = 't', long)]
        content: String,

        /// Tag of the action that produced the message
        #[arg(long)]
        cause_by: Option<String>,

        /// Metadata entry as key=value (repeatable)
        #[arg(short, long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },

    /// Remove the stored message equal to the given fields
    Delete {
        #[arg(short, long)]
        role: String,

        #[arg(short = 't', long)]
        content: String,

        #[arg(long)]
        cause_by: Option<String>,

        #[arg(short, long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },

    /// Remove and print the most recent message
    Pop,

    /// Remove every message
    Clear,

    /// Number of stored messages
    Count,

    /// Most recent messages (0 = all)
    Recent {
        #[arg(short, default_value = "0")]
        k: usize,
    },

    /// Messages sent by a role
    Role { role: String },

    /// Messages whose content contains NEEDLE (case-sensitive)
    Search { needle: String },

    /// Messages caused by the given actions, in tag order
    Action {
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Messages in FILE (JSON array) not among the k most recent
    News {
        file: PathBuf,

        /// Window size; defaults to the configured recent_window (0 = all)
        #[arg(short)]
        k: Option<usize>,
    },

    /// Log and index counts
    Stats,

    /// Registered action tags and their bucket sizes
    Actions,
}

#[derive(Serialize)]
struct ActionRow {
    tag: String,
    type_name: String,
    messages: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => MemoryConfig::from_toml_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => MemoryConfig::default(),
    }
    .with_env_overrides()
    .context("Invalid AGENT_MEMORY_* environment")?;
    if let Some(dir) = &cli.dir {
        config.storage_dir = dir.clone();
    }
    if cli.json {
        config.log_json = true;
    }
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.level()
    };
    telemetry::init_tracing(config.log_json, level);

    let registry = build_registry(&config, &cli.register)?;
    let backend = FsSnapshotStore::new(&config.storage_dir);
    let _span = SessionSpan::enter(&config.storage_dir.display().to_string());

    match cli.command {
        Commands::Init { force } => cmd_init(&backend, force).await,
        Commands::Add {
            role,
            content,
            cause_by,
            meta,
        } => {
            let message = build_message(role, content, cause_by, &meta, &registry)?;
            cmd_add(&backend, &registry, message).await
        }
        Commands::Delete {
            role,
            content,
            cause_by,
            meta,
        } => {
            let message = build_message(role, content, cause_by, &meta, &registry)?;
            cmd_delete(&backend, &registry, &message).await
        }
        Commands::Pop => cmd_pop(&backend, &registry).await,
        Commands::Clear => cmd_clear(&backend, &registry).await,
        Commands::Count => {
            let store = load(&backend, &registry).await?;
            print_json(&store.count())
        }
        Commands::Recent { k } => {
            let store = load(&backend, &registry).await?;
            print_messages(&store.get_recent(k))
        }
        Commands::Role { role } => {
            let store = load(&backend, &registry).await?;
            print_messages(&store.get_by_role(&role))
        }
        Commands::Search { needle } => {
            let store = load(&backend, &registry).await?;
            print_messages(&store.get_by_content_substring(&needle))
        }
        Commands::Action { tags } => {
            let store = load(&backend, &registry).await?;
            let tags: Vec<ActionTag> = tags.into_iter().map(ActionTag::from).collect();
            print_messages(&store.get_by_actions(&tags))
        }
        Commands::News { file, k } => {
            let store = load(&backend, &registry).await?;
            let observed = read_observed(&file)?;
            let news = store.find_new(&observed, k.unwrap_or(config.recent_window));
            let records: Vec<MessageRecord> = news.into_iter().map(MessageRecord::from).collect();
            print_json(&records)
        }
        Commands::Stats => {
            let store = load(&backend, &registry).await?;
            print_json(&store.stats())
        }
        Commands::Actions => {
            let store = load(&backend, &registry).await?;
            cmd_actions(&store, &registry)
        }
    }
}

fn build_registry(config: &MemoryConfig, extra: &[String]) -> Result<ActionRegistry> {
    let mut registry = config
        .build_registry()
        .context("Failed to build action registry")?;
    for tag in extra {
        let tag = ActionTag::from(tag.as_str());
        if !registry.contains(&tag) {
            registry
                .register(tag.clone(), ActionDescriptor::external(tag.clone()))
                .with_context(|| format!("Failed to register action {tag}"))?;
        }
    }
    Ok(registry)
}

fn build_message(
    role: String,
    content: String,
    cause_by: Option<String>,
    meta: &[String],
    registry: &ActionRegistry,
) -> Result<Message> {
    let mut message = Message::new(role, content);
    if let Some(tag) = cause_by {
        let tag = ActionTag::from(tag);
        // refuse tags that could not be loaded back
        registry
            .resolve(&tag)
            .with_context(|| format!("Action {tag} is not registered (use --register {tag})"))?;
        message = message.caused_by(tag);
    }
    for entry in meta {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("Metadata must be KEY=VALUE, got {entry:?}");
        };
        message = message.with_metadata(key, value);
    }
    Ok(message)
}

fn read_observed(path: &Path) -> Result<Vec<Message>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<MessageRecord> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of messages", path.display()))?;
    Ok(records.into_iter().map(Message::from).collect())
}

async fn load(backend: &FsSnapshotStore, registry: &ActionRegistry) -> Result<MemoryStore> {
    backend
        .load_or_default(registry)
        .await
        .with_context(|| format!("Failed to load snapshot from {}", backend.dir().display()))
}

async fn save(backend: &FsSnapshotStore, store: &MemoryStore) -> Result<()> {
    backend
        .save(store)
        .await
        .with_context(|| format!("Failed to save snapshot to {}", backend.dir().display()))
}

async fn cmd_init(backend: &FsSnapshotStore, force: bool) -> Result<()> {
    if !force && backend.exists().await? {
        bail!(
            "Snapshot already exists at {} (use --force to reset)",
            backend.path().display()
        );
    }
    save(backend, &MemoryStore::new()).await?;
    info!(path = %backend.path().display(), "Initialized empty memory");
    print_json(&backend.path())
}

async fn cmd_add(
    backend: &FsSnapshotStore,
    registry: &ActionRegistry,
    message: Message,
) -> Result<()> {
    let mut store = load(backend, registry).await?;
    let id = message.id().clone();
    let inserted = store.add(message);
    if inserted {
        save(backend, &store).await?;
    }
    print_json(&serde_json::json!({
        "id": id,
        "inserted": inserted,
        "count": store.count(),
    }))
}

async fn cmd_delete(
    backend: &FsSnapshotStore,
    registry: &ActionRegistry,
    message: &Message,
) -> Result<()> {
    let mut store = load(backend, registry).await?;
    store.delete(message)?;
    save(backend, &store).await?;
    print_json(&store.count())
}

async fn cmd_pop(backend: &FsSnapshotStore, registry: &ActionRegistry) -> Result<()> {
    let mut store = load(backend, registry).await?;
    let popped = store.delete_newest();
    if popped.is_some() {
        save(backend, &store).await?;
    }
    print_json(&popped.map(MessageRecord::from))
}

async fn cmd_clear(backend: &FsSnapshotStore, registry: &ActionRegistry) -> Result<()> {
    let mut store = load(backend, registry).await?;
    let removed = store.count();
    store.clear();
    save(backend, &store).await?;
    print_json(&removed)
}

fn cmd_actions(store: &MemoryStore, registry: &ActionRegistry) -> Result<()> {
    let rows: Vec<ActionRow> = registry
        .tags()
        .into_iter()
        .map(|tag| {
            let messages = store.get_by_action(&tag).len();
            let type_name = registry
                .resolve(&tag)
                .map(|d| d.type_name.clone())
                .unwrap_or_default();
            ActionRow {
                tag: tag.to_string(),
                type_name,
                messages,
            }
        })
        .collect();
    print_json(&rows)
}

fn print_messages(messages: &[Arc<Message>]) -> Result<()> {
    let records: Vec<MessageRecord> = messages.iter().map(|m| m.as_ref().into()).collect();
    print_json(&records)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

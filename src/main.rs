use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use httpdelta::auth::TokenGenerator;
use httpdelta::config::ServerConfig;
use httpdelta::events::Streams;
use httpdelta::server::{AppState, create_router};
use httpdelta::service::Service;
use httpdelta::store::SqliteStore;
use httpdelta::types::{Id, Role, User, Workspace, now_ms};

#[derive(Parser)]
#[command(name = "httpdelta")]
#[command(about = "HTTP request template server with delta overlays", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        /// Data directory holding the database
        #[arg(long, global = true, default_value = "./data")]
        data_dir: PathBuf,

        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML file with server settings
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory holding the database
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create the data directory and database
    Init,

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage workspaces
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user and print an API token for it
    Create { name: String },
}

#[derive(Subcommand)]
enum WorkspaceCommands {
    /// Create a workspace owned by a user
    Create {
        name: String,

        /// ID of the owning user
        #[arg(long)]
        owner: Id,
    },

    /// Add a user to a workspace
    AddMember {
        #[arg(long)]
        workspace: Id,

        #[arg(long)]
        user: Id,

        /// One of user, admin, owner
        #[arg(long, default_value = "user")]
        role: Role,
    },
}

fn db_path(data_dir: &Path) -> PathBuf {
    ServerConfig {
        data_dir: data_dir.to_path_buf(),
        ..ServerConfig::default()
    }
    .db_path()
}

fn open_store(data_dir: &Path) -> anyhow::Result<SqliteStore> {
    let path = db_path(data_dir);
    if !path.exists() {
        bail!("Server not initialized. Run 'httpdelta admin init' first to create the database.");
    }
    Ok(SqliteStore::new(&path)?)
}

fn run_init(data_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;

    let path = db_path(data_dir);
    if path.exists() {
        bail!("Server already initialized. Database exists at: {}", path.display());
    }

    let store = SqliteStore::new(&path)?;
    store.initialize()?;
    println!("Initialized database at {}", path.display());
    Ok(())
}

fn run_user(data_dir: &Path, command: UserCommands) -> anyhow::Result<()> {
    let UserCommands::Create { name } = command;
    let name = name.trim().to_string();
    if name.is_empty() || name.contains(char::is_whitespace) {
        bail!("User name cannot be empty or contain whitespace");
    }

    let store = open_store(data_dir)?;
    if store
        .read(|q| q.workspaces().get_user_by_name(&name))?
        .is_some()
    {
        bail!("User '{name}' already exists");
    }

    let user = User {
        id: Id::new(),
        name: name.clone(),
        created_at: now_ms(),
    };
    let (token, raw_token) = TokenGenerator::new()?.issue(user.id)?;
    store.transact(|q| {
        q.workspaces().create_user(&user)?;
        q.workspaces().create_token(&token)
    })?;

    println!();
    println!("========================================");
    println!("Created user '{name}' ({})", user.id);
    println!("API token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("========================================");
    println!();
    Ok(())
}

fn run_workspace(data_dir: &Path, command: WorkspaceCommands) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    match command {
        WorkspaceCommands::Create { name, owner } => {
            if store.read(|q| q.workspaces().get_user(owner))?.is_none() {
                bail!("User {owner} not found");
            }
            let now = now_ms();
            let workspace = Workspace {
                id: Id::new(),
                name: name.clone(),
                created_at: now,
                updated_at: now,
            };
            store.transact(|q| {
                q.workspaces().create_workspace(&workspace)?;
                q.workspaces().add_member(workspace.id, owner, Role::Owner)
            })?;
            println!("Created workspace '{name}' ({})", workspace.id);
        }
        WorkspaceCommands::AddMember {
            workspace,
            user,
            role,
        } => {
            if store.read(|q| q.workspaces().get_workspace(workspace))?.is_none() {
                bail!("Workspace {workspace} not found");
            }
            if store.read(|q| q.workspaces().get_user(user))?.is_none() {
                bail!("User {user} not found");
            }
            store.transact(|q| q.workspaces().add_member(workspace, user, role))?;
            println!(
                "Added {user} to {workspace} as {role} ({})",
                role.permissions()
            );
        }
    }
    Ok(())
}

async fn run_serve(
    config_file: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = match config_file {
        Some(path) => ServerConfig::load(&path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }

    let store = Arc::new(open_store(&config.data_dir)?);
    store.initialize()?;

    let streams = Arc::new(Streams::new(&config.stream));
    let service = Arc::new(Service::new(store, streams));
    let state = Arc::new(AppState::new(service, config.stream.clone())?);

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!(
        capacity = config.stream.capacity,
        lag_policy = ?config.stream.lag_policy,
        "Starting server on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("httpdelta=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { data_dir, command } => match command {
            AdminCommands::Init => run_init(&data_dir)?,
            AdminCommands::User { command } => run_user(&data_dir, command)?,
            AdminCommands::Workspace { command } => run_workspace(&data_dir, command)?,
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => run_serve(config, host, port, data_dir).await?,
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::{
    BookCommand, BookingsCommand, ChatCommand, ChatsCommand, ConfigCommand, FavCommand,
    ListenCommand, LoginCommand, SignupCommand, SlotsCommand, TeacherCommand, TeachersCommand,
};
use danceconnect::config::Config;
use danceconnect::remote::create_store;
use danceconnect::session::SessionManager;
use danceconnect::storage::LocalStorage;
use danceconnect::sync::SyncService;

#[derive(Parser)]
#[command(name = "dc")]
#[command(version)]
#[command(about = "DanceConnect: find dance teachers, book lessons, chat", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login(LoginCommand),

    /// Create an account
    Signup(SignupCommand),

    /// Log out and clear the cached session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Browse teachers
    Teachers(TeachersCommand),

    /// Show a teacher profile with courses and open slots
    Teacher(TeacherCommand),

    /// List lesson slots
    Slots(SlotsCommand),

    /// Book an available slot
    Book(BookCommand),

    /// List your bookings
    Bookings(BookingsCommand),

    /// List your chats
    Chats(ChatsCommand),

    /// Start, show, and follow chats
    Chat(ChatCommand),

    /// Manage favorite teachers
    Fav(FavCommand),

    /// Follow live backend changes
    Listen(ListenCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "danceconnect=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    // Config commands never need a backend.
    if let Commands::Config(cmd) = &cli.command {
        return cmd.run(&config);
    }

    let store = create_store(&config)?;
    let storage = LocalStorage::new(config.data_dir.value.clone());
    let session = Arc::new(SessionManager::new(
        store.clone(),
        storage.clone(),
        &config.session_scope(),
    ));
    session.restore()?;
    let service = SyncService::new(store, session, storage);

    match &cli.command {
        Commands::Login(cmd) => cmd.run(&service).await?,
        Commands::Signup(cmd) => cmd.run(&service).await?,
        Commands::Logout => commands::logout(&service).await?,
        Commands::Whoami => commands::whoami(&service),
        Commands::Teachers(cmd) => cmd.run(&service).await?,
        Commands::Teacher(cmd) => cmd.run(&service).await?,
        Commands::Slots(cmd) => cmd.run(&service).await?,
        Commands::Book(cmd) => cmd.run(&service, &config).await?,
        Commands::Bookings(cmd) => cmd.run(&service).await?,
        Commands::Chats(cmd) => cmd.run(&service).await?,
        Commands::Chat(cmd) => cmd.run(&service, &config).await?,
        Commands::Fav(cmd) => cmd.run(&service).await?,
        Commands::Listen(cmd) => cmd.run(&service).await?,
        Commands::Config(_) => unreachable!("handled before the backend is built"),
    }

    Ok(())
}

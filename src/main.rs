mod config;
mod constants;
mod credentials;
mod mail;
mod store;
mod sync;

use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::store::Store;
use crate::sync::{SyncEngine, scheduler};

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,prismsync=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_usage() {
    eprintln!(
        r#"prismsync - IMAP mailbox synchronization daemon

Usage: prismsync [command]

Commands:
    (none)      Run the sync daemon
    sync        Run one sync pass and exit
    status      Show synced folders and message counts
    setup       Configure the mailbox account and credentials
    help        Show this help message

Configuration file: ~/.config/prismsync/config.toml
"#
    );
}

/// Load config, open the store, and build the engine shared by the daemon
/// and the manual sync command.
async fn build_engine() -> Result<(Config, Arc<SyncEngine>)> {
    let config = Config::load()?;
    config.ensure_dirs()?;

    let creds = CredentialStore::new(&config.mailbox.username);
    let password = creds
        .get_password()
        .with_context(|| format!("No credentials for {}", config.mailbox.username))?;

    let store = Arc::new(Store::open(&config.db_path()?).await?);
    let engine = Arc::new(SyncEngine::new(store, &config, password)?);

    Ok((config, engine))
}

async fn run_daemon() -> Result<()> {
    let (config, engine) = build_engine().await?;

    if !config.sync.enabled {
        anyhow::bail!(
            "Periodic sync is disabled in the config; run 'prismsync sync' for a manual pass."
        );
    }

    let token = CancellationToken::new();
    let handle = scheduler::spawn(
        engine,
        Duration::from_secs(config.sync.interval_secs),
        token.clone(),
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");

    token.cancel();
    handle.await.ok();

    Ok(())
}

async fn run_manual_sync() -> Result<()> {
    let (_config, engine) = build_engine().await?;

    let summary = engine.run_pass().await?;
    println!("Sync completed: {}", summary);

    Ok(())
}

async fn run_status() -> Result<()> {
    let config = Config::load()?;
    let store = Store::open(&config.db_path()?).await?;

    let folders = store.list_folders().await?;
    if folders.is_empty() {
        println!("No folders synced yet. Run 'prismsync sync' first.");
        return Ok(());
    }

    println!(
        "{:<30} {:>9} {:>11}  {}",
        "FOLDER", "MESSAGES", "TOMBSTONES", "LAST SYNC"
    );
    for folder in folders {
        let status = store.folder_status(&folder.name).await?;
        let last_sync = status
            .last_synced_at
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "{:<30} {:>9} {:>11}  {}",
            folder.display_name, status.messages, status.tombstones, last_sync
        );
    }

    Ok(())
}

async fn run_setup() -> Result<()> {
    use std::io::{self, Write};

    println!("Prismsync Setup");
    println!("===============\n");

    let config_path = Config::config_path()?;
    if config_path.exists() {
        print!("Configuration already exists. Overwrite? [y/N]: ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Setup cancelled.");
            return Ok(());
        }
    }

    // IMAP server with basic hostname validation
    let server = loop {
        print!("IMAP server: ");
        io::stdout().flush()?;
        let mut server = String::new();
        io::stdin().read_line(&mut server)?;
        let server = server.trim().to_string();

        if !server.is_empty()
            && server
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
            && !server.starts_with('.')
            && !server.ends_with('.')
            && !server.starts_with('-')
            && server.contains('.')
        {
            break server;
        }
        println!("Invalid server hostname. Please enter a valid hostname (e.g., imap.example.com)");
    };

    print!("IMAP port [993]: ");
    io::stdout().flush()?;
    let mut port = String::new();
    io::stdin().read_line(&mut port)?;
    let port: u16 = match port.trim() {
        "" => 993,
        value => value.parse().context("Invalid port number")?,
    };

    print!("Username: ");
    io::stdout().flush()?;
    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    let username = username.trim().to_string();
    if username.is_empty() {
        anyhow::bail!("Username must not be empty");
    }

    print!("Password: ");
    io::stdout().flush()?;
    let password = read_password()?;
    println!();

    let config = Config {
        mailbox: config::MailboxConfig {
            server,
            port,
            tls: true,
            username: username.clone(),
        },
        storage: config::StorageConfig::default(),
        sync: config::SyncConfig::default(),
    };

    config.save()?;
    config.ensure_dirs()?;
    println!("Configuration saved to {}", config_path.display());

    let creds = CredentialStore::new(&username);
    creds.set_password(&password)?;

    if creds.has_credentials() {
        println!("Password stored successfully.");
    } else {
        eprintln!("Warning: Failed to store credentials.");
        return Err(anyhow::anyhow!("Credential storage failed"));
    }

    println!("\nSetup complete! Run 'prismsync' to start the daemon.");
    Ok(())
}

fn read_password() -> Result<String> {
    use std::io;

    // Disable echo while the password is typed
    let _guard = DisableEcho::new()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    Ok(password.trim().to_string())
}

struct DisableEcho {
    #[cfg(unix)]
    original: libc::termios,
}

impl DisableEcho {
    #[cfg(unix)]
    fn new() -> Result<Self> {
        use std::mem::MaybeUninit;
        use std::os::unix::io::AsRawFd;

        let fd = std::io::stdin().as_raw_fd();
        let mut termios = MaybeUninit::<libc::termios>::uninit();

        unsafe {
            if libc::tcgetattr(fd, termios.as_mut_ptr()) != 0 {
                anyhow::bail!("Failed to get terminal attributes");
            }
            let original = termios.assume_init();
            let mut new = original;
            new.c_lflag &= !libc::ECHO;
            if libc::tcsetattr(fd, libc::TCSANOW, &new) != 0 {
                anyhow::bail!("Failed to set terminal attributes");
            }
            Ok(Self { original })
        }
    }

    #[cfg(not(unix))]
    fn new() -> Result<Self> {
        Ok(Self {})
    }
}

#[cfg(unix)]
impl Drop for DisableEcho {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;
        let fd = std::io::stdin().as_raw_fd();
        unsafe {
            libc::tcsetattr(fd, libc::TCSANOW, &self.original);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some("setup") => run_setup().await,
        Some("sync") => {
            setup_logging();
            run_manual_sync().await
        }
        Some("status") => run_status().await,
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(1);
        }
        None => {
            setup_logging();
            run_daemon().await
        }
    }
}

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use cc_crypto::{MessageCiphertext, Scheme};
use cc_store::{Accounts, KeyringConfig, Session, SqliteStore};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

mod paths;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cipher Chat key management", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "CC_KEYCTL_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite key store, overrides the config file
    #[arg(long, global = true, env = "CC_KEYCTL_DB")]
    db: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration file management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that open the key store.
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// Create an account: key pair, credential and empty history
    Register {
        username: String,
        /// agreement (P-256 ECDH) or direct (RSA-OAEP)
        #[arg(long)]
        scheme: Option<Scheme>,
    },
    /// Check a password and unlock the private key
    Login { username: String },
    /// Change the password, re-wrapping the private key and history
    Passwd { username: String },
    /// Print a user's public key and fingerprint
    Pubkey {
        username: String,
        #[arg(long)]
        fingerprint_only: bool,
    },
    /// Encrypt a message for another registered user
    Encrypt {
        username: String,
        #[arg(long)]
        to: String,
        message: String,
    },
    /// Decrypt a message produced by `encrypt`
    Decrypt {
        username: String,
        #[arg(long)]
        from: String,
        /// Ciphertext JSON as printed by `encrypt`
        ciphertext: String,
    },
    /// Encrypted message history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// Append a message to a room
    Add {
        username: String,
        #[arg(long, default_value = "general")]
        room: String,
        message: String,
    },
    /// Print the decrypted history
    Show {
        username: String,
        #[arg(long)]
        room: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a config file with default values
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = match &cli.config {
        Some(p) => p.clone(),
        None => paths::config_path()?,
    };

    let command = match cli.command {
        Commands::Config {
            action: ConfigAction::Init { force },
        } => return config_init(&config_path, force),
        Commands::Store(command) => command,
    };

    let config = KeyringConfig::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let accounts = open_accounts(cli.db, &config).await?;

    match command {
        StoreCommand::Register { username, scheme } => {
            register(&accounts, &username, scheme.unwrap_or(config.default_scheme)).await
        }
        StoreCommand::Login { username } => login(&accounts, &username).await,
        StoreCommand::Passwd { username } => passwd(&accounts, &username).await,
        StoreCommand::Pubkey {
            username,
            fingerprint_only,
        } => pubkey(&accounts, &username, fingerprint_only).await,
        StoreCommand::Encrypt {
            username,
            to,
            message,
        } => encrypt(&accounts, &username, &to, &message).await,
        StoreCommand::Decrypt {
            username,
            from,
            ciphertext,
        } => decrypt(&accounts, &username, &from, &ciphertext).await,
        StoreCommand::History { action } => match action {
            HistoryAction::Add {
                username,
                room,
                message,
            } => history_add(&accounts, &username, &room, &message).await,
            HistoryAction::Show { username, room } => {
                history_show(&accounts, &username, room.as_deref()).await
            }
        },
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn open_accounts(db: Option<PathBuf>, config: &KeyringConfig) -> Result<Accounts> {
    let db_path = match db.or_else(|| config.database.clone()) {
        Some(p) => p,
        None => paths::default_database()?,
    };
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    debug!(path = %db_path.display(), "opening key store");
    let store = SqliteStore::open(&db_path)
        .await
        .with_context(|| format!("opening key store {}", db_path.display()))?;
    Ok(Accounts::from_config(store, config)?)
}

fn config_init(path: &std::path::Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    KeyringConfig::default()
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn register(accounts: &Accounts, username: &str, scheme: Scheme) -> Result<()> {
    let password = prompt_password_twice("New password: ")?;
    let public = accounts.register(username, password.as_str(), scheme).await?;
    println!("Registered {username} ({scheme})");
    println!("Fingerprint: {}", public.fingerprint()?);
    Ok(())
}

async fn login(accounts: &Accounts, username: &str) -> Result<()> {
    let session = unlock(accounts, username).await?;
    let history = session.load_history().await?;
    println!(
        "Unlocked {} ({}), {} stored messages",
        session.username(),
        session.scheme(),
        history.len()
    );
    session.lock();
    Ok(())
}

async fn passwd(accounts: &Accounts, username: &str) -> Result<()> {
    let old = prompt_password_once("Current password: ")?;
    let new = prompt_new_password()?;
    accounts
        .change_password(username, old.as_str(), new.as_str())
        .await?;
    println!("Password changed for {username}");
    Ok(())
}

async fn pubkey(accounts: &Accounts, username: &str, fingerprint_only: bool) -> Result<()> {
    let public = accounts.public_key(username).await?;
    if !fingerprint_only {
        println!("{}", public.to_b64()?);
    }
    println!("{}", public.fingerprint()?);
    Ok(())
}

async fn encrypt(accounts: &Accounts, username: &str, peer: &str, message: &str) -> Result<()> {
    let peer_public = accounts
        .public_key(peer)
        .await
        .with_context(|| format!("looking up {peer}"))?;
    let session = unlock(accounts, username).await?;
    let ciphertext = session.encrypt_for(peer, &peer_public, message)?;
    println!("{}", serde_json::to_string(&ciphertext)?);
    Ok(())
}

async fn decrypt(accounts: &Accounts, username: &str, peer: &str, raw: &str) -> Result<()> {
    let ciphertext: MessageCiphertext =
        serde_json::from_str(raw).context("ciphertext must be the JSON printed by encrypt")?;
    let peer_public = accounts
        .public_key(peer)
        .await
        .with_context(|| format!("looking up {peer}"))?;
    let session = unlock(accounts, username).await?;
    println!("{}", session.decrypt_from(peer, &peer_public, &ciphertext)?);
    Ok(())
}

async fn history_add(accounts: &Accounts, username: &str, room: &str, message: &str) -> Result<()> {
    let session = unlock(accounts, username).await?;
    let entry = session.append_message(room, username, message).await?;
    info!(room, id = %entry.id, "message stored");
    println!("{}", entry.id);
    Ok(())
}

async fn history_show(accounts: &Accounts, username: &str, room: Option<&str>) -> Result<()> {
    let session = unlock(accounts, username).await?;
    let history = session.load_history().await?;
    for (name, entries) in &history.rooms {
        if room.is_some_and(|r| r != name.as_str()) {
            continue;
        }
        println!("# {name}");
        for entry in entries {
            println!(
                "[{}] {}: {}",
                entry.sent_at.format("%Y-%m-%d %H:%M:%S"),
                entry.sender,
                entry.body
            );
        }
    }
    Ok(())
}

// ── Password input ────────────────────────────────────────────────────────────

async fn unlock(accounts: &Accounts, username: &str) -> Result<Session> {
    let password = prompt_password_once("Password: ")?;
    accounts
        .login(username, password.as_str())
        .await
        .map_err(|e| anyhow!("cannot unlock {username}: {e}"))
}

fn env_password(var: &str) -> Option<Zeroizing<String>> {
    std::env::var(var)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

fn prompt_password_once(prompt: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = env_password("CC_KEYCTL_PASSWORD") {
        return Ok(pw);
    }
    let pw = rpassword::prompt_password(prompt).map_err(|e| anyhow!("password prompt: {e}"))?;
    Ok(Zeroizing::new(pw))
}

fn prompt_password_twice(prompt: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = env_password("CC_KEYCTL_PASSWORD") {
        return Ok(pw);
    }
    confirm(prompt)
}

fn prompt_new_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = env_password("CC_KEYCTL_NEW_PASSWORD") {
        return Ok(pw);
    }
    confirm("New password: ")
}

fn confirm(prompt: &str) -> Result<Zeroizing<String>> {
    let first = rpassword::prompt_password(prompt).map_err(|e| anyhow!("password prompt: {e}"))?;
    let second = rpassword::prompt_password("Confirm password: ")
        .map_err(|e| anyhow!("password prompt: {e}"))?;
    if first != second {
        bail!("passwords do not match");
    }
    Ok(Zeroizing::new(first))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_register_with_scheme_alias() {
        let cli = Cli::parse_from(["cc-keyctl", "register", "alice", "--scheme", "rsa"]);
        match cli.command {
            Commands::Store(StoreCommand::Register { username, scheme }) => {
                assert_eq!(username, "alice");
                assert_eq!(scheme, Some(Scheme::Direct));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::parse_from([
            "cc-keyctl",
            "history",
            "show",
            "bob",
            "--room",
            "general",
            "--db",
            "/tmp/keys.db",
            "-v",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/keys.db")));
        assert!(matches!(
            cli.command,
            Commands::Store(StoreCommand::History {
                action: HistoryAction::Show { .. }
            })
        ));
    }

    #[test]
    fn config_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyring.json");
        config_init(&path, false).unwrap();
        assert!(config_init(&path, false).is_err());
        config_init(&path, true).unwrap();
        assert_eq!(KeyringConfig::load(&path).unwrap(), KeyringConfig::default());
    }
}

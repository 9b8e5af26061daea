//! Keygate CLI - operator tooling
//!
//! Usage:
//!   keygate hash-password [password]
//!   keygate verify-password <hash> [password]
//!   keygate issue-token <username> [--role admin] [--id <uuid>]
//!   keygate verify-token <token>
//!   keygate config
//!
//! Passwords not given on the command line are read from stdin.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use keygate_api::auth::{CredentialHasher, TokenService};
use keygate_core::{AppConfig, Identity, Role};
use std::io::BufRead;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "keygate")]
#[command(about = "Keygate authentication server tooling")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables take precedence
    #[arg(long, global = true, env = "KEYGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a password with the configured Argon2id parameters
    HashPassword {
        /// Password to hash (read from stdin when omitted)
        password: Option<String>,
    },
    /// Check a password against a stored hash
    VerifyPassword {
        /// PHC hash string
        hash: String,
        /// Password to check (read from stdin when omitted)
        password: Option<String>,
    },
    /// Issue a token with the configured signing secret
    IssueToken {
        username: String,
        #[arg(long, default_value = "user")]
        role: Role,
        /// Account id; random when omitted
        #[arg(long)]
        id: Option<Uuid>,
    },
    /// Verify a token and print its identity
    VerifyToken { token: String },
    /// Print the effective configuration, secrets omitted
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::HashPassword { password } => {
            let hasher = CredentialHasher::new(&config.password)?;
            let password = password_or_stdin(password)?;
            println!("{}", hasher.hash(&password)?);
        }
        Commands::VerifyPassword { hash, password } => {
            let hasher = CredentialHasher::new(&config.password)?;
            let password = password_or_stdin(password)?;
            if hasher.verify(&password, &hash)? {
                println!("match");
            } else {
                println!("no match");
                std::process::exit(1);
            }
        }
        Commands::IssueToken { username, role, id } => {
            let tokens = signing_tokens(&config)?;
            let identity = Identity::new(id.unwrap_or_else(Uuid::new_v4), username, role);
            println!("{}", tokens.issue(&identity)?);
        }
        Commands::VerifyToken { token } => {
            let tokens = signing_tokens(&config)?;
            match tokens.verify(&token) {
                Ok(identity) => println!("{}", serde_json::to_string_pretty(&identity)?),
                Err(e) => bail!("Token rejected: {e}"),
            }
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Token service over the configured secret
///
/// An ephemeral secret would make every issued token useless, so one must
/// be configured.
fn signing_tokens(config: &AppConfig) -> anyhow::Result<TokenService> {
    let Some(secret) = &config.auth.jwt_secret else {
        bail!("JWT_SECRET must be set to issue or verify tokens");
    };
    Ok(TokenService::new(
        secret.as_bytes(),
        &config.auth.issuer,
        config.auth.token_ttl_secs,
    ))
}

fn password_or_stdin(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("No password given");
    }
    Ok(password)
}

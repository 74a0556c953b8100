//! Gatehouse CLI
//!
//! Command-line client for a cookie-authenticated service.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password from --password or GATEHOUSE_PASSWORD)
//! gatehouse login anna@example.com
//!
//! # Show the current session
//! gatehouse status
//!
//! # Authenticated request, renewing the session if needed
//! gatehouse get accounts
//!
//! # Sign out
//! gatehouse logout
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gatehouse_core::{GuardError, LoginCredentials, RegistrationRequest, SessionStatus};
use serde_json::{Value, json};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

mod app;
mod config;
mod session_file;

use app::App;
use config::CliConfig;

#[derive(Parser)]
#[command(name = "gatehouse")]
#[command(about = "Session client for cookie-authenticated services")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to gatehouse.toml in the config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Service URL, overriding the configuration
    #[arg(long, global = true, env = "GATEHOUSE_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current session
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Sign in
    Login {
        /// Account email
        email: String,

        #[arg(short, long, env = "GATEHOUSE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out, clearing the local session even if the server is unreachable
    Logout,

    /// Create an account
    Register {
        /// Account email
        email: String,

        #[arg(short, long, env = "GATEHOUSE_PASSWORD", hide_env_values = true)]
        password: String,

        /// Phone number
        #[arg(long)]
        phone: String,

        /// Display name
        #[arg(long)]
        name: String,
    },

    /// Perform an authenticated GET and print the JSON response
    Get {
        /// Path relative to the service URL (e.g., accounts)
        path: String,
    },

    /// List recent request paths of the signed-in user
    Recent,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref(), cli.base_url.as_deref())?;
    init_logging(&config, cli.verbose);
    debug!("Loaded configuration from {:?}", config.config_path);

    let app = App::open(&config).await?;
    let outcome = run(&app, cli.command).await;
    app.close()?;
    outcome
}

fn init_logging(config: &CliConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::Status { format } => status(app, &format),
        Commands::Login { email, password } => login(app, &email, password).await,
        Commands::Logout => logout(app).await,
        Commands::Register {
            email,
            password,
            phone,
            name,
        } => register(app, email, password, phone, name).await,
        Commands::Get { path } => get(app, &path).await,
        Commands::Recent => recent(app),
    }
}

fn status(app: &App, format: &str) -> Result<()> {
    let snapshot = app.session.snapshot();

    match format {
        "json" => {
            let output = json!({
                "status": snapshot.status.as_str(),
                "authenticated": snapshot.is_authenticated(),
                "expired": snapshot.expired,
                "profile": snapshot.profile,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => match &snapshot.profile {
            Some(profile) if snapshot.is_authenticated() => {
                println!("Signed in as {} ({})", profile.email, profile.id);
                if !profile.display_name.is_empty() {
                    println!("  Name: {}", profile.display_name);
                }
                println!("  Account type: {}", profile.account_type);
                if profile.has_active_premium(chrono::Utc::now()) {
                    println!("  Premium: active");
                }
            }
            _ if snapshot.expired => println!("Session expired. Sign in again."),
            _ => println!("Not signed in"),
        },
    }
    Ok(())
}

async fn login(app: &App, email: &str, password: String) -> Result<()> {
    if app.session.status() == SessionStatus::Authenticated {
        info!("replacing the current session");
    }

    let profile = app
        .session
        .login(&LoginCredentials::new(email, password))
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .context("Sign in failed")?;

    println!("Signed in as {}", profile.email);
    Ok(())
}

async fn logout(app: &App) -> Result<()> {
    app.session.logout().await;
    println!("Signed out");
    Ok(())
}

async fn register(app: &App, email: String, password: String, phone: String, name: String) -> Result<()> {
    let request = RegistrationRequest::new(email, password)
        .with_phone(phone)
        .with_display_name(name);

    let user = app
        .session
        .register(&request)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .context("Registration failed")?;

    println!("Registered {} ({})", user.email, user.id);
    if let Some(message) = user.message {
        println!("  {}", message);
    }
    println!("Run `gatehouse login {}` to sign in.", user.email);
    Ok(())
}

async fn get(app: &App, path: &str) -> Result<()> {
    if !app.session.is_authenticated() {
        anyhow::bail!("Not signed in. Run `gatehouse login <email>` first.");
    }

    let body: Value = match app.client.guarded_get_json(&app.session, path).await {
        Ok(body) => body,
        Err(GuardError::SessionExpired) => {
            anyhow::bail!("{}", GuardError::SessionExpired.user_message())
        }
        Err(e) => return Err(anyhow::anyhow!(e.user_message())).context(format!("GET {} failed", path)),
    };

    app.record_request(path).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn recent(app: &App) -> Result<()> {
    if !app.session.is_authenticated() {
        anyhow::bail!("Not signed in");
    }

    let paths = app.recent.get();
    if paths.is_empty() {
        println!("No recent requests");
    }
    for path in paths {
        println!("{}", path);
    }
    Ok(())
}

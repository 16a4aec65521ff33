//! RealtyDesk CLI - a terminal front end for the RealtyDesk CRM.
//!
//! Provides login/logout, the signed-in identity, and read access to the
//! CRM resource collections through the authorized request pipeline.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use realtydesk_core::api::{ApiClient, Resource};
use realtydesk_core::auth::{Credentials, SessionContext, SessionEvent, SessionState};
use realtydesk_core::Config;

// ============================================================================
// Constants
// ============================================================================

/// Directory for a daily-rolling log file; unset means stderr only
const LOG_DIR_ENV: &str = "REALTYDESK_LOG_DIR";

/// Log file name prefix inside `LOG_DIR_ENV`
const LOG_FILE_PREFIX: &str = "realtydesk.log";

/// Shown when the server gives no usable error message
const LOGIN_FALLBACK_MESSAGE: &str = "Login failed. Check your email and password.";

const USAGE: &str = "Usage: realtydesk <command>

Commands:
  login [email]           Log in (password is prompted)
  logout                  Clear the stored session
  whoami                  Show the signed-in user
  list <resource>         List a resource collection
  get <resource> <id>     Show a single item

Resources: properties, leads, deals, contracts, developments, lots,
           commissions, users, organizations, shifts, reports";

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr));

    match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        _ => {
            registry.init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let mut config = Config::load()?;
    let base_url = config.api_base_url();
    debug!(base_url = %base_url, "Using API");

    let store = config.credential_store()?;
    let client = ApiClient::connect(&base_url, store)
        .context("Failed to create API client")?;
    let context = SessionContext::initialized(client.session().clone());
    let mut events = client.session().subscribe();

    let result = run(command, &args, &client, &context, &mut config).await;

    // `logout` ends the session on purpose and already said so
    if command != "logout" && session_ended(&mut events) {
        info!("Session ended");
        eprintln!("Session ended. Run `realtydesk login` to sign in again.");
    }
    result
}

async fn run(
    command: &str,
    args: &[String],
    client: &ApiClient,
    context: &SessionContext,
    config: &mut Config,
) -> Result<()> {
    match command {
        "login" => login(context, config, args.get(1).cloned()).await,
        "logout" => {
            context.logout();
            println!("Logged out.");
            Ok(())
        }
        "whoami" => {
            whoami(&context.state());
            Ok(())
        }
        "list" => {
            let resource = parse_resource(args.get(1))?;
            require_session(context)?;
            let items: Vec<serde_json::Value> = client.list(resource).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
            Ok(())
        }
        "get" => {
            let resource = parse_resource(args.get(1))?;
            let id = args.get(2).context("Missing item id")?;
            require_session(context)?;
            let item: serde_json::Value = client.fetch(resource, id).await?;
            println!("{}", serde_json::to_string_pretty(&item)?);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

/// Whether the session was terminated while the command ran
fn session_ended(events: &mut broadcast::Receiver<SessionEvent>) -> bool {
    let mut ended = false;
    loop {
        match events.try_recv() {
            Ok(SessionEvent::Terminated) => ended = true,
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return ended,
        }
    }
}

fn parse_resource(name: Option<&String>) -> Result<Resource> {
    let name = name.context("Missing resource name")?;
    Resource::from_name(name).with_context(|| format!("Unknown resource '{}'", name))
}

fn require_session(context: &SessionContext) -> Result<()> {
    if !context.session().is_authenticated() {
        bail!("Not logged in. Run `realtydesk login` first.");
    }
    Ok(())
}

async fn login(context: &SessionContext, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password("Password: ")?;
    if email.is_empty() || password.is_empty() {
        bail!("Email and password required");
    }

    match context.login(&Credentials::new(email.clone(), password)).await {
        Ok(response) => {
            config.last_email = Some(email);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            let name = response
                .user
                .as_ref()
                .map(|u| u.display_name())
                .unwrap_or_default();
            println!("Logged in as {}", name);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Login failed");
            bail!(e.user_message(LOGIN_FALLBACK_MESSAGE))
        }
    }
}

fn whoami(state: &SessionState) {
    match state {
        SessionState::Authenticated(Some(user)) => {
            println!("{} <{}>", user.display_name(), user.email);
            if let Some(ref org) = user.organization_id {
                println!("Organization: {}", org);
            }
            println!("Role: {}", user.role);
        }
        SessionState::Authenticated(None) => println!("Logged in (no profile cached)"),
        SessionState::Unauthenticated | SessionState::Loading => println!("Not logged in"),
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

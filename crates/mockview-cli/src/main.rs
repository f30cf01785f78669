//! mockview - terminal client for the mockview interview service.
//!
//! Signs in, keeps the session across runs and exposes the account
//! operations (signup, logout, deletion, verification email) as
//! subcommands.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use mockview_core::{
    ApiError, Config, Navigator, Route, RouteAccess, RouteGuard, SessionController,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: mockview <command> [args]

Commands:
  login [email]                 Sign in (prompts for the password)
  signup <username> <email>     Create an account
  resend-verification <email>   Send another verification email
  status                        Show the stored session
  whoami                        Fetch the signed-in profile from the server
  logout                        Sign out and forget the stored session
  delete-account                Permanently delete the signed-in account";

/// Prints where a graphical client would go next.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: Route) {
        info!(route = route.path(), "Navigate");
        match route {
            Route::Login => eprintln!("Signed out. Run `mockview login` to sign in again."),
            Route::Signup => eprintln!("Run `mockview signup` to create a new account."),
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g. RUST_LOG=mockview_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    if command == "help" || command == "--help" || command == "-h" {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load()?;
    let session = SessionController::new(
        &config.api_base_url(),
        config.open_store()?,
        Arc::new(TerminalNavigator),
    )?;
    session.initialize();

    let result = match (command.as_str(), &args[1..]) {
        ("login", rest) => login(&session, &mut config, rest.first().cloned()).await,
        ("signup", [username, email]) => signup(&session, username, email).await,
        ("resend-verification", [email]) => session
            .resend_verification_email(email)
            .await
            .map(|message| println!("{}", message))
            .map_err(Into::into),
        ("status", []) => {
            status(&session);
            Ok(())
        }
        ("whoami", []) => whoami(&session).await,
        ("logout", []) => {
            session.logout().await;
            Ok(())
        }
        ("delete-account", []) => delete_account(&session).await,
        _ => bail!("Unknown command or wrong arguments\n\n{}", USAGE),
    };

    result.map_err(|e| match e.downcast_ref::<ApiError>() {
        Some(api_error) => anyhow::anyhow!(api_error.user_message()),
        None => e,
    })
}

async fn login(session: &SessionController, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))
        .context("Failed to read password")?;

    let user = session.login(&email, &password).await?;
    println!("Signed in as {}", user.display_name());

    config.last_email = Some(email);
    config.save()?;
    Ok(())
}

async fn signup(session: &SessionController, username: &str, email: &str) -> Result<()> {
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let confirm = rpassword::prompt_password("Confirm password: ")
        .context("Failed to read password")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    let message = session.signup(username, email, &password).await?;
    println!("{}", message);
    Ok(())
}

fn status(session: &SessionController) {
    match RouteGuard::check(&session.state()) {
        RouteAccess::Allow => {
            if let Some(user) = session.current_user() {
                println!("Signed in as {} <{}>", user.display_name(), user.email);
            }
        }
        RouteAccess::Pending | RouteAccess::Redirect(_) => println!("Not signed in"),
    }
}

async fn whoami(session: &SessionController) -> Result<()> {
    if let RouteAccess::Redirect(_) = RouteGuard::check(&session.state()) {
        bail!("Not signed in. Run `mockview login` first.");
    }

    let user = session.reload_user().await?;
    println!("{} <{}>", user.display_name(), user.email);
    if !user.is_email_verified {
        println!("Email not verified. Run `mockview resend-verification {}`.", user.email);
    }
    Ok(())
}

async fn delete_account(session: &SessionController) -> Result<()> {
    let Some(user) = session.current_user() else {
        bail!("Not signed in. Run `mockview login` first.");
    };

    let answer = prompt(&format!(
        "Delete account {}? This cannot be undone. Type 'delete' to confirm: ",
        user.display_name()
    ))?;
    if answer != "delete" {
        println!("Cancelled");
        return Ok(());
    }

    session.delete_account().await?;
    println!("Account deleted");
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

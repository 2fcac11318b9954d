//! ticketwallet - command-line front end for the ticketwallet account API.
//!
//! Signs in, verifies devices and phones, and shows the profile of the
//! signed-in user. Credentials are kept in the configured store between runs.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ticketwallet_core::api::{AccountService, ApiError, SignIn};
use ticketwallet_core::Config;

const USAGE: &str = "\
Usage: ticketwallet <command>

Commands:
  status                    Show whether a session is stored
  sign-in <telephone>       Sign in (password is prompted)
  verify <telephone> <code> Confirm a telephone number with the SMS code
  resend-sms <telephone>    Send the SMS code again
  profile                   Print the signed-in user's profile
  sign-out                  Forget the stored session
  ping                      Check that the server is reachable";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(ApiError::SessionExpired) = e.downcast_ref::<ApiError>() {
                eprintln!("Your session has expired. Run `ticketwallet sign-in <telephone>` again.");
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<()> {
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = Config::load().context("Failed to load configuration")?;
    debug!(base_url = %config.base_url, store = ?config.store, "Configuration loaded");
    let service = config.account_service()?;

    match (command.as_str(), &args[1..]) {
        ("status", []) => status(&service),
        ("sign-in", [telephone]) => sign_in(&service, telephone).await,
        ("verify", [telephone, code]) => verify(&service, telephone, code).await,
        ("resend-sms", [telephone]) => {
            let reply = service.resend_sms_code(telephone).await?;
            println!("{}", reply.message.as_deref().unwrap_or("Verification code sent."));
            Ok(())
        }
        ("profile", []) => {
            let profile = service.profile().await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
            Ok(())
        }
        ("sign-out", []) => {
            service.sign_out()?;
            println!("Signed out.");
            Ok(())
        }
        ("ping", []) => {
            if service.test_connection().await {
                println!("Server is reachable.");
                Ok(())
            } else {
                bail!("Server is not reachable at {}", config.base_url)
            }
        }
        _ => bail!("Unrecognized command\n\n{}", USAGE),
    }
}

fn status(service: &AccountService) -> Result<()> {
    if service.is_authenticated()? {
        println!("Signed in.");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

async fn sign_in(service: &AccountService, telephone: &str) -> Result<()> {
    print!("Password: ");
    io::stdout().flush()?;
    let password = rpassword::read_password().context("Failed to read password")?;

    match service.sign_in(telephone, &password).await {
        Ok(SignIn::SignedIn) => {
            info!("Sign-in complete");
            println!("Signed in.");
            Ok(())
        }
        Ok(SignIn::VerificationRequired(verification)) => {
            println!(
                "{}",
                verification
                    .message
                    .as_deref()
                    .unwrap_or("This device is not recognized.")
            );
            println!("Run `ticketwallet verify {} <code>` with the code you received.", telephone);
            Ok(())
        }
        // Sign-in carries no session, so an auth rejection means bad credentials
        Err(ApiError::SessionExpired) => bail!("Telephone number or password is incorrect"),
        Err(e) => Err(e.into()),
    }
}

async fn verify(service: &AccountService, telephone: &str, code: &str) -> Result<()> {
    let reply = service.verify_phone(code, telephone).await?;
    if !reply.success {
        bail!(
            "{}",
            reply.message.as_deref().unwrap_or("Verification failed")
        );
    }
    if service.is_authenticated()? {
        println!("Verified and signed in.");
    } else {
        println!("Verified. You can sign in now.");
    }
    Ok(())
}

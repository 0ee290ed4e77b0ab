use chrono::Utc;

use crate::cli::AuthCommands;
use crate::commands::common::resolve_password;
use crate::context::CliContext;
use crate::error::CliError;

pub async fn run_auth(context: &CliContext, command: AuthCommands) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { email, password } => {
            let password = resolve_password(password)?;
            let (session, _) = context.open_session().await?;
            session.tokens().sign_in(&email, &password).await?;
            println!("Signed in as {}", email.trim());
            Ok(())
        }
        AuthCommands::Signup {
            username,
            email,
            password,
        } => {
            let password = resolve_password(password)?;
            let (session, _) = context.open_session().await?;
            let message = session
                .tokens()
                .sign_up(&username, &email, &password)
                .await?;
            println!("{message}");
            println!("Run `scrawl auth login --email {}` to sign in.", email.trim());
            Ok(())
        }
        AuthCommands::Status => {
            let (session, _) = context.open_session().await?;
            let Some(credential) = session.tokens().current() else {
                println!("Not signed in ({})", context.config.api_base_url);
                return Ok(());
            };

            let now = Utc::now();
            println!("Signed in to {}", context.config.api_base_url);
            if credential.access_expires_at <= now {
                println!("Access token: expired, refreshed on next request");
            } else {
                println!("Access token: valid until {}", credential.access_expires_at.to_rfc3339());
            }
            println!("Session: valid until {}", credential.refresh_expires_at.to_rfc3339());
            Ok(())
        }
        AuthCommands::Logout => {
            let (session, _) = context.open_session().await?;
            session.logout()?;
            println!("Signed out");
            Ok(())
        }
    }
}

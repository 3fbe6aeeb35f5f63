//! # AtlasCRM admin CLI
//!
//! Seeds accounts directly into the database.
//!
//! ```bash
//! atlascrm-admin create-user --email root@atlascrm.app --password 'a-long-secret' \
//!     --role ADMIN --super-admin
//! ```

use std::sync::Arc;

use anyhow::Context;
use atlascrm_api::config::Config;
use atlascrm_shared::auth::reset::LogResetTokenSender;
use atlascrm_shared::auth::service::{AuthService, SeedUserRequest, DEFAULT_TENANT_NAME};
use atlascrm_shared::clock::SystemClock;
use atlascrm_shared::db::{migrations, pool};
use atlascrm_shared::error::CredentialError;
use atlascrm_shared::models::membership::MembershipRole;
use atlascrm_shared::store::PgStore;
use clap::{Parser, Subcommand};
use serde_json::json;

#[derive(Parser)]
#[command(name = "atlascrm-admin")]
#[command(about = "Administrative tasks for AtlasCRM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a user, or overwrite the password and role of an existing one
    CreateUser {
        #[arg(short, long)]
        email: String,

        /// At least 12 characters
        #[arg(short, long)]
        password: String,

        /// ADMIN, MANAGER or USER
        #[arg(short, long, default_value = "ADMIN", value_parser = parse_role)]
        role: MembershipRole,

        #[arg(short, long)]
        name: Option<String>,

        /// Name given to the default tenant
        #[arg(short, long, default_value = DEFAULT_TENANT_NAME)]
        organization: String,

        #[arg(long)]
        super_admin: bool,
    },
}

fn parse_role(s: &str) -> Result<MembershipRole, String> {
    MembershipRole::parse(s).ok_or_else(|| format!("unknown role '{}': use ADMIN, MANAGER or USER", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atlascrm_shared=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let db = pool::create_pool(config.pool_config())
        .await
        .context("Failed to connect to database")?;
    migrations::run_migrations(&db)
        .await
        .context("Failed to run migrations")?;

    let auth = AuthService::new(
        Arc::new(PgStore::new(db.clone())),
        Arc::new(SystemClock),
        Arc::new(LogResetTokenSender::new(config.api.production)),
        config.auth_config(),
    )?;

    match cli.command {
        Commands::CreateUser {
            email,
            password,
            role,
            name,
            organization,
            super_admin,
        } => {
            let seeded = auth
                .seed_user(SeedUserRequest {
                    email,
                    password,
                    name,
                    role,
                    organization_name: organization,
                    super_admin,
                })
                .await;

            let seeded = match seeded {
                Ok(seeded) => seeded,
                Err(CredentialError::Validation(fields)) => {
                    for field in &fields {
                        eprintln!("{}: {}", field.field, field.message);
                    }
                    pool::close_pool(db).await;
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            };

            let summary = json!({
                "user_id": seeded.user.id,
                "email": seeded.user.email,
                "super_admin": seeded.user.is_super_admin,
                "tenant_id": seeded.tenant.id,
                "organization": seeded.tenant.name,
                "role": seeded.membership.role,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    pool::close_pool(db).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_create_user_defaults() {
        let cli = Cli::try_parse_from([
            "atlascrm-admin",
            "create-user",
            "--email",
            "root@atlascrm.app",
            "--password",
            "a-long-secret",
        ])
        .unwrap();

        let Commands::CreateUser {
            role,
            organization,
            super_admin,
            ..
        } = cli.command;
        assert_eq!(role, MembershipRole::Admin);
        assert_eq!(organization, "AtlasCRM");
        assert!(!super_admin);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(parse_role("manager"), Ok(MembershipRole::Manager));
        assert!(parse_role("owner").is_err());
    }
}

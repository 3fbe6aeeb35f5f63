/// Database models for AtlasCRM
///
/// Each model owns the SQL for its table. Query functions take any
/// `sqlx::PgExecutor`, so the store can compose them inside one transaction.
///
/// # Models
///
/// - `user`: accounts and credentials
/// - `tenant`: organizations, including the shared default tenant
/// - `membership`: user-tenant relationships with role and status
/// - `session`: login sessions keyed by token digest
/// - `password_reset_token`: single-use reset tokens
/// - `activation_code`: DEMO/PAID codes granting tenant access
/// - `audit_event`: issuance audit trail
///
/// # Example
///
/// ```no_run
/// use atlascrm_shared::models::user::{User, CreateUser};
/// use atlascrm_shared::db::pool::{create_pool, DatabaseConfig};
/// use chrono::Utc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let new_user = CreateUser {
///     email: "user@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Ada Yilmaz".to_string()),
///     is_super_admin: false,
/// };
///
/// let user = User::create(&pool, new_user, Utc::now()).await?;
/// # Ok(())
/// # }
/// ```

pub mod activation_code;
pub mod audit_event;
pub mod membership;
pub mod password_reset_token;
pub mod session;
pub mod tenant;
pub mod user;

use libsql::{Builder, Connection};
use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::error::Result;

use super::schema;

#[derive(Clone)]
pub struct Database {
    db: Arc<libsql::Database>,
}

impl Database {
    /// Opens (or creates) the database and applies the schema.
    ///
    /// `libsql://` and `https://` URLs connect to a remote server, or to an
    /// embedded replica when `DATABASE_LOCAL_PATH` is set. Anything else is a
    /// local file, with an optional `file:` prefix.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let db = if config.url.starts_with("libsql://") || config.url.starts_with("https://") {
            let auth_token = config.auth_token.clone().unwrap_or_default();
            if let Some(ref local_path) = config.local_path {
                Builder::new_remote_replica(local_path, config.url.clone(), auth_token)
                    .build()
                    .await?
            } else {
                Builder::new_remote(config.url.clone(), auth_token)
                    .build()
                    .await?
            }
        } else {
            let path = config.url.strip_prefix("file:").unwrap_or(&config.url);
            Builder::new_local(path).build().await?
        };

        let database = Self { db: Arc::new(db) };
        database.configure_database().await;
        schema::init_schema(&database.connect()?).await?;

        tracing::info!(url = %config.url, "Database ready");
        Ok(database)
    }

    pub fn connect(&self) -> Result<Connection> {
        Ok(self.db.connect()?)
    }

    /// Pragmas are best effort: remote databases reject some of them.
    async fn configure_database(&self) {
        let busy_timeout_ms = std::env::var("DATABASE_BUSY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5000);

        let conn = match self.connect() {
            Ok(conn) => conn,
            Err(error) => {
                tracing::warn!(error = %error, "Could not open connection for pragmas");
                return;
            }
        };

        for pragma in [
            format!("PRAGMA busy_timeout = {busy_timeout_ms}"),
            "PRAGMA journal_mode = WAL".to_string(),
            "PRAGMA synchronous = NORMAL".to_string(),
        ] {
            if let Err(error) = conn.execute_batch(&pragma).await {
                tracing::warn!(pragma = %pragma, error = %error, "Failed to apply SQLite pragma");
            }
        }
    }

    pub async fn sync(&self) -> Result<()> {
        if let Ok(sync) = self.db.sync().await {
            tracing::info!("Database synced: {:?}", sync);
        }
        Ok(())
    }
}

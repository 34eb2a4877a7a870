// src/backends/postgres.rs
use crate::config::DatabaseConfig;
use crate::health::{DatabaseProbe, ProbeError};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use std::str::FromStr;

/// Opens one connection per probe and closes it afterwards. A connect
/// failure is returned as-is: no pool, no retry.
pub struct PostgresProbe {
    options: PgConnectOptions,
}

impl PostgresProbe {
    pub fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let options = PgConnectOptions::from_str(&config.url)?;
        Ok(Self { options })
    }
}

#[async_trait]
impl DatabaseProbe for PostgresProbe {
    async fn database_name(&self) -> Result<String, ProbeError> {
        let mut conn: PgConnection = self.options.connect().await?;
        let name: String = sqlx::query_scalar("SELECT current_database()::text")
            .fetch_one(&mut conn)
            .await?;

        if let Err(e) = conn.close().await {
            tracing::debug!(%e, "failed to close probe connection");
        }
        Ok(name)
    }
}

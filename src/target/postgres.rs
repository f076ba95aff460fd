//! PostgreSQL target backed by sqlx

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::debug;

use super::{Target, TargetError};
use crate::config::TargetConfig;

/// Application name reported in `pg_stat_activity`
const APPLICATION_NAME: &str = "pglab-probe";

/// Read-only PostgreSQL target
///
/// Every call opens a new connection (the `pg_isready` model) and closes it
/// before returning. Sessions run with `default_transaction_read_only=on`.
#[derive(Debug, Clone)]
pub struct PgTarget {
    options: PgConnectOptions,
    label: String,
}

impl PgTarget {
    /// Builds a target from connection settings; `statement_timeout` is
    /// enforced server-side as a second bound behind the probe timeout
    pub fn new(settings: &TargetConfig, statement_timeout: Duration) -> Self {
        let options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.database)
            .application_name(APPLICATION_NAME)
            .options([
                ("default_transaction_read_only", "on".to_string()),
                (
                    "statement_timeout",
                    statement_timeout.as_millis().to_string(),
                ),
            ]);

        Self {
            options,
            label: format!(
                "{}@{}:{}/{}",
                settings.user, settings.host, settings.port, settings.database
            ),
        }
    }

    async fn connect(&self) -> Result<PgConnection, TargetError> {
        PgConnection::connect_with(&self.options)
            .await
            .map_err(|e| TargetError::Connect(e.to_string()))
    }
}

async fn finish(conn: PgConnection) {
    if let Err(error) = conn.close().await {
        debug!(%error, "closing probe session failed");
    }
}

fn query_error(error: sqlx::Error) -> TargetError {
    match error.as_database_error() {
        Some(db) => TargetError::Query(db.message().to_string()),
        None => TargetError::Query(error.to_string()),
    }
}

impl Target for PgTarget {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), TargetError>> {
        async move {
            let mut conn = self.connect().await?;
            let result = sqlx::query_scalar::<_, i32>("SELECT 1")
                .fetch_one(&mut conn)
                .await
                .map_err(query_error);
            finish(conn).await;
            result.map(|_| ())
        }
        .boxed()
    }

    fn fetch_count<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<i64, TargetError>> {
        async move {
            let mut conn = self.connect().await?;
            let result = sqlx::query_scalar::<_, i64>(sql)
                .fetch_one(&mut conn)
                .await
                .map_err(query_error);
            finish(conn).await;
            result
        }
        .boxed()
    }

    fn fetch_ratio<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<Option<f64>, TargetError>> {
        async move {
            let mut conn = self.connect().await?;
            let result = sqlx::query_scalar::<_, Option<f64>>(sql)
                .fetch_one(&mut conn)
                .await
                .map_err(query_error);
            finish(conn).await;
            result
        }
        .boxed()
    }

    fn row_count<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<usize, TargetError>> {
        async move {
            let mut conn = self.connect().await?;
            let result = sqlx::query(sql)
                .fetch_all(&mut conn)
                .await
                .map(|rows| rows.len())
                .map_err(query_error);
            finish(conn).await;
            result
        }
        .boxed()
    }

    fn setting<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<String>, TargetError>> {
        async move {
            let mut conn = self.connect().await?;
            // missing_ok = true: unknown settings come back as NULL
            let result = sqlx::query_scalar::<_, Option<String>>("SELECT current_setting($1, true)")
                .bind(name)
                .fetch_one(&mut conn)
                .await
                .map_err(query_error);
            finish(conn).await;
            result
        }
        .boxed()
    }

    fn relation_exists<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, TargetError>> {
        async move {
            let mut conn = self.connect().await?;
            let result = sqlx::query_scalar::<_, bool>("SELECT to_regclass($1) IS NOT NULL")
                .bind(name)
                .fetch_one(&mut conn)
                .await
                .map_err(query_error);
            finish(conn).await;
            result
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeConfig;

    #[test]
    fn description_omits_password() {
        let config = ProbeConfig::default();
        let target = PgTarget::new(&config.target, Duration::from_secs(5));

        let label = target.describe();
        assert_eq!(label, "postgres@localhost:5432/tuning_lab");
        assert!(!label.contains(&config.target.password));
    }
}

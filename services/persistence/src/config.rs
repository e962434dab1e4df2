use std::time::Duration;

/// Which backend holds price history and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Store connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// libpq-style URL or key/value connection string
    pub database_url: String,
    pub max_pool_size: usize,
    pub connect_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Postgres,
            database_url: connection_string("localhost", 5432, "postgres", "", "motor_metrics", "disable"),
            max_pool_size: 25,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// Load store settings from the environment.
    ///
    /// # Environment Variables
    /// - `STORE_BACKEND`: `postgres` (default) or `memory`
    /// - `DATABASE_URL`: full connection string; when unset it is assembled from
    ///   `DATABASE_HOST`, `DATABASE_PORT`, `DATABASE_USER`, `DATABASE_PASSWORD`,
    ///   `DATABASE_NAME` and `DATABASE_SSLMODE`
    /// - `DATABASE_POOL_SIZE`: maximum pooled connections (default: 25)
    pub fn from_env() -> Self {
        let backend = match std::env::var("STORE_BACKEND")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            _ => StoreBackend::Postgres,
        };

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| {
                connection_string(
                    &std::env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string()),
                    std::env::var("DATABASE_PORT")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(5432),
                    &std::env::var("DATABASE_USER").unwrap_or_else(|_| "postgres".to_string()),
                    &std::env::var("DATABASE_PASSWORD").unwrap_or_default(),
                    &std::env::var("DATABASE_NAME").unwrap_or_else(|_| "motor_metrics".to_string()),
                    &std::env::var("DATABASE_SSLMODE").unwrap_or_else(|_| "disable".to_string()),
                )
            });

        let max_pool_size = std::env::var("DATABASE_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(25);

        Self {
            backend,
            database_url,
            max_pool_size,
            ..Self::default()
        }
    }

    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            ..Self::default()
        }
    }
}

fn connection_string(host: &str, port: u16, user: &str, password: &str, dbname: &str, sslmode: &str) -> String {
    let mut conn = format!("host={host} port={port} user={user} dbname={dbname} sslmode={sslmode}");
    if !password.is_empty() {
        conn.push_str(&format!(" password={password}"));
    }
    conn
}

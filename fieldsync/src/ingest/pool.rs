//! Pool de connexions PostgreSQL du service d'ingestion
//!
//! Chaque requête `POST /sync` emprunte une connexion ; une base
//! injoignable doit faire échouer la requête vite (réponse `error`)
//! plutôt que de bloquer le terminal de saisie.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime, Timeouts};
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, info};

/// Délai de connexion par défaut (secondes), `PGCONNECT_TIMEOUT`
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Chiffrement de la connexion, valeurs `PGSSLMODE` de libpq
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    #[default]
    Disable,
    /// TLS tenté, repli en clair si le serveur le refuse
    Prefer,
    /// TLS obligatoire, certificat vérifié contre les racines webpki
    Require,
}

impl SslMode {
    fn uses_tls(self) -> bool {
        !matches!(self, SslMode::Disable)
    }

    fn to_driver(self) -> deadpool_postgres::SslMode {
        match self {
            SslMode::Disable => deadpool_postgres::SslMode::Disable,
            SslMode::Prefer => deadpool_postgres::SslMode::Prefer,
            SslMode::Require => deadpool_postgres::SslMode::Require,
        }
    }
}

impl std::str::FromStr for SslMode {
    type Err = String;

    /// `verify-ca` et `verify-full` reviennent à `require` : rustls vérifie
    /// toujours la chaîne et le nom d'hôte.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "allow" | "prefer" => Ok(SslMode::Prefer),
            "require" | "verify-ca" | "verify-full" => Ok(SslMode::Require),
            other => Err(format!(
                "Invalid PGSSLMODE: {}. Use: disable, prefer, require",
                other
            )),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        })
    }
}

/// Paramètres de connexion à la base d'ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub pool_size: usize,
    pub ssl_mode: SslMode,
    pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            dbname: "test_db".into(),
            user: "postgres".into(),
            password: None,
            pool_size: 4,
            ssl_mode: SslMode::Disable,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl DatabaseConfig {
    /// Variables libpq (`PGHOST`, `PGPORT`, ..., `PGCONNECT_TIMEOUT`) et `POOL_SIZE`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Variante de [`DatabaseConfig::from_env`] avec une source injectée
    ///
    /// Une valeur illisible garde le défaut.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            host: lookup("PGHOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PGPORT").unwrap_or(defaults.port),
            dbname: lookup("PGDATABASE").unwrap_or(defaults.dbname),
            user: lookup("PGUSER").unwrap_or(defaults.user),
            password: lookup("PGPASSWORD"),
            pool_size: parse_var(&lookup, "POOL_SIZE")
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.pool_size),
            ssl_mode: parse_var(&lookup, "PGSSLMODE").unwrap_or(defaults.ssl_mode),
            connect_timeout: parse_var(&lookup, "PGCONNECT_TIMEOUT")
                .filter(|&secs: &u64| secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        }
    }

    /// Configuration deadpool : le délai de connexion borne aussi
    /// l'attente d'une connexion libre
    pub fn pool_config(&self) -> Config {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = self.password.clone();
        cfg.ssl_mode = Some(self.ssl_mode.to_driver());
        cfg.connect_timeout = Some(self.connect_timeout);
        cfg.application_name = Some(env!("CARGO_PKG_NAME").to_string());

        cfg.pool = Some(PoolConfig {
            max_size: self.pool_size,
            timeouts: Timeouts {
                wait: Some(self.connect_timeout),
                create: Some(self.connect_timeout),
                recycle: Some(self.connect_timeout),
            },
            ..Default::default()
        });
        cfg
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn webpki_connector() -> MakeRustlsConnect {
    let roots = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    MakeRustlsConnect::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}

/// Crée le pool ; aucune connexion n'est ouverte avant le premier emprunt
pub fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
    let cfg = config.pool_config();

    debug!(
        host = %config.host,
        port = config.port,
        dbname = %config.dbname,
        ssl = %config.ssl_mode,
        timeout_secs = config.connect_timeout.as_secs(),
        "Creating ingestion pool"
    );

    if config.ssl_mode.uses_tls() {
        cfg.create_pool(Some(Runtime::Tokio1), webpki_connector())
            .context("Failed to create TLS ingestion pool")
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .context("Failed to create ingestion pool")
    }
}

/// Emprunte une connexion et exécute `SELECT 1`
pub async fn test_connection(pool: &Pool) -> Result<()> {
    let client = pool.get().await.context("DB connection failed")?;
    client
        .execute("SELECT 1", &[])
        .await
        .context("Connection test failed")?;
    info!(pool_size = pool.status().max_size, "Database connection OK");
    Ok(())
}

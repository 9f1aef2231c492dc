use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::migrator::Migrator;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub type DbPool = DatabaseConnection;

/// Pool tuning for one database URL.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub acquire_timeout: Duration,
}

impl PoolSettings {
    /// Each connection to `sqlite::memory:` opens its own empty database, so such pools are
    /// pinned to a single connection that is never reaped.
    fn normalized(mut self) -> Self {
        if is_in_memory_sqlite(&self.url) {
            self.max_connections = 1;
            self.min_connections = 1;
            self.idle_timeout = None;
        }
        self
    }
}

impl From<&AppConfig> for PoolSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Some(Duration::from_secs(cfg.db_idle_timeout_secs)),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

pub fn is_in_memory_sqlite(url: &str) -> bool {
    url.starts_with("sqlite:") && (url.contains(":memory:") || url.contains("mode=memory"))
}

pub async fn connect(settings: PoolSettings) -> Result<DbPool, ServiceError> {
    let settings = settings.normalized();
    debug!(
        max_connections = settings.max_connections,
        in_memory = is_in_memory_sqlite(&settings.url),
        "Configuring database connection"
    );

    let mut opt = ConnectOptions::new(settings.url.clone());
    opt.max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .connect_timeout(settings.connect_timeout)
        .acquire_timeout(settings.acquire_timeout)
        .sqlx_logging(false);
    if let Some(idle) = settings.idle_timeout {
        opt.idle_timeout(idle);
    }

    let pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection failed: {}", e);
        ServiceError::DatabaseError(e)
    })?;

    info!("Database connection pool established");
    Ok(pool)
}

pub async fn connect_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    connect(cfg.into()).await
}

/// A fresh, fully migrated in-memory SQLite database.
pub async fn connect_in_memory() -> Result<DbPool, ServiceError> {
    let pool = connect(PoolSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        connect_timeout: Duration::from_secs(5),
        idle_timeout: None,
        acquire_timeout: Duration::from_secs(30),
    })
    .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Applies pending migrations and returns how many ran.
pub async fn run_migrations(pool: &DbPool) -> Result<usize, ServiceError> {
    let started = Instant::now();
    let pending = Migrator::get_pending_migrations(pool).await?.len();
    if pending == 0 {
        debug!("Schema is up to date");
        return Ok(0);
    }

    info!(pending, "Running database migrations");
    Migrator::up(pool, None).await.map_err(|e| {
        error!("Database migrations failed after {:?}: {}", started.elapsed(), e);
        ServiceError::DatabaseError(e)
    })?;
    info!(pending, "Database migrations completed in {:?}", started.elapsed());
    Ok(pending)
}

pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    pool.ping().await.map_err(ServiceError::DatabaseError)
}

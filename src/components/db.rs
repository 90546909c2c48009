//! Database component.
//!
//! Opens a session to the configured server on start and hands it to
//! registered repositories. Siblings without a registered repository resolve
//! the component through the locator and use [`DbProvider`].

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::engine::EngineHandle;
use crate::lifecycle::{Component, ComponentBase, ComponentError};

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DbKind {
    #[default]
    Mysql,
}

/// `[components.db]` section.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DbConfig {
    pub kind: DbKind,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub connect_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            kind: DbKind::Mysql,
            user: "root".to_string(),
            password: String::new(),
            host: "127.0.0.1".to_string(),
            port: 3306,
            database: String::new(),
            connect_timeout_secs: 5,
        }
    }
}

impl DbConfig {
    /// Driver connection string for the configured dialect.
    pub fn connection_string(&self) -> String {
        match self.kind {
            DbKind::Mysql => format!(
                "{}:{}@tcp({}:{})/{}?charset=utf8&parseTime=True&loc=Local",
                self.user, self.password, self.host, self.port, self.database
            ),
        }
    }

    /// Connection string with the password masked, for logs.
    pub fn redacted_connection_string(&self) -> String {
        let masked = DbConfig {
            password: "***".to_string(),
            ..self.clone()
        };
        masked.connection_string()
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("kind", &self.kind)
            .field("user", &self.user)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Session {
    peer: SocketAddr,
    database: String,
    stream: tokio::sync::Mutex<Option<TcpStream>>,
}

/// Shared handle to the open database session.
#[derive(Debug, Clone)]
pub struct DbHandle {
    session: Arc<Session>,
}

impl DbHandle {
    pub fn peer_addr(&self) -> SocketAddr {
        self.session.peer
    }

    pub fn database(&self) -> &str {
        &self.session.database
    }

    /// Whether the session is still open.
    pub async fn is_open(&self) -> bool {
        self.session.stream.lock().await.is_some()
    }

    async fn close(&self) -> std::io::Result<()> {
        let stream = self.session.stream.lock().await.take();
        match stream {
            Some(mut stream) => stream.shutdown().await,
            None => Ok(()),
        }
    }
}

/// Receives the database handle when the DB component starts.
pub trait Repository: Send + Sync + 'static {
    fn set_db(&self, db: DbHandle);
}

/// Access to the database handle for components resolving it by name.
pub trait DbProvider {
    /// `None` until the component started.
    fn db(&self) -> Option<DbHandle>;
}

/// Owns the database session.
pub struct DbComponent {
    base: ComponentBase,
    repositories: Vec<Arc<dyn Repository>>,
    config: ArcSwapOption<DbConfig>,
    handle: Mutex<Option<DbHandle>>,
}

impl DbComponent {
    /// Create the component under its default name, `db`.
    pub fn new() -> Self {
        Self {
            base: ComponentBase::new("db"),
            repositories: Vec::new(),
            config: ArcSwapOption::empty(),
            handle: Mutex::new(None),
        }
    }

    /// Register a repository to receive the handle on start.
    pub fn with_repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repositories.push(repository);
        self
    }

    pub fn config(&self) -> Option<Arc<DbConfig>> {
        self.config.load_full()
    }

    fn handle(&self) -> MutexGuard<'_, Option<DbHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DbComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl DbProvider for DbComponent {
    fn db(&self) -> Option<DbHandle> {
        self.handle().clone()
    }
}

#[async_trait]
impl Component for DbComponent {
    type Config = DbConfig;

    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    async fn configure(&self, config: DbConfig) -> Result<(), ComponentError> {
        if config.host.trim().is_empty() {
            return Err(ComponentError::invalid_config("host must not be empty"));
        }
        if config.connect_timeout_secs == 0 {
            return Err(ComponentError::invalid_config(
                "connect_timeout_secs must be greater than zero",
            ));
        }
        self.config.store(Some(Arc::new(config)));
        Ok(())
    }

    async fn start(&self, _engine: EngineHandle) -> Result<(), ComponentError> {
        let config = self
            .config
            .load_full()
            .ok_or_else(|| ComponentError::failed("DB component was not configured"))?;
        tracing::debug!(dsn = %config.redacted_connection_string(), "Connecting to database");

        let limit = Duration::from_secs(config.connect_timeout_secs);
        let stream = tokio::time::timeout(limit, TcpStream::connect((config.host.as_str(), config.port)))
            .await
            .map_err(|_| ComponentError::Timeout(limit))?
            .map_err(|e| ComponentError::failed(format!("database connection failed: {e}")))?;

        let handle = DbHandle {
            session: Arc::new(Session {
                peer: stream.peer_addr()?,
                database: config.database.clone(),
                stream: tokio::sync::Mutex::new(Some(stream)),
            }),
        };
        tracing::info!(peer = %handle.peer_addr(), "Database connection established");

        for repository in &self.repositories {
            repository.set_db(handle.clone());
        }
        if !self.repositories.is_empty() {
            tracing::info!(count = self.repositories.len(), "Database handle injected into repositories");
        }

        *self.handle() = Some(handle);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        let handle = self.handle().take();
        let Some(handle) = handle else {
            return Ok(());
        };

        handle
            .close()
            .await
            .map_err(|e| ComponentError::failed(format!("error closing database session: {e}")))?;
        tracing::info!("Database connection closed");
        Ok(())
    }
}

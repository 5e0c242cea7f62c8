use std::path::PathBuf;

use tracing::info;

use crate::config::{self, ConnectionOverrides, ConnectionSettings};
use crate::dataset::{LocalFileSystem, DEFAULT_DATASET_DIRECTORY};
use crate::drivers;
use crate::error::Result;

use super::{Populator, DEFAULT_BATCH_SIZE};

/// Connects and builds a [`Populator`] from environment settings.
///
/// ```rust,no_run
/// # async fn demo() -> dbpop::Result<()> {
/// let mut populator = dbpop::Populator::builder()
///     .environment("qa")
///     .build()
///     .await?;
/// populator.load(&["base", "customers"]).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PopulatorBuilder {
    environment: Option<String>,
    env_file: Option<PathBuf>,
    overrides: ConnectionOverrides,
    resource_directory: String,
    path: Option<PathBuf>,
    batch_size: usize,
}

impl Default for PopulatorBuilder {
    fn default() -> Self {
        Self {
            environment: None,
            env_file: None,
            overrides: ConnectionOverrides::default(),
            resource_directory: DEFAULT_DATASET_DIRECTORY.to_string(),
            path: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl PopulatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment selected in the properties file.
    pub fn environment(mut self, name: impl Into<String>) -> Self {
        self.environment = Some(name.into());
        self
    }

    /// Properties file to read instead of `~/.dbpop/dbpop.properties`.
    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Replace all explicit connection values at once.
    pub fn overrides(mut self, overrides: ConnectionOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.overrides.connection_string = Some(connection_string.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.overrides.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.overrides.password = Some(password.into());
        self
    }

    /// Relative dataset directory, searched for upwards from the current directory.
    pub fn resource_directory(mut self, directory: impl Into<String>) -> Self {
        self.resource_directory = directory.into();
        self
    }

    /// Dataset root used as is, skipping the upward search.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Resolve connection settings from overrides and the properties file.
    pub fn settings(&self) -> Result<ConnectionSettings> {
        let env = config::load_env(self.env_file.as_deref())?;
        ConnectionSettings::resolve(
            &env.environment(self.environment.as_deref()),
            self.overrides.clone(),
        )
    }

    /// Dataset root this builder will use.
    pub fn file_tree(&self) -> Result<LocalFileSystem> {
        match &self.path {
            Some(path) => Ok(LocalFileSystem::from_path(path)),
            None => LocalFileSystem::find_from_current_directory(&self.resource_directory),
        }
    }

    /// Connect, detect the dialect and discover datasets.
    pub async fn build(self) -> Result<Populator> {
        let tree = self.file_tree()?;
        let settings = self.settings()?;
        let database = drivers::connect(&settings).await?;
        info!("Using datasets in {}", tree);
        Ok(Populator::new(database, &tree)
            .await?
            .with_batch_size(self.batch_size))
    }
}

//! Connection settings resolution.

use serde::{Deserialize, Serialize};

use super::env::Env;
use crate::error::{DbPopError, Result};

/// Explicitly supplied connection values, e.g. from command line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverrides {
    pub connection_string: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Everything needed to open a connection.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// ADO.NET style connection string.
    pub connection_string: String,

    /// SQL login; when absent the connection string decides authentication.
    pub username: Option<String>,

    pub password: Option<String>,
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("connection_string", &self.connection_string)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ConnectionSettings {
    /// Resolve settings, preferring overrides and falling back to the
    /// `connectionString`, `username` and `password` keys of `env`.
    ///
    /// `env` is only consulted for values that were not overridden.
    pub fn resolve(env: &Env, overrides: ConnectionOverrides) -> Result<Self> {
        let lookup = |value: Option<String>, key: &str| -> Result<Option<String>> {
            match value {
                Some(v) => Ok(Some(v)),
                None => Ok(env.get(key)?.map(String::from)),
            }
        };

        let connection_string = lookup(overrides.connection_string, "connectionString")?
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                DbPopError::Config(format!(
                    "No connection string: use --connection or set connectionString in environment '{}'",
                    env.name()
                ))
            })?;

        Ok(Self {
            connection_string,
            username: lookup(overrides.username, "username")?,
            password: lookup(overrides.password, "password")?,
        })
    }
}

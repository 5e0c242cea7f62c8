//! Environment and connection configuration.

mod connection;
mod env;

pub use connection::{ConnectionOverrides, ConnectionSettings};
pub use env::{Env, DEFAULT_ENVIRONMENT, ENV_FILE};

use std::path::Path;

use tracing::debug;

use crate::error::Result;

/// Load the properties file at `path`, or the default one.
///
/// A missing default file yields an empty [`Env`] so that explicit
/// connection flags work without any file.
pub fn load_env(path: Option<&Path>) -> Result<Env> {
    match path {
        Some(path) => Env::load(path),
        None => {
            let default = Env::default_path()?;
            if default.is_file() {
                Env::load(default)
            } else {
                debug!("No property file at {}", default.display());
                Ok(Env::empty())
            }
        }
    }
}

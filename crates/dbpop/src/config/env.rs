//! Environment properties file.
//!
//! ```text
//! # default environment
//! connectionString = "Server=tcp:localhost,1433;Database=shop;TrustServerCertificate=true"
//! username = sa
//! qa.connectionString = Server=tcp:qa-db,1433;Database=shop
//! qa.username = loader
//! ```
//!
//! Keys with a `<environment>.` prefix belong to that environment, all others
//! to `default`. The first definition of a key wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{DbPopError, Result};

/// Name of the environment used when none is selected.
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Location of the properties file below the home directory.
pub const ENV_FILE: &str = ".dbpop/dbpop.properties";

type Environments = HashMap<String, HashMap<String, String>>;

/// Parsed properties file with one selected environment.
#[derive(Debug, Clone)]
pub struct Env {
    current: String,
    environments: Arc<Environments>,
}

impl Env {
    /// An Env without any environment.
    pub fn empty() -> Self {
        Self {
            current: DEFAULT_ENVIRONMENT.to_string(),
            environments: Arc::new(HashMap::new()),
        }
    }

    /// `<home>/.dbpop/dbpop.properties`.
    pub fn default_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(ENV_FILE))
            .ok_or_else(|| DbPopError::Config("Home directory not found".to_string()))
    }

    /// Load the default properties file.
    pub fn load_default() -> Result<Self> {
        Self::load(Self::default_path()?)
    }

    /// Load a properties file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DbPopError::Config(format!(
                "Property file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Parse properties text.
    pub fn parse(content: &str) -> Self {
        let mut environments: Environments = HashMap::new();
        for line in content.lines() {
            if line.is_empty() || line.starts_with([';', '#', '\'']) {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = unquote(value.trim());

            let (environment, key) = key.split_once('.').unwrap_or((DEFAULT_ENVIRONMENT, key));
            environments
                .entry(environment.to_string())
                .or_default()
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }

        Self {
            current: DEFAULT_ENVIRONMENT.to_string(),
            environments: Arc::new(environments),
        }
    }

    /// Select an environment; `None` selects `default`.
    pub fn environment(&self, name: Option<&str>) -> Env {
        Self {
            current: name.unwrap_or(DEFAULT_ENVIRONMENT).to_string(),
            environments: Arc::clone(&self.environments),
        }
    }

    /// Name of the selected environment.
    pub fn name(&self) -> &str {
        &self.current
    }

    /// Environment names defined in the file, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.environments.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up a key in the selected environment.
    ///
    /// Fails when a named environment is not defined at all. The default
    /// environment always exists, possibly empty.
    pub fn get(&self, key: &str) -> Result<Option<&str>> {
        match self.environments.get(&self.current) {
            Some(environment) => Ok(environment.get(key).map(String::as_str)),
            None if self.current == DEFAULT_ENVIRONMENT => Ok(None),
            None => Err(DbPopError::Config(format!(
                "Invalid environment: {}",
                self.current
            ))),
        }
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LANGUAGES: &str = "one=un\ntwo=deux\nspanish.one=uno\nspanish.two=dos\ndeutch.one=een\ndeutch.two=twee\n";

    #[test]
    fn test_environments_resolve_independently() {
        let env = Env::parse(LANGUAGES);
        assert_eq!(env.get("one").unwrap(), Some("un"));
        assert_eq!(env.get("two").unwrap(), Some("deux"));
        assert_eq!(env.environment(Some("spanish")).get("one").unwrap(), Some("uno"));
        assert_eq!(env.environment(Some("spanish")).get("two").unwrap(), Some("dos"));
        assert_eq!(env.environment(Some("deutch")).get("one").unwrap(), Some("een"));
        assert_eq!(env.environment(Some("deutch")).get("two").unwrap(), Some("twee"));
        assert_eq!(env.environment(None).get("one").unwrap(), Some("un"));
        assert_eq!(env.names(), vec!["default", "deutch", "spanish"]);
    }

    #[test]
    fn test_comments_quotes_and_first_wins() {
        let env = Env::parse(
            "; ini comment\n# hash comment\n' vb comment\nno equals sign\n\n  url = \"a=b\"  \nname='x'\nname=y\nodd=\"half\n",
        );
        assert_eq!(env.get("url").unwrap(), Some("a=b"));
        assert_eq!(env.get("name").unwrap(), Some("x"));
        assert_eq!(env.get("odd").unwrap(), Some("\"half"));
        assert_eq!(env.get("no equals sign").unwrap(), None);
        assert_eq!(env.get("missing").unwrap(), None);
    }

    #[test]
    fn test_unknown_environment_fails_on_lookup() {
        let env = Env::parse(LANGUAGES).environment(Some("klingon"));
        assert_eq!(env.name(), "klingon");
        let err = env.get("one").unwrap_err();
        assert!(err.to_string().contains("Invalid environment: klingon"));
    }

    #[test]
    fn test_default_environment_always_exists() {
        assert_eq!(Env::empty().get("connectionString").unwrap(), None);
        let env = Env::parse("qa.username=loader\n");
        assert_eq!(env.get("username").unwrap(), None);
        assert!(env.environment(Some("prod")).get("username").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(LANGUAGES.as_bytes()).unwrap();
        let env = Env::load(file.path()).unwrap();
        assert_eq!(env.environment(Some("spanish")).get("one").unwrap(), Some("uno"));

        let err = Env::load(file.path().with_extension("missing")).unwrap_err();
        assert!(matches!(err, DbPopError::Config(_)));
    }
}

//! File tree access for dataset discovery and downloads.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{DbPopError, Result};

/// Dataset root searched for when no explicit path is configured.
pub const DEFAULT_DATASET_DIRECTORY: &str = "Tests/resources/testdata";

/// A node in a tree of directories and files.
pub trait FileTree: Send + Sync + fmt::Debug {
    /// Last path segment.
    fn name(&self) -> String;

    /// Node at `sub_path` below this one. The node need not exist yet.
    fn cd(&self, sub_path: &str) -> Box<dyn FileTree>;

    /// Children sorted by name.
    fn list(&self) -> Result<Vec<Box<dyn FileTree>>>;

    fn is_dir(&self) -> bool;

    /// Open the file for reading.
    fn open(&self) -> Result<Box<dyn Read + Send>>;

    /// Create or truncate the file for writing, creating missing parent directories.
    fn create(&self) -> Result<Box<dyn Write + Send>>;

    /// Human readable location, used in error messages.
    fn location(&self) -> String;
}

/// [`FileTree`] over the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
    path: String,
}

impl LocalFileSystem {
    /// Tree rooted at `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            root: path.into(),
            path: String::new(),
        }
    }

    /// Walk up from the current directory until `<ancestor>/<path>` exists.
    pub fn find_from_current_directory(path: &str) -> Result<Self> {
        let current = std::env::current_dir()?;
        Self::find_from(&current, path)
    }

    /// Walk up from `start` until `<ancestor>/<path>` exists.
    pub fn find_from(start: &Path, path: &str) -> Result<Self> {
        let relative = trim_slashes(path);
        start
            .ancestors()
            .map(|dir| dir.join(relative))
            .find(|candidate| candidate.is_dir())
            .map(Self::from_path)
            .ok_or_else(|| DbPopError::InvalidPath(format!("Directory not found: .../{}", relative)))
    }

    /// Absolute or root-relative path of this node.
    pub fn full_path(&self) -> PathBuf {
        if self.path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&self.path)
        }
    }

    fn child(&self, name: &str) -> Self {
        let path = if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.path, name)
        };
        Self {
            root: self.root.clone(),
            path,
        }
    }
}

fn trim_slashes(path: &str) -> &str {
    path.trim_start_matches('/').trim_end_matches('/')
}

impl fmt::Display for LocalFileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_path().display())
    }
}

impl FileTree for LocalFileSystem {
    fn name(&self) -> String {
        match self.path.rsplit_once('/') {
            Some((_, last)) => last.to_string(),
            None if !self.path.is_empty() => self.path.clone(),
            None => self
                .root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    fn cd(&self, sub_path: &str) -> Box<dyn FileTree> {
        Box::new(self.child(trim_slashes(sub_path)))
    }

    fn list(&self) -> Result<Vec<Box<dyn FileTree>>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.full_path())? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names
            .iter()
            .map(|name| Box::new(self.child(name)) as Box<dyn FileTree>)
            .collect())
    }

    fn is_dir(&self) -> bool {
        self.full_path().is_dir()
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        let file = File::open(self.full_path())?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn create(&self) -> Result<Box<dyn Write + Send>> {
        let path = self.full_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn location(&self) -> String {
        self.to_string()
    }
}

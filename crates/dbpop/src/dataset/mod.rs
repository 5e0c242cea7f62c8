//! Dataset discovery.
//!
//! A dataset root is laid out as `<root>/<dataset>/<catalog>/<schema>/<table>.csv`.
//! [`discover`] walks that hierarchy once and binds every CSV file to the
//! table it populates.

mod fs;
mod header;

use std::collections::BTreeMap;

use tracing::debug;

use crate::core::TableName;
use crate::error::{DbPopError, Result};

pub use fs::{FileTree, LocalFileSystem, DEFAULT_DATASET_DIRECTORY};
pub use header::{DataFileHeader, BINARY_TAG};

/// Suffix of table data files.
pub const DATA_FILE_SUFFIX: &str = ".csv";

/// One CSV file bound to the table it populates.
#[derive(Debug)]
pub struct DataFile {
    pub file: Box<dyn FileTree>,
    pub table_name: TableName,
}

/// Named bundle of data files found under one top-level directory.
#[derive(Debug)]
pub struct Dataset {
    pub name: String,
    /// Data files in catalog, schema, file name order.
    pub data_files: Vec<DataFile>,
}

/// Discover all datasets under `root`, keyed by name.
///
/// Datasets without any `*.csv` file are left out.
pub fn discover(root: &dyn FileTree) -> Result<BTreeMap<String, Dataset>> {
    let entries = root.list()?;
    if entries.is_empty() {
        return Err(DbPopError::NoDatasetsFound(root.location()));
    }

    let mut datasets = BTreeMap::new();
    for dataset_dir in entries.into_iter().filter(|e| e.is_dir()) {
        let mut data_files = Vec::new();
        for catalog_dir in subdirectories(dataset_dir.as_ref())? {
            let catalog = catalog_dir.name();
            for schema_dir in subdirectories(catalog_dir.as_ref())? {
                let schema = schema_dir.name();
                for table_file in list_required(schema_dir.as_ref())? {
                    let file_name = table_file.name();
                    let Some(table) = file_name.strip_suffix(DATA_FILE_SUFFIX) else {
                        continue;
                    };
                    if table.is_empty() || table_file.is_dir() {
                        continue;
                    }
                    data_files.push(DataFile {
                        table_name: TableName::new(catalog.clone(), schema.clone(), table),
                        file: table_file,
                    });
                }
            }
        }

        let name = dataset_dir.name();
        if data_files.is_empty() {
            debug!("Skipping dataset {} without data files", name);
            continue;
        }
        debug!("Found dataset {} with {} data files", name, data_files.len());
        datasets.insert(name.clone(), Dataset { name, data_files });
    }

    if datasets.is_empty() {
        return Err(DbPopError::NoDatasetsFound(root.location()));
    }
    Ok(datasets)
}

/// Child directories of a directory that must not be empty. Stray files are skipped.
fn subdirectories(dir: &dyn FileTree) -> Result<Vec<Box<dyn FileTree>>> {
    Ok(list_required(dir)?
        .into_iter()
        .filter(|entry| entry.is_dir())
        .collect())
}

/// Children of a directory that must not be empty.
fn list_required(dir: &dyn FileTree) -> Result<Vec<Box<dyn FileTree>>> {
    let entries = dir.list()?;
    if entries.is_empty() {
        return Err(DbPopError::InvalidPath(dir.location()));
    }
    Ok(entries)
}

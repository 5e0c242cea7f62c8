//! Dataset population.
//!
//! A [`Populator`] discovers the datasets under a root directory once, checks
//! that every table they reference exists, and then loads requested datasets
//! inside a single transaction:
//!
//! 1. `BEGIN TRANSACTION`
//! 2. preparation strategy `before_inserts` over every known table
//! 3. each requested dataset, each data file in discovery order, streamed
//!    through a batched [`Inserter`]
//! 4. preparation strategy `after_inserts`, also when step 2 or 3 failed
//! 5. `COMMIT TRANSACTION`, only when everything succeeded
//!
//! A failed load is never committed and no explicit rollback is issued; the
//! open transaction is discarded by the server once the connection is dropped.
//! Until then the populator refuses further loads with
//! [`DbPopError::TransactionAborted`], since a nested `BEGIN` would leave the
//! outer transaction uncommitted.

mod builder;
mod inserter;

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::{Database, PreparationStrategy, Table, TableName};
use crate::dataset::{self, DataFile, DataFileHeader, Dataset, FileTree};
use crate::error::{DbPopError, Result};

pub use builder::PopulatorBuilder;
pub use inserter::{Inserter, DEFAULT_BATCH_SIZE};

/// Summary of one [`Populator::load`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulateResult {
    /// Datasets loaded, in load order.
    pub datasets: Vec<String>,

    /// Rows inserted.
    pub rows: u64,

    /// Wall clock duration in seconds.
    pub duration_seconds: f64,
}

impl PopulateResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Loads datasets into one database.
pub struct Populator {
    database: Box<dyn Database>,
    datasets: BTreeMap<String, Dataset>,
    tables: BTreeMap<TableName, Table>,
    batch_size: usize,
    /// Set between `BEGIN` and a successful `COMMIT`.
    in_transaction: bool,
}

impl std::fmt::Debug for Populator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Populator")
            .field("database", &self.database.product_name())
            .field("datasets", &self.datasets.keys().collect::<Vec<_>>())
            .field("tables", &self.tables.len())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl Populator {
    /// Discover datasets under `root` and validate them against the live schema.
    ///
    /// Fails with [`DbPopError::MissingTable`] before anything is written if a
    /// data file targets a table the database does not have.
    pub async fn new(mut database: Box<dyn Database>, root: &dyn FileTree) -> Result<Self> {
        let datasets = dataset::discover(root)?;

        let referenced: BTreeSet<TableName> = datasets
            .values()
            .flat_map(|d| d.data_files.iter().map(|f| f.table_name.clone()))
            .collect();
        let tables: BTreeMap<TableName, Table> = database
            .load_tables(&referenced)
            .await?
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();

        validate_tables_exist(&datasets, &referenced, &tables)?;

        info!(
            "Found {} datasets referencing {} tables in {}",
            datasets.len(),
            tables.len(),
            root.location()
        );
        Ok(Self {
            database,
            datasets,
            tables,
            batch_size: DEFAULT_BATCH_SIZE,
            in_transaction: false,
        })
    }

    /// Convenience builder that connects using environment settings.
    pub fn builder() -> PopulatorBuilder {
        PopulatorBuilder::new()
    }

    /// Override the inserter batch threshold.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Discovered dataset names, sorted.
    pub fn dataset_names(&self) -> Vec<&str> {
        self.datasets.keys().map(String::as_str).collect()
    }

    /// Definitions of every table referenced by any dataset.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn database(&mut self) -> &mut dyn Database {
        self.database.as_mut()
    }

    /// Release the connection.
    pub fn into_database(self) -> Box<dyn Database> {
        self.database
    }

    /// Load datasets in the given order, returning the number of rows inserted.
    ///
    /// After a failed load the connection still holds the uncommitted
    /// transaction, and every later call fails with
    /// [`DbPopError::TransactionAborted`].
    pub async fn load<S: AsRef<str>>(&mut self, dataset_names: &[S]) -> Result<u64> {
        if self.in_transaction {
            return Err(DbPopError::TransactionAborted);
        }
        self.database.begin_transaction().await?;
        self.in_transaction = true;

        let touched: BTreeSet<&TableName> = dataset_names
            .iter()
            .filter_map(|name| self.datasets.get(name.as_ref()))
            .flat_map(|d| d.data_files.iter().map(|f| &f.table_name))
            .collect();
        debug!(
            "Requested datasets touch {} of {} tables",
            touched.len(),
            self.tables.len()
        );

        let all_tables: Vec<Table> = self.tables.values().cloned().collect();
        let strategy = self.database.create_preparation_strategy(&all_tables);

        let inserted = self.prepare_and_insert(strategy.as_ref(), dataset_names).await;
        let cleanup = strategy.after_inserts(self.database.as_mut()).await;

        let rows = match (inserted, cleanup) {
            (Ok(rows), Ok(())) => rows,
            (Err(e), cleanup) => {
                if let Err(cleanup_err) = cleanup {
                    warn!("Cleanup after failed load also failed: {}", cleanup_err);
                }
                return Err(e);
            }
            (Ok(_), Err(e)) => return Err(e),
        };

        self.database.commit_transaction().await?;
        self.in_transaction = false;
        info!("Loaded {} rows", rows);
        Ok(rows)
    }

    /// Like [`load`](Populator::load), with timing and dataset names for reporting.
    pub async fn load_with_result<S: AsRef<str>>(
        &mut self,
        dataset_names: &[S],
    ) -> Result<PopulateResult> {
        let started = Instant::now();
        let rows = self.load(dataset_names).await?;
        Ok(PopulateResult {
            datasets: dataset_names.iter().map(|n| n.as_ref().to_string()).collect(),
            rows,
            duration_seconds: started.elapsed().as_secs_f64(),
        })
    }

    async fn prepare_and_insert<S: AsRef<str>>(
        &mut self,
        strategy: &dyn PreparationStrategy,
        dataset_names: &[S],
    ) -> Result<u64> {
        strategy.before_inserts(self.database.as_mut()).await?;

        let mut rows = 0;
        for name in dataset_names {
            let name = name.as_ref();
            let dataset = self
                .datasets
                .get(name)
                .ok_or_else(|| DbPopError::DatasetNotFound(name.to_string()))?;
            info!("Loading dataset {}", name);
            for data_file in &dataset.data_files {
                rows += load_data_file(
                    self.database.as_mut(),
                    &self.tables,
                    data_file,
                    self.batch_size,
                )
                .await?;
            }
        }
        Ok(rows)
    }
}

async fn load_data_file(
    database: &mut dyn Database,
    tables: &BTreeMap<TableName, Table>,
    data_file: &DataFile,
    batch_size: usize,
) -> Result<u64> {
    let table = tables.get(&data_file.table_name).ok_or_else(|| {
        DbPopError::missing_table(data_file.table_name.qualified_name(), data_file.file.location())
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data_file.file.open()?);
    let headers: Vec<DataFileHeader> = reader
        .headers()?
        .iter()
        .map(DataFileHeader::parse)
        .collect();

    let mut inserter = database
        .create_inserter(table, headers)?
        .with_batch_size(batch_size);

    let streamed = stream_records(&mut reader, &mut inserter, database).await;
    let closed = inserter.close(database).await;
    let rows = streamed?;
    closed?;

    debug!("Read {} rows from {}", rows, data_file.file.location());
    Ok(rows)
}

async fn stream_records<R: Read>(
    reader: &mut csv::Reader<R>,
    inserter: &mut Inserter,
    database: &mut dyn Database,
) -> Result<u64> {
    let mut rows = 0u64;
    let mut record = csv::StringRecord::new();
    while reader.read_record(&mut record)? {
        inserter.insert(database, &record).await?;
        rows += 1;
    }
    Ok(rows)
}

fn validate_tables_exist(
    datasets: &BTreeMap<String, Dataset>,
    referenced: &BTreeSet<TableName>,
    tables: &BTreeMap<TableName, Table>,
) -> Result<()> {
    let Some(missing) = referenced.iter().find(|name| !tables.contains_key(*name)) else {
        return Ok(());
    };
    let data_file = datasets
        .values()
        .flat_map(|d| d.data_files.iter())
        .find(|f| &f.table_name == missing)
        .map(|f| f.file.location())
        .unwrap_or_default();
    Err(DbPopError::missing_table(missing.qualified_name(), data_file))
}

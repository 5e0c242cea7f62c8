//! dbpop CLI - populate databases from CSV datasets and download tables into them.

use clap::{Args, Parser, Subcommand};
use dbpop::config::{self, ConnectionOverrides, ConnectionSettings};
use dbpop::{drivers, DbPopError, Downloader, Populator, TableSelector};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbpop")]
#[command(about = "Populate databases from CSV datasets and download tables as datasets")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Output JSON result to stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    /// Log verbosity: debug, info, warn, error (RUST_LOG takes precedence)
    #[arg(long, default_value = "info", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Connection string (ADO.NET syntax), overrides the environment
    #[arg(long, global = true)]
    connection: Option<String>,

    /// SQL login, overrides the environment
    #[arg(long, global = true)]
    username: Option<String>,

    /// Password, overrides the environment
    #[arg(long, global = true)]
    password: Option<String>,

    /// Environment to read from the properties file [default: default]
    #[arg(long, global = true)]
    environment: Option<String>,

    /// Properties file [default: ~/.dbpop/dbpop.properties]
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

impl ConnectionArgs {
    fn overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            connection_string: self.connection.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    fn settings(&self) -> Result<ConnectionSettings, DbPopError> {
        let env = config::load_env(self.env_file.as_deref())?;
        ConnectionSettings::resolve(
            &env.environment(self.environment.as_deref()),
            self.overrides(),
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Empty all dataset tables and load the given datasets
    Populate {
        /// Dataset root [default: Tests/resources/testdata, searched upwards]
        #[arg(long)]
        path: Option<PathBuf>,

        /// Datasets to load, in order
        #[arg(required = true)]
        datasets: Vec<String>,
    },

    /// Download tables into a dataset
    Download {
        /// Name of the dataset to write
        #[arg(long)]
        dataset: String,

        /// Directory holding the dataset
        #[arg(long, default_value = "./output")]
        directory: PathBuf,

        /// Tables to download: catalog, catalog.schema or catalog.schema.table
        #[arg(required = true)]
        selectors: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), DbPopError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    match cli.command {
        Commands::Populate { path, datasets } => {
            let mut builder = Populator::builder().overrides(cli.connection.overrides());
            if let Some(environment) = &cli.connection.environment {
                builder = builder.environment(environment);
            }
            if let Some(env_file) = &cli.connection.env_file {
                builder = builder.env_file(env_file);
            }
            if let Some(path) = path {
                builder = builder.path(path);
            }

            let mut populator = builder.build().await?;
            let result = populator.load_with_result(&datasets).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nPopulation completed!");
                println!("  Datasets: {}", result.datasets.join(", "));
                println!("  Rows: {}", result.rows);
                println!("  Duration: {:.2}s", result.duration_seconds);
            }
        }

        Commands::Download {
            dataset,
            directory,
            selectors,
        } => {
            let selectors = selectors
                .iter()
                .map(|s| TableSelector::parse(s))
                .collect::<Result<Vec<_>, _>>()?;

            let settings = cli.connection.settings()?;
            let database = drivers::connect(&settings).await?;
            info!("Downloading into {}", directory.join(&dataset).display());

            let mut downloader = Downloader::new(database, &directory, &dataset);
            let result = downloader.download_all(&selectors).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nDownload completed!");
                for table in &result.tables {
                    println!("  {}: {} rows -> {}", table.table, table.rows, table.file);
                    if table.skipped_values > 0 {
                        println!("    {} oversized values skipped", table.skipped_values);
                    }
                }
                println!("  Rows: {}", result.rows);
                println!("  Duration: {:.2}s", result.duration_seconds);
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

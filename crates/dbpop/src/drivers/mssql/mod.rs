//! Microsoft SQL Server dialect.

mod connection;
mod database;
mod preparation;
mod types;

pub use connection::{MssqlClient, MssqlConnection};
pub use database::MssqlDatabase;
pub use preparation::ReferentialIntegrityStrategy;
pub use types::{column_type_for, is_row_version};

/// Product name reported by SQL Server connections.
pub const SQL_SERVER_PRODUCT_NAME: &str = "Microsoft SQL Server";

/// Quoted identifier pattern SQL Server describes its bracket quoting with.
pub const SQL_SERVER_QUOTED_IDENTIFIER_PATTERN: &str = r"(([^\[]|\]\])*)";

//! TDS connection setup.

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::ConnectionSettings;
use crate::core::{DatabaseConnection, ProductMetadata};
use crate::error::Result;

use super::{SQL_SERVER_PRODUCT_NAME, SQL_SERVER_QUOTED_IDENTIFIER_PATTERN};

/// Tiberius client over a tokio TCP stream.
pub type MssqlClient = Client<Compat<TcpStream>>;

/// An open SQL Server connection that has not been bound to a dialect yet.
pub struct MssqlConnection {
    client: MssqlClient,
}

impl MssqlConnection {
    /// Translate settings into a tiberius config.
    ///
    /// An explicit username switches to SQL Server authentication; otherwise
    /// the connection string decides.
    pub fn build_config(settings: &ConnectionSettings) -> Result<Config> {
        let mut config = Config::from_ado_string(&settings.connection_string)?;
        if let Some(username) = &settings.username {
            config.authentication(AuthMethod::sql_server(
                username,
                settings.password.as_deref().unwrap_or_default(),
            ));
        }
        Ok(config)
    }

    /// Open a connection.
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let config = Self::build_config(settings)?;
        let addr = config.get_addr();
        debug!("Connecting to {}", addr);

        let tcp = TcpStream::connect(addr.as_str()).await?;
        tcp.set_nodelay(true).ok();

        let mut client = Client::connect(config, tcp.compat_write()).await?;
        client
            .simple_query("SET QUOTED_IDENTIFIER ON")
            .await?
            .into_results()
            .await?;

        info!("Connected to {}", addr);
        Ok(Self { client })
    }

    pub fn into_client(self) -> MssqlClient {
        self.client
    }
}

#[async_trait]
impl DatabaseConnection for MssqlConnection {
    async fn product_metadata(&mut self) -> Result<ProductMetadata> {
        let row = self
            .client
            .simple_query("SELECT @@VERSION")
            .await?
            .into_row()
            .await?;
        let version = row
            .as_ref()
            .and_then(|r| r.get::<&str, _>(0))
            .unwrap_or_default();
        debug!("Server version: {}", version.lines().next().unwrap_or_default());
        Ok(product_metadata_from_version(version))
    }
}

/// Every SQL Server edition, Azure SQL included, reports a `Microsoft SQL` prefix.
fn product_metadata_from_version(version: &str) -> ProductMetadata {
    if version.starts_with("Microsoft SQL") {
        ProductMetadata {
            product_name: SQL_SERVER_PRODUCT_NAME.to_string(),
            quoted_identifier_pattern: Some(SQL_SERVER_QUOTED_IDENTIFIER_PATTERN.to_string()),
        }
    } else {
        ProductMetadata {
            product_name: version.lines().next().unwrap_or_default().trim().to_string(),
            quoted_identifier_pattern: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_from_version() {
        let metadata = product_metadata_from_version(
            "Microsoft SQL Server 2022 (RTM-CU12) - 16.0.4115.5 (X64)\n\tMar  4 2024",
        );
        assert_eq!(metadata.product_name, SQL_SERVER_PRODUCT_NAME);
        assert_eq!(
            metadata.quoted_identifier_pattern.as_deref(),
            Some(SQL_SERVER_QUOTED_IDENTIFIER_PATTERN)
        );

        let azure = product_metadata_from_version("Microsoft SQL Azure (RTM) - 12.0.2000.8");
        assert_eq!(azure.product_name, SQL_SERVER_PRODUCT_NAME);
    }

    #[test]
    fn test_unknown_product() {
        let metadata = product_metadata_from_version("PostgreSQL 16.2 on x86_64\nmore");
        assert_eq!(metadata.product_name, "PostgreSQL 16.2 on x86_64");
        assert_eq!(metadata.quoted_identifier_pattern, None);
    }

    #[test]
    fn test_build_config_accepts_ado_string() {
        let settings = ConnectionSettings {
            connection_string: "Server=tcp:localhost,1433;Database=shop;TrustServerCertificate=true"
                .to_string(),
            username: Some("sa".to_string()),
            password: Some("secret".to_string()),
        };
        let config = MssqlConnection::build_config(&settings).unwrap();
        assert_eq!(config.get_addr(), "localhost:1433");
    }
}

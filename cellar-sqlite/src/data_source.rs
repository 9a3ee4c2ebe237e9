use crate::SqliteConnection;
use cellar_core::{DataSource, Result};

/// Opens a new [`SqliteConnection`] on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteDataSource {
    url: String,
}

impl SqliteDataSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl DataSource for SqliteDataSource {
    type Connection = SqliteConnection;

    async fn connection(&self) -> Result<SqliteConnection> {
        SqliteConnection::connect(&self.url).await
    }
}

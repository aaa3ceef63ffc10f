//! [`UserStore`] backed by one Elasticsearch index

use crate::client::{AuthMethod, ElasticsearchClient};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;
use userdex::config::BackendConfig;
use userdex::{User, UserStore};

pub struct ElasticsearchUserStore {
    client: ElasticsearchClient,
    index: String,
    refresh: bool,
    max_results: usize,
}

impl ElasticsearchUserStore {
    pub fn new(client: ElasticsearchClient, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
            refresh: true,
            max_results: 10_000,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let client = ElasticsearchClient::with_timeout(
            Url::parse(&config.url)?,
            AuthMethod::from(&config.auth),
            config.request_timeout_ms.map(Duration::from_millis),
        )?;

        Ok(Self::new(client, config.index.clone())
            .with_refresh(config.refresh_on_write)
            .with_max_results(config.max_results))
    }

    /// Refresh the index after each write
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn client(&self) -> &ElasticsearchClient {
        &self.client
    }

    pub fn index(&self) -> &str {
        &self.index
    }
}

#[async_trait]
impl UserStore for ElasticsearchUserStore {
    async fn create_index(&self, name: &str) -> userdex::Result<()> {
        if self.client.create_index(name).await? {
            tracing::info!("Created index '{}'", name);
        } else {
            tracing::debug!("Index '{}' already exists", name);
        }
        Ok(())
    }

    async fn upsert(&self, user: &User) -> userdex::Result<()> {
        self.client
            .index_document(&self.index, user.key.as_str(), user, self.refresh)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> userdex::Result<Option<User>> {
        Ok(self.client.get_document(&self.index, key).await?)
    }

    async fn get_all(&self) -> userdex::Result<Vec<User>> {
        Ok(self
            .client
            .search_all(&self.index, self.max_results)
            .await?)
    }

    async fn delete(&self, key: &str) -> userdex::Result<bool> {
        Ok(self
            .client
            .delete_document(&self.index, key, self.refresh)
            .await?)
    }

    async fn delete_all(&self) -> userdex::Result<u64> {
        Ok(self
            .client
            .delete_all_documents(&self.index, self.refresh)
            .await?)
    }

    async fn ping(&self) -> userdex::Result<()> {
        self.client.ping().await?;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "elasticsearch"
    }
}

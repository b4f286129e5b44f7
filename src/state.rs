use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::{
    config::{AppConfig, StoreBackend},
    pages::PageRenderer,
    users::{
        memory::MemoryUserStore,
        repo::{MongoUserStore, UserStore},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub pages: Arc<PageRenderer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let users = match config.store {
            StoreBackend::Mongo => {
                let store = MongoUserStore::connect(&config.mongo)
                    .await
                    .context("connect to mongodb")?;
                store.ping().await.context("ping mongodb")?;
                info!(
                    database = %config.mongo.database,
                    collection = %config.mongo.collection,
                    "connected to mongodb"
                );
                Arc::new(store) as Arc<dyn UserStore>
            }
            StoreBackend::Memory => {
                info!("using in-memory user store; data is lost on exit");
                Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };

        let pages = Arc::new(PageRenderer::new(
            config.templates_dir.clone(),
            config.template_cache,
        ));

        Ok(Self::from_parts(config, users, pages))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        pages: Arc<PageRenderer>,
    ) -> Self {
        Self {
            config,
            users,
            pages,
        }
    }

    /// In-memory store and templates from `templates_dir`.
    #[cfg(test)]
    pub fn fake(templates_dir: &std::path::Path) -> Self {
        use crate::config::MongoConfig;

        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            store: StoreBackend::Memory,
            mongo: MongoConfig {
                uri: "mongodb://localhost:27017".into(),
                database: "test".into(),
                collection: "users".into(),
            },
            templates_dir: templates_dir.to_path_buf(),
            template_cache: false,
        });
        let pages = Arc::new(PageRenderer::new(templates_dir, false));
        Self::from_parts(config, Arc::new(MemoryUserStore::new()), pages)
    }
}

use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres};

use crate::{config::Config, media::MediaStore};

pub struct AppState {
    pub pool: Pool<Postgres>,
    pub cache: Option<MultiplexedConnection>,
    pub config: Config,
    pub media: MediaStore,
}

impl AppState {
    pub fn new(
        pool: Pool<Postgres>,
        cache: Option<MultiplexedConnection>,
        config: Config,
    ) -> Arc<Self> {
        let media = MediaStore::new(config.media_root.clone(), config.media_url.clone());

        Arc::new(Self {
            pool,
            cache,
            config,
            media,
        })
    }

    pub fn cache(&self) -> Option<MultiplexedConnection> {
        self.cache.clone()
    }
}

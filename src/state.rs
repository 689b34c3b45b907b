use std::sync::Arc;

use crate::{config::Config, engine::ContestEngine, store::MemoryStore};

pub struct AppState {
    pub config: Config,
    pub engine: ContestEngine,
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Self::with_config(Config::load())
    }

    pub fn with_config(config: Config) -> Arc<Self> {
        let store = Arc::new(MemoryStore::default());
        let engine = ContestEngine::new(store, &config);

        Arc::new(Self { config, engine })
    }
}

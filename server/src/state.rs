use std::sync::Arc;

use crate::{
    config::Environment,
    idempotency::IdempotencyScope,
    store::{IdempotencyStore, ItemStore, MemoryIdempotencyStore, MemoryItemStore, SqliteStore},
};

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Store handles and per-deployment settings shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub items: Arc<dyn ItemStore>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub idempotency_scope: IdempotencyScope,
    pub max_body_bytes: usize,
    pub environment: Environment,
}

impl AppState {
    pub fn new(items: Arc<dyn ItemStore>, idempotency: Arc<dyn IdempotencyStore>) -> Self {
        Self {
            items,
            idempotency,
            idempotency_scope: IdempotencyScope::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            environment: Environment::Production,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryItemStore::new()),
            Arc::new(MemoryIdempotencyStore::new()),
        )
    }

    pub fn sqlite(store: SqliteStore) -> Self {
        let store = Arc::new(store);
        Self::new(store.clone(), store)
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}

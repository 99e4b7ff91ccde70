use importer::{ImportStore, SharedCatalog};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ImportStore>,
    pub catalog: SharedCatalog,
}

impl AppState {
    pub fn new(store: Arc<dyn ImportStore>, catalog: SharedCatalog) -> Self {
        Self { store, catalog }
    }
}

//! Shared application state for all routes.

use crate::database::Database;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        AppState { db: Arc::new(db) }
    }
}

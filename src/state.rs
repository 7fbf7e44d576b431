//! Shared application state for all routes.

use crate::auth::TokenSigner;
use crate::query::QueryEngine;
use crate::store::EntityStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: QueryEngine,
    pub store: Arc<dyn EntityStore>,
    pub signer: Arc<dyn TokenSigner>,
}

impl AppState {
    pub fn new(engine: QueryEngine, store: Arc<dyn EntityStore>, signer: Arc<dyn TokenSigner>) -> Self {
        AppState { engine, store, signer }
    }
}

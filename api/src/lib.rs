use std::sync::Arc;

use axum::{Router, routing::get};

pub mod config;
pub mod db;
pub mod error;
pub mod json;
pub mod schema;
pub mod thread;

use thread::{ReplyInteractor, store::ThreadStore};

/// Shared state handed to every handler. Built once in `main` from explicitly
/// constructed parts.
pub struct App<S> {
    pub threads: Arc<ReplyInteractor<S>>,
}

impl<S> Clone for App<S> {
    fn clone(&self) -> Self {
        Self {
            threads: self.threads.clone(),
        }
    }
}

impl<S: ThreadStore> App<S> {
    pub fn new(store: S) -> Self {
        Self {
            threads: Arc::new(ReplyInteractor::new(store)),
        }
    }
}

pub fn router<S: ThreadStore + 'static>(app: App<S>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(thread::routes::route::<S>())
        .with_state(app)
}

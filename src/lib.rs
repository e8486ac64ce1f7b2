pub mod api;
pub mod core;
pub mod error;
pub mod infra;
pub mod models;

use axum::{extract::DefaultBodyLimit, routing::post, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::answer::answer_questions;

pub use crate::error::{AppError, Result};
pub use crate::infra::config::Config;

pub mod ax_state {
    use crate::core::model_client::ModelClient;
    use crate::error::Result;
    use crate::infra::config::Config;

    /// Process-wide, read-only. Every request works off its own copies of
    /// the uploaded data, so nothing here needs locking.
    pub struct AppState {
        pub config: Config,
        pub model: ModelClient,
    }

    impl AppState {
        pub fn new(config: Config) -> Result<Self> {
            let model = ModelClient::new(&config)?;
            Ok(Self { config, model })
        }
    }
}

pub fn build_router(state: Arc<ax_state::AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/answer", post(answer_questions))
        .with_state(state)
        // Uploads are unbounded
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

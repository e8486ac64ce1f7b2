use doc_qa_service::ax_state::AppState;
use doc_qa_service::infra::logging;
use doc_qa_service::{build_router, Config};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let config = Config::from_env();
    let addr = config.bind_addr;
    let state = Arc::new(AppState::new(config)?);
    info!(
        endpoint = state.model.endpoint(),
        model = state.model.model(),
        "model client ready"
    );

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("doc-qa-service listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
